// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Block definition/insertion value types (§3), used by the flattener
//! (§4.3) to describe what it read off an `INSERT`/`BLOCK` pair before it
//! resolves them into primitives.

use crate::geom::Point2;

/// A `BLOCK` definition: name, anchor point, and entity children (the
/// entity nodes themselves stay in the tree; this only records the anchor
/// used to re-center instances).
#[derive(Clone, Copy, Debug)]
pub struct BlockAnchor {
    pub point: Point2,
}

/// The transform parameters carried by an `INSERT` entity (§3).
#[derive(Clone, Copy, Debug)]
pub struct BlockInsert {
    pub insert_point: Point2,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation_deg: f64,
    pub columns: u32,
    pub rows: u32,
    pub col_spacing: f64,
    pub row_spacing: f64,
}

impl Default for BlockInsert {
    fn default() -> Self {
        BlockInsert {
            insert_point: Point2::new(0.0, 0.0),
            scale_x: 1.0,
            scale_y: 1.0,
            rotation_deg: 0.0,
            columns: 1,
            rows: 1,
            col_spacing: 0.0,
            row_spacing: 0.0,
        }
    }
}
