// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The polyline value type shared by the extractor, post-processor and
//! CAMM-GL emitter (§3).

use crate::geom::{BBox, Point2};

/// Whether a polyline is logically open or closed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PolylineKind {
    Open,
    Closed,
}

/// A 2D polyline: a kind plus an ordered point sequence.
///
/// For `Closed`, the last point is either already equal to the first or
/// will be made so at an appropriate stage (§3) — the type itself doesn't
/// enforce that invariant, since several passes (stitching in particular)
/// legitimately operate on a closed polyline before it's been snapped shut.
#[derive(Clone, Debug)]
pub struct Polyline {
    pub kind: PolylineKind,
    pub points: Vec<Point2>,
}

impl Polyline {
    pub fn new(kind: PolylineKind, points: Vec<Point2>) -> Self {
        Polyline { kind, points }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.kind == PolylineKind::Closed
    }

    pub fn first(&self) -> Option<Point2> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point2> {
        self.points.last().copied()
    }

    /// The axis-aligned bbox of this polyline, or `None` if it is
    /// degenerate (§4.6).
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.points)
    }

    /// Total path length (sum of segment lengths), used by the overlap and
    /// knife-offset passes.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_sums_segments() {
        let pl = Polyline::new(
            PolylineKind::Open,
            vec![Point2::new(0.0, 0.0), Point2::new(3.0, 0.0), Point2::new(3.0, 4.0)],
        );
        assert!((pl.length() - 7.0).abs() < 1e-9);
    }
}
