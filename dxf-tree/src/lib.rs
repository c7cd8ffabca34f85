// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
`dxf-tree` is the attributed tree representation (§3 of the design) shared
by every other crate in the knifecut workspace: the group-code parser
builds it, the tree walker/boil-down/flattener transform it in place, and
the polyline extractor reads `LWPOLYLINE` geometry back out of it.
*/

#![forbid(unsafe_code)]

mod blocks;
mod error;
mod geom;
mod names;
mod polyline;
mod tree;
mod value;

pub use blocks::{BlockAnchor, BlockInsert};
pub use error::{Error, Result};
pub use geom::{BBox, FuzzyEq, Point2, Transform, DEFAULT_EPS};
pub use names::{
    attr_name_for_code, code_for_attr_name, end_node_for, is_known_acadver, starter_for_end_node,
    CANONICAL_SECTIONS, GENERAL_ATTRS,
};
pub use polyline::{Polyline, PolylineKind};
pub use tree::{EndTag, NodeId, Tree};
pub use value::{format_float, Value};
