// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The polyline extractor (C6, §4.5): pulls `LWPOLYLINE` geometry out of
//! `ENTITIES` into a uniform polyline list.

use dxf_tree::{Error, NodeId, Point2, Polyline, PolylineKind, Result, Tree};

use crate::walker::find_section;

/// Walks `ENTITIES`, reading every `LWPOLYLINE`'s parallel `x`/`y` arrays
/// into a [`Polyline`]. Any other entity kind still present triggers a
/// warning and is skipped — the pipeline guarantees none survive once
/// boil-down has been run with `{POINT, LWPOLYLINE}` as the acceptable set
/// (§4.5).
pub fn extract_polylines(tree: &Tree) -> Result<Vec<Polyline>> {
    let root = tree.root();
    let Some(entities) = find_section(tree, root, "ENTITIES") else {
        return Ok(Vec::new());
    };

    let mut polylines = Vec::new();
    for &id in tree.children(entities) {
        match tree.name(id) {
            "LWPOLYLINE" => polylines.push(extract_one(tree, id)?),
            "POINT" => continue,
            other => log::warn!("skipping non-LWPOLYLINE entity '{}' in ENTITIES during extraction", other),
        }
    }
    Ok(polylines)
}

fn extract_one(tree: &Tree, id: NodeId) -> Result<Polyline> {
    let xs = tree
        .attr(id, "x")
        .ok_or_else(|| Error::InvalidPolyline("LWPOLYLINE has no x array".into()))?
        .as_f64_list()?;
    let ys = tree
        .attr(id, "y")
        .ok_or_else(|| Error::InvalidPolyline("LWPOLYLINE has no y array".into()))?
        .as_f64_list()?;

    if xs.len() != ys.len() {
        return Err(Error::InvalidPolyline("LWPOLYLINE x/y arrays have different lengths".into()));
    }
    if xs.is_empty() {
        return Err(Error::InvalidPolyline("LWPOLYLINE has no points".into()));
    }

    let closed = tree
        .attr(id, "int")
        .map(|v| v.as_i64().map(|n| n & 1 != 0))
        .transpose()?
        .unwrap_or(false);

    let points: Vec<Point2> = xs.iter().zip(ys.iter()).map(|(&x, &y)| Point2::new(x, y)).collect();
    let kind = if closed { PolylineKind::Closed } else { PolylineKind::Open };
    Ok(Polyline::new(kind, points))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities_with(flags: &str) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let entities = tree.alloc("SECTION");
        tree.set_attr(entities, "name", "ENTITIES");
        tree.push_child(root, entities);

        let poly = tree.alloc("LWPOLYLINE");
        tree.push_attr(poly, "x", "0.0".into());
        tree.push_attr(poly, "x", "1.0".into());
        tree.push_attr(poly, "y", "0.0".into());
        tree.push_attr(poly, "y", "1.0".into());
        tree.set_attr(poly, "int", flags);
        tree.push_child(entities, poly);

        (tree, entities)
    }

    #[test]
    fn extracts_open_polyline() {
        let (tree, _) = entities_with("0");
        let polylines = extract_polylines(&tree).unwrap();
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].kind, PolylineKind::Open);
        assert_eq!(polylines[0].points, vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]);
    }

    #[test]
    fn closed_flag_bit_zero_marks_closed() {
        let (tree, _) = entities_with("1");
        let polylines = extract_polylines(&tree).unwrap();
        assert_eq!(polylines[0].kind, PolylineKind::Closed);
    }

    #[test]
    fn other_entity_kinds_are_skipped_with_warning() {
        let (mut tree, entities) = entities_with("0");
        let line = tree.alloc("LINE");
        tree.push_child(entities, line);
        let polylines = extract_polylines(&tree).unwrap();
        assert_eq!(polylines.len(), 1);
    }

    #[test]
    fn mismatched_arrays_are_invalid_polyline() {
        let (mut tree, entities) = entities_with("0");
        let poly = tree.children(entities)[0];
        tree.push_attr(poly, "x", "2.0".into());
        let err = extract_polylines(&tree).unwrap_err();
        assert!(matches!(err, Error::InvalidPolyline(_)));
    }
}
