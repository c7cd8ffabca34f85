// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The entity rewriter ("boil-down", C4, §4.4): rewrites entities outside
//! an acceptable set into that set via shortest-path substitution over a
//! fixed conversion graph.

use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;

use dxf_tree::{Error, NodeId, Point2, Result, Tree, GENERAL_ATTRS};

use crate::options::BoilDownOptions;
use crate::walker::{walk, FilterOutcome};

/// A single edge of the conversion graph (§4.4's table), applied
/// left-to-right.
struct Edge {
    from: &'static str,
    to: &'static str,
    convert: fn(&mut Tree, NodeId) -> Result<Vec<NodeId>>,
}

const GRAPH: &[Edge] = &[
    Edge { from: "SPLINE", to: "LWPOLYLINE", convert: spline_to_lwpolyline },
    Edge { from: "POLYLINE", to: "LWPOLYLINE", convert: polyline_to_lwpolyline },
    Edge { from: "ELLIPSE", to: "LWPOLYLINE", convert: ellipse_to_lwpolyline },
    Edge { from: "LINE", to: "LWPOLYLINE", convert: line_to_lwpolyline },
    Edge { from: "ARC", to: "ELLIPSE", convert: arc_to_ellipse },
    Edge { from: "CIRCLE", to: "ARC", convert: circle_to_arc },
    Edge { from: "LWPOLYLINE", to: "LINE", convert: lwpolyline_to_line },
];

/// Finds, for every kind reachable by at least one edge, the shortest
/// chain of `(target_kind, converter)` steps landing in `acceptable`, via
/// BFS from the acceptable set over the *reverse* conversion graph (§9
/// redesign note).
fn build_chains(acceptable: &[String]) -> HashMap<&'static str, Vec<&'static Edge>> {
    let mut chains: HashMap<&'static str, Vec<&'static Edge>> = HashMap::new();
    let mut queue: VecDeque<&'static str> = VecDeque::new();

    let mut node_names: Vec<&'static str> = Vec::new();
    for edge in GRAPH {
        if !node_names.contains(&edge.from) {
            node_names.push(edge.from);
        }
        if !node_names.contains(&edge.to) {
            node_names.push(edge.to);
        }
    }
    for &name in &node_names {
        if acceptable.iter().any(|a| a == name) {
            chains.insert(name, Vec::new());
            queue.push_back(name);
        }
    }

    while let Some(target) = queue.pop_front() {
        let chain_to_target = chains[target].clone();
        for edge in GRAPH {
            if edge.to == target && !chains.contains_key(edge.from) {
                let mut chain = vec![edge];
                chain.extend(chain_to_target.iter().copied());
                chains.insert(edge.from, chain);
                queue.push_back(edge.from);
            }
        }
    }

    chains
}

/// Rewrites every entity under `ENTITIES`/`BLOCKS` whose kind is not in
/// `options.acceptable` into a chain of acceptable-set entities (§4.4).
pub fn boil_down(tree: &mut Tree, options: &BoilDownOptions) -> Result<()> {
    let chains = build_chains(&options.acceptable);

    let root = tree.root();
    if let Some(entities) = crate::walker::find_section(tree, root, "ENTITIES") {
        boil_down_children(tree, entities, &chains, &options.acceptable)?;
    }
    if let Some(blocks) = crate::walker::find_section(tree, root, "BLOCKS") {
        for block in tree.children(blocks).to_vec() {
            boil_down_children(tree, block, &chains, &options.acceptable)?;
        }
    }
    Ok(())
}

fn boil_down_children(
    tree: &mut Tree,
    parent: NodeId,
    chains: &HashMap<&'static str, Vec<&'static Edge>>,
    acceptable: &[String],
) -> Result<()> {
    let mut unresolved = Vec::new();
    let mut error: Option<Error> = None;

    walk(
        tree,
        parent,
        &mut |tree, id| {
            let kind = tree.name(id).to_string();
            if acceptable.iter().any(|a| a == &kind) {
                return FilterOutcome::keep();
            }
            let chain = match chains.get(kind.as_str()) {
                Some(chain) => chain.clone(),
                None => {
                    unresolved.push(kind);
                    return FilterOutcome::keep();
                }
            };
            if error.is_some() {
                return FilterOutcome::keep();
            }
            match apply_chain(tree, id, &chain) {
                Ok(replacement) => FilterOutcome::replace(replacement),
                Err(e) => {
                    error = Some(e);
                    FilterOutcome::keep()
                }
            }
        },
        &mut |_, _| FilterOutcome::keep(),
    );

    if let Some(e) = error {
        return Err(e);
    }
    if !unresolved.is_empty() {
        unresolved.sort();
        unresolved.dedup();
        return Err(Error::UnsupportedEntity(unresolved));
    }
    Ok(())
}

fn apply_chain(tree: &mut Tree, id: NodeId, chain: &[&'static Edge]) -> Result<Vec<NodeId>> {
    let mut frontier = vec![id];
    for edge in chain {
        let mut next = Vec::new();
        for &node in &frontier {
            let produced = (edge.convert)(tree, node)?;
            propagate_general_attrs(tree, node, &produced);
            next.extend(produced);
        }
        frontier = next;
    }
    Ok(frontier)
}

/// Copies §3's "general" attributes from `source` onto every node in
/// `targets`, skipping any attribute a target already has set.
fn propagate_general_attrs(tree: &mut Tree, source: NodeId, targets: &[NodeId]) {
    let inherited: Vec<(String, dxf_tree::Value)> =
        GENERAL_ATTRS.iter().filter_map(|&name| tree.attr(source, name).map(|v| (name.to_string(), v.clone()))).collect();
    for &target in targets {
        for (name, value) in &inherited {
            tree.set_attr_if_absent(target, name.clone(), value.clone());
        }
    }
}

fn point2_of(tree: &Tree, id: NodeId, x: &str, y: &str) -> Result<Point2> {
    let x = tree.attr(id, x).ok_or_else(|| Error::InvalidArgument(format!("missing '{}'", x)))?.as_f64()?;
    let y = tree.attr(id, y).ok_or_else(|| Error::InvalidArgument(format!("missing '{}'", y)))?.as_f64()?;
    Ok(Point2::new(x, y))
}

fn make_lwpolyline(tree: &mut Tree, points: &[Point2], closed: bool) -> NodeId {
    let node = tree.alloc("LWPOLYLINE");
    let xs: Vec<dxf_tree::Value> = points.iter().map(|p| p.x.into()).collect();
    let ys: Vec<dxf_tree::Value> = points.iter().map(|p| p.y.into()).collect();
    set_list(tree, node, "x", xs);
    set_list(tree, node, "y", ys);
    tree.set_attr(node, "int", if closed { "1" } else { "0" });
    node
}

fn set_list(tree: &mut Tree, node: NodeId, name: &str, values: Vec<dxf_tree::Value>) {
    for value in values {
        match value {
            dxf_tree::Value::Scalar(s) => tree.push_attr(node, name, s),
            dxf_tree::Value::List(list) => {
                for s in list {
                    tree.push_attr(node, name, s);
                }
            }
        }
    }
}

/// SPLINE → LWPOLYLINE: cubic Bézier sampling (§4.4). Degree must be 3;
/// each 4-point control segment is subdivided into 20 uniform steps with
/// endpoints preserved exactly.
fn spline_to_lwpolyline(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let degree = tree.attr(id, "int").map(|v| v.as_i64()).transpose()?.unwrap_or(3);
    if degree != 3 {
        return Err(Error::NotImplemented(format!("SPLINE degree {} unsupported (only cubic)", degree)));
    }

    let xs = tree.attr(id, "x").ok_or_else(|| Error::InvalidPolyline("SPLINE has no control points".into()))?.as_f64_list()?;
    let ys = tree.attr(id, "y").ok_or_else(|| Error::InvalidPolyline("SPLINE has no control points".into()))?.as_f64_list()?;
    if xs.len() != ys.len() || xs.len() < 4 || (xs.len() - 4) % 3 != 0 {
        return Err(Error::InvalidPolyline("SPLINE control-point count is not 4 + 3k".into()));
    }
    let closed = tree.attr(id, "int1").map(|v| v.as_bool()).unwrap_or(false);

    let controls: Vec<Point2> = xs.iter().zip(ys.iter()).map(|(&x, &y)| Point2::new(x, y)).collect();

    let mut points = Vec::new();
    let segment_count = (controls.len() - 1) / 3;
    for seg in 0..segment_count {
        let base = seg * 3;
        let (p0, p1, p2, p3) = (controls[base], controls[base + 1], controls[base + 2], controls[base + 3]);
        let steps = 20;
        let start = if seg == 0 { 0 } else { 1 };
        for step in start..=steps {
            let t = step as f64 / steps as f64;
            points.push(cubic_bezier(p0, p1, p2, p3, t));
        }
    }

    Ok(vec![make_lwpolyline(tree, &points, closed)])
}

fn cubic_bezier(p0: Point2, p1: Point2, p2: Point2, p3: Point2, t: f64) -> Point2 {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point2::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

/// POLYLINE → LWPOLYLINE: copy `VERTEX` children's x/y (§4.4). Bulge arcs
/// (vertex `float1`) are a documented extension point, not implemented
/// (§9, SPEC_FULL §6).
fn polyline_to_lwpolyline(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let closed = tree.attr(id, "int").map(|v| v.as_bool()).unwrap_or(false);
    let mut points = Vec::new();
    for &vertex in tree.children(id) {
        if tree.name(vertex) != "VERTEX" {
            continue;
        }
        points.push(point2_of(tree, vertex, "x", "y")?);
    }
    if points.is_empty() {
        return Err(Error::InvalidPolyline("POLYLINE has no VERTEX children".into()));
    }
    Ok(vec![make_lwpolyline(tree, &points, closed)])
}

/// ELLIPSE → LWPOLYLINE: sample `max(20, ceil((a2-a1)*r1))` points along
/// the parametric ellipse (§4.4).
fn ellipse_to_lwpolyline(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let center = point2_of(tree, id, "x", "y")?;
    let major = point2_of(tree, id, "x1", "y1")?;
    let ratio = tree.attr(id, "float").ok_or_else(|| Error::InvalidArgument("ELLIPSE missing minor-ratio".into()))?.as_f64()?;
    let start = tree.attr(id, "angle").ok_or_else(|| Error::InvalidArgument("ELLIPSE missing start angle".into()))?.as_f64()?;
    let end = tree.attr(id, "angle1").ok_or_else(|| Error::InvalidArgument("ELLIPSE missing end angle".into()))?.as_f64()?;

    let r1 = (major.x * major.x + major.y * major.y).sqrt();
    let axis_angle = major.y.atan2(major.x);

    // Normalise end into [start, start + 2*pi + eps] so a near-full-turn
    // ellipse matches LibreCAD semantics instead of degenerating to zero
    // points.
    let two_pi = 2.0 * PI;
    let eps = 1e-9;
    let mut normalized_end = end;
    while normalized_end < start {
        normalized_end += two_pi;
    }
    if normalized_end > start + two_pi + eps {
        normalized_end -= two_pi;
    }

    let sweep = normalized_end - start;
    let samples = ((sweep * r1).ceil() as i64).max(20) as usize;
    let closed = (normalized_end - start - two_pi).abs() < eps;

    let mut points = Vec::with_capacity(samples + 1);
    for i in 0..=samples {
        let t = start + sweep * (i as f64 / samples as f64);
        let local = Point2::new(r1 * t.cos(), r1 * ratio * t.sin());
        points.push(local.rotated_deg(axis_angle.to_degrees()).translated(center.x, center.y));
    }

    Ok(vec![make_lwpolyline(tree, &points, closed)])
}

/// LINE → LWPOLYLINE: the 2-point case (§4.4).
fn line_to_lwpolyline(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let start = point2_of(tree, id, "x", "y")?;
    let end = point2_of(tree, id, "x1", "y1")?;
    Ok(vec![make_lwpolyline(tree, &[start, end], false)])
}

/// ARC → ELLIPSE: axis = (r, 0), minor-ratio = 1, angles in radians
/// (§4.4).
fn arc_to_ellipse(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let center = point2_of(tree, id, "x", "y")?;
    let r = tree.attr(id, "float").ok_or_else(|| Error::InvalidArgument("ARC missing radius".into()))?.as_f64()?;
    let start_deg = tree.attr(id, "angle").ok_or_else(|| Error::InvalidArgument("ARC missing start angle".into()))?.as_f64()?;
    let end_deg = tree.attr(id, "angle1").ok_or_else(|| Error::InvalidArgument("ARC missing end angle".into()))?.as_f64()?;

    let node = tree.alloc("ELLIPSE");
    tree.set_attr(node, "x", center.x);
    tree.set_attr(node, "y", center.y);
    tree.set_attr(node, "x1", r);
    tree.set_attr(node, "y1", 0.0);
    tree.set_attr(node, "float", 1.0);
    tree.set_attr(node, "angle", start_deg.to_radians());
    tree.set_attr(node, "angle1", end_deg.to_radians());
    Ok(vec![node])
}

/// CIRCLE → ARC: full 0..360° sweep (§4.4).
fn circle_to_arc(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let center = point2_of(tree, id, "x", "y")?;
    let r = tree.attr(id, "float").ok_or_else(|| Error::InvalidArgument("CIRCLE missing radius".into()))?.as_f64()?;

    let node = tree.alloc("ARC");
    tree.set_attr(node, "x", center.x);
    tree.set_attr(node, "y", center.y);
    tree.set_attr(node, "float", r);
    tree.set_attr(node, "angle", 0.0);
    tree.set_attr(node, "angle1", 360.0);
    Ok(vec![node])
}

/// LWPOLYLINE → LINE: consecutive-pair fan-out (§4.4).
fn lwpolyline_to_line(tree: &mut Tree, id: NodeId) -> Result<Vec<NodeId>> {
    let xs = tree.attr(id, "x").ok_or_else(|| Error::InvalidPolyline("LWPOLYLINE has no x array".into()))?.as_f64_list()?;
    let ys = tree.attr(id, "y").ok_or_else(|| Error::InvalidPolyline("LWPOLYLINE has no y array".into()))?.as_f64_list()?;
    if xs.len() != ys.len() || xs.is_empty() {
        return Err(Error::InvalidPolyline("mismatched or empty x/y arrays".into()));
    }
    let closed = tree.attr(id, "int").map(|v| v.as_i64().map(|n| n & 1 != 0)).transpose()?.unwrap_or(false);

    let mut points: Vec<Point2> = xs.iter().zip(ys.iter()).map(|(&x, &y)| Point2::new(x, y)).collect();
    if closed && points.len() > 1 {
        points.push(points[0]);
    }

    let mut out = Vec::new();
    for pair in points.windows(2) {
        let line = tree.alloc("LINE");
        tree.set_attr(line, "x", pair[0].x);
        tree.set_attr(line, "y", pair[0].y);
        tree.set_attr(line, "x1", pair[1].x);
        tree.set_attr(line, "y1", pair[1].y);
        out.push(line);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(tree: &mut Tree, parent: NodeId, x: f64, y: f64, x1: f64, y1: f64, layer: &str) -> NodeId {
        let id = tree.alloc("LINE");
        tree.set_attr(id, "x", x);
        tree.set_attr(id, "y", y);
        tree.set_attr(id, "x1", x1);
        tree.set_attr(id, "y1", y1);
        tree.set_attr(id, "layer", layer);
        tree.push_child(parent, id);
        id
    }

    fn entities_section() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let section = tree.alloc("SECTION");
        tree.set_attr(section, "name", "ENTITIES");
        tree.push_child(root, section);
        (tree, section)
    }

    #[test]
    fn line_boils_down_to_lwpolyline_and_back_inherits_layer() {
        let (mut tree, entities) = entities_section();
        line(&mut tree, entities, 0.0, 0.0, 100.0, 50.0, "A");

        let options = BoilDownOptions { acceptable: vec!["POINT".into(), "LWPOLYLINE".into()] };
        boil_down(&mut tree, &options).unwrap();

        let poly = tree.children(entities)[0];
        assert_eq!(tree.name(poly), "LWPOLYLINE");
        assert_eq!(tree.attr(poly, "layer").unwrap().as_str(), "A");
    }

    #[test]
    fn circle_boils_down_through_arc_and_ellipse_to_lwpolyline() {
        let (mut tree, entities) = entities_section();
        let circle = tree.alloc("CIRCLE");
        tree.set_attr(circle, "x", 0.0);
        tree.set_attr(circle, "y", 0.0);
        tree.set_attr(circle, "float", 10.0);
        tree.push_child(entities, circle);

        let options = BoilDownOptions { acceptable: vec!["POINT".into(), "LWPOLYLINE".into()] };
        boil_down(&mut tree, &options).unwrap();

        let poly = tree.children(entities)[0];
        assert_eq!(tree.name(poly), "LWPOLYLINE");
        let xs = tree.attr(poly, "x").unwrap().as_f64_list().unwrap();
        let ys = tree.attr(poly, "y").unwrap().as_f64_list().unwrap();
        assert!(xs.len() >= 20);
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            let r = (x * x + y * y).sqrt();
            assert!((r - 10.0).abs() < 1e-6);
        }
        assert!((xs[0] - xs[xs.len() - 1]).abs() < 1e-6);
        assert!((ys[0] - ys[ys.len() - 1]).abs() < 1e-6);
    }

    #[test]
    fn unreachable_target_is_unsupported_entity() {
        let (mut tree, entities) = entities_section();
        let text = tree.alloc("TEXT");
        tree.push_child(entities, text);

        let options = BoilDownOptions { acceptable: vec!["POINT".into(), "LWPOLYLINE".into()] };
        let err = boil_down(&mut tree, &options).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEntity(kinds) if kinds == vec!["TEXT".to_string()]));
    }

    #[test]
    fn lwpolyline_boils_down_to_lines_by_consecutive_pairs() {
        let (mut tree, entities) = entities_section();
        let poly = make_lwpolyline(&mut tree, &[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)], false);
        tree.push_child(entities, poly);

        let options = BoilDownOptions { acceptable: vec!["POINT".into(), "LINE".into()] };
        boil_down(&mut tree, &options).unwrap();

        assert_eq!(tree.child_count(entities), 2);
        for &child in tree.children(entities) {
            assert_eq!(tree.name(child), "LINE");
        }
    }
}
