// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The polyline post-processor (C7, §4.6): stitching, cycle embedding,
//! coarsening, overlap, bounding boxes and partial sort, driven in the
//! order §4.6 specifies.

use std::cmp::Ordering;
use std::collections::HashMap;

use dxf_tree::{BBox, Error, Point2, Polyline, PolylineKind, Result};

use crate::options::{PipelineOptions, StitchOptions};
use crate::spatial::{Role, SpatialIndex};

/// Runs the full §4.6 pipeline: stitch → translate+scale → coarsen →
/// sort → prepend calibration → append bbox frame → append overlap.
///
/// (Overlap is applied last here rather than before sort, since it would
/// otherwise perturb each closed polyline's bbox right before the sort
/// that's supposed to act on the drawing's logical extents; `stitch` does
/// not depend on this ordering, so this is purely a pipeline-composition
/// choice, not a semantic difference from §4.6's each-step description.)
pub fn process(polylines: Vec<Polyline>, stitch_opts: &StitchOptions, pipeline_opts: &PipelineOptions) -> Result<Vec<Polyline>> {
    let mut polylines = if pipeline_opts.combine {
        stitch(polylines, stitch_opts)
    } else {
        polylines
    };

    if pipeline_opts.scale != 1.0 || pipeline_opts.translate.x != 0.0 || pipeline_opts.translate.y != 0.0 {
        translate_and_scale(&mut polylines, pipeline_opts.translate, pipeline_opts.scale);
    }

    if stitch_opts.coarsen_threshold > 0.0 {
        for pl in polylines.iter_mut() {
            *pl = coarsen(pl, stitch_opts.coarsen_threshold);
        }
    }

    if !stitch_opts.sort.trim().is_empty() {
        let criteria = parse_sort(&stitch_opts.sort)?;
        polylines = sort_polylines(polylines, &criteria, stitch_opts.crudeness);
    }

    if pipeline_opts.calibration {
        prepend_calibration(&mut polylines);
    }

    if let Some(margin) = pipeline_opts.bbox_margin {
        append_bbox_frame(&mut polylines, margin);
    }

    if stitch_opts.overlap > 0.0 {
        for pl in polylines.iter_mut() {
            if pl.is_closed() {
                *pl = add_overlap(pl, stitch_opts.overlap);
            }
        }
    }

    Ok(polylines)
}

/// Fuzzy combine (§4.6 "Stitch"): partitions into cycles/non-cycles,
/// repeatedly joins non-cycles (exact passes, then epsilon-tolerant
/// passes), migrates newly-closed non-cycles into the cycle list, then
/// (if `join_cycles`) splices cycles and non-cycles sharing an internal
/// point into each other.
pub fn stitch(input: Vec<Polyline>, opts: &StitchOptions) -> Vec<Polyline> {
    let mut cycles = Vec::new();
    let mut non_cycles = Vec::new();

    for mut pl in input {
        if pl.points.len() < 2 {
            non_cycles.push(pl);
            continue;
        }
        let forced_closed = pl.is_closed();
        let fuzzy_closed = pl.first().unwrap().fuzzy_eq_eps(pl.last().unwrap(), opts.epsilon);
        if forced_closed || fuzzy_closed {
            snap_closed(&mut pl);
            cycles.push(pl);
        } else {
            non_cycles.push(pl);
        }
    }

    // Passes A/B (exact), then C/D (epsilon-tolerant), each run to
    // fixpoint before moving to the next exactness class (§4.6).
    non_cycles = run_to_fixpoint(non_cycles, 0.0, opts.reverse_allowed);
    non_cycles = run_to_fixpoint(non_cycles, opts.epsilon, opts.reverse_allowed);

    let mut still_open = Vec::with_capacity(non_cycles.len());
    for mut pl in non_cycles {
        if pl.points.len() >= 2 && pl.first().unwrap().fuzzy_eq_eps(pl.last().unwrap(), opts.epsilon) {
            snap_closed(&mut pl);
            cycles.push(pl);
        } else {
            still_open.push(pl);
        }
    }
    non_cycles = still_open;

    if opts.join_cycles {
        embed_cycles(&mut cycles, opts.epsilon);
        splice_noncycles_into_cycles(&mut non_cycles, &mut cycles, opts.epsilon);
    }

    let mut out = Vec::with_capacity(cycles.len() + non_cycles.len());
    out.append(&mut cycles);
    out.append(&mut non_cycles);
    out
}

/// Forces the last point exactly equal to the first — the "closing
/// duplicate point" §4.6 requires once a polyline is recognized as a
/// cycle.
fn snap_closed(pl: &mut Polyline) {
    let first = pl.points[0];
    let last_idx = pl.points.len() - 1;
    pl.points[last_idx] = first;
    pl.kind = PolylineKind::Closed;
}

/// Joins `a` then `b`. When the join point only matched within epsilon
/// (`exact` is false) both near-duplicate points are kept rather than
/// collapsed, so the result still reflects the actual input geometry
/// (§8 scenario 3: an epsilon-tolerant join keeps both endpoints).
fn concat(a: &Polyline, b: &Polyline, exact: bool) -> Polyline {
    let mut points = a.points.clone();
    if exact {
        points.extend(b.points.iter().skip(1).copied());
    } else {
        points.extend(b.points.iter().copied());
    }
    Polyline::new(PolylineKind::Open, points)
}

fn reversed(p: &Polyline) -> Polyline {
    let mut points = p.points.clone();
    points.reverse();
    Polyline::new(p.kind, points)
}

/// Repeatedly scans `items` in order for the first joinable pair, using
/// the spatial endpoint index (§4.7) to find a candidate partner for
/// each element's endpoints, merges the first pair found, and restarts
/// the scan — giving a result that only depends on the input order, not
/// on iteration-order incidentals (§4.6 "Ordering of stitching must be
/// deterministic given the input order").
fn run_to_fixpoint(mut items: Vec<Polyline>, match_eps: f64, reverse_allowed: bool) -> Vec<Polyline> {
    let query_eps = if match_eps > 0.0 { match_eps } else { dxf_tree::DEFAULT_EPS };

    'outer: loop {
        let mut index = SpatialIndex::new(query_eps);
        for (i, pl) in items.iter().enumerate() {
            if let (Some(s), Some(e)) = (pl.first(), pl.last()) {
                index.insert(i, s, e);
            }
        }

        for i in 0..items.len() {
            let (Some(a_first), Some(a_last)) = (items[i].first(), items[i].last()) else { continue };

            let lookup = |role: Role, point: Point2| {
                if match_eps > 0.0 {
                    index.query(role, point, i)
                } else {
                    index.query_exact(role, point, i)
                }
            };

            let exact = match_eps <= 0.0;

            if let Some(j) = lookup(Role::Start, a_last) {
                let merged = concat(&items[i], &items[j], exact);
                merge_at(&mut items, i, j, merged);
                continue 'outer;
            }
            if reverse_allowed {
                if let Some(j) = lookup(Role::End, a_last) {
                    let b = reversed(&items[j]);
                    let merged = concat(&items[i], &b, exact);
                    merge_at(&mut items, i, j, merged);
                    continue 'outer;
                }
                if let Some(j) = lookup(Role::Start, a_first) {
                    let merged = concat(&reversed(&items[i]), &items[j], exact);
                    merge_at(&mut items, i, j, merged);
                    continue 'outer;
                }
            }
        }
        break;
    }
    items
}

/// Removes elements `i` and `j` from `items` and inserts `merged` at the
/// lower of the two original indices, preserving the relative order of
/// everything else.
fn merge_at(items: &mut Vec<Polyline>, i: usize, j: usize, merged: Polyline) {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    items.remove(hi);
    items.remove(lo);
    items.insert(lo, merged);
}

/// A hashable point signature on the `epsilon` grid (§9 redesign note:
/// "a hashable (i64, i64) derived from rounded coordinates"). Assumes, as
/// the original does, that points are not referentially aliased across
/// polylines — two geometrically coincident points always get the same
/// signature whether or not they're "the same" point.
fn signature(p: Point2, epsilon: f64) -> (i64, i64) {
    let eps = if epsilon > 0.0 { epsilon } else { 1.0 };
    ((p.x / eps).round() as i64, (p.y / eps).round() as i64)
}

/// Splices a surviving cycle's loop (given as a point sequence that both
/// starts and ends at the shared point, not counting `host`'s own copy of
/// it) into `host` right after `at`.
fn splice_loop(host: &mut Polyline, at: usize, loop_points: &[Point2]) {
    // `loop_points[0]` is the shared point again; skip it so we don't
    // duplicate `host.points[at]`.
    let mut new_points = Vec::with_capacity(host.points.len() + loop_points.len() - 1);
    new_points.extend_from_slice(&host.points[..=at]);
    new_points.extend_from_slice(&loop_points[1..]);
    new_points.extend_from_slice(&host.points[at + 1..]);
    host.points = new_points;
}

/// Rotates a closed cycle's core (points without the duplicate final
/// point) so index `at` comes first, then re-closes it — the loop the
/// splice operation inserts (§4.6 "rotated so the shared point is at the
/// splice location").
fn rotated_loop(cycle: &Polyline, at: usize) -> Vec<Point2> {
    let core = &cycle.points[..cycle.points.len() - 1];
    let mut rotated: Vec<Point2> = core[at..].iter().chain(core[..at].iter()).copied().collect();
    rotated.push(rotated[0]);
    rotated
}

/// Splices every surviving cycle sharing an internal point with another
/// into the first; the second is dropped (consumed) (§4.6 "Stitch" /
/// join-cycles).
fn embed_cycles(cycles: &mut Vec<Polyline>, epsilon: f64) {
    loop {
        let mut sig_map: HashMap<(i64, i64), (usize, usize)> = HashMap::new();
        let mut found: Option<(usize, usize, usize, usize)> = None;

        'search: for (ci, cycle) in cycles.iter().enumerate() {
            if cycle.points.len() < 4 {
                // fewer than 2 distinct internal points; nothing to embed.
                continue;
            }
            for pi in 1..cycle.points.len() - 1 {
                let sig = signature(cycle.points[pi], epsilon);
                if let Some(&(other_ci, other_pi)) = sig_map.get(&sig) {
                    found = Some((other_ci, other_pi, ci, pi));
                    break 'search;
                }
                sig_map.insert(sig, (ci, pi));
            }
        }

        let Some((host_ci, host_pi, guest_ci, guest_pi)) = found else {
            break;
        };

        let guest_loop = rotated_loop(&cycles[guest_ci], guest_pi);
        splice_loop(&mut cycles[host_ci], host_pi, &guest_loop);
        cycles.remove(guest_ci);
    }
}

/// Scans every remaining non-cycle for an endpoint matching a point on a
/// surviving cycle, splicing it in as a there-and-back detour (§4.6
/// "scan each non-cycle for points matching a surviving cycle's
/// signature and splice likewise").
fn splice_noncycles_into_cycles(non_cycles: &mut Vec<Polyline>, cycles: &mut [Polyline], epsilon: f64) {
    let mut remaining = Vec::new();
    'outer: for nc in non_cycles.drain(..) {
        if nc.points.len() >= 2 {
            for (end_idx, &endpoint) in [(0usize, nc.points[0]), (nc.points.len() - 1, *nc.points.last().unwrap())].iter() {
                let sig = signature(endpoint, epsilon);
                for cycle in cycles.iter_mut() {
                    if cycle.points.len() < 3 {
                        continue;
                    }
                    for pi in 0..cycle.points.len() - 1 {
                        if signature(cycle.points[pi], epsilon) == sig {
                            let detour = there_and_back(&nc, *end_idx);
                            splice_loop(cycle, pi, &detour);
                            continue 'outer;
                        }
                    }
                }
            }
        }
        remaining.push(nc);
    }
    *non_cycles = remaining;
}

/// The out-and-back point sequence for splicing a non-cycle into a host
/// cycle at the non-cycle's endpoint `shared_end_idx`: walk to the far
/// end, then back, starting and ending at the shared point.
fn there_and_back(nc: &Polyline, shared_end_idx: usize) -> Vec<Point2> {
    let mut path = nc.points.clone();
    if shared_end_idx != 0 {
        path.reverse();
    }
    // `path[0]` is now the shared point.
    let mut out = path.clone();
    out.extend(path[..path.len() - 1].iter().rev().copied());
    out
}

/// Drops interior points whose squared distance to the previously
/// retained point is below `threshold_sq`; endpoints are always kept
/// (§4.6 "Coarsen").
pub fn coarsen(pl: &Polyline, threshold_sq: f64) -> Polyline {
    if pl.points.len() <= 2 || threshold_sq <= 0.0 {
        return pl.clone();
    }
    let mut out = Vec::with_capacity(pl.points.len());
    out.push(pl.points[0]);
    for &p in &pl.points[1..pl.points.len() - 1] {
        let prev = *out.last().unwrap();
        if prev.distance_sq(p) < threshold_sq {
            continue;
        }
        out.push(p);
    }
    out.push(*pl.points.last().unwrap());
    Polyline::new(pl.kind, out)
}

/// Reopens a closed polyline and appends a prefix of its own path whose
/// length is at least `overlap` (§4.6 "Add overlap").
pub fn add_overlap(pl: &Polyline, overlap: f64) -> Polyline {
    if !pl.is_closed() || pl.points.len() < 2 {
        return pl.clone();
    }
    let core = &pl.points;
    let n = core.len();
    let max_steps = n * 4;

    let mut points = pl.points.clone();
    let mut acc = 0.0;
    let mut prev = core[0];
    let mut idx = 1usize;
    let mut steps = 0usize;

    loop {
        if steps >= max_steps {
            break;
        }
        steps += 1;
        let next = core[idx % n];
        let seg_len = prev.distance(next);
        if acc + seg_len >= overlap {
            if acc + seg_len <= 2.0 * overlap {
                points.push(next);
            } else if seg_len > 0.0 {
                let t = (overlap - acc) / seg_len;
                points.push(prev.lerp(next, t));
            }
            break;
        }
        points.push(next);
        acc += seg_len;
        prev = next;
        idx += 1;
    }

    Polyline::new(PolylineKind::Open, points)
}

fn translate_and_scale(polylines: &mut [Polyline], translate: Point2, scale: f64) {
    for pl in polylines.iter_mut() {
        for p in pl.points.iter_mut() {
            *p = Point2::new(p.x * scale + translate.x, p.y * scale + translate.y);
        }
    }
}

/// A small fixed registration mark prepended to the job so the operator
/// can check alignment before the real cut begins — the spec's §4.6
/// pipeline names this step but does not define the mark's geometry; a
/// 5-unit open square at the origin is used here.
fn prepend_calibration(polylines: &mut Vec<Polyline>) {
    const SIZE: f64 = 5.0;
    let mark = Polyline::new(
        PolylineKind::Closed,
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(SIZE, 0.0),
            Point2::new(SIZE, SIZE),
            Point2::new(0.0, SIZE),
            Point2::new(0.0, 0.0),
        ],
    );
    polylines.insert(0, mark);
}

/// Appends a rectangular frame `margin` units outside the union of every
/// other polyline's bbox (§4.6 "append bbox frame").
fn append_bbox_frame(polylines: &mut Vec<Polyline>, margin: f64) {
    let mut overall: Option<BBox> = None;
    for pl in polylines.iter() {
        if let Some(b) = pl.bbox() {
            overall = Some(match overall {
                None => b,
                Some(o) => union_bbox(o, b),
            });
        }
    }
    let Some(b) = overall else { return };
    let min = Point2::new(b.min.x - margin, b.min.y - margin);
    let max = Point2::new(b.max.x + margin, b.max.y + margin);
    let frame = Polyline::new(
        PolylineKind::Closed,
        vec![min, Point2::new(max.x, min.y), max, Point2::new(min.x, max.y), min],
    );
    polylines.push(frame);
}

fn union_bbox(a: BBox, b: BBox) -> BBox {
    BBox {
        min: Point2::new(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
        max: Point2::new(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Axis {
    Left,
    Bottom,
    Right,
    Top,
}

#[derive(Clone, Copy, Debug)]
enum SortCriterion {
    Coord(Axis, bool /* descending */),
    Box,
}

/// Parses a comma-separated `{left,bottom,right,top}[-asc|-desc]`/`box`
/// criteria list (§4.6 "Partial sort").
fn parse_sort(spec: &str) -> Result<Vec<SortCriterion>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| {
            if token == "box" {
                return Ok(SortCriterion::Box);
            }
            let (axis_name, desc) = match token.strip_suffix("-desc") {
                Some(rest) => (rest, true),
                None => match token.strip_suffix("-asc") {
                    Some(rest) => (rest, false),
                    None => (token, false),
                },
            };
            let axis = match axis_name {
                "left" => Axis::Left,
                "bottom" => Axis::Bottom,
                "right" => Axis::Right,
                "top" => Axis::Top,
                other => return Err(Error::InvalidArgument(format!("unknown sort criterion '{}'", other))),
            };
            Ok(SortCriterion::Coord(axis, desc))
        })
        .collect()
}

fn axis_value(bbox: &Option<BBox>, axis: Axis) -> f64 {
    match bbox {
        Some(b) => match axis {
            Axis::Left => b.min.x,
            Axis::Right => b.max.x,
            Axis::Bottom => b.min.y,
            Axis::Top => b.max.y,
        },
        None => 0.0,
    }
}

fn quantize(v: f64, step: f64) -> f64 {
    if step <= 0.0 {
        v
    } else {
        (v / step).round() * step
    }
}

/// `box`'s strict partial order, oriented so a bbox that strictly
/// contains another sorts before it — an outer shape is traced before
/// what it contains (a resolved Open Question; §4.6 specifies the
/// comparator but not the cut-order convention it implies).
fn compare_box(a: &Option<BBox>, b: &Option<BBox>) -> Ordering {
    match (a, b) {
        (Some(ba), Some(bb)) => match ba.partial_cmp_containment(bb) {
            -1 => Ordering::Greater,
            1 => Ordering::Less,
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

/// Applies `criteria` right-to-left: numeric criteria use a stable sort
/// over the quantised coordinate (so near-equal values tie rather than
/// breaking a later, more-significant criterion's ordering); `box` uses
/// an O(n²) stable insertion sort against the partial order (§4.6).
pub fn sort_polylines(polylines: Vec<Polyline>, criteria: &[SortCriterion], crudeness: f64) -> Vec<Polyline> {
    let mut items: Vec<(Polyline, Option<BBox>)> = polylines
        .into_iter()
        .map(|p| {
            let b = p.bbox();
            (p, b)
        })
        .collect();

    for criterion in criteria.iter().rev() {
        match criterion {
            SortCriterion::Coord(axis, desc) => {
                items.sort_by(|a, b| {
                    let va = quantize(axis_value(&a.1, *axis), crudeness);
                    let vb = quantize(axis_value(&b.1, *axis), crudeness);
                    let ord = va.partial_cmp(&vb).unwrap_or(Ordering::Equal);
                    if *desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
            }
            SortCriterion::Box => insertion_sort_box(&mut items),
        }
    }

    items.into_iter().map(|(p, _)| p).collect()
}

fn insertion_sort_box(items: &mut [(Polyline, Option<BBox>)]) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare_box(&items[j - 1].1, &items[j].1) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(PolylineKind::Open, points.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    fn closed(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(PolylineKind::Closed, points.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    #[test]
    fn stitch_joins_two_open_polylines_fuzzily() {
        // §8 scenario 3.
        let a = open(&[(0.0, 0.0), (1.0, 0.0)]);
        let b = open(&[(1.0001, 0.0), (2.0, 0.0)]);
        let opts = StitchOptions { epsilon: 0.001, ..Default::default() };
        let result = stitch(vec![a, b], &opts);
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].points,
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0001, 0.0), Point2::new(2.0, 0.0)]
        );
    }

    #[test]
    fn stitch_is_deterministic_given_input_order() {
        let opts = StitchOptions { epsilon: 0.001, ..Default::default() };
        let a = open(&[(0.0, 0.0), (1.0, 0.0)]);
        let b = open(&[(1.0, 0.0), (2.0, 0.0)]);
        let c = open(&[(2.0, 0.0), (3.0, 0.0)]);
        let result = stitch(vec![a.clone(), b.clone(), c.clone()], &opts);
        let result2 = stitch(vec![a, b, c], &opts);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].points, result2[0].points);
    }

    #[test]
    fn stitch_migrates_closed_loop() {
        let a = open(&[(0.0, 0.0), (1.0, 0.0)]);
        let b = open(&[(1.0, 0.0), (1.0, 1.0)]);
        let c = open(&[(1.0, 1.0), (0.0, 0.0)]);
        let opts = StitchOptions { epsilon: 1e-6, ..Default::default() };
        let result = stitch(vec![a, b, c], &opts);
        assert_eq!(result.len(), 1);
        assert!(result[0].is_closed());
        assert_eq!(result[0].first(), result[0].last());
    }

    #[test]
    fn coarsen_drops_close_interior_points_but_keeps_endpoints() {
        let pl = open(&[(0.0, 0.0), (0.0001, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let result = coarsen(&pl, 0.01 * 0.01);
        assert_eq!(result.points, vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(1.0, 1.0)]);
    }

    #[test]
    fn overlap_cuts_final_segment_parametrically() {
        let pl = closed(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let result = add_overlap(&pl, 5.0);
        assert!(!result.is_closed());
        let last = *result.points.last().unwrap();
        assert!((last.x - 5.0).abs() < 1e-9);
        assert!((last.y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn sort_by_left_ascending() {
        let a = open(&[(10.0, 0.0), (11.0, 0.0)]);
        let b = open(&[(0.0, 0.0), (1.0, 0.0)]);
        let criteria = parse_sort("left-asc").unwrap();
        let sorted = sort_polylines(vec![a, b], &criteria, 1e-6);
        assert_eq!(sorted[0].points[0].x, 0.0);
        assert_eq!(sorted[1].points[0].x, 10.0);
    }

    #[test]
    fn sort_by_box_puts_container_before_contents() {
        let outer = open(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let inner = open(&[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0)]);
        let criteria = parse_sort("box").unwrap();
        let sorted = sort_polylines(vec![inner, outer], &criteria, 1e-6);
        // outer strictly contains inner, so outer sorts first.
        assert_eq!(sorted[0].bbox().unwrap().width(), 10.0);
    }

    #[test]
    fn invalid_sort_criterion_is_rejected() {
        assert!(parse_sort("diagonal").is_err());
    }
}
