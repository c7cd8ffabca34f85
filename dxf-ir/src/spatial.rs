// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The epsilon-bucketed spatial endpoint index (C8, §4.7), used by the
//! stitcher to find fuzzy start/end matches among open polylines.

use std::collections::HashMap;

use dxf_tree::Point2;

type CellKey = (i64, i64);

fn cell_of(p: Point2, epsilon: f64) -> CellKey {
    ((p.x / epsilon).floor() as i64, (p.y / epsilon).floor() as i64)
}

/// The four neighbouring cell keys a point's own cell plus every
/// combination of `{0,1}` OR-ed into each dimension of its floor
/// coordinate (§4.7: "insert each element under all 2^D neighbouring cell
/// keys").
fn neighbor_keys(p: Point2, epsilon: f64) -> [CellKey; 4] {
    let (cx, cy) = cell_of(p, epsilon);
    [(cx, cy), (cx + 1, cy), (cx, cy + 1), (cx + 1, cy + 1)]
}

/// An epsilon-bucketed spatial map from 2D endpoints to element indices,
/// queried separately by "start" and "end" role (§4.7).
pub struct SpatialIndex {
    epsilon: f64,
    by_start: HashMap<CellKey, Vec<usize>>,
    by_end: HashMap<CellKey, Vec<usize>>,
    starts: HashMap<usize, Point2>,
    ends: HashMap<usize, Point2>,
}

/// Which endpoint role a query or insertion targets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Start,
    End,
}

impl SpatialIndex {
    pub fn new(epsilon: f64) -> Self {
        SpatialIndex {
            epsilon,
            by_start: HashMap::new(),
            by_end: HashMap::new(),
            starts: HashMap::new(),
            ends: HashMap::new(),
        }
    }

    /// Inserts element `id`'s start and end points.
    pub fn insert(&mut self, id: usize, start: Point2, end: Point2) {
        for key in neighbor_keys(start, self.epsilon) {
            self.by_start.entry(key).or_default().push(id);
        }
        for key in neighbor_keys(end, self.epsilon) {
            self.by_end.entry(key).or_default().push(id);
        }
        self.starts.insert(id, start);
        self.ends.insert(id, end);
    }

    /// Removes `id` from all buckets on both maps.
    pub fn remove(&mut self, id: usize) {
        if let Some(start) = self.starts.remove(&id) {
            for key in neighbor_keys(start, self.epsilon) {
                if let Some(bucket) = self.by_start.get_mut(&key) {
                    bucket.retain(|&e| e != id);
                }
            }
        }
        if let Some(end) = self.ends.remove(&id) {
            for key in neighbor_keys(end, self.epsilon) {
                if let Some(bucket) = self.by_end.get_mut(&key) {
                    bucket.retain(|&e| e != id);
                }
            }
        }
    }

    /// Finds the closest element (by its `role` endpoint) to `point`
    /// within `self.epsilon`, excluding `exclude` (so an element never
    /// matches itself), deterministically tie-breaking on first
    /// encounter — which, since buckets are appended to in insertion
    /// order and scanned in a fixed key order, gives a repeatable result
    /// for a given input order (§4.7, §4.6 "Ordering of stitching must be
    /// deterministic").
    pub fn query(&self, role: Role, point: Point2, exclude: usize) -> Option<usize> {
        let (map, points) = match role {
            Role::Start => (&self.by_start, &self.starts),
            Role::End => (&self.by_end, &self.ends),
        };

        let mut best: Option<(usize, f64)> = None;
        let eps_sq = self.epsilon * self.epsilon;
        let mut seen = std::collections::HashSet::new();

        for key in neighbor_keys(point, self.epsilon) {
            let Some(bucket) = map.get(&key) else { continue };
            for &candidate in bucket {
                if candidate == exclude || !seen.insert(candidate) {
                    continue;
                }
                let candidate_point = points[&candidate];
                let d = point.distance_sq(candidate_point);
                if d <= eps_sq {
                    match best {
                        Some((_, best_d)) if best_d <= d => {}
                        _ => best = Some((candidate, d)),
                    }
                }
            }
        }
        best.map(|(id, _)| id)
    }

    /// Same as [`SpatialIndex::query`] but requires an exact (epsilon-free,
    /// `== 0` within floating point) match — used for stitch pass A/B
    /// which run before the fuzzy passes C/D (§4.6).
    pub fn query_exact(&self, role: Role, point: Point2, exclude: usize) -> Option<usize> {
        let (map, points) = match role {
            Role::Start => (&self.by_start, &self.starts),
            Role::End => (&self.by_end, &self.ends),
        };

        let mut seen = std::collections::HashSet::new();
        for key in neighbor_keys(point, self.epsilon) {
            let Some(bucket) = map.get(&key) else { continue };
            for &candidate in bucket {
                if candidate == exclude || !seen.insert(candidate) {
                    continue;
                }
                if points[&candidate] == point {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_within_epsilon_and_excludes_self() {
        let mut idx = SpatialIndex::new(0.01);
        idx.insert(0, Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        idx.insert(1, Point2::new(1.001, 0.0), Point2::new(2.0, 0.0));

        let hit = idx.query(Role::Start, Point2::new(1.0, 0.0), usize::MAX);
        assert_eq!(hit, Some(1));

        // excluding element 1 itself leaves nothing to match against.
        let none = idx.query(Role::Start, Point2::new(1.001, 0.0), 1);
        assert_eq!(none, None);
    }

    #[test]
    fn remove_deletes_from_all_buckets() {
        let mut idx = SpatialIndex::new(0.01);
        idx.insert(0, Point2::new(5.0, 5.0), Point2::new(6.0, 5.0));
        idx.remove(0);
        assert_eq!(idx.query(Role::Start, Point2::new(5.0, 5.0), usize::MAX), None);
        assert_eq!(idx.query(Role::End, Point2::new(6.0, 5.0), usize::MAX), None);
    }

    #[test]
    fn exact_query_rejects_fuzzy_match() {
        let mut idx = SpatialIndex::new(1.0);
        idx.insert(0, Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        assert_eq!(idx.query_exact(Role::Start, Point2::new(0.0001, 0.0), usize::MAX), None);
        assert_eq!(idx.query_exact(Role::Start, Point2::new(0.0, 0.0), usize::MAX), Some(0));
    }
}
