// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 2D geometry primitives shared by the parser, the boil-down/flatten
//! passes, the polyline post-processor and the CAMM-GL emitter.

/// Default tolerance used where the spec doesn't name an explicit epsilon
/// (e.g. comparing a closed polyline's first and last point).
pub const DEFAULT_EPS: f64 = 1e-9;

/// A trait for approximate equality, since direct `f64`/`Point2` equality
/// is almost never the right comparison for geometry produced by sampling
/// or accumulated floating point arithmetic.
pub trait FuzzyEq<Rhs: ?Sized = Self> {
    /// Checks for approximate equality within [`DEFAULT_EPS`].
    fn fuzzy_eq(&self, other: &Rhs) -> bool;
}

impl FuzzyEq for f64 {
    #[inline]
    fn fuzzy_eq(&self, other: &f64) -> bool {
        (self - other).abs() <= DEFAULT_EPS
    }
}

/// A point in 2D space.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: Point2) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Squared Euclidean distance to `other` (avoids a `sqrt` on hot paths
    /// such as epsilon comparisons and the spatial index).
    #[inline]
    pub fn distance_sq(&self, other: Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn fuzzy_eq_eps(&self, other: Point2, eps: f64) -> bool {
        self.distance_sq(other) <= eps * eps
    }

    #[inline]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Point2::new(self.x + dx, self.y + dy)
    }

    #[inline]
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Point2::new(self.x * sx, self.y * sy)
    }

    /// Rotates the point counter-clockwise around the origin by `degrees`.
    #[inline]
    pub fn rotated_deg(&self, degrees: f64) -> Self {
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();
        Point2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    #[inline]
    pub fn lerp(&self, other: Point2, t: f64) -> Self {
        Point2::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl std::ops::Sub for Point2 {
    type Output = Point2;

    #[inline]
    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Point2 {
    type Output = Point2;

    #[inline]
    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl FuzzyEq for Point2 {
    #[inline]
    fn fuzzy_eq(&self, other: &Point2) -> bool {
        self.fuzzy_eq_eps(*other, DEFAULT_EPS)
    }
}

/// An axis-aligned 2D transform: per-axis scale, rotation (applied before
/// translation, per the `INSERT` semantics of §4.3), then translation.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Transform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation_deg: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            translate_x: 0.0,
            translate_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation_deg: 0.0,
        }
    }
}

impl Transform {
    #[inline]
    pub fn new(scale_x: f64, scale_y: f64, rotation_deg: f64, translate_x: f64, translate_y: f64) -> Self {
        Transform { translate_x, translate_y, scale_x, scale_y, rotation_deg }
    }

    /// Applies scale, then rotation, then translation — the order §4.3
    /// specifies for resolving a block insertion.
    pub fn apply(&self, p: Point2) -> Point2 {
        p.scaled(self.scale_x, self.scale_y)
            .rotated_deg(self.rotation_deg)
            .translated(self.translate_x, self.translate_y)
    }
}

/// An axis-aligned bounding box.
///
/// `None` represents the "unit-undef" bbox of a degenerate (single-point,
/// per §4.6) polyline.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BBox {
    pub min: Point2,
    pub max: Point2,
}

impl BBox {
    /// Builds a bbox from a non-empty point slice. Returns `None` if the
    /// polyline is degenerate (a single distinct point, or empty).
    pub fn from_points(points: &[Point2]) -> Option<Self> {
        let mut iter = points.iter();
        let first = *iter.next()?;
        let mut bbox = BBox { min: first, max: first };
        let mut degenerate = true;
        for &p in iter {
            if !p.fuzzy_eq(&first) {
                degenerate = false;
            }
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        if degenerate {
            None
        } else {
            Some(bbox)
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// `box` partial order from §4.6: `-1` if `self` strictly inside
    /// `other`, `1` if `other` strictly inside `self`, `0` otherwise
    /// (including equal or overlapping-but-neither-contains bboxes).
    pub fn partial_cmp_containment(&self, other: &BBox) -> i32 {
        let self_in_other = self.min.x > other.min.x
            && self.min.y > other.min.y
            && self.max.x < other.max.x
            && self.max.y < other.max.y;
        if self_in_other {
            return -1;
        }

        let other_in_self = other.min.x > self.min.x
            && other.min.y > self.min.y
            && other.max.x < self.max.x
            && other.max.y < self.max.y;
        if other_in_self {
            return 1;
        }

        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_90_deg() {
        let p = Point2::new(1.0, 0.0).rotated_deg(90.0);
        assert!(p.fuzzy_eq(&Point2::new(0.0, 1.0)));
    }

    #[test]
    fn transform_order_matches_insert_semantics() {
        // scale 2, rotate 90, translate (10, 0): (1, 0) -> scale (2,0)
        // -> rotate (0,2) -> translate (10,2)
        let ts = Transform::new(2.0, 1.0, 90.0, 10.0, 0.0);
        let p = ts.apply(Point2::new(1.0, 0.0));
        assert!(p.fuzzy_eq(&Point2::new(10.0, 2.0)));
    }

    #[test]
    fn bbox_containment_is_strict() {
        let outer = BBox { min: Point2::new(0.0, 0.0), max: Point2::new(10.0, 10.0) };
        let inner = BBox { min: Point2::new(1.0, 1.0), max: Point2::new(2.0, 2.0) };
        assert_eq!(inner.partial_cmp_containment(&outer), -1);
        assert_eq!(outer.partial_cmp_containment(&inner), 1);
        assert_eq!(outer.partial_cmp_containment(&outer), 0);
    }

    #[test]
    fn degenerate_bbox_is_none() {
        let pts = [Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)];
        assert!(BBox::from_points(&pts).is_none());
    }
}
