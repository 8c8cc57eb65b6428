//! Axis-aligned bounding box used by every build stage.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use crate::util::{Axis, Vec3};

/// Axis-aligned bounding box.
///
/// [`Aabb::EMPTY`] is inverted (`min = +inf`, `max = -inf`) so that a union
/// with it is the identity.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Smallest box containing every point.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut b = Self::EMPTY;
        for &p in points {
            b.grow_point(p);
        }
        b
    }

    /// True while nothing has been added to the box.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) -> &mut Self {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
        self
    }

    /// Grow to include another box. Componentwise min of mins, max of maxes.
    #[inline]
    pub fn union(&mut self, other: &Aabb) -> &mut Self {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self
    }

    /// Union of two boxes as a new value.
    #[inline]
    pub fn union_of(a: &Aabb, b: &Aabb) -> Self {
        let mut out = *a;
        out.union(b);
        out
    }

    /// Box midpoint.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area. Only meaningful relative to other boxes (SAH cost).
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let d = self.extent();
        2.0 * (d.x * d.z + d.x * d.y + d.z * d.y)
    }

    /// Axis of greatest extent. On equal extents Y wins over both others
    /// and Z wins over X.
    #[inline]
    pub fn maximum_extent(&self) -> Axis {
        let d = self.extent();
        if d.x > d.z {
            if d.x > d.y {
                Axis::X
            } else {
                Axis::Y
            }
        } else if d.z > d.y {
            Axis::Z
        } else {
            Axis::Y
        }
    }

    /// Relative position of `p` along `axis`: 0 at `min`, 1 at `max`.
    ///
    /// When the box is flat on that axis the raw distance from `min` is
    /// returned instead.
    #[inline]
    pub fn offset(&self, axis: Axis, p: Vec3) -> f32 {
        let a = axis.index();
        let mut o = p[a] - self.min[a];
        if self.max[a] > self.min[a] {
            o /= self.max[a] - self.min[a];
        }
        o
    }

    /// Whether `other` lies inside this box, allowing `eps` slack per side.
    pub fn contains(&self, other: &Aabb, eps: f32) -> bool {
        other.min.cmpge(self.min - Vec3::splat(eps)).all()
            && other.max.cmple(self.max + Vec3::splat(eps)).all()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aabb({:?} - {:?})", self.min, self.max)
    }
}
