//! Recursive SAH-based BVH builder.
//!
//! Splits along the axis of greatest centroid extent. Ranges of at most
//! [`SMALL_RANGE`] primitives split at the median; larger ranges bucket
//! centroids into [`NUM_BUCKETS`] bins and split where the surface area
//! heuristic is cheapest.

use super::aabb::Aabb;
use super::primitive::{make_primitive_info, PrimitiveInfo};
use super::select::{nth_element, partition};
use crate::geometry::MergedGeometry;
use crate::util::{Axis, Error, Result};

/// Number of SAH buckets along the split axis.
pub const NUM_BUCKETS: usize = 12;

/// Relative cost of one traversal step against one primitive test.
pub const TRAVERSAL_COST: f32 = 0.1;

/// Ranges up to this size skip SAH and split at the median centroid.
pub const SMALL_RANGE: usize = 4;

/// Node of the built hierarchy. Each interior node owns both children.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    Leaf {
        primitives: Vec<PrimitiveInfo>,
        bounds: Aabb,
    },
    Interior {
        child0: Box<BvhNode>,
        child1: Box<BvhNode>,
        bounds: Aabb,
        split_axis: Axis,
    },
}

impl BvhNode {
    fn leaf(primitives: &[PrimitiveInfo], bounds: Aabb) -> Self {
        BvhNode::Leaf {
            primitives: primitives.to_vec(),
            bounds,
        }
    }

    fn interior(split_axis: Axis, child0: BvhNode, child1: BvhNode) -> Self {
        let bounds = Aabb::union_of(child0.bounds(), child1.bounds());
        BvhNode::Interior {
            child0: Box::new(child0),
            child1: Box::new(child1),
            bounds,
            split_axis,
        }
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { bounds, .. } | BvhNode::Interior { bounds, .. } => bounds,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }

    /// Levels from this node down to its deepest leaf; a lone leaf is 1.
    pub fn depth(&self) -> u32 {
        match self {
            BvhNode::Leaf { .. } => 1,
            BvhNode::Interior { child0, child1, .. } => 1 + child0.depth().max(child1.depth()),
        }
    }

    /// Total primitives stored in the leaves under this node.
    pub fn primitive_count(&self) -> usize {
        match self {
            BvhNode::Leaf { primitives, .. } => primitives.len(),
            BvhNode::Interior { child0, child1, .. } => {
                child0.primitive_count() + child1.primitive_count()
            }
        }
    }

    /// Every leaf primitive, left to right.
    pub fn primitives(&self) -> Vec<&PrimitiveInfo> {
        let mut out = Vec::with_capacity(self.primitive_count());
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a PrimitiveInfo>) {
        match self {
            BvhNode::Leaf { primitives, .. } => out.extend(primitives.iter()),
            BvhNode::Interior { child0, child1, .. } => {
                child0.collect_primitives(out);
                child1.collect_primitives(out);
            }
        }
    }
}

/// SAH bucket accumulator.
#[derive(Clone, Copy)]
struct Bucket {
    bounds: Aabb,
    count: usize,
}

impl Bucket {
    const EMPTY: Self = Self {
        bounds: Aabb::EMPTY,
        count: 0,
    };
}

/// Extract primitives from `geometry` and build the hierarchy over them.
#[tracing::instrument(skip_all, fields(tri_count = geometry.triangle_count()))]
pub fn build_bvh(geometry: &MergedGeometry) -> Result<BvhNode> {
    let mut primitives = make_primitive_info(geometry.indices(), geometry);
    build(&mut primitives)
}

/// Build over the whole slice. The slice is reordered in place.
pub fn build(primitives: &mut [PrimitiveInfo]) -> Result<BvhNode> {
    let len = primitives.len();
    build_range(primitives, 0, len)
}

/// Build over `primitives[start..end]`. Only that range is reordered.
pub fn build_range(primitives: &mut [PrimitiveInfo], start: usize, end: usize) -> Result<BvhNode> {
    if primitives.is_empty() {
        return Err(Error::EmptyGeometry);
    }
    if start >= end || end > primitives.len() {
        return Err(Error::InvalidRange {
            start,
            end,
            len: primitives.len(),
        });
    }
    Ok(recursive_build(primitives, start, end))
}

fn recursive_build(primitives: &mut [PrimitiveInfo], start: usize, end: usize) -> BvhNode {
    let mut bounds = Aabb::EMPTY;
    for p in &primitives[start..end] {
        bounds.union(&p.bounds);
    }

    let n_primitives = end - start;
    if n_primitives == 1 {
        return BvhNode::leaf(&primitives[start..end], bounds);
    }

    let mut centroid_bounds = Aabb::EMPTY;
    for p in &primitives[start..end] {
        centroid_bounds.grow_point(p.centroid);
    }
    let axis = centroid_bounds.maximum_extent();
    let dim = axis.index();

    let mid = if n_primitives <= SMALL_RANGE {
        let mid = (start + end) / 2;
        nth_element(&mut primitives[start..end], mid - start, |a, b| {
            a.centroid[dim] < b.centroid[dim]
        });
        mid
    } else if centroid_bounds.max[dim] == centroid_bounds.min[dim] {
        // No split can separate coincident centroids.
        tracing::debug!(count = n_primitives, "degenerate centroid extent, emitting leaf");
        return BvhNode::leaf(&primitives[start..end], bounds);
    } else {
        sah_split(primitives, start, end, &bounds, &centroid_bounds, axis)
    };

    BvhNode::interior(
        axis,
        recursive_build(primitives, start, mid),
        recursive_build(primitives, mid, end),
    )
}

/// Bucket the range, pick the cheapest of the `NUM_BUCKETS - 1` candidate
/// splits and partition around it. Returns the partition point.
fn sah_split(
    primitives: &mut [PrimitiveInfo],
    start: usize,
    end: usize,
    bounds: &Aabb,
    centroid_bounds: &Aabb,
    axis: Axis,
) -> usize {
    let mut buckets = [Bucket::EMPTY; NUM_BUCKETS];
    for p in &primitives[start..end] {
        let b = bucket_index(centroid_bounds, axis, p);
        buckets[b].count += 1;
        buckets[b].bounds.union(&p.bounds);
    }

    // Sweep from left: prefix bounds and counts
    let mut left_area = [0.0f32; NUM_BUCKETS - 1];
    let mut left_count = [0usize; NUM_BUCKETS - 1];
    let mut sweep = Aabb::EMPTY;
    let mut sweep_count = 0;
    for i in 0..NUM_BUCKETS - 1 {
        sweep.union(&buckets[i].bounds);
        sweep_count += buckets[i].count;
        left_area[i] = sweep.surface_area();
        left_count[i] = sweep_count;
    }

    // Sweep from right and evaluate SAH cost
    let mut cost = [0.0f32; NUM_BUCKETS - 1];
    let total_area = bounds.surface_area();
    sweep = Aabb::EMPTY;
    sweep_count = 0;
    for i in (1..NUM_BUCKETS).rev() {
        sweep.union(&buckets[i].bounds);
        sweep_count += buckets[i].count;
        cost[i - 1] = TRAVERSAL_COST
            + (left_count[i - 1] as f32 * left_area[i - 1]
                + sweep_count as f32 * sweep.surface_area())
                / total_area;
    }

    // First strict minimum wins
    let mut min_cost = cost[0];
    let mut split_bucket = 0;
    for (i, &c) in cost.iter().enumerate().skip(1) {
        if c < min_cost {
            min_cost = c;
            split_bucket = i;
        }
    }

    tracing::trace!(split_bucket, min_cost, "sah split");

    start
        + partition(&mut primitives[start..end], |p| {
            bucket_index(centroid_bounds, axis, p) <= split_bucket
        })
}

#[inline]
fn bucket_index(centroid_bounds: &Aabb, axis: Axis, p: &PrimitiveInfo) -> usize {
    let b = (NUM_BUCKETS as f32 * centroid_bounds.offset(axis, p.centroid)).floor() as usize;
    b.min(NUM_BUCKETS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    fn make_prim(cx: f32, cy: f32, cz: f32, id: u32) -> PrimitiveInfo {
        let bounds = Aabb::new(
            Vec3::new(cx - 0.5, cy - 0.5, cz),
            Vec3::new(cx + 0.5, cy + 0.5, cz),
        );
        PrimitiveInfo {
            bounds,
            centroid: bounds.center(),
            indices: [id * 3, id * 3 + 1, id * 3 + 2],
            face_normal: Vec3::Z,
            material_index: 0,
        }
    }

    fn sorted_ids(node: &BvhNode) -> Vec<u32> {
        let mut ids: Vec<u32> = node.primitives().iter().map(|p| p.indices[0] / 3).collect();
        ids.sort();
        ids
    }

    fn check_bounds(node: &BvhNode) {
        match node {
            BvhNode::Leaf { primitives, bounds } => {
                let mut b = Aabb::EMPTY;
                for p in primitives {
                    b.union(&p.bounds);
                }
                assert_eq!(&b, bounds);
            }
            BvhNode::Interior { child0, child1, bounds, .. } => {
                assert_eq!(&Aabb::union_of(child0.bounds(), child1.bounds()), bounds);
                check_bounds(child0);
                check_bounds(child1);
            }
        }
    }

    #[test]
    fn test_empty_fails() {
        let mut prims: Vec<PrimitiveInfo> = Vec::new();
        assert!(matches!(build(&mut prims), Err(Error::EmptyGeometry)));
    }

    #[test]
    fn test_bad_range_fails() {
        let mut prims = vec![make_prim(0.0, 0.0, 0.0, 0), make_prim(1.0, 0.0, 0.0, 1)];
        assert!(matches!(
            build_range(&mut prims, 1, 1),
            Err(Error::InvalidRange { start: 1, end: 1, len: 2 })
        ));
        assert!(build_range(&mut prims, 0, 3).is_err());
    }

    #[test]
    fn test_single_primitive_is_leaf() {
        let mut prims = vec![make_prim(0.0, 0.0, 0.0, 0)];
        let node = build(&mut prims).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.depth(), 1);
        assert_eq!(node.primitive_count(), 1);
    }

    #[test]
    fn test_small_range_median_split() {
        // Spread along Y so Y is the split axis.
        let mut prims: Vec<_> = [3.0, 0.0, 2.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &y)| make_prim(0.0, y * 4.0, 0.0, i as u32))
            .collect();
        let node = build(&mut prims).unwrap();

        match &node {
            BvhNode::Interior { child0, child1, split_axis, .. } => {
                assert_eq!(*split_axis, Axis::Y);
                assert_eq!(child0.primitive_count(), 2);
                assert_eq!(child1.primitive_count(), 2);
                assert!(child0.bounds().max.y < child1.bounds().min.y);
            }
            BvhNode::Leaf { .. } => panic!("expected interior root"),
        }
        assert_eq!(node.depth(), 3);
        check_bounds(&node);
    }

    #[test]
    fn test_small_range_coincident_centroids_still_split() {
        let mut prims: Vec<_> = (0..3).map(|i| make_prim(1.0, 1.0, 1.0, i)).collect();
        let node = build(&mut prims).unwrap();
        assert!(!node.is_leaf());
        assert_eq!(sorted_ids(&node), vec![0, 1, 2]);
    }

    #[test]
    fn test_degenerate_centroids_make_one_leaf() {
        let mut prims: Vec<_> = (0..8).map(|i| make_prim(1.0, 2.0, 3.0, i)).collect();
        let node = build(&mut prims).unwrap();
        match &node {
            BvhNode::Leaf { primitives, .. } => assert_eq!(primitives.len(), 8),
            BvhNode::Interior { .. } => panic!("coincident centroids must stop splitting"),
        }
    }

    #[test]
    fn test_sah_separates_clusters() {
        // Two tight clusters far apart on X; the root split must separate them.
        let mut prims: Vec<_> = (0..6)
            .map(|i| make_prim(i as f32 * 0.01, 0.0, 0.0, i))
            .chain((6..12).map(|i| make_prim(100.0 + i as f32 * 0.01, 0.0, 0.0, i)))
            .collect();
        let node = build(&mut prims).unwrap();

        match &node {
            BvhNode::Interior { child0, child1, split_axis, .. } => {
                assert_eq!(*split_axis, Axis::X);
                assert_eq!(sorted_ids(child0), (0..6).collect::<Vec<_>>());
                assert_eq!(sorted_ids(child1), (6..12).collect::<Vec<_>>());
            }
            BvhNode::Leaf { .. } => panic!("expected interior root"),
        }
        check_bounds(&node);
    }

    #[test]
    fn test_zero_area_split_takes_first_bucket() {
        // Collinear slivers: every box is flat, so the root area is zero and
        // every candidate cost is NaN. The first bucket is kept.
        let mut prims: Vec<_> = (0..9u32)
            .map(|i| {
                let x = i as f32;
                let bounds = Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 0.5, 0.0, 0.0));
                PrimitiveInfo {
                    bounds,
                    centroid: bounds.center(),
                    indices: [i * 3, i * 3 + 1, i * 3 + 2],
                    face_normal: Vec3::ZERO,
                    material_index: 0,
                }
            })
            .collect();
        let node = build(&mut prims).unwrap();

        assert_eq!(sorted_ids(&node), (0..9).collect::<Vec<_>>());
        match &node {
            BvhNode::Interior { child0, child1, split_axis, .. } => {
                assert_eq!(*split_axis, Axis::X);
                assert_eq!(sorted_ids(child0), vec![0]);
                assert_eq!(child1.primitive_count(), 8);
            }
            other => panic!("expected interior, got {:?}", other),
        }
        // 9, 8, 7, 6, 5 peel one off each; 4 and 2 split at the median.
        assert_eq!(node.depth(), 8);
        check_bounds(&node);
    }

    #[test]
    fn test_many_primitives_conserved() {
        let mut prims: Vec<_> = (0..100).map(|i| make_prim(i as f32 * 2.0, 0.0, 0.0, i)).collect();
        let node = build(&mut prims).unwrap();

        assert_eq!(sorted_ids(&node), (0..100).collect::<Vec<_>>());
        assert!(node.bounds().min.x < 0.0);
        assert!(node.bounds().max.x > 198.0);
        assert!(node.depth() >= 7);
        check_bounds(&node);
    }

    #[test]
    fn test_build_range_only_touches_range() {
        let mut prims: Vec<_> = (0..10).map(|i| make_prim(9.0 - i as f32, 0.0, 0.0, i)).collect();
        let before = prims.clone();
        let node = build_range(&mut prims, 2, 8).unwrap();
        assert_eq!(node.primitive_count(), 6);
        assert_eq!(&prims[..2], &before[..2]);
        assert_eq!(&prims[8..], &before[8..]);
    }

    #[test]
    fn test_bucket_index_clamps() {
        let cb = Aabb::new(Vec3::ZERO, Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(bucket_index(&cb, Axis::X, &make_prim(0.0, 0.0, 0.0, 0)), 0);
        assert_eq!(bucket_index(&cb, Axis::X, &make_prim(5.5, 0.0, 0.0, 0)), 5);
        assert_eq!(bucket_index(&cb, Axis::X, &make_prim(12.0, 0.0, 0.0, 0)), 11);
    }
}
