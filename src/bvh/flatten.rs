//! Serialize a [`BvhNode`] tree into the flat buffer the GPU traverses.
//!
//! Layout: every record is two RGBA texels (8 scalars), written depth-first
//! in pre-order.
//!
//! ```text
//! interior  row0 = min.x  min.y  min.z  split_axis        (f32 f32 f32 i32)
//!           row1 = max.x  max.y  max.z  second_child      (f32 f32 f32 i32)
//! leaf      row0 = i0     i1     i2     -primitive_count  (i32 i32 i32 i32)
//!           row1 = n.x    n.y    n.z    material_index    (f32 f32 f32 i32)
//! ```
//!
//! The first child of an interior node is always the next record
//! (`texel + 2`); `second_child` is the texel index of the other one. The
//! sign of the last scalar of row0 tells the two kinds apart. A leaf with
//! several primitives emits one record per primitive, each carrying the
//! leaf's primitive count.

use bytemuck::{Pod, Zeroable};
use std::fmt;

use super::build::BvhNode;
use crate::util::{Error, Result};

/// Scalars per texel (RGBA).
pub const SCALARS_PER_TEXEL: usize = 4;

/// Texels per record.
pub const TEXELS_PER_RECORD: usize = 2;

/// Scalars per record.
pub const SCALARS_PER_RECORD: usize = SCALARS_PER_TEXEL * TEXELS_PER_RECORD;

/// One 32-bit slot of the flat buffer, holding either an `f32` or an `i32`.
///
/// Stored as raw bits so a buffer can be viewed as `&[f32]`, `&[i32]` or
/// `&[u8]` without conversion, the same way a shader reads it with
/// `floatBitsToInt`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Scalar(u32);

impl Scalar {
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits())
    }

    #[inline]
    pub const fn from_i32(v: i32) -> Self {
        Self(v as u32)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({:#010x} i={} f={})", self.0, self.as_i32(), self.as_f32())
    }
}

/// Flattened hierarchy ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatBvh {
    buffer: Vec<Scalar>,
    max_depth: u32,
    count: u32,
}

impl FlatBvh {
    /// Wrap an existing scalar buffer (e.g. read back from disk).
    pub fn from_parts(buffer: Vec<Scalar>, max_depth: u32) -> Result<Self> {
        if buffer.is_empty() || buffer.len() % SCALARS_PER_RECORD != 0 {
            return Err(Error::malformed(format!(
                "flat buffer of {} scalars is not a whole number of records",
                buffer.len()
            )));
        }
        let count = (buffer.len() / SCALARS_PER_RECORD) as u32;
        // Every level of a root-to-leaf path is its own record.
        if max_depth == 0 || max_depth > count {
            return Err(Error::malformed(format!(
                "max depth {} is outside 1..={} for {} records",
                max_depth, count, count
            )));
        }
        Ok(Self {
            buffer,
            max_depth,
            count,
        })
    }

    pub fn scalars(&self) -> &[Scalar] {
        &self.buffer
    }

    /// Deepest root-to-leaf level, root counted as 1. Sizes the traversal stack.
    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Number of records (row pairs).
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of RGBA texels (rows).
    #[inline]
    pub fn texel_count(&self) -> usize {
        self.count as usize * TEXELS_PER_RECORD
    }

    /// The four scalars of texel `texel`.
    #[inline]
    pub fn texel(&self, texel: usize) -> Option<&[Scalar]> {
        let s = texel.checked_mul(SCALARS_PER_TEXEL)?;
        self.buffer.get(s..s.checked_add(SCALARS_PER_TEXEL)?)
    }

    pub fn as_f32(&self) -> &[f32] {
        bytemuck::cast_slice(&self.buffer)
    }

    pub fn as_i32(&self) -> &[i32] {
        bytemuck::cast_slice(&self.buffer)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }
}

/// Flatten `root` into a [`FlatBvh`]. The tree is not modified.
#[tracing::instrument(skip_all, fields(prim_count = root.primitive_count()))]
pub fn flatten(root: &BvhNode) -> FlatBvh {
    let mut f = Flattener {
        buffer: Vec::new(),
        max_depth: 1,
    };
    f.visit(root, 1);

    let count = (f.buffer.len() / SCALARS_PER_RECORD) as u32;
    tracing::debug!(count, max_depth = f.max_depth, "flattened bvh");

    FlatBvh {
        buffer: f.buffer,
        max_depth: f.max_depth,
        count,
    }
}

struct Flattener {
    buffer: Vec<Scalar>,
    max_depth: u32,
}

impl Flattener {
    fn visit(&mut self, node: &BvhNode, depth: u32) {
        self.max_depth = self.max_depth.max(depth);

        match node {
            BvhNode::Leaf { primitives, .. } => {
                // Negative count marks a leaf.
                let count = -(primitives.len() as i32);
                for p in primitives {
                    let [i0, i1, i2] = p.indices;
                    self.buffer.extend_from_slice(&[
                        Scalar::from_bits(i0),
                        Scalar::from_bits(i1),
                        Scalar::from_bits(i2),
                        Scalar::from_i32(count),
                        Scalar::from_f32(p.face_normal.x),
                        Scalar::from_f32(p.face_normal.y),
                        Scalar::from_f32(p.face_normal.z),
                        Scalar::from_i32(p.material_index),
                    ]);
                }
            }
            BvhNode::Interior {
                child0,
                child1,
                bounds,
                split_axis,
            } => {
                self.buffer.extend_from_slice(&[
                    Scalar::from_f32(bounds.min.x),
                    Scalar::from_f32(bounds.min.y),
                    Scalar::from_f32(bounds.min.z),
                    Scalar::from_i32(*split_axis as i32),
                    Scalar::from_f32(bounds.max.x),
                    Scalar::from_f32(bounds.max.y),
                    Scalar::from_f32(bounds.max.z),
                    Scalar::default(),
                ]);
                let second_child_slot = self.buffer.len() - 1;

                self.visit(child0, depth + 1);
                let second_child = (self.buffer.len() / SCALARS_PER_TEXEL) as i32;
                self.visit(child1, depth + 1);

                self.buffer[second_child_slot] = Scalar::from_i32(second_child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{build, Aabb, PrimitiveInfo};
    use crate::util::{Axis, Vec3};

    fn prim(x: f32, id: u32) -> PrimitiveInfo {
        let bounds = Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 0.0));
        PrimitiveInfo {
            bounds,
            centroid: bounds.center(),
            indices: [id, id + 1, id + 2],
            face_normal: Vec3::Z,
            material_index: id as i32,
        }
    }

    #[test]
    fn test_scalar_bits() {
        assert_eq!(Scalar::from_f32(1.0).bits(), 0x3f80_0000);
        assert_eq!(Scalar::from_i32(-2).as_i32(), -2);
        assert_eq!(Scalar::from_i32(-2).bits(), 0xffff_fffe);
        assert_eq!(Scalar::from_f32(-0.5).as_f32(), -0.5);
    }

    #[test]
    fn test_single_leaf() {
        let mut prims = vec![prim(0.0, 3)];
        let flat = flatten(&build(&mut prims).unwrap());

        assert_eq!(flat.count(), 1);
        assert_eq!(flat.max_depth(), 1);
        assert_eq!(flat.texel_count(), 2);
        assert_eq!(&flat.as_i32()[0..4], &[3, 4, 5, -1]);
        assert_eq!(&flat.as_f32()[4..7], &[0.0, 0.0, 1.0]);
        assert_eq!(flat.as_i32()[7], 3);
    }

    #[test]
    fn test_two_leaves_layout() {
        let mut prims = vec![prim(0.0, 0), prim(10.0, 3)];
        let root = build(&mut prims).unwrap();
        let flat = flatten(&root);

        assert_eq!(flat.count(), 3);
        assert_eq!(flat.max_depth(), 2);

        let f = flat.as_f32();
        let i = flat.as_i32();
        // Root interior: bounds, axis X, second child at texel 4.
        assert_eq!(&f[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(i[3], Axis::X as i32);
        assert_eq!(&f[4..7], &[11.0, 1.0, 0.0]);
        assert_eq!(i[7], 4);
        // First child directly after, second child where the offset says.
        assert_eq!(&i[8..12], &[0, 1, 2, -1]);
        assert_eq!(&i[16..20], &[3, 4, 5, -1]);
    }

    #[test]
    fn test_multi_primitive_leaf_repeats_count() {
        let root = BvhNode::Leaf {
            primitives: vec![prim(0.0, 0), prim(0.0, 3), prim(0.0, 6)],
            bounds: Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)),
        };
        let flat = flatten(&root);
        assert_eq!(flat.count(), 3);
        for r in 0..3 {
            assert_eq!(flat.as_i32()[r * 8 + 3], -3);
            assert_eq!(flat.as_i32()[r * 8 + 7], (r * 3) as i32);
        }
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let mut prims: Vec<_> = (0..40).map(|i| prim((i * 7 % 13) as f32, i * 3)).collect();
        let root = build(&mut prims).unwrap();
        let a = flatten(&root);
        let b = flatten(&root);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.max_depth(), root.depth());
    }

    #[test]
    fn test_from_parts_validates() {
        assert!(FlatBvh::from_parts(vec![Scalar::default(); 7], 1).is_err());
        assert!(FlatBvh::from_parts(Vec::new(), 1).is_err());
        assert!(FlatBvh::from_parts(vec![Scalar::default(); 8], 0).is_err());
        assert!(FlatBvh::from_parts(vec![Scalar::default(); 8], 2).is_err());
        assert!(FlatBvh::from_parts(vec![Scalar::default(); 8], u32::MAX).is_err());
        let flat = FlatBvh::from_parts(vec![Scalar::default(); 16], 2).unwrap();
        assert_eq!(flat.count(), 2);
        assert_eq!(flat.texel(3).map(|t| t.len()), Some(4));
        assert!(flat.texel(4).is_none());
    }
}
