//! Read back a [`FlatBvh`] the way the GPU consumer does.

use super::aabb::Aabb;
use super::flatten::{FlatBvh, TEXELS_PER_RECORD};
use crate::util::{Axis, Error, Result, Vec3};

/// A decoded record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatNode {
    Interior {
        bounds: Aabb,
        split_axis: Axis,
        /// Texel index of the second child's first row.
        second_child: usize,
    },
    Leaf {
        indices: [u32; 3],
        /// Primitive count of the whole leaf this record belongs to.
        primitive_count: u32,
        face_normal: Vec3,
        material_index: i32,
    },
}

/// Totals gathered by [`FlatBvh::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlatSummary {
    pub interior_nodes: usize,
    pub leaves: usize,
    pub leaf_records: usize,
    /// Deepest level reached, root counted as 1.
    pub depth: u32,
}

impl FlatBvh {
    /// Decode the record whose first row is texel `texel`.
    pub fn node(&self, texel: usize) -> Result<FlatNode> {
        if texel % TEXELS_PER_RECORD != 0 {
            return Err(Error::invalid_node(texel, "records start on even texels"));
        }
        let (Some(lo), Some(hi)) = (self.texel(texel), self.texel(texel + 1)) else {
            return Err(Error::invalid_node(
                texel,
                format!("past the end of {} texels", self.texel_count()),
            ));
        };
        let tag = lo[3].as_i32();

        if tag >= 0 {
            let split_axis = Axis::from_i32(tag)
                .ok_or_else(|| Error::invalid_node(texel, format!("unknown split axis {}", tag)))?;
            let second = hi[3].as_i32();
            if second <= texel as i32 + 2 || second as usize % TEXELS_PER_RECORD != 0 {
                return Err(Error::invalid_node(
                    texel,
                    format!("second child offset {} does not point forward", second),
                ));
            }
            if second as usize >= self.texel_count() {
                return Err(Error::invalid_node(
                    texel,
                    format!("second child offset {} past the end", second),
                ));
            }
            Ok(FlatNode::Interior {
                bounds: Aabb::new(
                    Vec3::new(lo[0].as_f32(), lo[1].as_f32(), lo[2].as_f32()),
                    Vec3::new(hi[0].as_f32(), hi[1].as_f32(), hi[2].as_f32()),
                ),
                split_axis,
                second_child: second as usize,
            })
        } else {
            Ok(FlatNode::Leaf {
                indices: [lo[0].bits(), lo[1].bits(), lo[2].bits()],
                primitive_count: tag.unsigned_abs(),
                face_normal: Vec3::new(hi[0].as_f32(), hi[1].as_f32(), hi[2].as_f32()),
                material_index: hi[3].as_i32(),
            })
        }
    }

    /// Pre-order traversal with an explicit stack, first child at
    /// `texel + 2`, second child at the stored offset.
    ///
    /// `visit` receives `(texel, node, depth)` for every record. For a leaf,
    /// all `primitive_count` consecutive records of the leaf are visited at
    /// the same depth. Fails if a record cannot be decoded or the depth would
    /// exceed [`FlatBvh::max_depth`].
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &FlatNode, u32),
    {
        let cap = self.max_depth().min(self.count()) as usize * 2;
        let mut stack: Vec<(usize, u32)> = Vec::with_capacity(cap);
        stack.push((0, 1));

        while let Some((texel, depth)) = stack.pop() {
            if depth > self.max_depth() {
                return Err(Error::invalid_node(
                    texel,
                    format!("depth {} exceeds max depth {}", depth, self.max_depth()),
                ));
            }

            let node = self.node(texel)?;
            match node {
                FlatNode::Interior { second_child, .. } => {
                    visit(texel, &node, depth);
                    stack.push((second_child, depth + 1));
                    stack.push((texel + TEXELS_PER_RECORD, depth + 1));
                }
                FlatNode::Leaf { primitive_count, .. } => {
                    visit(texel, &node, depth);
                    for k in 1..primitive_count as usize {
                        let t = texel + k * TEXELS_PER_RECORD;
                        let row = self.node(t)?;
                        match row {
                            FlatNode::Leaf { primitive_count: c, .. } if c == primitive_count => {
                                visit(t, &row, depth)
                            }
                            _ => {
                                return Err(Error::invalid_node(
                                    t,
                                    format!("expected leaf record {} of {}", k + 1, primitive_count),
                                ))
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Walk the whole buffer and check that every record is reached exactly
    /// once and that interior boxes are well formed.
    pub fn validate(&self) -> Result<FlatSummary> {
        let mut seen = vec![false; self.count() as usize];
        let mut summary = FlatSummary::default();
        let mut failure: Option<Error> = None;
        // Records still to come in the current leaf run.
        let mut run_left = 0u32;

        self.walk(|texel, node, depth| {
            let record = texel / TEXELS_PER_RECORD;
            if std::mem::replace(&mut seen[record], true) && failure.is_none() {
                failure = Some(Error::invalid_node(texel, "record reached twice"));
            }
            summary.depth = summary.depth.max(depth);
            match node {
                FlatNode::Interior { bounds, .. } => {
                    summary.interior_nodes += 1;
                    if !bounds.min.cmple(bounds.max).all() && failure.is_none() {
                        failure = Some(Error::invalid_node(texel, format!("inverted bounds {:?}", bounds)));
                    }
                }
                FlatNode::Leaf { primitive_count, .. } => {
                    summary.leaf_records += 1;
                    if run_left == 0 {
                        summary.leaves += 1;
                        run_left = *primitive_count;
                    }
                    run_left -= 1;
                }
            }
        })?;

        if let Some(err) = failure {
            return Err(err);
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(Error::invalid_node(
                missing * TEXELS_PER_RECORD,
                "record not reachable from the root",
            ));
        }

        Ok(summary)
    }
}
