//! Summary statistics of a built hierarchy.

use serde::Serialize;

use super::build::BvhNode;

/// Shape of a [`BvhNode`] tree, as written to build reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BvhStats {
    pub nodes: usize,
    pub interior_nodes: usize,
    pub leaves: usize,
    pub primitives: usize,
    pub max_leaf_size: usize,
    /// Root counted as 1.
    pub max_depth: u32,
    pub root_surface_area: f32,
    /// Sum of leaf depths over leaf count.
    pub mean_leaf_depth: f32,
}

impl BvhStats {
    pub fn from_node(root: &BvhNode) -> Self {
        let mut stats = BvhStats {
            root_surface_area: root.bounds().surface_area(),
            ..Default::default()
        };
        let mut depth_sum = 0u64;

        let mut stack = vec![(root, 1u32)];
        while let Some((node, depth)) = stack.pop() {
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);
            match node {
                BvhNode::Leaf { primitives, .. } => {
                    stats.leaves += 1;
                    stats.primitives += primitives.len();
                    stats.max_leaf_size = stats.max_leaf_size.max(primitives.len());
                    depth_sum += depth as u64;
                }
                BvhNode::Interior { child0, child1, .. } => {
                    stats.interior_nodes += 1;
                    stack.push((child1, depth + 1));
                    stack.push((child0, depth + 1));
                }
            }
        }

        if stats.leaves > 0 {
            stats.mean_leaf_depth = depth_sum as f32 / stats.leaves as f32;
        }
        stats
    }
}
