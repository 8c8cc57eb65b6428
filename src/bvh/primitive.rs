//! Per-triangle records the builder partitions.

use super::aabb::Aabb;
use crate::geometry::VertexSource;
use crate::util::Vec3;

/// Build-time record for one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveInfo {
    pub bounds: Aabb,
    /// Midpoint of `bounds`, not the vertex average.
    pub centroid: Vec3,
    /// Vertex indices into the shared vertex buffer.
    pub indices: [u32; 3],
    pub face_normal: Vec3,
    pub material_index: i32,
}

impl PrimitiveInfo {
    /// Record for the triangle `[i0, i1, i2]` of `source`.
    pub fn from_triangle<S: VertexSource + ?Sized>(source: &S, indices: [u32; 3]) -> Self {
        let [i0, i1, i2] = indices;
        let p0 = source.position(i0);
        let p1 = source.position(i1);
        let p2 = source.position(i2);

        let bounds = Aabb::from_points(&[p0, p1, p2]);

        // Edges, cross and normalize run in double precision, rounded once.
        let d0 = p0.as_dvec3();
        let e0 = p2.as_dvec3() - d0;
        let e1 = p1.as_dvec3() - d0;
        // Operand order fixes the winding the shading side expects.
        let face_normal = e1.cross(e0).normalize_or_zero().as_vec3();

        Self {
            bounds,
            centroid: bounds.center(),
            indices,
            face_normal,
            material_index: source.material_index(i0),
        }
    }
}

/// One record per triangle of `indices`, in triangle order.
///
/// Trailing indices that do not form a whole triangle are ignored.
#[tracing::instrument(skip_all, fields(tri_count = indices.len() / 3))]
pub fn make_primitive_info<S: VertexSource + ?Sized>(indices: &[u32], source: &S) -> Vec<PrimitiveInfo> {
    indices
        .chunks_exact(3)
        .map(|tri| PrimitiveInfo::from_triangle(source, [tri[0], tri[1], tri[2]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MergedGeometry;
    use crate::util::DVec3;

    #[test]
    fn test_centroid_is_box_midpoint() {
        // Vertex average would be (1/3, 1/3, 0); box midpoint is (0.5, 0.5, 0).
        let geo = MergedGeometry::with_material(
            vec![0, 1, 2],
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            0,
        )
        .unwrap();
        let prims = make_primitive_info(geo.indices(), &geo);
        assert_eq!(prims.len(), 1);
        assert_eq!(prims[0].centroid, Vec3::new(0.5, 0.5, 0.0));
        assert_eq!(prims[0].bounds.min, Vec3::ZERO);
        assert_eq!(prims[0].bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_face_normal_winding() {
        let positions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let geo = MergedGeometry::with_material(vec![0, 1, 2, 0, 2, 1], positions, 0).unwrap();
        let prims = make_primitive_info(geo.indices(), &geo);
        // cross(p1 - p0, p2 - p0): counter-clockwise in XY faces +Z.
        assert_eq!(prims[0].face_normal, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(prims[1].face_normal, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_material_from_first_vertex() {
        let positions = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let pairs = vec![3, 1, 9, 1, 9, 1];
        let geo = MergedGeometry::new(vec![0, 1, 2, 1, 2, 0], positions, pairs).unwrap();
        let prims = make_primitive_info(geo.indices(), &geo);
        assert_eq!(prims[0].material_index, 3);
        assert_eq!(prims[1].material_index, 9);
        assert_eq!(prims[1].indices, [1, 2, 0]);
    }

    #[test]
    fn test_degenerate_triangle_has_zero_normal() {
        let positions = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let geo = MergedGeometry::with_material(vec![0, 1, 2], positions, 0).unwrap();
        let prims = make_primitive_info(geo.indices(), &geo);
        assert_eq!(prims[0].face_normal, Vec3::ZERO);
    }

    #[test]
    fn test_face_normal_rounded_once() {
        let positions = vec![0.1, 0.2, 0.3, 1.7, -0.4, 0.9, -0.6, 2.3, 1.1];
        let geo = MergedGeometry::with_material(vec![0, 1, 2], positions.clone(), 0).unwrap();
        let prims = make_primitive_info(geo.indices(), &geo);

        let p = |i: usize| {
            DVec3::new(positions[i * 3] as f64, positions[i * 3 + 1] as f64, positions[i * 3 + 2] as f64)
        };
        let n = (p(1) - p(0)).cross(p(2) - p(0));
        let expected = (n * (1.0 / n.length())).as_vec3();
        assert_eq!(prims[0].face_normal, expected);
    }
}
