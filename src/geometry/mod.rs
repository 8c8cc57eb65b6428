//! Merged triangle geometry consumed by the BVH builder.
//!
//! A scene is flattened into one set of buffers before the hierarchy is
//! built: a shared index list, per-vertex positions/normals/uvs and a
//! per-vertex `(material index, mesh index)` pair. Only the positions and
//! the material component are read by the builder; the rest travels along
//! for the shading side.

mod merge;

pub use merge::{merge_meshes, Merged, Mesh};

use crate::util::{Error, Result, Vec3};

/// Per-vertex accessors the primitive extractor reads from.
pub trait VertexSource {
    /// Position of vertex `vertex`.
    fn position(&self, vertex: u32) -> Vec3;

    /// Material slot stored at vertex `vertex`.
    fn material_index(&self, vertex: u32) -> i32;
}

/// Output of the mesh merge step.
///
/// Shape is checked once at construction: every index addresses an
/// existing vertex and every per-vertex buffer has the right length. The
/// coordinates themselves are not inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedGeometry {
    indices: Vec<u32>,
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    material_mesh_index: Vec<i32>,
}

impl MergedGeometry {
    /// Create merged geometry from an index list, xyz positions and the
    /// interleaved `(material, mesh)` pair buffer.
    pub fn new(indices: Vec<u32>, positions: Vec<f32>, material_mesh_index: Vec<i32>) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(Error::malformed(format!(
                "position buffer length {} is not a multiple of 3",
                positions.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::malformed(format!(
                "index buffer length {} is not a multiple of 3",
                indices.len()
            )));
        }
        let vertex_count = positions.len() / 3;
        if material_mesh_index.len() != vertex_count * 2 {
            return Err(Error::malformed(format!(
                "material/mesh buffer has {} entries, expected {}",
                material_mesh_index.len(),
                vertex_count * 2
            )));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::IndexOutOfBounds { index, vertex_count });
        }

        Ok(Self {
            indices,
            positions,
            normals: Vec::new(),
            uvs: Vec::new(),
            material_mesh_index,
        })
    }

    /// Create geometry where every vertex uses `material` and belongs to mesh 1.
    pub fn with_material(indices: Vec<u32>, positions: Vec<f32>, material: i32) -> Result<Self> {
        let vertex_count = positions.len() / 3;
        let pairs = (0..vertex_count).flat_map(|_| [material, 1]).collect();
        Self::new(indices, positions, pairs)
    }

    /// Attach per-vertex normals (3 floats per vertex).
    pub fn with_normals(mut self, normals: Vec<f32>) -> Result<Self> {
        if normals.len() != self.positions.len() {
            return Err(Error::malformed(format!(
                "normal buffer has {} floats, expected {}",
                normals.len(),
                self.positions.len()
            )));
        }
        self.normals = normals;
        Ok(self)
    }

    /// Attach per-vertex texture coordinates (2 floats per vertex).
    pub fn with_uvs(mut self, uvs: Vec<f32>) -> Result<Self> {
        if uvs.len() != self.vertex_count() * 2 {
            return Err(Error::malformed(format!(
                "uv buffer has {} floats, expected {}",
                uvs.len(),
                self.vertex_count() * 2
            )));
        }
        self.uvs = uvs;
        Ok(self)
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Per-vertex normals, empty when none were attached.
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    /// Per-vertex uvs, empty when none were attached.
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    pub fn material_mesh_index(&self) -> &[i32] {
        &self.material_mesh_index
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 1-based index of the source mesh vertex `vertex` came from.
    #[inline]
    pub fn mesh_index(&self, vertex: u32) -> i32 {
        self.material_mesh_index[vertex as usize * 2 + 1]
    }
}

impl VertexSource for MergedGeometry {
    #[inline]
    fn position(&self, vertex: u32) -> Vec3 {
        let b = vertex as usize * 3;
        Vec3::new(self.positions[b], self.positions[b + 1], self.positions[b + 2])
    }

    #[inline]
    fn material_index(&self, vertex: u32) -> i32 {
        self.material_mesh_index[vertex as usize * 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_positions() -> Vec<f32> {
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ]
    }

    #[test]
    fn test_new_validates_shape() {
        let geo = MergedGeometry::with_material(vec![0, 1, 2, 0, 2, 3], quad_positions(), 7).unwrap();
        assert_eq!(geo.vertex_count(), 4);
        assert_eq!(geo.triangle_count(), 2);
        assert_eq!(geo.material_index(3), 7);
        assert_eq!(geo.mesh_index(3), 1);
        assert_eq!(geo.position(2), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let err = MergedGeometry::with_material(vec![0, 1], quad_positions(), 0).unwrap_err();
        assert!(matches!(err, Error::MalformedBuffer(_)));

        let err = MergedGeometry::with_material(vec![0, 1, 2], vec![0.0; 7], 0).unwrap_err();
        assert!(matches!(err, Error::MalformedBuffer(_)));

        let err = MergedGeometry::new(vec![0, 1, 2], quad_positions(), vec![0; 4]).unwrap_err();
        assert!(matches!(err, Error::MalformedBuffer(_)));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let err = MergedGeometry::with_material(vec![0, 1, 4], quad_positions(), 0).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 4, vertex_count: 4 }));
    }

    #[test]
    fn test_attribute_lengths() {
        let geo = MergedGeometry::with_material(vec![0, 1, 2], quad_positions(), 0).unwrap();
        assert!(geo.clone().with_normals(vec![0.0; 12]).is_ok());
        assert!(geo.clone().with_normals(vec![0.0; 9]).is_err());
        assert!(geo.clone().with_uvs(vec![0.0; 8]).is_ok());
        assert!(geo.with_uvs(vec![0.0; 12]).is_err());
    }
}
