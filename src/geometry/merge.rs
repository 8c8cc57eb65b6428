//! Merge a list of meshes into a single [`MergedGeometry`].
//!
//! Each mesh is moved to world space, gets indices and normals if it has
//! none, and is appended to the shared buffers. Materials are deduplicated
//! in first-seen order and each vertex records `(material slot, mesh index)`
//! with mesh indices starting at 1.

use std::collections::HashMap;
use std::hash::Hash;

use super::MergedGeometry;
use crate::util::{Error, Mat3, Mat4, Result, Vec3};

/// A single input mesh in object space.
#[derive(Debug, Clone)]
pub struct Mesh<M> {
    /// xyz per vertex.
    pub positions: Vec<f32>,
    /// xyz per vertex. Computed from the faces when absent.
    pub normals: Option<Vec<f32>>,
    /// uv per vertex. Zero-filled when absent.
    pub uvs: Option<Vec<f32>>,
    /// Triangle list. Treated as a non-indexed triangle list when absent.
    pub indices: Option<Vec<u32>>,
    /// Object to world transform.
    pub transform: Mat4,
    /// Material key; meshes with equal keys share a material slot.
    pub material: M,
}

impl<M> Mesh<M> {
    /// Non-indexed mesh with identity transform.
    pub fn new(positions: Vec<f32>, material: M) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            indices: None,
            transform: Mat4::IDENTITY,
            material,
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<f32>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Merged geometry plus the deduplicated material list.
#[derive(Debug, Clone)]
pub struct Merged<M> {
    pub geometry: MergedGeometry,
    /// `materials[slot]` is the key every vertex with material index `slot` refers to.
    pub materials: Vec<M>,
}

/// Merge `meshes` into one indexed triangle soup.
#[tracing::instrument(skip_all, fields(mesh_count = meshes.len()))]
pub fn merge_meshes<M: Clone + Eq + Hash>(meshes: &[Mesh<M>]) -> Result<Merged<M>> {
    if meshes.is_empty() {
        return Err(Error::EmptyGeometry);
    }

    let vertex_count: usize = meshes.iter().map(Mesh::vertex_count).sum();

    let mut positions = Vec::with_capacity(vertex_count * 3);
    let mut normals = Vec::with_capacity(vertex_count * 3);
    let mut uvs = Vec::with_capacity(vertex_count * 2);
    let mut indices = Vec::new();
    let mut material_mesh_index = Vec::with_capacity(vertex_count * 2);

    let mut material_slots: HashMap<M, i32> = HashMap::new();
    let mut materials = Vec::new();

    for (mesh_no, mesh) in meshes.iter().enumerate() {
        if mesh.positions.len() % 3 != 0 {
            return Err(Error::malformed(format!(
                "mesh {} position buffer length {} is not a multiple of 3",
                mesh_no,
                mesh.positions.len()
            )));
        }

        let count = mesh.vertex_count();
        let base = (positions.len() / 3) as u32;

        let local_indices: Vec<u32> = match &mesh.indices {
            Some(idx) => idx.clone(),
            None => (0..count as u32).collect(),
        };
        if let Some(&index) = local_indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::IndexOutOfBounds { index, vertex_count: count });
        }

        let world = transform_positions(&mesh.positions, &mesh.transform);
        let world_normals = match &mesh.normals {
            Some(n) if n.len() == mesh.positions.len() => transform_normals(n, &mesh.transform),
            Some(n) => {
                return Err(Error::malformed(format!(
                    "mesh {} has {} normal floats, expected {}",
                    mesh_no,
                    n.len(),
                    mesh.positions.len()
                )))
            }
            None => compute_vertex_normals(&world, &local_indices),
        };

        match &mesh.uvs {
            Some(uv) if uv.len() == count * 2 => uvs.extend_from_slice(uv),
            Some(uv) => {
                return Err(Error::malformed(format!(
                    "mesh {} has {} uv floats, expected {}",
                    mesh_no,
                    uv.len(),
                    count * 2
                )))
            }
            None => uvs.resize(uvs.len() + count * 2, 0.0),
        }

        let material = match material_slots.get(&mesh.material) {
            Some(&slot) => slot,
            None => {
                let slot = materials.len() as i32;
                material_slots.insert(mesh.material.clone(), slot);
                materials.push(mesh.material.clone());
                slot
            }
        };
        let mesh_index = mesh_no as i32 + 1;

        positions.extend(world);
        normals.extend(world_normals);
        indices.extend(local_indices.iter().map(|&i| base + i));
        for _ in 0..count {
            material_mesh_index.push(material);
            material_mesh_index.push(mesh_index);
        }
    }

    tracing::debug!(
        vertices = positions.len() / 3,
        triangles = indices.len() / 3,
        materials = materials.len(),
        "merged meshes"
    );

    let geometry = MergedGeometry::new(indices, positions, material_mesh_index)?
        .with_normals(normals)?
        .with_uvs(uvs)?;

    Ok(Merged { geometry, materials })
}

fn transform_positions(positions: &[f32], transform: &Mat4) -> Vec<f32> {
    positions
        .chunks_exact(3)
        .flat_map(|p| transform.transform_point3(Vec3::new(p[0], p[1], p[2])).to_array())
        .collect()
}

fn transform_normals(normals: &[f32], transform: &Mat4) -> Vec<f32> {
    let normal_mat = Mat3::from_mat4(*transform).inverse().transpose();
    normals
        .chunks_exact(3)
        .flat_map(|n| (normal_mat * Vec3::new(n[0], n[1], n[2])).normalize_or_zero().to_array())
        .collect()
}

/// Area-weighted vertex normals accumulated from every face touching a vertex.
fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut acc = vec![Vec3::ZERO; positions.len() / 3];
    let at = |i: usize| Vec3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);

    for tri in indices.chunks_exact(3) {
        let (i1, i2, i3) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (p1, p2, p3) = (at(i1), at(i2), at(i3));
        // Unnormalized: magnitude is twice the face area.
        let n = (p1 - p2).cross(p2 - p3);
        acc[i1] += n;
        acc[i2] += n;
        acc[i3] += n;
    }

    acc.into_iter()
        .flat_map(|n| n.normalize_or_zero().to_array())
        .collect()
}
