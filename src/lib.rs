//! # bvh-accel
//!
//! Bounding volume hierarchy construction and flattening for GPU path tracing.
//!
//! Triangles from a merged scene are turned into per-primitive records, built
//! into a binary hierarchy with a bucketed surface area heuristic, and
//! flattened into a buffer of 32-bit scalars that a shader reads as pairs of
//! RGBA texels.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports, [`Axis`](util::Axis)
//! - [`geometry`] - Merged scene buffers and the mesh merge step
//! - [`bvh`] - Bounds, primitive extraction, build, flatten and decode
//! - [`texture`] - Data-texture layout and shader constants
//! - [`config`] - Settings for the command-line tool
//! - [`io`] - On-disk container for flattened hierarchies
//!
//! ## Example
//!
//! ```
//! use bvh_accel::prelude::*;
//!
//! let geometry = MergedGeometry::with_material(
//!     vec![0, 1, 2, 0, 2, 3],
//!     vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
//!     0,
//! )?;
//! let root = build_bvh(&geometry)?;
//! let flat = flatten(&root);
//! assert_eq!(flat.count(), 3);
//! # Ok::<(), bvh_accel::Error>(())
//! ```

pub mod util;
pub mod geometry;
pub mod bvh;
pub mod texture;
pub mod config;
pub mod io;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Axis, Error, Result, Vec3};
    pub use crate::geometry::{merge_meshes, Merged, MergedGeometry, Mesh, VertexSource};
    pub use crate::bvh::{build, build_bvh, flatten, make_primitive_info, Aabb, BvhNode, BvhStats, FlatBvh, FlatNode, PrimitiveInfo};
    pub use crate::texture::{ShaderDefines, TextureLayout};
    pub use crate::config::Settings;
}
