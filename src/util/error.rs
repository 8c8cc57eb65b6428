//! Error types for BVH construction and serialization.

use thiserror::Error;

/// Main error type for BVH operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Build was asked to index zero primitives
    #[error("Cannot build a BVH over empty geometry")]
    EmptyGeometry,

    /// Primitive range outside the slice, or empty
    #[error("Invalid primitive range {start}..{end} (len: {len})")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Geometry buffer with the wrong length or component count
    #[error("Malformed buffer: {0}")]
    MalformedBuffer(String),

    /// Triangle index referencing a vertex that does not exist
    #[error("Vertex index {index} out of bounds (vertex count: {vertex_count})")]
    IndexOutOfBounds { index: u32, vertex_count: usize },

    /// Flat record that cannot be decoded
    #[error("Invalid node at texel {texel}: {reason}")]
    InvalidNode { texel: usize, reason: String },

    /// Invalid magic bytes at start of a flat BVH file
    #[error("Invalid BVH file: expected BVHF magic bytes")]
    InvalidMagic,

    /// Unsupported container version
    #[error("Unsupported BVH file version: {0}")]
    UnsupportedVersion(u32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings or report (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed buffer error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBuffer(msg.into())
    }

    /// Create an invalid node error for the row pair starting at `texel`.
    pub fn invalid_node(texel: usize, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            texel,
            reason: reason.into(),
        }
    }
}

/// Result type alias for BVH operations.
pub type Result<T> = std::result::Result<T, Error>;
