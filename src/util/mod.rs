//! Utility types shared by every stage of the build.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Axis`] - Split axis of an interior node
//! - Math type re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
