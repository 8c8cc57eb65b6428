//! Bounding volume hierarchy: build, flatten and decode.
//!
//! The pipeline is
//! [`make_primitive_info`] → [`build`] → [`flatten`] → upload of
//! [`FlatBvh::scalars`] as an RGBA32 data texture.

mod aabb;
mod build;
mod decode;
mod flatten;
mod primitive;
mod select;
mod stats;

pub use aabb::Aabb;
pub use build::{build, build_bvh, build_range, BvhNode, NUM_BUCKETS, SMALL_RANGE, TRAVERSAL_COST};
pub use decode::{FlatNode, FlatSummary};
pub use flatten::{flatten, FlatBvh, Scalar, SCALARS_PER_RECORD, SCALARS_PER_TEXEL, TEXELS_PER_RECORD};
pub use primitive::{make_primitive_info, PrimitiveInfo};
pub use select::{nth_element, partition};
pub use stats::BvhStats;
