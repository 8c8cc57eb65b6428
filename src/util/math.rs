//! Math type re-exports and the split axis enum.

// Re-export glam types
pub use glam::{DVec3, Mat3, Mat4, Vec3};

use std::fmt;

/// Axis an interior node was split along.
///
/// The discriminant is written verbatim into the flat buffer, so the
/// values are fixed: X = 0, Y = 1, Z = 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// Component index into a `Vec3`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decode an axis from its serialized integer form.
    #[inline]
    pub const fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}
