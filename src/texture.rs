//! Data-texture layout for uploading a [`FlatBvh`].
//!
//! The consumer samples the flat buffer as a 2D RGBA32 texture, one texel per
//! row. Linear texel `i` lives at `(i & (columns - 1), i >> columns_log)`, so
//! the column count is always a power of two.

use serde::Serialize;

use crate::bvh::{FlatBvh, Scalar, SCALARS_PER_TEXEL};

/// Width and height of a data texture holding `texels` texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureLayout {
    pub columns_log: u32,
    pub columns: u32,
    pub rows: u32,
    /// `rows * columns`, texels after padding.
    pub size: u32,
}

impl TextureLayout {
    /// Roughly square layout with a power-of-two width.
    pub fn for_texels(texels: usize) -> Self {
        let columns_log = if texels == 0 {
            0
        } else {
            (texels as f64).sqrt().log2().round().max(0.0) as u32
        };
        let columns = 1u32 << columns_log;
        let rows = (texels as u32).div_ceil(columns);
        Self {
            columns_log,
            columns,
            rows,
            size: rows * columns,
        }
    }

    /// 2D coordinate of linear texel `texel`.
    #[inline]
    pub fn unpack(&self, texel: u32) -> (u32, u32) {
        let y = texel >> self.columns_log;
        (texel - (y << self.columns_log), y)
    }
}

/// Compile-time constants the traversal shader is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShaderDefines {
    /// `columns_log` of the BVH texture.
    pub bvh_columns: u32,
    /// Traversal stack size, the hierarchy's max depth.
    pub stack_size: u32,
}

impl ShaderDefines {
    pub fn to_source(&self) -> String {
        format!(
            "#define BVH_COLUMNS {}\n#define STACK_SIZE {}\n",
            self.bvh_columns, self.stack_size
        )
    }
}

impl FlatBvh {
    pub fn texture_layout(&self) -> TextureLayout {
        TextureLayout::for_texels(self.texel_count())
    }

    /// Scalar buffer zero-padded to a full `columns x rows` texture.
    pub fn padded_texture_data(&self) -> Vec<Scalar> {
        let layout = self.texture_layout();
        let mut data = self.scalars().to_vec();
        data.resize(layout.size as usize * SCALARS_PER_TEXEL, Scalar::default());
        data
    }

    pub fn shader_defines(&self) -> ShaderDefines {
        ShaderDefines {
            bvh_columns: self.texture_layout().columns_log,
            stack_size: self.max_depth(),
        }
    }
}
