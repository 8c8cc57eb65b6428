//! On-disk container for a flattened hierarchy.
//!
//! Layout (all little-endian):
//!
//! | offset | size        | field                    |
//! |--------|-------------|--------------------------|
//! | 0      | 4           | magic `BVHF`             |
//! | 4      | 4           | version                  |
//! | 8      | 4           | max depth                |
//! | 12     | 4           | record count             |
//! | 16     | count * 32  | raw 32-bit scalars       |

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bvh::{FlatBvh, Scalar, SCALARS_PER_RECORD};
use crate::util::{Error, Result};

/// Magic bytes at the start of every container.
pub const MAGIC: &[u8; 4] = b"BVHF";

/// Current container version.
pub const VERSION: u32 = 1;

/// Bytes before the scalar payload.
pub const HEADER_SIZE: usize = 16;

/// Payload bytes per record.
const RECORD_BYTES: usize = SCALARS_PER_RECORD * 4;

/// Write `flat` to `w`.
pub fn write_flat<W: Write>(mut w: W, flat: &FlatBvh) -> Result<()> {
    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(VERSION)?;
    w.write_u32::<LittleEndian>(flat.max_depth())?;
    w.write_u32::<LittleEndian>(flat.count())?;
    for s in flat.scalars() {
        w.write_u32::<LittleEndian>(s.bits())?;
    }
    w.flush()?;
    Ok(())
}

/// Read a container written by [`write_flat`].
pub fn read_flat<R: Read>(mut r: R) -> Result<FlatBvh> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::InvalidMagic);
    }

    let version = r.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let max_depth = r.read_u32::<LittleEndian>()?;
    let count = r.read_u32::<LittleEndian>()? as usize;
    if count == 0 {
        return Err(Error::malformed("container holds no records"));
    }

    // Never allocate from the declared count.
    let expected = count as u64 * RECORD_BYTES as u64;
    let mut payload = Vec::new();
    r.by_ref().take(expected).read_to_end(&mut payload)?;
    if (payload.len() as u64) < expected {
        return Err(Error::malformed(format!(
            "header declares {} records ({} bytes) but only {} bytes follow",
            count,
            expected,
            payload.len()
        )));
    }
    let buffer = payload
        .chunks_exact(4)
        .map(|b| Scalar::from_bits(LittleEndian::read_u32(b)))
        .collect();

    FlatBvh::from_parts(buffer, max_depth)
}

/// Write the zero-padded texture payload of `flat` as raw little-endian
/// scalars, ready for a `columns x rows` RGBA32 upload.
pub fn write_texture_data<W: Write>(mut w: W, flat: &FlatBvh) -> Result<()> {
    for s in flat.padded_texture_data() {
        w.write_u32::<LittleEndian>(s.bits())?;
    }
    w.flush()?;
    Ok(())
}

/// Write `flat` to a file at `path`.
pub fn save_flat(path: impl AsRef<Path>, flat: &FlatBvh) -> Result<()> {
    let file = File::create(path)?;
    write_flat(BufWriter::new(file), flat)
}

/// Write the padded texture payload of `flat` to a file at `path`.
pub fn save_texture_data(path: impl AsRef<Path>, flat: &FlatBvh) -> Result<()> {
    let file = File::create(path)?;
    write_texture_data(BufWriter::new(file), flat)
}

/// Read a container from the file at `path`.
pub fn load_flat(path: impl AsRef<Path>) -> Result<FlatBvh> {
    let file = File::open(path)?;
    read_flat(BufReader::new(file))
}
