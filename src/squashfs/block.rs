use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::compress;
use super::error::{Result, SquashfsError};
use super::input::{self, Input};
use super::superblock::Compressor;

/// Metadata blocks are at most 8 KiB uncompressed, fixed by the format.
pub(crate) const METADATA_BLOCK_SIZE: usize = 8192;

const METADATA_COMPRESSED_BIT: u16 = 1 << 15;
const DATA_COMPRESSED_BIT: u32 = 1 << 24;

/// One decompressed block plus the number of bytes it consumed on disk,
/// used to walk forward to the next block.
#[derive(Debug)]
pub(crate) struct Block {
    pub data: Vec<u8>,
    pub raw_size: u64,
}

impl Block {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Decode a 16-bit metadata block header into (compressed, on-disk size).
/// A zero size field with the flag set means 0x8000 bytes, stored as is.
pub(crate) fn md_header(hdr: u16) -> (bool, usize) {
    let compressed = hdr & METADATA_COMPRESSED_BIT == 0;
    let mut size = (hdr & !METADATA_COMPRESSED_BIT) as usize;
    if size == 0 {
        size = METADATA_COMPRESSED_BIT as usize;
    }
    (compressed, size)
}

/// Decode a 32-bit data block header into (compressed, on-disk size).
/// A zero size denotes a hole.
pub(crate) fn data_header(hdr: u32) -> (bool, u32) {
    (hdr & DATA_COMPRESSED_BIT == 0, hdr & !DATA_COMPRESSED_BIT)
}

/// Read `size` raw bytes at `pos` and decompress them if flagged, bounding
/// the output by `limit`.
fn read_block<I: Input>(
    input: &I,
    comp: Compressor,
    pos: u64,
    compressed: bool,
    size: usize,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    raw.try_reserve_exact(size)
        .map_err(|_| SquashfsError::OutOfMemory)?;
    raw.resize(size, 0);
    input::read_exact_at(input, pos, &mut raw)?;

    if compressed {
        compress::decompress(comp, &raw, limit)
    } else if size > limit {
        Err(SquashfsError::Corrupt)
    } else {
        Ok(raw)
    }
}

/// Read the metadata block starting at `pos` (2-byte header included).
pub(crate) fn read_md_block<I: Input>(input: &I, comp: Compressor, pos: u64) -> Result<Block> {
    let mut hdr = [0u8; 2];
    input::read_exact_at(input, pos, &mut hdr)?;
    let (compressed, size) = md_header(LittleEndian::read_u16(&hdr));
    trace!(pos, compressed, size, "metadata block read");

    let data = read_block(input, comp, pos + 2, compressed, size, METADATA_BLOCK_SIZE)?;
    Ok(Block {
        data,
        raw_size: 2 + size as u64,
    })
}

/// Read the data or fragment block at `pos` described by the 32-bit header
/// `hdr`. Holes come back as empty blocks; callers keep them away from the
/// caches.
pub(crate) fn read_data_block<I: Input>(
    input: &I,
    comp: Compressor,
    pos: u64,
    hdr: u32,
    block_size: usize,
) -> Result<Block> {
    let (compressed, size) = data_header(hdr);
    if size == 0 {
        return Ok(Block {
            data: Vec::new(),
            raw_size: 0,
        });
    }
    if size as usize > block_size {
        return Err(SquashfsError::Corrupt);
    }
    trace!(pos, compressed, size, "data block read");

    let data = read_block(input, comp, pos, compressed, size as usize, block_size)?;
    Ok(Block {
        data,
        raw_size: size as u64,
    })
}
