use byteorder::{ByteOrder, LittleEndian};

use super::block::METADATA_BLOCK_SIZE;
use super::error::{Result, SquashfsError};
use super::input::{self, Input};
use super::squashfs::SquashFS;

/// A lookup table of fixed-size entries packed into metadata blocks, with a
/// raw list of 64-bit block locations in front of it. The location list is
/// read eagerly; the blocks themselves go through the metadata cache on
/// demand.
#[derive(Debug)]
pub(crate) struct Table {
    blocks: Vec<u64>,
    each: usize,
    count: usize,
}

impl Table {
    /// Read the block location list for a table of `count` entries of
    /// `each` bytes, whose pointer list starts at `start`.
    pub fn read<I: Input>(input: &I, start: u64, each: usize, count: usize) -> Result<Table> {
        let nblocks = (each * count).div_ceil(METADATA_BLOCK_SIZE);
        let mut raw = vec![0u8; nblocks * 8];
        input::read_exact_at(input, start, &mut raw)?;
        let blocks = raw.chunks_exact(8).map(LittleEndian::read_u64).collect();
        Ok(Table {
            blocks,
            each,
            count,
        })
    }

    /// Copy entry `idx` into `buf`, which must be exactly `each` bytes.
    pub fn get<I: Input>(&self, fs: &SquashFS<I>, idx: usize, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.each);
        if idx >= self.count {
            return Err(SquashfsError::Corrupt);
        }
        let pos = idx * self.each;
        let (bnum, off) = (pos / METADATA_BLOCK_SIZE, pos % METADATA_BLOCK_SIZE);

        let bpos = *self.blocks.get(bnum).ok_or(SquashfsError::Corrupt)?;
        let blk = fs.md_block(bpos)?;
        let end = off + self.each;
        if end > blk.size() {
            return Err(SquashfsError::Corrupt);
        }
        buf.copy_from_slice(&blk.data[off..end]);
        Ok(())
    }
}
