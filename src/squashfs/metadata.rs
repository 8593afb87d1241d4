use std::io::Read;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use super::block::{self, Block};
use super::cache::CacheHandle;
use super::error::{Result, SquashfsError};
use super::input::{self, Input};
use super::squashfs::SquashFS;

/// Position within the logical byte stream formed by the concatenation of
/// decompressed metadata blocks: the image offset of a metadata block plus
/// a byte offset into its decompressed contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MdCursor {
    pub block: u64,
    pub offset: usize,
}

/// An opaque 48-bit reference identifying an inode: the offset of its
/// metadata block relative to the inode table, shifted left 16, plus the
/// byte offset within the decompressed block. Stable for the lifetime of
/// the image; [`SquashFS::inode`] turns it back into an [`Inode`].
///
/// [`SquashFS::inode`]: super::SquashFS::inode
/// [`Inode`]: super::Inode
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeRef {
    val: u64,
}

impl InodeRef {
    pub(crate) fn new(location: u64, offset: u16) -> Self {
        Self {
            val: (location << 16) | u64::from(offset),
        }
    }

    pub(crate) fn from_raw(val: u64) -> Self {
        Self { val }
    }

    pub(crate) fn location(&self) -> u64 {
        self.val >> 16
    }

    pub(crate) fn offset(&self) -> u16 {
        (self.val & 0xFFFF) as u16
    }

    /// The cursor for this reference within the table starting at `base`.
    pub(crate) fn cursor(&self, base: u64) -> MdCursor {
        MdCursor {
            block: base + self.location(),
            offset: self.offset() as usize,
        }
    }

    pub(crate) fn read<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(Self {
            val: r.read_u64::<LittleEndian>()?,
        })
    }
}

impl std::fmt::Debug for InodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.location(), self.offset())
    }
}

impl<I: Input> SquashFS<I> {
    /// The cached decompressed metadata block starting at image offset
    /// `pos`. On a miss the block is read and decompressed by exactly one
    /// caller; concurrent requests share the result.
    pub(crate) fn md_block(&self, pos: u64) -> Result<CacheHandle<'_, Block>> {
        self.md_cache
            .get(pos, || block::read_md_block(&self.input, self.sb.compressor, pos))
    }

    /// Read `buf.len()` logical bytes at `cur`, advancing the cursor across
    /// block boundaries as needed.
    pub(crate) fn md_read(&self, cur: &mut MdCursor, buf: &mut [u8]) -> Result<()> {
        self.md_consume(cur, buf.len(), Some(buf))
    }

    /// Advance the cursor by `size` logical bytes without copying.
    pub(crate) fn md_skip(&self, cur: &mut MdCursor, size: usize) -> Result<()> {
        self.md_consume(cur, size, None)
    }

    fn md_consume(&self, cur: &mut MdCursor, mut size: usize, mut buf: Option<&mut [u8]>) -> Result<()> {
        let mut copied = 0;
        while size > 0 {
            let blk = self.md_block(cur.block)?;
            if cur.offset > blk.size() {
                return Err(SquashfsError::Corrupt);
            }
            let take = size.min(blk.size() - cur.offset);
            if let Some(out) = buf.as_deref_mut() {
                out[copied..copied + take]
                    .copy_from_slice(&blk.data[cur.offset..cur.offset + take]);
            }
            copied += take;
            size -= take;
            if size > 0 {
                // `raw_size` includes the 2-byte header, landing the cursor
                // on the next metadata block.
                cur.block += blk.raw_size;
                cur.offset = 0;
            } else {
                cur.offset += take;
            }
        }
        Ok(())
    }

    /// Advance `pos` past one whole metadata block by reading only its
    /// 2-byte header.
    #[allow(dead_code)]
    pub(crate) fn md_skip_block(&self, pos: &mut u64) -> Result<()> {
        let mut hdr = [0u8; 2];
        input::read_exact_at(&self.input, *pos, &mut hdr)?;
        let (_, size) = block::md_header(LittleEndian::read_u16(&hdr));
        *pos += 2 + size as u64;
        Ok(())
    }
}
