use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use super::block::{self, METADATA_BLOCK_SIZE};
use super::error::{Result, SquashfsError};
use super::inode::{FileInfo, Inode, InodeInfo, NO_FRAGMENT};
use super::input::Input;
use super::metadata::MdCursor;
use super::squashfs::SquashFS;

/// One 32-bit header per data block in the metadata stream.
const BLOCKLIST_ENTRY_SIZE: usize = 4;

/// Number of data blocks a regular file occupies; the tail lives in a
/// fragment when one is present.
pub(crate) fn blocklist_count(block_size: u32, info: &FileInfo) -> u64 {
    let block_size = u64::from(block_size);
    if info.frag_index == NO_FRAGMENT {
        info.file_size.div_ceil(block_size)
    } else {
        info.file_size / block_size
    }
}

/// Iterator over a file's blocklist: one step per data block, yielding its
/// on-disk position and size while tracking the logical file offset.
pub(crate) struct BlockList<'a, I: Input> {
    fs: &'a SquashFS<I>,
    pub remain: u64,
    cur: MdCursor,
    started: bool,
    /// Logical file offset of the current block.
    pub pos: u64,
    /// On-disk position of the current block.
    pub block: u64,
    /// Raw 32-bit header of the current block.
    pub header: u32,
    /// On-disk size of the current block; zero marks a hole.
    pub input_size: u32,
}

impl<'a, I: Input> BlockList<'a, I> {
    pub fn new(fs: &'a SquashFS<I>, inode: &Inode, info: &FileInfo) -> Self {
        BlockList {
            fs,
            remain: blocklist_count(fs.sb.block_size, info),
            cur: inode.next,
            started: false,
            pos: 0,
            block: info.start_block,
            header: 0,
            input_size: 0,
        }
    }

    /// Step to the next block; false once the blocklist is exhausted.
    pub fn next(&mut self) -> Result<bool> {
        if self.remain == 0 {
            return Ok(false);
        }
        self.remain -= 1;

        let mut raw = [0u8; BLOCKLIST_ENTRY_SIZE];
        self.fs.md_read(&mut self.cur, &mut raw)?;
        self.header = LittleEndian::read_u32(&raw);

        self.block = self
            .block
            .checked_add(self.input_size.into())
            .ok_or(SquashfsError::Corrupt)?;
        let (_, input_size) = block::data_header(self.header);
        self.input_size = input_size;

        if self.started {
            self.pos += u64::from(self.fs.sb.block_size);
        }
        self.started = true;
        Ok(true)
    }
}

/// Per-inode index over the blocklist. Reading block N of an M-block file
/// means walking N blocksizes of metadata; for large files one entry per
/// metadata block of blocklist lets the walk start at the right block.
#[derive(Debug)]
pub(crate) struct BlockIdx {
    entries: Vec<BlockIdxEntry>,
}

#[derive(Debug)]
struct BlockIdxEntry {
    /// Data block position where the file continues at this boundary.
    data_block: u64,
    /// Metadata block (relative to the inode table) whose blocksizes
    /// continue from `data_block`.
    md_block: u32,
}

impl<I: Input> SquashFS<I> {
    /// A file is worth indexing once its blocklist fills at least one
    /// whole metadata block.
    fn blockidx_indexable(&self, info: &FileInfo) -> bool {
        let md_size = blocklist_count(self.sb.block_size, info) * BLOCKLIST_ENTRY_SIZE as u64;
        md_size >= METADATA_BLOCK_SIZE as u64
    }

    /// Walk the whole blocklist once, recording each metadata-block
    /// boundary. The first metadata block is skipped: its location is
    /// already known from the inode.
    fn blockidx_build(&self, inode: &Inode, info: &FileInfo) -> Result<BlockIdx> {
        let blocks = blocklist_count(self.sb.block_size, info);
        let md_size = blocks * BLOCKLIST_ENTRY_SIZE as u64;
        let count = (inode.next.offset as u64 + md_size - 1) / METADATA_BLOCK_SIZE as u64;
        trace!(inode = inode.inode_number(), count, "building block index");

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count as usize)
            .map_err(|_| SquashfsError::OutOfMemory)?;

        let mut bl = BlockList::new(self, inode, info);
        let mut first = true;
        while bl.remain > 0 && entries.len() < count as usize {
            if bl.cur.offset < BLOCKLIST_ENTRY_SIZE && !first {
                entries.push(BlockIdxEntry {
                    data_block: bl.block + u64::from(bl.input_size),
                    md_block: (bl.cur.block - self.sb.inode_table) as u32,
                });
            }
            first = false;
            bl.next()?;
        }
        Ok(BlockIdx { entries })
    }

    /// A blocklist iterator positioned at the block containing `start`,
    /// skipping intervening blocklist metadata via the cached per-inode
    /// index whenever the file is big enough to have one.
    fn blocklist_seek(&self, inode: &Inode, info: &FileInfo, start: u64) -> Result<BlockList<'_, I>> {
        let mut bl = BlockList::new(self, inode, info);
        let block_size = u64::from(self.sb.block_size);
        let block = start / block_size;
        if block >= bl.remain {
            // Inside the fragment; no blocks to walk at all.
            bl.remain = 0;
            return Ok(bl);
        }

        let metablock =
            (bl.cur.offset as u64 + block * BLOCKLIST_ENTRY_SIZE as u64) / METADATA_BLOCK_SIZE as u64;
        if metablock == 0 || !self.blockidx_indexable(info) {
            return Ok(bl);
        }

        let (md_block, data_block) = {
            let idx = self
                .blockidx_cache
                .get(u64::from(inode.inode_number()), || {
                    self.blockidx_build(inode, info)
                })?;
            let entry = idx
                .entries
                .get(metablock as usize - 1)
                .ok_or(SquashfsError::Corrupt)?;
            (entry.md_block, entry.data_block)
        };

        let entries_per_md = (METADATA_BLOCK_SIZE / BLOCKLIST_ENTRY_SIZE) as u64;
        let skipped = metablock * entries_per_md - bl.cur.offset as u64 / BLOCKLIST_ENTRY_SIZE as u64;

        bl.cur.block = u64::from(md_block) + self.sb.inode_table;
        bl.cur.offset %= BLOCKLIST_ENTRY_SIZE;
        bl.remain = bl.remain.checked_sub(skipped).ok_or(SquashfsError::Corrupt)?;
        bl.pos = skipped * block_size;
        bl.block = data_block;
        Ok(bl)
    }

    /// Read up to `buf.len()` bytes of file content starting at byte
    /// `start`, returning the number of bytes produced. Reads past the end
    /// of the file are shortened; a start at or past the end reads zero
    /// bytes. Holes yield zeros without touching the data cache.
    pub fn read_range(&self, inode: &Inode, start: u64, buf: &mut [u8]) -> Result<usize> {
        let InodeInfo::File(info) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        let file_size = info.file_size;
        let block_size = u64::from(self.sb.block_size);
        if start >= file_size {
            return Ok(0);
        }

        let mut bl = self.blocklist_seek(inode, info, start)?;
        let mut read_off = (start % block_size) as usize;
        let mut remaining = buf.len().min((file_size - start) as usize);
        let mut out = 0;

        while remaining > 0 {
            if bl.remain == 0 {
                // All full blocks consumed; the tail, if any, lives in a
                // shared fragment block.
                if info.frag_index == NO_FRAGMENT {
                    break;
                }
                let frag = self.fragment_entry(info.frag_index)?;
                let handle = self.frag_cache.get(frag.start, || {
                    block::read_data_block(
                        &self.input,
                        self.sb.compressor,
                        frag.start,
                        frag.size,
                        self.sb.block_size as usize,
                    )
                })?;
                let data_off = info.frag_offset as usize;
                let data_size = (file_size % block_size) as usize;
                if data_off + data_size > handle.size() {
                    return Err(SquashfsError::Corrupt);
                }
                let avail = data_size
                    .checked_sub(read_off)
                    .ok_or(SquashfsError::Corrupt)?;
                let take = remaining.min(avail);
                buf[out..out + take].copy_from_slice(
                    &handle.data[data_off + read_off..data_off + read_off + take],
                );
                out += take;
                break;
            }

            bl.next()?;
            if bl.pos + block_size <= start {
                continue;
            }

            let take;
            if bl.input_size == 0 {
                // Hole: zeros, served without any disk read.
                let data_size = block_size.min(file_size - bl.pos) as usize;
                let avail = data_size
                    .checked_sub(read_off)
                    .ok_or(SquashfsError::Corrupt)?;
                take = remaining.min(avail);
                buf[out..out + take].fill(0);
            } else {
                let handle = self.data_cache.get(bl.block, || {
                    block::read_data_block(
                        &self.input,
                        self.sb.compressor,
                        bl.block,
                        bl.header,
                        self.sb.block_size as usize,
                    )
                })?;
                let avail = handle
                    .size()
                    .checked_sub(read_off)
                    .ok_or(SquashfsError::Corrupt)?;
                take = remaining.min(avail);
                buf[out..out + take].copy_from_slice(&handle.data[read_off..read_off + take]);
            }
            out += take;
            remaining -= take;
            read_off = 0;
        }

        Ok(out)
    }

    /// Read a whole file into memory.
    pub fn read_file(&self, inode: &Inode) -> Result<Vec<u8>> {
        let InodeInfo::File(info) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        let size = usize::try_from(info.file_size).map_err(|_| SquashfsError::OutOfMemory)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| SquashfsError::OutOfMemory)?;
        buf.resize(size, 0);
        let n = self.read_range(inode, 0, &mut buf)?;
        if n != size {
            return Err(SquashfsError::Corrupt);
        }
        Ok(buf)
    }

    /// A positioned `io::Read + io::Seek` view of a regular file.
    pub fn open_file(&self, inode: &Inode) -> Result<FileReader<'_, I>> {
        let InodeInfo::File(info) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        Ok(FileReader {
            fs: self,
            size: info.file_size,
            inode: inode.clone(),
            pos: 0,
        })
    }
}

/// Streaming reader over a regular file's contents.
pub struct FileReader<'a, I: Input> {
    fs: &'a SquashFS<I>,
    inode: Inode,
    size: u64,
    pos: u64,
}

impl<I: Input> Read for FileReader<'_, I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.fs.read_range(&self.inode, self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<I: Input> Seek for FileReader<'_, I> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => self.size.checked_add_signed(n),
            SeekFrom::Current(n) => self.pos.checked_add_signed(n),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            )),
        }
    }
}
