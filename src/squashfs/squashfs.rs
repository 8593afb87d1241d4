use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use super::block::Block;
use super::cache::Cache;
use super::compress;
use super::error::{Result, SquashfsError};
use super::file::BlockIdx;
use super::inode::Inode;
use super::input::{self, Input};
use super::metadata::InodeRef;
use super::superblock::{Superblock, SuperblockFlags, NO_TABLE, SUPERBLOCK_SIZE};
use super::table::Table;
use super::xattr::XattrIdTable;

// Cache geometry: initial slots per cache, growing up to the capacity when
// many threads pin blocks at once. Metadata blocks are small and hot; data
// and fragment blocks are large; block indexes are keyed by inode number.
const MD_CACHE_SLOTS: (usize, usize) = (8, 64);
const DATA_CACHE_SLOTS: (usize, usize) = (4, 16);
const FRAG_CACHE_SLOTS: (usize, usize) = (3, 16);
const BLOCKIDX_CACHE_SLOTS: (usize, usize) = (8, 32);

/// The top-level interface to a SquashFS image. One handle owns the parsed
/// superblock, the lookup tables, and the shared block caches; all
/// operations take `&self` and may run concurrently from many threads.
pub struct SquashFS<I> {
    pub(crate) input: I,
    pub(crate) sb: Superblock,
    pub(crate) md_cache: Cache<Block>,
    pub(crate) data_cache: Cache<Block>,
    pub(crate) frag_cache: Cache<Block>,
    pub(crate) blockidx_cache: Cache<BlockIdx>,
    id_table: Table,
    frag_table: Option<Table>,
    export_table: Option<Table>,
    pub(crate) xattr_table: Option<XattrIdTable>,
}

/// Occupancy counters for one cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheUsage {
    /// Slots currently allocated.
    pub entries: usize,
    /// Slots pinned by outstanding handles.
    pub in_use: usize,
}

/// Occupancy of all caches owned by a filesystem handle.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub metadata: CacheUsage,
    pub data: CacheUsage,
    pub fragment: CacheUsage,
    pub block_index: CacheUsage,
}

/// On-disk fragment table entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FragmentEntry {
    pub start: u64,
    /// Raw size field, compression bit included.
    pub size: u32,
}

impl SquashFS<File> {
    /// Open the SquashFS image at a filesystem path.
    pub fn open<P>(path: P) -> Result<SquashFS<File>>
    where
        P: AsRef<Path>,
    {
        SquashFS::new(File::open(path)?)
    }
}

impl<I: Input> SquashFS<I> {
    /// Create a filesystem handle over any positional byte source.
    pub fn new(input: I) -> Result<Self> {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        input::read_exact_at(&input, 0, &mut raw)?;
        let sb = Superblock::from_bytes(&raw)?;
        if !compress::supported(sb.compressor) {
            return Err(SquashfsError::UnsupportedCompression(sb.compressor));
        }
        debug!(
            inodes = sb.inode_count,
            block_size = sb.block_size,
            compressor = ?sb.compressor,
            "opening squashfs image"
        );

        let id_table = Table::read(&input, sb.id_table, 4, sb.id_count as usize)?;
        let frag_table = if sb.frag_count > 0 && sb.frag_table != NO_TABLE {
            Some(Table::read(&input, sb.frag_table, 16, sb.frag_count as usize)?)
        } else {
            None
        };
        let export_table = if sb.flags.contains(SuperblockFlags::NFS_EXPORT_EXISTS)
            && sb.export_table != NO_TABLE
        {
            Some(Table::read(&input, sb.export_table, 8, sb.inode_count as usize)?)
        } else {
            None
        };
        let xattr_table = if sb.xattr_table != NO_TABLE {
            Some(XattrIdTable::read(&input, sb.xattr_table)?)
        } else {
            None
        };

        Ok(SquashFS {
            input,
            sb,
            md_cache: Cache::new(MD_CACHE_SLOTS.0, MD_CACHE_SLOTS.1),
            data_cache: Cache::new(DATA_CACHE_SLOTS.0, DATA_CACHE_SLOTS.1),
            frag_cache: Cache::new(FRAG_CACHE_SLOTS.0, FRAG_CACHE_SLOTS.1),
            blockidx_cache: Cache::new(BLOCKIDX_CACHE_SLOTS.0, BLOCKIDX_CACHE_SLOTS.1),
            id_table,
            frag_table,
            export_table,
            xattr_table,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// Block size of the image's data blocks.
    pub fn block_size(&self) -> u32 {
        self.sb.block_size
    }

    /// The root directory inode.
    pub fn root_inode(&self) -> Result<Inode> {
        self.inode(self.sb.root_inode)
    }

    /// Resolve an id-table index into a 32-bit uid/gid value.
    pub fn id(&self, index: u16) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.id_table.get(self, index as usize, &mut raw)?;
        Ok(LittleEndian::read_u32(&raw))
    }

    pub fn uid(&self, inode: &Inode) -> Result<u32> {
        self.id(inode.uid_index())
    }

    pub fn gid(&self, inode: &Inode) -> Result<u32> {
        self.id(inode.gid_index())
    }

    /// Map an inode number back to its inode through the export table.
    /// Images without an export table do not support this operation.
    pub fn inode_by_number(&self, inode_number: u32) -> Result<Inode> {
        let Some(table) = &self.export_table else {
            return Err(SquashfsError::UnsupportedFeature);
        };
        if inode_number == 0 {
            return Err(SquashfsError::NotFound);
        }
        let mut raw = [0u8; 8];
        table.get(self, inode_number as usize - 1, &mut raw)?;
        self.inode(InodeRef::from_raw(LittleEndian::read_u64(&raw)))
    }

    /// Look up a path from the root without following symlinks, so a
    /// trailing symlink component yields the link inode itself.
    pub fn lookup_path(&self, path: &str) -> Result<Inode> {
        let mut inode = self.root_inode()?;
        for name in path.split('/').filter(|c| !c.is_empty()) {
            let entry = self
                .lookup(&inode, name.as_bytes())?
                .ok_or(SquashfsError::NotFound)?;
            inode = self.inode(entry.inode_ref())?;
        }
        Ok(inode)
    }

    pub(crate) fn fragment_entry(&self, index: u32) -> Result<FragmentEntry> {
        let Some(table) = &self.frag_table else {
            return Err(SquashfsError::Corrupt);
        };
        let mut raw = [0u8; 16];
        table.get(self, index as usize, &mut raw)?;
        Ok(FragmentEntry {
            start: LittleEndian::read_u64(&raw[0..8]),
            size: LittleEndian::read_u32(&raw[8..12]),
        })
    }

    /// Current cache occupancy, mostly useful for diagnostics.
    pub fn cache_stats(&self) -> CacheStats {
        let usage = |c: &Cache<Block>| CacheUsage {
            entries: c.allocated(),
            in_use: c.in_use(),
        };
        CacheStats {
            metadata: usage(&self.md_cache),
            data: usage(&self.data_cache),
            fragment: usage(&self.frag_cache),
            block_index: CacheUsage {
                entries: self.blockidx_cache.allocated(),
                in_use: self.blockidx_cache.in_use(),
            },
        }
    }
}
