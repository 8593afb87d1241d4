use std::io::Read;

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::error::{Result, SquashfsError};
use super::metadata::InodeRef;

pub const MAGIC: u32 = 0x73717368;

pub(crate) const SUPERBLOCK_SIZE: usize = 96;

/// Offset value marking a table that is not present in the image.
pub(crate) const NO_TABLE: u64 = u64::MAX;

const MIN_BLOCK_SIZE: u32 = 4096;
const MAX_BLOCK_SIZE: u32 = 1024 * 1024;

#[derive(Debug)]
pub struct Superblock {
    pub magic: u32,
    pub inode_count: u32,
    pub mod_time: u32,
    pub block_size: u32,
    pub frag_count: u32,
    pub compressor: Compressor,
    pub block_log: u16,
    pub flags: SuperblockFlags,
    pub id_count: u16,
    pub version_major: u16,
    pub version_minor: u16,
    pub root_inode: InodeRef,
    pub bytes_used: u64,
    pub id_table: u64,
    pub xattr_table: u64,
    pub inode_table: u64,
    pub dir_table: u64,
    pub frag_table: u64,
    pub export_table: u64,
}

bitflags! {
    pub struct SuperblockFlags: u16 {
        const INODES_UNCOMPRESSED = 0x0001;
        const DATABLOCKS_UNCOMPRESSED = 0x0002;
        const FRAGMENTS_UNCOMPRESSED = 0x0008;
        const FRAGMENTS_NOT_USED = 0x0010;
        const FRAGMENTS_ALWAYS_GENERATED = 0x0020;
        const DATA_DEDUPLICATED = 0x0040;
        const NFS_EXPORT_EXISTS = 0x0080;
        const XATTRS_UNCOMPRESSED = 0x0100;
        const NO_XATTRS = 0x0200;
        const COMPRESSOR_OPTIONS_PRESENT = 0x0400;
        const ID_TABLE_UNCOMPRESSED = 0x0800;
    }
}

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compressor {
    None = 0,
    Gzip = 1,
    Lzma = 2,
    Lzo = 3,
    Xz = 4,
    Lz4 = 5,
    Zstd = 6,
    #[num_enum(default)]
    Unknown = 0xFFFF,
}

impl Superblock {
    /// Parse and sanity-check the superblock.
    pub fn read<R>(r: &mut R) -> Result<Superblock>
    where
        R: Read,
    {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(SquashfsError::BadFormat);
        }
        let inode_count = r.read_u32::<LittleEndian>()?;
        let mod_time = r.read_u32::<LittleEndian>()?;
        let block_size = r.read_u32::<LittleEndian>()?;
        let frag_count = r.read_u32::<LittleEndian>()?;
        let compressor = Compressor::try_from(r.read_u16::<LittleEndian>()?)
            .unwrap_or(Compressor::Unknown);
        let block_log = r.read_u16::<LittleEndian>()?;
        let flags = SuperblockFlags::from_bits(r.read_u16::<LittleEndian>()?)
            .ok_or(SquashfsError::UnsupportedFeature)?;
        let id_count = r.read_u16::<LittleEndian>()?;
        let version_major = r.read_u16::<LittleEndian>()?;
        let version_minor = r.read_u16::<LittleEndian>()?;

        let sb = Superblock {
            magic,
            inode_count,
            mod_time,
            block_size,
            frag_count,
            compressor,
            block_log,
            flags,
            id_count,
            version_major,
            version_minor,
            root_inode: InodeRef::read(r)?,
            bytes_used: r.read_u64::<LittleEndian>()?,
            id_table: r.read_u64::<LittleEndian>()?,
            xattr_table: r.read_u64::<LittleEndian>()?,
            inode_table: r.read_u64::<LittleEndian>()?,
            dir_table: r.read_u64::<LittleEndian>()?,
            frag_table: r.read_u64::<LittleEndian>()?,
            export_table: r.read_u64::<LittleEndian>()?,
        };
        sb.validate()?;
        Ok(sb)
    }

    pub fn from_bytes(b: &[u8]) -> Result<Superblock> {
        Superblock::read(&mut &b[..])
    }

    fn validate(&self) -> Result<()> {
        if self.version_major != 4 || self.version_minor > 0 {
            return Err(SquashfsError::BadVersion {
                major: self.version_major,
                minor: self.version_minor,
            });
        }
        if !self.block_size.is_power_of_two()
            || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size)
            || 1u32.checked_shl(self.block_log.into()) != Some(self.block_size)
        {
            return Err(SquashfsError::BadFormat);
        }

        // Tables appear in a fixed order, each within the image.
        let tables = [
            self.inode_table,
            self.dir_table,
            self.frag_table,
            self.export_table,
            self.id_table,
            self.xattr_table,
        ];
        let mut prev = SUPERBLOCK_SIZE as u64;
        for offset in tables {
            if offset == NO_TABLE {
                continue;
            }
            if offset < prev || offset > self.bytes_used {
                return Err(SquashfsError::BadFormat);
            }
            prev = offset;
        }
        Ok(())
    }
}
