use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::error::{Result, SquashfsError};
use super::input::Input;
use super::metadata::{InodeRef, MdCursor};
use super::squashfs::SquashFS;

/// Fragment index marking a file without a tail-end fragment.
pub(crate) const NO_FRAGMENT: u32 = 0xFFFF_FFFF;

/// Xattr index marking an inode without extended attributes.
pub(crate) const NO_XATTR: u32 = 0xFFFF_FFFF;

/// Symlink targets are path-sized; anything beyond this is corrupt.
const MAX_SYMLINK_TARGET: u32 = 65535;

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InodeType {
    BasicDir = 1,
    BasicFile = 2,
    BasicSymlink = 3,
    BasicBlockDev = 4,
    BasicCharDev = 5,
    BasicFifo = 6,
    BasicSocket = 7,
    ExtDir = 8,
    ExtFile = 9,
    ExtSymlink = 10,
    ExtBlockDev = 11,
    ExtCharDev = 12,
    ExtFifo = 13,
    ExtSocket = 14,
}

impl InodeType {
    pub fn is_dir(&self) -> bool {
        matches!(self, InodeType::BasicDir | InodeType::ExtDir)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, InodeType::BasicFile | InodeType::ExtFile)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, InodeType::BasicSymlink | InodeType::ExtSymlink)
    }

    /// The file-type bits this inode contributes to a mode value.
    fn mode_bits(&self) -> u16 {
        match self {
            InodeType::BasicFifo | InodeType::ExtFifo => 0o10000,
            InodeType::BasicCharDev | InodeType::ExtCharDev => 0o20000,
            InodeType::BasicDir | InodeType::ExtDir => 0o40000,
            InodeType::BasicBlockDev | InodeType::ExtBlockDev => 0o60000,
            InodeType::BasicFile | InodeType::ExtFile => 0o100000,
            InodeType::BasicSymlink | InodeType::ExtSymlink => 0o120000,
            InodeType::BasicSocket | InodeType::ExtSocket => 0o140000,
        }
    }
}

/// A decoded inode. The record is immutable value data; concurrent
/// operations on the same inode are safe.
#[derive(Debug, Clone)]
pub struct Inode {
    inode_type: InodeType,
    permissions: u16,
    uid_index: u16,
    gid_index: u16,
    mtime: u32,
    inode_number: u32,
    nlink: u32,
    pub(crate) xattr_index: u32,
    /// Cursor just past the type-specific head: blocklist for files,
    /// lookup index for directories, target bytes for symlinks.
    pub(crate) next: MdCursor,
    pub info: InodeInfo,
}

/// Type-specific payload of an inode.
#[derive(Debug, Clone)]
pub enum InodeInfo {
    File(FileInfo),
    Dir(DirInfo),
    Symlink(SymlinkInfo),
    Device(DeviceInfo),
    Ipc,
}

/// Regular file payload, unified across the basic and extended variants.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub(crate) start_block: u64,
    pub file_size: u64,
    pub(crate) frag_index: u32,
    pub(crate) frag_offset: u32,
}

impl FileInfo {
    pub fn has_fragment(&self) -> bool {
        self.frag_index != NO_FRAGMENT
    }
}

/// Directory payload, unified across the basic and extended variants.
#[derive(Debug, Clone)]
pub struct DirInfo {
    pub(crate) start_block: u32,
    pub(crate) offset: u16,
    /// Listing size plus the 3 phantom bytes accounting for "." and "..".
    pub(crate) size: u32,
    pub parent_inode: u32,
    pub(crate) index_count: u16,
}

#[derive(Debug, Clone)]
pub struct SymlinkInfo {
    pub target_size: u32,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub rdev: u32,
}

impl DeviceInfo {
    // rdev packs a 12-bit major around a split 20-bit minor.
    pub fn major(&self) -> u32 {
        (self.rdev >> 8) & 0xFFF
    }

    pub fn minor(&self) -> u32 {
        (self.rdev & 0xFF) | ((self.rdev >> 12) & 0xFFF00)
    }
}

impl Inode {
    pub fn inode_type(&self) -> InodeType {
        self.inode_type
    }

    pub fn is_dir(&self) -> bool {
        self.inode_type.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.inode_type.is_file()
    }

    pub fn is_symlink(&self) -> bool {
        self.inode_type.is_symlink()
    }

    pub fn permissions(&self) -> u16 {
        self.permissions
    }

    /// Permissions plus the type bits, in the traditional mode layout.
    pub fn mode(&self) -> u16 {
        self.permissions | self.inode_type.mode_bits()
    }

    pub fn inode_number(&self) -> u32 {
        self.inode_number
    }

    pub fn mtime(&self) -> u32 {
        self.mtime
    }

    pub fn nlink(&self) -> u32 {
        self.nlink
    }

    pub fn uid_index(&self) -> u16 {
        self.uid_index
    }

    pub fn gid_index(&self) -> u16 {
        self.gid_index
    }

    /// Size of the file for regular files, of the listing for directories.
    pub fn file_size(&self) -> Option<u64> {
        match &self.info {
            InodeInfo::File(f) => Some(f.file_size),
            InodeInfo::Dir(d) => Some(d.size.into()),
            _ => None,
        }
    }

    pub fn has_xattrs(&self) -> bool {
        self.xattr_index != NO_XATTR
    }
}

impl<I: Input> SquashFS<I> {
    /// Decode the inode behind a 48-bit reference.
    pub fn inode(&self, iref: InodeRef) -> Result<Inode> {
        let mut cur = iref.cursor(self.sb.inode_table);

        // 16-byte head common to every variant.
        let mut head = [0u8; 16];
        self.md_read(&mut cur, &mut head)?;
        let mut r = &head[..];
        let raw_type = r.read_u16::<LittleEndian>()?;
        let inode_type = InodeType::try_from(raw_type).map_err(|_| SquashfsError::Corrupt)?;
        let permissions = r.read_u16::<LittleEndian>()?;
        let uid_index = r.read_u16::<LittleEndian>()?;
        let gid_index = r.read_u16::<LittleEndian>()?;
        let mtime = r.read_u32::<LittleEndian>()?;
        let inode_number = r.read_u32::<LittleEndian>()?;

        let mut nlink = 1;
        let mut xattr_index = NO_XATTR;
        let info = match inode_type {
            InodeType::BasicFile => {
                let mut tail = [0u8; 16];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                let start_block = u64::from(r.read_u32::<LittleEndian>()?);
                let frag_index = r.read_u32::<LittleEndian>()?;
                let frag_offset = r.read_u32::<LittleEndian>()?;
                let file_size = u64::from(r.read_u32::<LittleEndian>()?);
                InodeInfo::File(FileInfo {
                    start_block,
                    file_size,
                    frag_index,
                    frag_offset,
                })
            }
            InodeType::ExtFile => {
                let mut tail = [0u8; 40];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                let start_block = r.read_u64::<LittleEndian>()?;
                let file_size = r.read_u64::<LittleEndian>()?;
                let _sparse = r.read_u64::<LittleEndian>()?;
                nlink = r.read_u32::<LittleEndian>()?;
                let frag_index = r.read_u32::<LittleEndian>()?;
                let frag_offset = r.read_u32::<LittleEndian>()?;
                xattr_index = r.read_u32::<LittleEndian>()?;
                InodeInfo::File(FileInfo {
                    start_block,
                    file_size,
                    frag_index,
                    frag_offset,
                })
            }
            InodeType::BasicDir => {
                let mut tail = [0u8; 16];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                let start_block = r.read_u32::<LittleEndian>()?;
                nlink = r.read_u32::<LittleEndian>()?;
                let size = u32::from(r.read_u16::<LittleEndian>()?);
                let offset = r.read_u16::<LittleEndian>()?;
                let parent_inode = r.read_u32::<LittleEndian>()?;
                InodeInfo::Dir(DirInfo {
                    start_block,
                    offset,
                    size,
                    parent_inode,
                    index_count: 0,
                })
            }
            InodeType::ExtDir => {
                let mut tail = [0u8; 24];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                nlink = r.read_u32::<LittleEndian>()?;
                let size = r.read_u32::<LittleEndian>()?;
                let start_block = r.read_u32::<LittleEndian>()?;
                let parent_inode = r.read_u32::<LittleEndian>()?;
                let index_count = r.read_u16::<LittleEndian>()?;
                let offset = r.read_u16::<LittleEndian>()?;
                xattr_index = r.read_u32::<LittleEndian>()?;
                InodeInfo::Dir(DirInfo {
                    start_block,
                    offset,
                    size,
                    parent_inode,
                    index_count,
                })
            }
            InodeType::BasicSymlink | InodeType::ExtSymlink => {
                let mut tail = [0u8; 8];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                nlink = r.read_u32::<LittleEndian>()?;
                let target_size = r.read_u32::<LittleEndian>()?;
                if target_size > MAX_SYMLINK_TARGET {
                    return Err(SquashfsError::Corrupt);
                }
                if inode_type == InodeType::ExtSymlink {
                    // The xattr index trails the target bytes.
                    let mut scratch = cur;
                    self.md_skip(&mut scratch, target_size as usize)?;
                    let mut raw = [0u8; 4];
                    self.md_read(&mut scratch, &mut raw)?;
                    xattr_index = u32::from_le_bytes(raw);
                }
                InodeInfo::Symlink(SymlinkInfo { target_size })
            }
            InodeType::BasicBlockDev | InodeType::BasicCharDev => {
                let mut tail = [0u8; 8];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                nlink = r.read_u32::<LittleEndian>()?;
                let rdev = r.read_u32::<LittleEndian>()?;
                InodeInfo::Device(DeviceInfo { rdev })
            }
            InodeType::ExtBlockDev | InodeType::ExtCharDev => {
                let mut tail = [0u8; 12];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                nlink = r.read_u32::<LittleEndian>()?;
                let rdev = r.read_u32::<LittleEndian>()?;
                xattr_index = r.read_u32::<LittleEndian>()?;
                InodeInfo::Device(DeviceInfo { rdev })
            }
            InodeType::BasicFifo | InodeType::BasicSocket => {
                let mut tail = [0u8; 4];
                self.md_read(&mut cur, &mut tail)?;
                nlink = u32::from_le_bytes(tail);
                InodeInfo::Ipc
            }
            InodeType::ExtFifo | InodeType::ExtSocket => {
                let mut tail = [0u8; 8];
                self.md_read(&mut cur, &mut tail)?;
                let mut r = &tail[..];
                nlink = r.read_u32::<LittleEndian>()?;
                xattr_index = r.read_u32::<LittleEndian>()?;
                InodeInfo::Ipc
            }
        };

        Ok(Inode {
            inode_type,
            permissions,
            uid_index,
            gid_index,
            mtime,
            inode_number,
            nlink,
            xattr_index,
            next: cur,
            info,
        })
    }

    /// Read a symlink's target bytes.
    pub fn readlink(&self, inode: &Inode) -> Result<Vec<u8>> {
        let InodeInfo::Symlink(s) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        let mut target = vec![0u8; s.target_size as usize];
        let mut cur = inode.next;
        self.md_read(&mut cur, &mut target)?;
        Ok(target)
    }
}
