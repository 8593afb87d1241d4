use byteorder::{LittleEndian, ReadBytesExt};

use super::block::METADATA_BLOCK_SIZE;
use super::error::{Result, SquashfsError};
use super::inode::{DirInfo, Inode, InodeInfo, InodeType};
use super::input::Input;
use super::metadata::{InodeRef, MdCursor};
use super::squashfs::SquashFS;

/// Directory entry names are at most 256 bytes.
const MAX_NAME_LEN: usize = 256;

/// Entry runs are grouped under headers of at most 256 entries.
const MAX_RUN_LEN: u32 = 256;

/// A named reference to an inode within a directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    name: Vec<u8>,
    inode_ref: InodeRef,
    inode_number: u32,
    entry_type: InodeType,
}

impl DirEntry {
    pub fn file_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn inode_ref(&self) -> InodeRef {
        self.inode_ref
    }

    pub fn inode_number(&self) -> u32 {
        self.inode_number
    }

    /// The entry's type as recorded in the directory; always one of the
    /// basic type codes.
    pub fn entry_type(&self) -> InodeType {
        self.entry_type
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type.is_dir()
    }
}

/// Lazy iterator over the entries of one directory, in stored order.
///
/// The listing is a sequence of headers, each followed by a run of entries
/// whose inodes share a metadata block. [`DirReader::lookup`] consults the
/// directory's lookup index first, fast-forwarding past listing blocks that
/// cannot contain the name.
pub struct DirReader<'a, I: Input> {
    fs: &'a SquashFS<I>,
    cur: MdCursor,
    /// Listing bytes left to read; headers and entries both count.
    remain: i64,
    /// Entries left in the current run.
    count: u32,
    /// Inode metadata block of the current run's entries.
    start_block: u32,
    /// Inode number base of the current run.
    inode_base: u32,
}

impl<I: Input> SquashFS<I> {
    /// Iterate the entries of a directory inode.
    pub fn read_dir(&self, inode: &Inode) -> Result<DirReader<'_, I>> {
        let InodeInfo::Dir(d) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        Ok(DirReader {
            fs: self,
            cur: MdCursor {
                block: self.sb.dir_table + u64::from(d.start_block),
                offset: d.offset as usize,
            },
            // The stored size includes 3 phantom bytes for "." and "..".
            remain: i64::from(d.size) - 3,
            count: 0,
            start_block: 0,
            inode_base: 0,
        })
    }

    /// Find `name` in a directory, using its lookup index when present.
    pub fn lookup(&self, inode: &Inode, name: &[u8]) -> Result<Option<DirEntry>> {
        let mut dir = self.read_dir(inode)?;
        dir.fast_forward(inode, name)?;
        dir.find(name)
    }
}

impl<'a, I: Input> DirReader<'a, I> {
    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.remain -= buf.len() as i64;
        self.fs.md_read(&mut self.cur, buf)
    }

    /// The next entry, or `None` at the end of the listing.
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        while self.count == 0 {
            if self.remain <= 0 {
                return Ok(None);
            }
            let mut raw = [0u8; 12];
            self.read(&mut raw)?;
            let mut r = &raw[..];
            let count = r.read_u32::<LittleEndian>()? + 1;
            if count > MAX_RUN_LEN {
                return Err(SquashfsError::Corrupt);
            }
            self.count = count;
            self.start_block = r.read_u32::<LittleEndian>()?;
            self.inode_base = r.read_u32::<LittleEndian>()?;
        }

        let mut raw = [0u8; 8];
        self.read(&mut raw)?;
        let mut r = &raw[..];
        let offset = r.read_u16::<LittleEndian>()?;
        let inode_delta = r.read_i16::<LittleEndian>()?;
        let entry_type =
            InodeType::try_from(r.read_u16::<LittleEndian>()?).map_err(|_| SquashfsError::Corrupt)?;
        let name_size = r.read_u16::<LittleEndian>()? as usize + 1;
        if name_size > MAX_NAME_LEN {
            return Err(SquashfsError::Corrupt);
        }
        self.count -= 1;

        let mut name = vec![0u8; name_size];
        self.read(&mut name)?;

        Ok(Some(DirEntry {
            name,
            inode_ref: InodeRef::new(self.start_block.into(), offset),
            // The delta is signed, the sum wraps mod 2^32.
            inode_number: self.inode_base.wrapping_add_signed(inode_delta.into()),
            entry_type,
        }))
    }

    /// Skip ahead using the directory's lookup index: position the reader
    /// at the last indexed run whose first name is not past `name`.
    fn fast_forward(&mut self, inode: &Inode, name: &[u8]) -> Result<()> {
        let InodeInfo::Dir(DirInfo { index_count, .. }) = &inode.info else {
            return Err(SquashfsError::NotFound);
        };
        if *index_count == 0 {
            return Ok(());
        }

        let mut cur = inode.next;
        let mut skipped: u64 = 0;
        for _ in 0..*index_count {
            let mut raw = [0u8; 12];
            self.fs.md_read(&mut cur, &mut raw)?;
            let mut r = &raw[..];
            let index = r.read_u32::<LittleEndian>()?;
            let start_block = r.read_u32::<LittleEndian>()?;
            let name_size = r.read_u32::<LittleEndian>()? as usize + 1;
            if name_size > MAX_NAME_LEN {
                return Err(SquashfsError::Corrupt);
            }

            let mut index_name = vec![0u8; name_size];
            self.fs.md_read(&mut cur, &mut index_name)?;

            // Byte-wise comparison over the queried prefix; the first
            // index entry past the name ends the scan.
            let n = name.len().min(index_name.len());
            if index_name[..n] > name[..n] {
                break;
            }
            skipped = index.into();
            self.cur.block = self.fs.sb.dir_table + u64::from(start_block);
        }

        self.remain -= skipped as i64;
        self.cur.offset = (self.cur.offset + skipped as usize) % METADATA_BLOCK_SIZE;
        Ok(())
    }

    /// Scan forward for an exact name match.
    fn find(&mut self, name: &[u8]) -> Result<Option<DirEntry>> {
        while let Some(entry) = self.next_entry()? {
            if entry.name_bytes() == name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl<'a, I: Input> Iterator for DirReader<'a, I> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
