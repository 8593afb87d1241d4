use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use super::error::{Result, SquashfsError};
use super::inode::{Inode, NO_XATTR};
use super::input::{self, Input};
use super::metadata::{InodeRef, MdCursor};
use super::squashfs::SquashFS;
use super::table::Table;

/// Attribute type codes map to name prefixes; the OOL bit marks a value
/// stored by reference in the xattr blob.
const XATTR_PREFIX_MASK: u16 = 0x00FF;
const XATTR_VALUE_OOL: u16 = 0x0100;

/// Values are capped like the host xattr interface caps them.
const MAX_VALUE_SIZE: u32 = 65536;

const PREFIXES: [&str; 3] = ["user.", "security.", "trusted."];

bitflags! {
    /// Which cursors of the enumeration state machine are valid for the
    /// current attribute.
    struct Cursors: u8 {
        const VSIZE = 1;
        const VALUE = 2;
        const NEXT = 4;
    }
}

/// The xattr id table: a lookup table of per-inode id records plus the
/// start of the key/value blob the records point into.
#[derive(Debug)]
pub(crate) struct XattrIdTable {
    pub table: Table,
    pub kv_start: u64,
}

impl XattrIdTable {
    pub fn read<I: Input>(input: &I, start: u64) -> Result<Self> {
        let mut raw = [0u8; 16];
        input::read_exact_at(input, start, &mut raw)?;
        let mut r = &raw[..];
        let kv_start = r.read_u64::<LittleEndian>()?;
        let ids = r.read_u32::<LittleEndian>()?;
        let _unused = r.read_u32::<LittleEndian>()?;
        let table = Table::read(input, start + 16, 16, ids as usize)?;
        Ok(XattrIdTable { table, kv_start })
    }
}

/// Enumerator over the extended attributes of one inode.
///
/// The reader advances attribute by attribute; within one attribute the
/// name, value size, and value may each be read or skipped independently.
/// Out-of-line values are followed transparently, and reading them does not
/// disturb the cursor for the next attribute.
pub struct XattrReader<'a, I: Input> {
    fs: &'a SquashFS<I>,
    kv_start: u64,
    remain: u32,
    ool: bool,
    prefix: usize,
    name_size: usize,
    val_size: u32,
    c_next: MdCursor,
    c_name: MdCursor,
    c_vsize: MdCursor,
    c_val: MdCursor,
    cursors: Cursors,
}

impl<I: Input> SquashFS<I> {
    /// Enumerate the extended attributes of `inode`. Inodes without
    /// attributes (or images without an xattr table) yield an empty
    /// enumeration.
    pub fn xattrs(&self, inode: &Inode) -> Result<XattrReader<'_, I>> {
        let empty = MdCursor { block: 0, offset: 0 };
        let mut reader = XattrReader {
            fs: self,
            kv_start: 0,
            remain: 0,
            ool: false,
            prefix: 0,
            name_size: 0,
            val_size: 0,
            c_next: empty,
            c_name: empty,
            c_vsize: empty,
            c_val: empty,
            cursors: Cursors::NEXT,
        };
        let Some(xattr) = &self.xattr_table else {
            return Ok(reader);
        };
        if inode.xattr_index == NO_XATTR {
            return Ok(reader);
        }

        let mut raw = [0u8; 16];
        xattr.table.get(self, inode.xattr_index as usize, &mut raw)?;
        let mut r = &raw[..];
        let xattr_ref = InodeRef::read(&mut r)?;
        let count = r.read_u32::<LittleEndian>()?;
        let _size = r.read_u32::<LittleEndian>()?;

        reader.kv_start = xattr.kv_start;
        reader.c_next = xattr_ref.cursor(xattr.kv_start);
        reader.remain = count;
        Ok(reader)
    }

    /// Look up one attribute by its fully-prefixed name.
    pub fn xattr_find(&self, inode: &Inode, name: &[u8]) -> Result<Option<Vec<u8>>> {
        self.xattrs(inode)?.find(name)
    }
}

impl<'a, I: Input> XattrReader<'a, I> {
    /// Attributes not yet visited.
    pub fn remaining(&self) -> u32 {
        self.remain
    }

    /// Advance to the next attribute, skipping whatever parts of the
    /// current one were never read. False once exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        if self.remain == 0 {
            return Ok(false);
        }

        if !self.cursors.contains(Cursors::NEXT) {
            // Skip the rest of the current attribute. Forcing the value
            // inline makes the skip step over the OOL pointer itself,
            // landing exactly on the next entry.
            self.ool = false;
            self.skip_value()?;
        }

        self.c_name = self.c_next;
        let mut raw = [0u8; 4];
        self.fs.md_read(&mut self.c_name, &mut raw)?;
        let entry_type = LittleEndian::read_u16(&raw[0..2]);
        self.name_size = LittleEndian::read_u16(&raw[2..4]) as usize;

        let prefix = (entry_type & XATTR_PREFIX_MASK) as usize;
        if prefix >= PREFIXES.len() {
            return Err(SquashfsError::Corrupt);
        }
        self.prefix = prefix;
        self.ool = entry_type & XATTR_VALUE_OOL != 0;

        self.remain -= 1;
        self.cursors = Cursors::empty();
        Ok(true)
    }

    /// Prefix of the current attribute's name.
    pub fn prefix(&self) -> &'static str {
        PREFIXES[self.prefix]
    }

    /// Length of the current name, prefix included.
    pub fn name_size(&self) -> usize {
        self.name_size + self.prefix().len()
    }

    /// Read the current attribute's name, optionally with its prefix.
    pub fn name(&mut self, with_prefix: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if with_prefix {
            out.extend_from_slice(self.prefix().as_bytes());
        }
        let start = out.len();
        out.resize(start + self.name_size, 0);

        self.c_vsize = self.c_name;
        self.fs.md_read(&mut self.c_vsize, &mut out[start..])?;
        self.cursors |= Cursors::VSIZE;
        Ok(out)
    }

    fn skip_name(&mut self) -> Result<()> {
        self.c_vsize = self.c_name;
        self.fs.md_skip(&mut self.c_vsize, self.name_size)?;
        self.cursors |= Cursors::VSIZE;
        Ok(())
    }

    /// Size of the current attribute's value. For an out-of-line value the
    /// stored pointer is followed and the size header re-read at the
    /// target; calling this repeatedly returns the same size.
    pub fn value_size(&mut self) -> Result<u32> {
        if !self.cursors.contains(Cursors::VSIZE) {
            self.skip_name()?;
        }

        self.c_val = self.c_vsize;
        let mut raw = [0u8; 4];
        self.fs.md_read(&mut self.c_val, &mut raw)?;
        self.val_size = LittleEndian::read_u32(&raw);

        if self.ool {
            self.c_next = self.c_val;
            let mut raw_ptr = [0u8; 8];
            self.fs.md_read(&mut self.c_next, &mut raw_ptr)?;
            self.cursors |= Cursors::NEXT;

            // Re-read the size header at the pointed-to location.
            self.c_val = InodeRef::from_raw(LittleEndian::read_u64(&raw_ptr)).cursor(self.kv_start);
            self.fs.md_read(&mut self.c_val, &mut raw)?;
            self.val_size = LittleEndian::read_u32(&raw);
        }

        if self.val_size > MAX_VALUE_SIZE {
            return Err(SquashfsError::Corrupt);
        }
        self.cursors |= Cursors::VALUE;
        Ok(self.val_size)
    }

    /// Read the current attribute's value.
    pub fn value(&mut self) -> Result<Vec<u8>> {
        if !self.cursors.contains(Cursors::VALUE) {
            self.value_size()?;
        }

        let mut out = vec![0u8; self.val_size as usize];
        let mut cur = self.c_val;
        self.fs.md_read(&mut cur, &mut out)?;

        if !self.ool {
            self.c_next = cur;
            self.cursors |= Cursors::NEXT;
        }
        Ok(out)
    }

    fn skip_value(&mut self) -> Result<()> {
        if !self.cursors.contains(Cursors::VALUE) {
            self.value_size()?;
        }
        let mut cur = self.c_val;
        self.fs.md_skip(&mut cur, self.val_size as usize)?;
        if !self.ool {
            self.c_next = cur;
            self.cursors |= Cursors::NEXT;
        }
        Ok(())
    }

    /// First attribute whose fully-prefixed name equals `name`.
    pub fn find(&mut self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        while self.advance()? {
            if self.name_size() != name.len() {
                continue;
            }
            if self.name(true)? == name {
                return Ok(Some(self.value()?));
            }
        }
        Ok(None)
    }
}
