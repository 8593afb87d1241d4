//! Synthetic SquashFS image builder for tests.
//!
//! Produces structurally real images: metadata blocks of up to 8 KiB with
//! 2-byte headers, header-grouped directory listings with lookup indexes,
//! packed tail-end fragments, export/id/xattr tables. Every block is stored
//! uncompressed (the per-block "uncompressed" bit is set), so images decode
//! without exercising any particular compressor backend.

#![allow(dead_code)]

pub const BLOCK_SIZE: u32 = 4096;

const METADATA_BLOCK_SIZE: usize = 8192;
/// Disk bytes per full metadata block: 2-byte header plus contents.
const METADATA_DISK_SIZE: u64 = 2 + METADATA_BLOCK_SIZE as u64;
const SUPERBLOCK_SIZE: usize = 96;
const UNCOMPRESSED_META: u16 = 0x8000;
const UNCOMPRESSED_DATA: u32 = 1 << 24;
const NO_FRAGMENT: u32 = 0xFFFF_FFFF;
const NO_XATTR: u32 = 0xFFFF_FFFF;
const NO_TABLE: u64 = u64::MAX;

const FLAG_EXPORTABLE: u16 = 0x0080;
const FLAG_NO_XATTRS: u16 = 0x0200;

const MTIME: u32 = 1_600_000_000;
const TEST_ID: u32 = 1000;

#[derive(Clone)]
pub struct Xattr {
    pub name: String,
    pub value: Vec<u8>,
    pub ool: bool,
}

pub enum BlockSpec {
    Data(Vec<u8>),
    Hole,
}

pub enum FileData {
    /// Split into full blocks; a partial tail goes to a shared fragment.
    Bytes(Vec<u8>),
    /// Split into blocks only; a partial tail becomes a short block.
    BytesNoFrag(Vec<u8>),
    /// Explicit block layout (for holes); no fragment.
    Blocks { blocks: Vec<BlockSpec>, file_size: u64 },
}

pub enum NodeKind {
    File(FileData),
    Dir(Vec<Node>),
    Symlink(String),
    CharDev(u32),
    BlockDev(u32),
    Fifo,
    Socket,
}

pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub xattrs: Vec<Xattr>,
}

pub fn file(name: &str, bytes: &[u8]) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::File(FileData::Bytes(bytes.to_vec())),
        xattrs: Vec::new(),
    }
}

pub fn file_no_frag(name: &str, bytes: &[u8]) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::File(FileData::BytesNoFrag(bytes.to_vec())),
        xattrs: Vec::new(),
    }
}

pub fn file_blocks(name: &str, blocks: Vec<BlockSpec>, file_size: u64) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::File(FileData::Blocks { blocks, file_size }),
        xattrs: Vec::new(),
    }
}

pub fn dir(name: &str, children: Vec<Node>) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::Dir(children),
        xattrs: Vec::new(),
    }
}

pub fn symlink(name: &str, target: &str) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::Symlink(target.into()),
        xattrs: Vec::new(),
    }
}

pub fn chardev(name: &str, rdev: u32) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::CharDev(rdev),
        xattrs: Vec::new(),
    }
}

pub fn fifo(name: &str) -> Node {
    Node {
        name: name.into(),
        kind: NodeKind::Fifo,
        xattrs: Vec::new(),
    }
}

pub fn with_xattrs(mut node: Node, xattrs: Vec<Xattr>) -> Node {
    node.xattrs = xattrs;
    node
}

pub fn xattr(name: &str, value: &[u8]) -> Xattr {
    Xattr {
        name: name.into(),
        value: value.to_vec(),
        ool: false,
    }
}

pub fn xattr_ool(name: &str, value: &[u8]) -> Xattr {
    Xattr {
        name: name.into(),
        value: value.to_vec(),
        ool: true,
    }
}

/// A stream of metadata that will be chunked into 8 KiB blocks, each
/// emitted with an "uncompressed" 2-byte header. Positions are expressed
/// as (disk offset of the block, byte offset within it), assuming full
/// blocks occupy exactly 8194 disk bytes.
struct MetaWriter {
    raw: Vec<u8>,
}

impl MetaWriter {
    fn new() -> Self {
        MetaWriter { raw: Vec::new() }
    }

    fn pos(&self) -> (u64, u16) {
        (
            loc_of(self.raw.len()),
            (self.raw.len() % METADATA_BLOCK_SIZE) as u16,
        )
    }

    fn ref_raw(&self) -> u64 {
        let (loc, off) = self.pos();
        (loc << 16) | u64::from(off)
    }

    fn len(&self) -> usize {
        self.raw.len()
    }

    fn bytes(&mut self, b: &[u8]) {
        self.raw.extend_from_slice(b);
    }

    fn u16(&mut self, v: u16) {
        self.raw.extend_from_slice(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.raw.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.raw.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.raw.extend_from_slice(&v.to_le_bytes());
    }

    fn patch_u32(&mut self, at: usize, v: u32) {
        self.raw[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn finalize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.raw.chunks(METADATA_BLOCK_SIZE) {
            out.extend_from_slice(&(UNCOMPRESSED_META | chunk.len() as u16).to_le_bytes());
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// Disk offset of the metadata block containing logical offset `pos`,
/// relative to the table start.
fn loc_of(pos: usize) -> u64 {
    (pos / METADATA_BLOCK_SIZE) as u64 * METADATA_DISK_SIZE
}

fn basic_type_code(kind: &NodeKind) -> u16 {
    match kind {
        NodeKind::Dir(_) => 1,
        NodeKind::File(_) => 2,
        NodeKind::Symlink(_) => 3,
        NodeKind::BlockDev(_) => 4,
        NodeKind::CharDev(_) => 5,
        NodeKind::Fifo => 6,
        NodeKind::Socket => 7,
    }
}

struct ChildInfo {
    name: Vec<u8>,
    num: u32,
    iref: u64,
    type_code: u16,
}

struct Builder {
    block_size: u32,
    /// File and fragment content; lands right after the superblock.
    data: Vec<u8>,
    frag_cur: Vec<u8>,
    frag_entries: Vec<(u64, u32)>,
    inode_w: MetaWriter,
    dir_w: MetaWriter,
    kv_w: MetaWriter,
    xattr_ids: Vec<(u64, u32, u32)>,
    /// Inode number (1-based) to raw inode reference.
    export: Vec<u64>,
}

impl Builder {
    fn data_pos(&self) -> u64 {
        SUPERBLOCK_SIZE as u64 + self.data.len() as u64
    }

    /// Append one stored data block, returning its raw blocklist header.
    fn add_block(&mut self, bytes: &[u8]) -> u32 {
        assert!(bytes.len() <= self.block_size as usize);
        self.data.extend_from_slice(bytes);
        UNCOMPRESSED_DATA | bytes.len() as u32
    }

    fn flush_fragment(&mut self) {
        if self.frag_cur.is_empty() {
            return;
        }
        let start = self.data_pos();
        let size = self.frag_cur.len() as u32;
        self.data.append(&mut self.frag_cur);
        self.frag_entries.push((start, size));
    }

    /// Pack a tail into the open fragment block.
    fn add_fragment(&mut self, tail: &[u8]) -> (u32, u32) {
        if self.frag_cur.len() + tail.len() > self.block_size as usize {
            self.flush_fragment();
        }
        let index = self.frag_entries.len() as u32;
        let offset = self.frag_cur.len() as u32;
        self.frag_cur.extend_from_slice(tail);
        (index, offset)
    }

    /// Write any out-of-line values and then the attribute entries for one
    /// inode, returning its xattr table index.
    fn write_xattrs(&mut self, xattrs: &[Xattr]) -> u32 {
        if xattrs.is_empty() {
            return NO_XATTR;
        }

        let mut ool_refs = Vec::new();
        for x in xattrs {
            if x.ool {
                let r = self.kv_w.ref_raw();
                self.kv_w.u32(x.value.len() as u32);
                self.kv_w.bytes(&x.value);
                ool_refs.push(r);
            }
        }

        let list_ref = self.kv_w.ref_raw();
        let mut ool_refs = ool_refs.into_iter();
        let mut total = 0u32;
        for x in xattrs {
            let (prefix_id, rest) = split_prefix(&x.name);
            let mut t = prefix_id;
            if x.ool {
                t |= 0x0100;
            }
            self.kv_w.u16(t);
            self.kv_w.u16(rest.len() as u16);
            self.kv_w.bytes(rest.as_bytes());
            if x.ool {
                self.kv_w.u32(8);
                self.kv_w.u64(ool_refs.next().unwrap());
            } else {
                self.kv_w.u32(x.value.len() as u32);
                self.kv_w.bytes(&x.value);
            }
            total += x.value.len() as u32;
        }

        self.xattr_ids.push((list_ref, xattrs.len() as u32, total));
        (self.xattr_ids.len() - 1) as u32
    }

    fn record_export(&mut self, num: u32, iref: u64) {
        let idx = num as usize - 1;
        if self.export.len() <= idx {
            self.export.resize(idx + 1, 0);
        }
        self.export[idx] = iref;
    }
}

fn split_prefix(name: &str) -> (u16, &str) {
    if let Some(rest) = name.strip_prefix("user.") {
        (0, rest)
    } else if let Some(rest) = name.strip_prefix("security.") {
        (1, rest)
    } else if let Some(rest) = name.strip_prefix("trusted.") {
        (2, rest)
    } else {
        panic!("xattr name without a known prefix: {name}");
    }
}

/// Tree node with numbers assigned pre-order, children name-sorted.
struct Numbered {
    node: Node,
    num: u32,
    children: Vec<Numbered>,
}

fn number(mut node: Node, counter: &mut u32) -> Numbered {
    let num = *counter;
    *counter += 1;
    let children = match &mut node.kind {
        NodeKind::Dir(c) => {
            let mut c = std::mem::take(c);
            c.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
            c.into_iter().map(|n| number(n, counter)).collect()
        }
        _ => Vec::new(),
    };
    Numbered {
        node,
        num,
        children,
    }
}

fn write_inode_head(w: &mut MetaWriter, type_code: u16, permissions: u16, num: u32) {
    w.u16(type_code);
    w.u16(permissions);
    w.u16(0); // uid index
    w.u16(0); // gid index
    w.u32(MTIME);
    w.u32(num);
}

/// Emit a file's data and inode; returns the raw inode reference.
fn emit_file(b: &mut Builder, data: &FileData, xattrs: &[Xattr], num: u32) -> u64 {
    let bs = b.block_size as usize;

    let start_block = b.data_pos();
    let mut headers = Vec::new();
    let mut frag = (NO_FRAGMENT, 0u32);
    let file_size;
    match data {
        FileData::Bytes(bytes) => {
            file_size = bytes.len() as u64;
            let mut chunks = bytes.chunks_exact(bs);
            for chunk in chunks.by_ref() {
                headers.push(b.add_block(chunk));
            }
            let tail = chunks.remainder();
            if !tail.is_empty() {
                frag = b.add_fragment(tail);
            }
        }
        FileData::BytesNoFrag(bytes) => {
            file_size = bytes.len() as u64;
            for chunk in bytes.chunks(bs) {
                headers.push(b.add_block(chunk));
            }
        }
        FileData::Blocks { blocks, file_size: size } => {
            file_size = *size;
            for block in blocks {
                match block {
                    BlockSpec::Data(bytes) => headers.push(b.add_block(bytes)),
                    BlockSpec::Hole => headers.push(0),
                }
            }
        }
    }

    let xattr_index = b.write_xattrs(xattrs);
    let iref = b.inode_w.ref_raw();
    if xattr_index == NO_XATTR && start_block <= u32::MAX.into() && file_size <= u32::MAX.into() {
        write_inode_head(&mut b.inode_w, 2, 0o644, num);
        b.inode_w.u32(start_block as u32);
        b.inode_w.u32(frag.0);
        b.inode_w.u32(frag.1);
        b.inode_w.u32(file_size as u32);
    } else {
        write_inode_head(&mut b.inode_w, 9, 0o644, num);
        b.inode_w.u64(start_block);
        b.inode_w.u64(file_size);
        b.inode_w.u64(0); // sparse
        b.inode_w.u32(1); // nlink
        b.inode_w.u32(frag.0);
        b.inode_w.u32(frag.1);
        b.inode_w.u32(xattr_index);
    }
    for h in headers {
        b.inode_w.u32(h);
    }
    iref
}

/// Write a directory's listing into the directory table; returns
/// (start offset in the listing stream, listing length, index entries).
fn write_listing(b: &mut Builder, entries: &[ChildInfo]) -> (u64, u16, u32, Vec<(u32, u32, Vec<u8>)>) {
    let dir_start = b.dir_w.len();
    let (start_loc, start_off) = b.dir_w.pos();

    struct Run {
        count_pos: usize,
        count: u32,
        inode_loc: u32,
        base_num: u32,
        block: usize,
    }

    let mut run: Option<Run> = None;
    let mut index = Vec::new();
    let mut last_index_block = dir_start / METADATA_BLOCK_SIZE;

    for child in entries {
        let child_loc = (child.iref >> 16) as u32;
        let cur_block = b.dir_w.len() / METADATA_BLOCK_SIZE;
        let need_new = match &run {
            None => true,
            Some(r) => r.count == 256 || r.inode_loc != child_loc || r.block != cur_block,
        };
        if need_new {
            if let Some(r) = run.take() {
                b.dir_w.patch_u32(r.count_pos, r.count - 1);
            }
            let pos = b.dir_w.len();
            let block = pos / METADATA_BLOCK_SIZE;
            if block != last_index_block {
                index.push((
                    (pos - dir_start) as u32,
                    loc_of(pos) as u32,
                    child.name.clone(),
                ));
                last_index_block = block;
            }
            let count_pos = b.dir_w.len();
            b.dir_w.u32(0); // patched below
            b.dir_w.u32(child_loc);
            b.dir_w.u32(child.num);
            run = Some(Run {
                count_pos,
                count: 0,
                inode_loc: child_loc,
                base_num: child.num,
                block,
            });
        }

        let r = run.as_mut().unwrap();
        let delta = child.num as i64 - r.base_num as i64;
        b.dir_w.u16((child.iref & 0xFFFF) as u16);
        b.dir_w.i16(i16::try_from(delta).expect("inode delta fits i16"));
        b.dir_w.u16(child.type_code);
        b.dir_w.u16(child.name.len() as u16 - 1);
        b.dir_w.bytes(&child.name);
        r.count += 1;
    }
    if let Some(r) = run.take() {
        b.dir_w.patch_u32(r.count_pos, r.count - 1);
    }

    let listing_len = (b.dir_w.len() - dir_start) as u32;
    (start_loc, start_off, listing_len, index)
}

/// Emit one node (post-order for directories); returns the raw reference.
fn emit_node(b: &mut Builder, n: &Numbered, parent_num: u32) -> u64 {
    let iref = match &n.node.kind {
        NodeKind::File(data) => emit_file(b, data, &n.node.xattrs, n.num),
        NodeKind::Dir(_) => {
            let mut children = Vec::new();
            for child in &n.children {
                let iref = emit_node(b, child, n.num);
                children.push(ChildInfo {
                    name: child.node.name.as_bytes().to_vec(),
                    num: child.num,
                    iref,
                    type_code: basic_type_code(&child.node.kind),
                });
            }
            let (start_loc, start_off, listing_len, index) = write_listing(b, &children);
            let size = listing_len + 3;
            let nlink = 2 + n.children.iter().filter(|c| matches!(c.node.kind, NodeKind::Dir(_))).count() as u32;

            let xattr_index = b.write_xattrs(&n.node.xattrs);
            let iref = b.inode_w.ref_raw();
            if xattr_index == NO_XATTR && index.is_empty() && size <= 0xFFFF {
                write_inode_head(&mut b.inode_w, 1, 0o755, n.num);
                b.inode_w.u32(start_loc as u32);
                b.inode_w.u32(nlink);
                b.inode_w.u16(size as u16);
                b.inode_w.u16(start_off);
                b.inode_w.u32(parent_num);
            } else {
                write_inode_head(&mut b.inode_w, 8, 0o755, n.num);
                b.inode_w.u32(nlink);
                b.inode_w.u32(size);
                b.inode_w.u32(start_loc as u32);
                b.inode_w.u32(parent_num);
                b.inode_w.u16(index.len() as u16);
                b.inode_w.u16(start_off);
                b.inode_w.u32(xattr_index);
                for (idx, loc, name) in &index {
                    b.inode_w.u32(*idx);
                    b.inode_w.u32(*loc);
                    b.inode_w.u32(name.len() as u32 - 1);
                    b.inode_w.bytes(name);
                }
            }
            iref
        }
        NodeKind::Symlink(target) => {
            let xattr_index = b.write_xattrs(&n.node.xattrs);
            let iref = b.inode_w.ref_raw();
            let ext = xattr_index != NO_XATTR;
            write_inode_head(&mut b.inode_w, if ext { 10 } else { 3 }, 0o777, n.num);
            b.inode_w.u32(1); // nlink
            b.inode_w.u32(target.len() as u32);
            b.inode_w.bytes(target.as_bytes());
            if ext {
                b.inode_w.u32(xattr_index);
            }
            iref
        }
        NodeKind::CharDev(rdev) | NodeKind::BlockDev(rdev) => {
            let xattr_index = b.write_xattrs(&n.node.xattrs);
            let iref = b.inode_w.ref_raw();
            let ext = xattr_index != NO_XATTR;
            let code = match (&n.node.kind, ext) {
                (NodeKind::BlockDev(_), false) => 4,
                (NodeKind::CharDev(_), false) => 5,
                (NodeKind::BlockDev(_), true) => 11,
                _ => 12,
            };
            write_inode_head(&mut b.inode_w, code, 0o644, n.num);
            b.inode_w.u32(1); // nlink
            b.inode_w.u32(*rdev);
            if ext {
                b.inode_w.u32(xattr_index);
            }
            iref
        }
        NodeKind::Fifo | NodeKind::Socket => {
            let xattr_index = b.write_xattrs(&n.node.xattrs);
            let iref = b.inode_w.ref_raw();
            let ext = xattr_index != NO_XATTR;
            let code = match (&n.node.kind, ext) {
                (NodeKind::Fifo, false) => 6,
                (NodeKind::Socket, false) => 7,
                (NodeKind::Fifo, true) => 13,
                _ => 14,
            };
            write_inode_head(&mut b.inode_w, code, 0o644, n.num);
            b.inode_w.u32(1); // nlink
            if ext {
                b.inode_w.u32(xattr_index);
            }
            iref
        }
    };
    b.record_export(n.num, iref);
    iref
}

/// Emit a table's metadata blocks followed by its block pointer list;
/// returns the disk offset of the pointer list.
fn write_table(out: &mut Vec<u8>, entries: &[u8]) -> u64 {
    let mut ptrs = Vec::new();
    for chunk in entries.chunks(METADATA_BLOCK_SIZE) {
        ptrs.push(out.len() as u64);
        out.extend_from_slice(&(UNCOMPRESSED_META | chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    let table_pos = out.len() as u64;
    for p in ptrs {
        out.extend_from_slice(&p.to_le_bytes());
    }
    table_pos
}

pub fn build_image(root_children: Vec<Node>) -> Vec<u8> {
    build_image_bs(BLOCK_SIZE, root_children)
}

pub fn build_image_bs(block_size: u32, root_children: Vec<Node>) -> Vec<u8> {
    let root = Node {
        name: String::new(),
        kind: NodeKind::Dir(root_children),
        xattrs: Vec::new(),
    };
    let mut counter = 1;
    let numbered = number(root, &mut counter);
    let inode_count = counter - 1;

    let mut b = Builder {
        block_size,
        data: Vec::new(),
        frag_cur: Vec::new(),
        frag_entries: Vec::new(),
        inode_w: MetaWriter::new(),
        dir_w: MetaWriter::new(),
        kv_w: MetaWriter::new(),
        xattr_ids: Vec::new(),
        export: Vec::new(),
    };

    let root_ref = emit_node(&mut b, &numbered, 0);
    b.flush_fragment();

    let mut out = vec![0u8; SUPERBLOCK_SIZE];
    out.extend_from_slice(&b.data);

    let inode_table = out.len() as u64;
    out.extend_from_slice(&b.inode_w.finalize());
    let dir_table = out.len() as u64;
    out.extend_from_slice(&b.dir_w.finalize());

    let frag_table = if b.frag_entries.is_empty() {
        NO_TABLE
    } else {
        let mut entries = Vec::new();
        for (start, size) in &b.frag_entries {
            entries.extend_from_slice(&start.to_le_bytes());
            entries.extend_from_slice(&(UNCOMPRESSED_DATA | size).to_le_bytes());
            entries.extend_from_slice(&0u32.to_le_bytes());
        }
        write_table(&mut out, &entries)
    };

    let export_table = {
        let mut entries = Vec::new();
        b.export.resize(inode_count as usize, 0);
        for r in &b.export {
            entries.extend_from_slice(&r.to_le_bytes());
        }
        write_table(&mut out, &entries)
    };

    let id_table = write_table(&mut out, &TEST_ID.to_le_bytes());

    let xattr_table = if b.xattr_ids.is_empty() {
        NO_TABLE
    } else {
        let kv_start = out.len() as u64;
        out.extend_from_slice(&b.kv_w.finalize());

        let mut entries = Vec::new();
        for (r, count, size) in &b.xattr_ids {
            entries.extend_from_slice(&r.to_le_bytes());
            entries.extend_from_slice(&count.to_le_bytes());
            entries.extend_from_slice(&size.to_le_bytes());
        }
        let mut ptrs = Vec::new();
        for chunk in entries.chunks(METADATA_BLOCK_SIZE) {
            ptrs.push(out.len() as u64);
            out.extend_from_slice(&(UNCOMPRESSED_META | chunk.len() as u16).to_le_bytes());
            out.extend_from_slice(chunk);
        }
        let header_pos = out.len() as u64;
        out.extend_from_slice(&kv_start.to_le_bytes());
        out.extend_from_slice(&(b.xattr_ids.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for p in ptrs {
            out.extend_from_slice(&p.to_le_bytes());
        }
        header_pos
    };

    let mut flags = FLAG_EXPORTABLE;
    if b.xattr_ids.is_empty() {
        flags |= FLAG_NO_XATTRS;
    }

    let bytes_used = out.len() as u64;
    let sb = &mut out[..SUPERBLOCK_SIZE];
    sb[0..4].copy_from_slice(&0x73717368u32.to_le_bytes());
    sb[4..8].copy_from_slice(&inode_count.to_le_bytes());
    sb[8..12].copy_from_slice(&MTIME.to_le_bytes());
    sb[12..16].copy_from_slice(&block_size.to_le_bytes());
    sb[16..20].copy_from_slice(&(b.frag_entries.len() as u32).to_le_bytes());
    sb[20..22].copy_from_slice(&1u16.to_le_bytes()); // gzip
    sb[22..24].copy_from_slice(&(block_size.trailing_zeros() as u16).to_le_bytes());
    sb[24..26].copy_from_slice(&flags.to_le_bytes());
    sb[26..28].copy_from_slice(&1u16.to_le_bytes()); // id count
    sb[28..30].copy_from_slice(&4u16.to_le_bytes());
    sb[30..32].copy_from_slice(&0u16.to_le_bytes());
    sb[32..40].copy_from_slice(&root_ref.to_le_bytes());
    sb[40..48].copy_from_slice(&bytes_used.to_le_bytes());
    sb[48..56].copy_from_slice(&id_table.to_le_bytes());
    sb[56..64].copy_from_slice(&xattr_table.to_le_bytes());
    sb[64..72].copy_from_slice(&inode_table.to_le_bytes());
    sb[72..80].copy_from_slice(&dir_table.to_le_bytes());
    sb[80..88].copy_from_slice(&frag_table.to_le_bytes());
    sb[88..96].copy_from_slice(&export_table.to_le_bytes());

    out
}
