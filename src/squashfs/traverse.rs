use std::borrow::Cow;

use super::dir::{DirEntry, DirReader};
use super::error::{Result, SquashfsError};
use super::inode::Inode;
use super::input::Input;
use super::squashfs::SquashFS;

/// Stateful pre-order walk of a directory tree.
///
/// Each call to [`Traverse::next`] yields either a directory entry (with
/// [`Traverse::path`] holding its full path) or a directory-end boundary.
/// Descent into a directory is deferred until the following step, so the
/// caller sees every node before entering it and may [`Traverse::skip`]
/// a subtree.
pub struct Traverse<'a, I: Input> {
    fs: &'a SquashFS<I>,
    stack: Vec<Level<'a, I>>,
    path: Vec<u8>,
    /// Length of the last appended name, the part of `path` that the next
    /// sibling entry replaces.
    path_last: usize,
    entry: Option<DirEntry>,
    descend: bool,
    dir_end: bool,
}

struct Level<'a, I: Input> {
    dir: DirReader<'a, I>,
    /// Name length to restore into `path_last` when ascending.
    name_len: usize,
}

impl<I: Input> SquashFS<I> {
    /// Walk the whole image starting at the root directory.
    pub fn traverse(&self) -> Result<Traverse<'_, I>> {
        self.traverse_inode(&self.root_inode()?)
    }

    /// Walk the tree below one directory inode.
    pub fn traverse_inode(&self, inode: &Inode) -> Result<Traverse<'_, I>> {
        let mut traverse = Traverse {
            fs: self,
            stack: Vec::new(),
            path: Vec::new(),
            path_last: 0,
            entry: None,
            descend: false,
            dir_end: false,
        };
        traverse.push_dir(inode)?;
        Ok(traverse)
    }
}

impl<'a, I: Input> Traverse<'a, I> {
    fn push_dir(&mut self, inode: &Inode) -> Result<()> {
        let dir = self.fs.read_dir(inode)?;
        self.stack.push(Level {
            dir,
            name_len: self.path_last,
        });
        if self.path_last > 0 {
            self.path.push(b'/');
        }
        self.path_last = 0;
        self.descend = false;
        Ok(())
    }

    fn pop_dir(&mut self) -> Result<()> {
        let level = self.stack.pop().ok_or(SquashfsError::Corrupt)?;
        self.path.truncate(self.path.len() - self.path_last);
        if level.name_len > 0 {
            self.path.pop(); // separator
        }
        self.path_last = level.name_len;
        Ok(())
    }

    /// Step the walk. True while something was produced: either an entry
    /// (see [`Traverse::entry`]) or the end of a directory
    /// ([`Traverse::dir_end`]).
    pub fn next(&mut self) -> Result<bool> {
        if self.stack.is_empty() {
            return Ok(false);
        }

        // Enter the directory produced by the previous step.
        if self.descend {
            let entry = self.entry.as_ref().ok_or(SquashfsError::Corrupt)?;
            let inode = self.fs.inode(entry.inode_ref())?;
            self.push_dir(&inode)?;
        }

        let level = self.stack.last_mut().expect("stack is non-empty");
        match level.dir.next_entry()? {
            None => {
                // This directory is finished; surface the boundary.
                self.pop_dir()?;
                self.dir_end = true;
                Ok(true)
            }
            Some(entry) => {
                self.path.truncate(self.path.len() - self.path_last);
                self.path_last = entry.name_bytes().len();
                self.path.extend_from_slice(entry.name_bytes());
                self.dir_end = false;
                if entry.is_dir() {
                    self.descend = true;
                }
                self.entry = Some(entry);
                Ok(true)
            }
        }
    }

    /// The entry produced by the last step, if it was not a boundary.
    pub fn entry(&self) -> Option<&DirEntry> {
        if self.dir_end {
            None
        } else {
            self.entry.as_ref()
        }
    }

    /// Whether the last step was the end of a directory.
    pub fn dir_end(&self) -> bool {
        self.dir_end
    }

    /// Path of the entry produced by the last step, relative to the walk
    /// root, without a leading separator.
    pub fn path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }

    pub fn path_bytes(&self) -> &[u8] {
        &self.path
    }

    /// Do not descend into the directory entry produced by the last step.
    pub fn skip(&mut self) {
        self.descend = false;
    }
}
