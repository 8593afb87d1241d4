use std::collections::VecDeque;

use tracing::debug;

use super::error::{Result, SquashfsError};
use super::inode::Inode;
use super::input::Input;
use super::squashfs::SquashFS;

/// A symlink chain longer than this is treated as a loop.
const MAX_LINK_DEPTH: usize = 256;

/// Path resolution state: a stack of traversed directory inodes and a
/// queue of name components still to walk. Symlink targets are spliced
/// onto the front of the queue as they are encountered, with a depth cap
/// guarding against cycles.
pub struct Resolver<'a, I: Input> {
    fs: &'a SquashFS<I>,
    root: Inode,
    levels: Vec<Inode>,
    components: VecDeque<Vec<u8>>,
}

impl<I: Input> SquashFS<I> {
    /// A resolver rooted at the image root directory.
    pub fn resolver(&self) -> Result<Resolver<'_, I>> {
        Ok(Resolver {
            fs: self,
            root: self.root_inode()?,
            levels: Vec::new(),
            components: VecDeque::new(),
        })
    }

    /// Resolve `path` to an inode, following symlinks.
    /// Missing components surface as [`SquashfsError::NotFound`].
    pub fn resolve(&self, path: &str) -> Result<Inode> {
        let mut resolver = self.resolver()?;
        resolver.push_path(path.as_bytes());
        resolver.resolve()?.ok_or(SquashfsError::NotFound)
    }
}

/// Split a path into components. A leading slash becomes one empty
/// component, which resets resolution to the root; other empty components
/// carry no meaning and are dropped.
fn components(path: &[u8]) -> impl Iterator<Item = &[u8]> {
    path.split(|&b| b == b'/')
        .enumerate()
        .filter(|(i, c)| *i == 0 || !c.is_empty())
        .map(|(_, c)| c)
}

impl<'a, I: Input> Resolver<'a, I> {
    /// Queue `path` to be resolved after anything already queued.
    pub fn push_path(&mut self, path: &[u8]) {
        for c in components(path) {
            self.components.push_back(c.to_vec());
        }
    }

    fn prepend_path(&mut self, path: &[u8]) {
        let mut split: Vec<&[u8]> = components(path).collect();
        while let Some(c) = split.pop() {
            self.components.push_front(c.to_vec());
        }
    }

    /// Drop all state, returning to the root with nothing queued.
    pub fn reset(&mut self) {
        self.levels.clear();
        self.components.clear();
    }

    fn current(&self) -> &Inode {
        self.levels.last().unwrap_or(&self.root)
    }

    /// Walk the queued components. Yields `None` when a component does not
    /// exist; errors are reserved for real failures.
    pub fn resolve(&mut self) -> Result<Option<Inode>> {
        let mut depth = 0usize;
        while let Some(name) = self.components.pop_front() {
            if name.is_empty() {
                // Absolute path: restart from the root.
                self.levels.clear();
                continue;
            }
            if name == b".." {
                // Never above the filesystem root.
                self.levels.pop();
                continue;
            }
            if name == b"." {
                continue;
            }

            let parent = self.current().clone();
            let Some(entry) = self.fs.lookup(&parent, &name)? else {
                return Ok(None);
            };
            let inode = self.fs.inode(entry.inode_ref())?;

            if inode.is_symlink() {
                depth += 1;
                if depth > MAX_LINK_DEPTH {
                    return Err(SquashfsError::SymlinkDepthExceeded);
                }
                let target = self.fs.readlink(&inode)?;
                debug!(
                    link = %String::from_utf8_lossy(&name),
                    target = %String::from_utf8_lossy(&target),
                    depth,
                    "following symlink"
                );
                self.prepend_path(&target);
            } else {
                self.levels.push(inode);
            }
        }

        Ok(Some(self.current().clone()))
    }
}
