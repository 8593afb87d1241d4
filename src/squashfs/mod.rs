mod block;
mod cache;
mod compress;
mod squashfs;
mod table;

pub mod dir;
pub mod error;
pub mod file;
pub mod inode;
pub mod input;
pub mod metadata;
pub mod resolve;
pub mod superblock;
pub mod traverse;
pub mod xattr;

pub use dir::{DirEntry, DirReader};
pub use file::FileReader;
pub use inode::{Inode, InodeInfo, InodeType};
pub use input::{Input, StreamInput};
pub use metadata::InodeRef;
pub use resolve::Resolver;
pub use squashfs::*;
pub use superblock::{Compressor, Superblock};
pub use traverse::Traverse;
pub use xattr::XattrReader;
