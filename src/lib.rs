//! Rsquash is a read-only SquashFS reader built for shared use from many
//! threads. One [`SquashFS`] handle serves any number of concurrent readers:
//! metadata, data, and fragment blocks are decompressed on demand into
//! shared bounded caches, and concurrent misses for the same block are
//! coalesced so each block is read and decompressed exactly once.
//!
//! # Usage Example
//! ```no_run
//! use std::io;
//! use rsquash::SquashFS;
//! fn print_file_from_squashfs() -> io::Result<()> {
//!     // Open the SquashFS
//!     let sqfs = SquashFS::open("rootfs.squashfs")?;
//!
//!     // List the contents of a directory
//!     let etc = sqfs.resolve("/etc")?;
//!     for d in sqfs.read_dir(&etc)? {
//!         println!("{}", d?.file_name());
//!     }
//!
//!     // Open a file to read its contents
//!     let group = sqfs.resolve("/etc/group")?;
//!     let mut file_reader = sqfs.open_file(&group)?;
//!
//!     // Copy the file contents to stdout
//!     let mut stdout = io::stdout().lock();
//!     io::copy(&mut file_reader, &mut stdout)?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//! Rsquash uses feature flags to select compression algorithms for inclusion:
//! - **gzip** - Include support for GZIP compression via flate2 (default)
//! - **xz** - Include support for XZ compression via lzma-rs (default)
//! - **zstd** - Include support for ZSTD compression via ruzstd (default)
//!
//! Images using a compression method that was not compiled in fail to open
//! with [`SquashfsError::UnsupportedCompression`].
//!
//! [`SquashfsError::UnsupportedCompression`]: error::SquashfsError::UnsupportedCompression

pub mod squashfs;

pub use squashfs::error::{Result, SquashfsError};
pub use squashfs::*;
