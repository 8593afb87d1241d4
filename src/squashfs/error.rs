use std::io;

use thiserror::Error;

use super::superblock::Compressor;

pub type Result<T> = std::result::Result<T, SquashfsError>;

/// Errors surfaced by the library. Every predictable failure is a value;
/// nothing in the crate panics on malformed images.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SquashfsError {
    #[error("not a squashfs image")]
    BadFormat,

    #[error("unsupported squashfs version {major}.{minor}")]
    BadVersion { major: u16, minor: u16 },

    #[error("unsupported compression method {0:?}")]
    UnsupportedCompression(Compressor),

    #[error("corrupt compressed block")]
    BadCompressedData,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt or inconsistent metadata")]
    Corrupt,

    /// A path component does not exist, or an operation was applied to an
    /// inode of the wrong kind (for example a directory read on a file).
    #[error("no such file or directory")]
    NotFound,

    #[error("too many levels of symbolic links")]
    SymlinkDepthExceeded,

    #[error("out of memory")]
    OutOfMemory,

    #[error("unsupported feature flags")]
    UnsupportedFeature,
}

impl From<SquashfsError> for io::Error {
    fn from(value: SquashfsError) -> Self {
        use SquashfsError::*;
        match value {
            Io(e) => e,
            e @ NotFound => io::Error::new(io::ErrorKind::NotFound, e),
            e @ (UnsupportedCompression(_) | UnsupportedFeature) => {
                io::Error::new(io::ErrorKind::Unsupported, e)
            }
            e @ OutOfMemory => io::Error::new(io::ErrorKind::OutOfMemory, e),
            e @ (BadFormat | BadVersion { .. } | BadCompressedData | Corrupt
            | SymlinkDepthExceeded) => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
