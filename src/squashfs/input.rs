use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Mutex;

use super::error::{Result, SquashfsError};

/// Byte source holding a SquashFS image.
///
/// All reads are absolute-positional and carry no stream state, so one
/// implementation may be shared by any number of reader threads. Error text
/// travels inside the returned [`io::Error`].
pub trait Input: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`, returning the number of
    /// bytes read. A short count past the first call means end of input.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether the backend supports cheap random access. Purely advisory.
    fn seekable(&self) -> bool {
        true
    }
}

impl Input for File {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

/// An image held entirely in memory.
impl Input for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        if offset >= self.len() {
            return Ok(0);
        }
        let take = buf.len().min(self.len() - offset);
        buf[..take].copy_from_slice(&self[offset..offset + take]);
        Ok(take)
    }
}

/// Adapter presenting the positional interface over a plain `Read + Seek`
/// backend. The seek and read pair is serialized under an internal lock.
#[derive(Debug)]
pub struct StreamInput<R> {
    inner: Mutex<R>,
}

impl<R: Read + Seek> StreamInput<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner().unwrap()
    }
}

impl<R: Read + Seek + Send> Input for StreamInput<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.seek(SeekFrom::Start(offset))?;
        inner.read(buf)
    }

    fn seekable(&self) -> bool {
        false
    }
}

/// Fill `buf` from `offset`, treating a short read as a truncated image.
pub(crate) fn read_exact_at<I: Input + ?Sized>(
    input: &I,
    mut offset: u64,
    mut buf: &mut [u8],
) -> Result<()> {
    while !buf.is_empty() {
        match input.read_at(offset, buf) {
            Ok(0) => {
                return Err(SquashfsError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read, truncated squashfs image",
                )))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(SquashfsError::Io(e)),
        }
    }
    Ok(())
}
