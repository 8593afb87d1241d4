use std::io::Read;

#[cfg(feature = "flate2")]
use flate2::read::ZlibDecoder;

#[cfg(feature = "lzma-rs")]
use lzma_rs::xz_decompress;

#[cfg(feature = "ruzstd")]
use ruzstd::decoding::StreamingDecoder;

use super::error::{Result, SquashfsError};
use super::superblock::Compressor;

/// Whether the given compression method was compiled into this build.
pub(crate) fn supported(comp: Compressor) -> bool {
    match comp {
        #[cfg(feature = "flate2")]
        Compressor::Gzip => true,
        #[cfg(feature = "lzma-rs")]
        Compressor::Xz => true,
        #[cfg(feature = "ruzstd")]
        Compressor::Zstd => true,
        _ => false,
    }
}

/// Decompress one block into a fresh buffer of at most `limit` bytes.
///
/// Block sizes are fixed maxima in the format, so producing more than
/// `limit` bytes can only mean a corrupt stream.
pub(crate) fn decompress(comp: Compressor, src: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(limit)
        .map_err(|_| SquashfsError::OutOfMemory)?;

    match comp {
        #[cfg(feature = "flate2")]
        Compressor::Gzip => {
            let mut dec = ZlibDecoder::new(src).take(limit as u64 + 1);
            dec.read_to_end(&mut out)
                .map_err(|_| SquashfsError::BadCompressedData)?;
        }
        #[cfg(feature = "lzma-rs")]
        Compressor::Xz => {
            let mut input = src;
            xz_decompress(&mut input, &mut out)
                .map_err(|_| SquashfsError::BadCompressedData)?;
        }
        #[cfg(feature = "ruzstd")]
        Compressor::Zstd => {
            let dec =
                StreamingDecoder::new(src).map_err(|_| SquashfsError::BadCompressedData)?;
            dec.take(limit as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|_| SquashfsError::BadCompressedData)?;
        }
        _ => return Err(SquashfsError::UnsupportedCompression(comp)),
    }

    if out.len() > limit {
        return Err(SquashfsError::BadCompressedData);
    }
    Ok(out)
}
