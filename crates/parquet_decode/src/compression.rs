//! Decompression of page data.
//!
//! Codec implementations live in external crates, each behind a feature flag.

use std::fmt::Debug;

use rayexec_error::{not_implemented, RayexecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
    Lz4Raw,
}

impl CompressionCodec {
    /// Get the codec for its thrift id.
    pub fn try_from_thrift(id: i32) -> Result<Self> {
        Ok(match id {
            0 => Self::Uncompressed,
            1 => Self::Snappy,
            2 => Self::Gzip,
            3 => Self::Lzo,
            4 => Self::Brotli,
            5 => Self::Lz4,
            6 => Self::Zstd,
            7 => Self::Lz4Raw,
            other => not_implemented!("compression codec id {other}"),
        })
    }
}

/// Decompresses page data.
pub trait Decompressor: Debug + Send + Sync {
    /// Decompress `input` onto the end of `output`.
    ///
    /// `uncompressed_size` is the size recorded in the page header.
    fn decompress(
        &self,
        codec: CompressionCodec,
        input: &[u8],
        uncompressed_size: usize,
        output: &mut Vec<u8>,
    ) -> Result<()>;
}

/// Decompressor backed by the codec crates enabled at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecompressor;

impl Decompressor for DefaultDecompressor {
    fn decompress(
        &self,
        codec: CompressionCodec,
        input: &[u8],
        uncompressed_size: usize,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        let start = output.len();

        match codec {
            CompressionCodec::Uncompressed => output.extend_from_slice(input),
            CompressionCodec::Snappy => decompress_snappy(input, uncompressed_size, output)?,
            CompressionCodec::Gzip => decompress_gzip(input, uncompressed_size, output)?,
            CompressionCodec::Brotli => decompress_brotli(input, uncompressed_size, output)?,
            CompressionCodec::Zstd => decompress_zstd(input, uncompressed_size, output)?,
            CompressionCodec::Lz4Raw => decompress_lz4_raw(input, uncompressed_size, output)?,
            CompressionCodec::Lzo => not_implemented!("LZO decompression"),
            CompressionCodec::Lz4 => not_implemented!("Legacy LZ4 decompression"),
        }

        let written = output.len() - start;
        if written != uncompressed_size {
            return Err(RayexecError::corruption(
                format!(
                    "Decompressed {written} bytes, page header says {uncompressed_size}"
                ),
                0,
            ));
        }

        Ok(())
    }
}

/// Upper bound for reserving output space up front. Sizes come from page
/// headers and can't be trusted, larger outputs grow as they're written.
const MAX_RESERVE: usize = 16 * 1024 * 1024;

/// Maximum compression ratio of an LZ4 block.
#[cfg(feature = "lz4")]
const LZ4_MAX_RATIO: usize = 255;

/// Map a codec error to a corruption error. The offset is relative to the
/// compressed input, callers rebase it.
fn corrupt<E>(msg: &'static str) -> impl FnOnce(E) -> RayexecError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |e| RayexecError::corruption_with_source(msg, 0, Box::new(e))
}

/// Read all of `reader` onto `output`, stopping one byte past the expected
/// size so a mismatch is still detected.
fn read_bounded(
    reader: impl std::io::Read,
    uncompressed_size: usize,
    output: &mut Vec<u8>,
    msg: &'static str,
) -> Result<()> {
    use std::io::Read;

    output.reserve(usize::min(uncompressed_size, MAX_RESERVE));
    reader
        .take(uncompressed_size as u64 + 1)
        .read_to_end(output)
        .map_err(corrupt(msg))?;
    Ok(())
}

#[cfg(feature = "snap")]
fn decompress_snappy(input: &[u8], uncompressed_size: usize, output: &mut Vec<u8>) -> Result<()> {
    let len = snap::raw::decompress_len(input).map_err(corrupt("Invalid snappy header"))?;
    if len != uncompressed_size {
        return Err(RayexecError::corruption(
            format!("Snappy data decompresses to {len} bytes, page header says {uncompressed_size}"),
            0,
        ));
    }

    let start = output.len();
    output.resize(start + len, 0);
    let n = snap::raw::Decoder::new()
        .decompress(input, &mut output[start..])
        .map_err(corrupt("Failed to decompress snappy data"))?;
    output.truncate(start + n);
    Ok(())
}

#[cfg(not(feature = "snap"))]
fn decompress_snappy(_input: &[u8], _size: usize, _output: &mut Vec<u8>) -> Result<()> {
    not_implemented!("Snappy decompression requires the 'snap' feature")
}

#[cfg(feature = "flate2")]
fn decompress_gzip(input: &[u8], uncompressed_size: usize, output: &mut Vec<u8>) -> Result<()> {
    read_bounded(
        flate2::read::MultiGzDecoder::new(input),
        uncompressed_size,
        output,
        "Failed to decompress gzip data",
    )
}

#[cfg(not(feature = "flate2"))]
fn decompress_gzip(_input: &[u8], _size: usize, _output: &mut Vec<u8>) -> Result<()> {
    not_implemented!("Gzip decompression requires the 'flate2' feature")
}

#[cfg(feature = "brotli")]
fn decompress_brotli(input: &[u8], uncompressed_size: usize, output: &mut Vec<u8>) -> Result<()> {
    const BROTLI_BUFFER_SIZE: usize = 4096;

    read_bounded(
        brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE),
        uncompressed_size,
        output,
        "Failed to decompress brotli data",
    )
}

#[cfg(not(feature = "brotli"))]
fn decompress_brotli(_input: &[u8], _size: usize, _output: &mut Vec<u8>) -> Result<()> {
    not_implemented!("Brotli decompression requires the 'brotli' feature")
}

#[cfg(feature = "zstd")]
fn decompress_zstd(input: &[u8], uncompressed_size: usize, output: &mut Vec<u8>) -> Result<()> {
    let decoder = zstd::Decoder::new(input).map_err(corrupt("Failed to create zstd decoder"))?;
    read_bounded(
        decoder,
        uncompressed_size,
        output,
        "Failed to decompress zstd data",
    )
}

#[cfg(not(feature = "zstd"))]
fn decompress_zstd(_input: &[u8], _size: usize, _output: &mut Vec<u8>) -> Result<()> {
    not_implemented!("Zstd decompression requires the 'zstd' feature")
}

#[cfg(feature = "lz4")]
fn decompress_lz4_raw(input: &[u8], uncompressed_size: usize, output: &mut Vec<u8>) -> Result<()> {
    if uncompressed_size > input.len().saturating_mul(LZ4_MAX_RATIO) {
        return Err(RayexecError::corruption(
            format!(
                "LZ4 block of {} bytes can't decompress to {uncompressed_size} bytes",
                input.len()
            ),
            0,
        ));
    }

    let start = output.len();
    output.resize(start + uncompressed_size, 0);
    let n = lz4_flex::block::decompress_into(input, &mut output[start..])
        .map_err(corrupt("Failed to decompress lz4 data"))?;
    output.truncate(start + n);
    Ok(())
}

#[cfg(not(feature = "lz4"))]
fn decompress_lz4_raw(_input: &[u8], _size: usize, _output: &mut Vec<u8>) -> Result<()> {
    not_implemented!("LZ4 decompression requires the 'lz4' feature")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const DATA: &[u8] = b"aaaaaaaaaabbbbbbbbbbaaaaaaaaaabbbbbbbbbbccccc";

    #[test]
    fn snappy() {
        let compressed = snap::raw::Encoder::new().compress_vec(DATA).unwrap();
        let mut out = Vec::new();
        DefaultDecompressor
            .decompress(CompressionCodec::Snappy, &compressed, DATA.len(), &mut out)
            .unwrap();
        assert_eq!(DATA, out.as_slice());
    }

    #[test]
    fn gzip_appends() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(DATA).unwrap();
        let compressed = enc.finish().unwrap();

        let mut out = vec![1, 2];
        DefaultDecompressor
            .decompress(CompressionCodec::Gzip, &compressed, DATA.len(), &mut out)
            .unwrap();
        assert_eq!(&[1, 2], &out[..2]);
        assert_eq!(DATA, &out[2..]);
    }

    #[test]
    fn zstd() {
        let compressed = zstd::encode_all(DATA, 3).unwrap();
        let mut out = Vec::new();
        DefaultDecompressor
            .decompress(CompressionCodec::Zstd, &compressed, DATA.len(), &mut out)
            .unwrap();
        assert_eq!(DATA, out.as_slice());
    }

    #[test]
    fn size_mismatch_is_corruption() {
        let mut out = Vec::new();
        let err = DefaultDecompressor
            .decompress(CompressionCodec::Uncompressed, DATA, DATA.len() + 1, &mut out)
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn corrupt_payloads_are_corruption() {
        let garbage = [0xFF; 8];
        for codec in [
            CompressionCodec::Snappy,
            CompressionCodec::Gzip,
            CompressionCodec::Zstd,
        ] {
            let mut out = Vec::new();
            let err = DefaultDecompressor
                .decompress(codec, &garbage, 16, &mut out)
                .unwrap_err();
            assert!(err.is_corruption(), "{codec:?}: {err}");
            assert_eq!(Some(0), err.offset());
        }
    }

    #[test]
    fn snappy_size_from_header_checked() {
        let compressed = snap::raw::Encoder::new().compress_vec(DATA).unwrap();
        let mut out = Vec::new();
        let err = DefaultDecompressor
            .decompress(CompressionCodec::Snappy, &compressed, i32::MAX as usize, &mut out)
            .unwrap_err();
        assert!(err.is_corruption());
        assert!(out.capacity() < 1024);
    }

    #[test]
    fn gzip_output_larger_than_header() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&[0; 4096]).unwrap();
        let compressed = enc.finish().unwrap();

        let mut out = Vec::new();
        let err = DefaultDecompressor
            .decompress(CompressionCodec::Gzip, &compressed, 100, &mut out)
            .unwrap_err();
        assert!(err.is_corruption());
        assert!(out.len() <= 101);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn lz4_size_beyond_max_ratio() {
        let mut out = Vec::new();
        let err = DefaultDecompressor
            .decompress(CompressionCodec::Lz4Raw, &[0; 2], 10_000, &mut out)
            .unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn lzo_not_implemented() {
        let mut out = Vec::new();
        let err = DefaultDecompressor
            .decompress(CompressionCodec::Lzo, DATA, DATA.len(), &mut out)
            .unwrap_err();
        assert!(err.is_not_implemented());

        let err = CompressionCodec::try_from_thrift(42).unwrap_err();
        assert!(err.is_not_implemented());
    }
}
