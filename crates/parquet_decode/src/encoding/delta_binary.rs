//! Decoder for delta encoding.
//!
//! See <https://github.com/apache/parquet-format/blob/master/Encodings.md#delta-encoding-delta_binary_packed--5>

use rayexec_error::{RayexecError, Result};

use super::bitpack::{packed_len, unpack_into};
use super::uleb128::{decode_uleb128, decode_zigzag_uleb128};

/// Decodes a whole page of delta encoded integers up front, then hands them
/// out sequentially.
///
/// Arithmetic is done on i64 with wrapping. Truncating the results gives the
/// correct values for INT32 columns as well.
#[derive(Debug)]
pub struct DeltaBinaryDecoder {
    values: Vec<i64>,
    pos: usize,
}

impl DeltaBinaryDecoder {
    /// Try to create a new decoder, decoding all values in `buf`.
    ///
    /// `buf` should be the value section of the page.
    pub fn try_new(buf: &[u8]) -> Result<Self> {
        let mut reader = Reader { buf, pos: 0 };

        // Header (all uleb128)
        // <block size in values> <number of miniblocks in a block>
        // <total value count> <first value>
        let block_size = reader.uleb()? as usize;
        let miniblocks_per_block = reader.uleb()? as usize;
        let total_values = reader.uleb()? as usize;
        let first_value = reader.zigzag()?;

        if block_size == 0 || block_size % 128 != 0 {
            return Err(RayexecError::corruption(
                format!("Expected block size to be multiple of 128, got {block_size}"),
                0,
            ));
        }
        if miniblocks_per_block == 0 || block_size % miniblocks_per_block != 0 {
            return Err(RayexecError::corruption(
                format!("Block size {block_size} not divisible into {miniblocks_per_block} miniblocks"),
                0,
            ));
        }
        let values_per_miniblock = block_size / miniblocks_per_block;
        if values_per_miniblock % 32 != 0 {
            return Err(RayexecError::corruption(
                format!("Expected values per miniblock to be multiple of 32, got {values_per_miniblock}"),
                0,
            ));
        }

        // Don't trust the header for the allocation size.
        let mut values = Vec::with_capacity(usize::min(total_values, 1 << 16));
        if total_values > 0 {
            values.push(first_value);
        }

        let mut deltas = vec![0u64; values_per_miniblock];
        let mut previous = first_value;

        while values.len() < total_values {
            let min_delta = reader.zigzag()?;
            let bit_widths = reader.take(miniblocks_per_block)?;

            for &bit_width in bit_widths {
                // Blocks may list widths for miniblocks that hold no values.
                let remaining = total_values - values.len();
                if remaining == 0 {
                    break;
                }
                if bit_width > 64 {
                    return Err(RayexecError::corruption(
                        format!("Invalid miniblock bit width: {bit_width}"),
                        reader.pos as u64,
                    ));
                }

                let bit_width = bit_width as usize;
                let num_bytes = packed_len(values_per_miniblock, bit_width);
                // Trailing padding of the final miniblock may be omitted.
                let packed = reader.take_up_to(num_bytes);
                unpack_into(packed, bit_width, &mut deltas);

                for &delta in deltas.iter().take(remaining) {
                    previous = previous.wrapping_add(min_delta).wrapping_add(delta as i64);
                    values.push(previous);
                }
            }
        }

        Ok(DeltaBinaryDecoder { values, pos: 0 })
    }

    pub fn remaining(&self) -> usize {
        self.values.len() - self.pos
    }

    /// Get the next `count` values.
    pub fn next_values(&mut self, count: usize) -> Result<&[i64]> {
        self.check_remaining(count)?;
        let start = self.pos;
        self.pos += count;
        Ok(&self.values[start..self.pos])
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.check_remaining(count)?;
        self.pos += count;
        Ok(())
    }

    fn check_remaining(&self, count: usize) -> Result<()> {
        if count > self.remaining() {
            return Err(RayexecError::corruption(
                format!(
                    "Requested {count} delta values, only {} remaining",
                    self.remaining()
                ),
                0,
            ));
        }
        Ok(())
    }
}

/// Cursor over the raw delta encoded buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn uleb(&mut self) -> Result<u64> {
        let (v, n) =
            decode_uleb128(&self.buf[self.pos..]).map_err(|e| e.offset_by(self.pos as u64))?;
        self.pos += n;
        Ok(v)
    }

    fn zigzag(&mut self) -> Result<i64> {
        let (v, n) =
            decode_zigzag_uleb128(&self.buf[self.pos..]).map_err(|e| e.offset_by(self.pos as u64))?;
        self.pos += n;
        Ok(v)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let out = self.buf.get(self.pos..self.pos + len).ok_or_else(|| {
            RayexecError::corruption("Truncated delta encoded block", self.pos as u64)
        })?;
        self.pos += len;
        Ok(out)
    }

    fn take_up_to(&mut self, len: usize) -> &'a [u8] {
        let end = usize::min(self.pos + len, self.buf.len());
        let out = &self.buf[self.pos..end];
        self.pos = end;
        out
    }
}
