//! RLE/Bit packing hybrid encoding.
//!
//! See <https://parquet.apache.org/docs/file-format/data-pages/encodings/#run-length-encoding--bit-packing-hybrid-rle--3>

use bytes::Bytes;
use rayexec_error::{RayexecError, Result};

use super::bitpack::unpack_into;
use super::uleb128::decode_uleb128;

/// Number of values we unpack at a time from a bit packed run.
const UNPACK_BATCH: usize = 32;

/// An RLE/bit packing hybrid decoder.
#[derive(Debug)]
pub struct RleBpDecoder {
    data: Bytes,
    /// Byte position of the next run header or packed group.
    pos: usize,
    /// Bits needed to encode the value.
    bit_width: u8,
    /// Div ceil for how many bytes it takes to encode a single value.
    byte_enc_len: usize,
    /// Current repeated value.
    rle_value: u32,
    /// Remaining number of RLE values in this run.
    rle_left: usize,
    /// Remaining number of bit packed values in this run that haven't been
    /// unpacked yet.
    packed_left: usize,
    /// Values unpacked from the current bit packed run.
    unpacked: [u32; UNPACK_BATCH],
    unpacked_pos: usize,
    unpacked_len: usize,
}

impl RleBpDecoder {
    pub fn new(data: Bytes, bit_width: u8) -> Self {
        assert!(bit_width <= 32);

        RleBpDecoder {
            data,
            pos: 0,
            bit_width,
            byte_enc_len: bit_width.div_ceil(8) as usize,
            rle_value: 0,
            rle_left: 0,
            packed_left: 0,
            unpacked: [0; UNPACK_BATCH],
            unpacked_pos: 0,
            unpacked_len: 0,
        }
    }

    /// Create a decoder for data prefixed with a 4 byte little endian length.
    ///
    /// Returns the decoder along with the total number of bytes it covers,
    /// including the prefix.
    pub fn try_new_length_prefixed(data: &Bytes, bit_width: u8) -> Result<(Self, usize)> {
        let prefix: [u8; 4] = data
            .get(0..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RayexecError::corruption("Missing length prefix for RLE data", 0))?;
        let len = u32::from_le_bytes(prefix) as usize;

        if 4 + len > data.len() {
            return Err(RayexecError::corruption(
                format!(
                    "RLE data length {len} exceeds remaining {} bytes",
                    data.len() - 4
                ),
                0,
            ));
        }

        Ok((Self::new(data.slice(4..4 + len), bit_width), 4 + len))
    }

    pub fn bit_width(&self) -> u8 {
        self.bit_width
    }

    /// Fill `values` with the next decoded values.
    pub fn get_batch(&mut self, values: &mut [u32]) -> Result<()> {
        let mut num_read = 0;

        while num_read < values.len() {
            if self.rle_left > 0 {
                let num_vals = usize::min(values.len() - num_read, self.rle_left);
                values[num_read..(num_read + num_vals)].fill(self.rle_value);

                self.rle_left -= num_vals;
                num_read += num_vals;
            } else if self.unpacked_pos < self.unpacked_len {
                let num_vals =
                    usize::min(values.len() - num_read, self.unpacked_len - self.unpacked_pos);
                values[num_read..(num_read + num_vals)].copy_from_slice(
                    &self.unpacked[self.unpacked_pos..(self.unpacked_pos + num_vals)],
                );

                self.unpacked_pos += num_vals;
                num_read += num_vals;
            } else if self.packed_left > 0 {
                self.unpack_next()?;
            } else {
                self.read_next_run()?;
            }
        }

        Ok(())
    }

    /// Skip the next `count` values.
    pub fn skip(&mut self, mut count: usize) -> Result<()> {
        while count > 0 {
            if self.rle_left > 0 {
                let n = usize::min(count, self.rle_left);
                self.rle_left -= n;
                count -= n;
            } else if self.unpacked_pos < self.unpacked_len {
                let n = usize::min(count, self.unpacked_len - self.unpacked_pos);
                self.unpacked_pos += n;
                count -= n;
            } else if self.packed_left >= UNPACK_BATCH && count >= UNPACK_BATCH {
                // Whole batch can be skipped without unpacking.
                let n = (usize::min(count, self.packed_left) / UNPACK_BATCH) * UNPACK_BATCH;
                self.pos = self.packed_end(n)?;
                self.packed_left -= n;
                count -= n;
            } else if self.packed_left > 0 {
                self.unpack_next()?;
            } else {
                self.read_next_run()?;
            }
        }

        Ok(())
    }

    fn unpack_next(&mut self) -> Result<()> {
        let n = usize::min(UNPACK_BATCH, self.packed_left);
        let end = self.packed_end(n)?;

        unpack_into(
            &self.data[self.pos..end],
            self.bit_width as usize,
            &mut self.unpacked[..n],
        );

        self.pos = end;
        self.packed_left -= n;
        self.unpacked_pos = 0;
        self.unpacked_len = n;

        Ok(())
    }

    /// End position of the next `n` bit packed values.
    ///
    /// Bit packed runs are always multiples of 8 values, so `n` values end on
    /// a byte boundary.
    fn packed_end(&self, n: usize) -> Result<usize> {
        let remaining = self.data.len() - self.pos;
        match n.checked_mul(self.bit_width as usize).map(|bits| bits / 8) {
            Some(len) if len <= remaining => Ok(self.pos + len),
            _ => Err(RayexecError::corruption(
                format!("Bit packed run of {n} values exceeds the {remaining} bytes left"),
                self.pos as u64,
            )),
        }
    }

    fn read_next_run(&mut self) -> Result<()> {
        if self.pos >= self.data.len() {
            return Err(RayexecError::corruption(
                "Unexpected end of RLE/bit packed data",
                self.pos as u64,
            ));
        }

        let (indicator, num_bytes) =
            decode_uleb128(&self.data[self.pos..]).map_err(|e| e.offset_by(self.pos as u64))?;
        self.pos += num_bytes;

        // lsb indicates if it is a literal run or repeated run.
        if indicator & 1 == 1 {
            self.packed_left = usize::try_from(indicator >> 1)
                .ok()
                .and_then(|groups| groups.checked_mul(8))
                .ok_or_else(|| {
                    RayexecError::corruption(
                        format!("Invalid bit packed run length: {indicator}"),
                        self.pos as u64,
                    )
                })?;
            self.unpacked_pos = 0;
            self.unpacked_len = 0;
        } else {
            self.rle_left = (indicator >> 1) as usize;

            let end = self.pos + self.byte_enc_len;
            let bytes = self.data.get(self.pos..end).ok_or_else(|| {
                RayexecError::corruption("Truncated RLE run value", self.pos as u64)
            })?;

            self.rle_value = 0;
            for (idx, &b) in bytes.iter().enumerate() {
                self.rle_value |= (b as u32) << (idx * 8);
            }
            self.pos = end;
        }

        Ok(())
    }
}
