//! Bit packed booleans as used by the plain encoding.

use bytes::Bytes;
use rayexec_error::{RayexecError, Result};

/// Reads LSB ordered bit packed booleans.
#[derive(Debug)]
pub struct BooleanDecoder {
    data: Bytes,
    bit_pos: usize,
}

impl BooleanDecoder {
    pub fn new(data: Bytes) -> Self {
        BooleanDecoder { data, bit_pos: 0 }
    }

    pub fn decode(&mut self, count: usize, out: &mut Vec<bool>) -> Result<()> {
        self.check_remaining(count)?;
        out.extend((self.bit_pos..self.bit_pos + count).map(|idx| {
            self.data[idx / 8] & (1 << (idx % 8)) != 0
        }));
        self.bit_pos += count;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.check_remaining(count)?;
        self.bit_pos += count;
        Ok(())
    }

    fn check_remaining(&self, count: usize) -> Result<()> {
        if self.bit_pos + count > self.data.len() * 8 {
            return Err(RayexecError::corruption(
                format!("Not enough bit packed booleans to read {count} values"),
                (self.bit_pos / 8) as u64,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_across_bytes() {
        // 0b1010_0101, 0b0000_0011
        let mut dec = BooleanDecoder::new(Bytes::from_static(&[0xA5, 0x03]));
        let mut out = Vec::new();

        dec.skip(2).unwrap();
        dec.decode(8, &mut out).unwrap();
        assert_eq!(
            vec![true, false, false, true, false, true, true, true],
            out
        );

        let err = dec.decode(7, &mut out).unwrap_err();
        assert!(err.is_corruption());
    }
}
