//! Dictionary indices, a bit width byte followed by RLE/bit packed data.

use bytes::Bytes;
use rayexec_error::{RayexecError, Result};

use super::rle_bp::RleBpDecoder;

#[derive(Debug)]
pub struct DictIndexDecoder {
    decoder: RleBpDecoder,
}

impl DictIndexDecoder {
    pub fn try_new(data: Bytes) -> Result<Self> {
        let bit_width = *data
            .first()
            .ok_or_else(|| RayexecError::corruption("Missing dictionary index bit width", 0))?;
        if bit_width > 32 {
            return Err(RayexecError::corruption(
                format!("Invalid dictionary index bit width: {bit_width}"),
                0,
            ));
        }

        Ok(DictIndexDecoder {
            decoder: RleBpDecoder::new(data.slice(1..), bit_width),
        })
    }

    /// Decode the next `count` indices into `out`, replacing its contents.
    pub fn decode(&mut self, count: usize, out: &mut Vec<u32>) -> Result<()> {
        out.clear();
        out.resize(count, 0);
        // Offsets from the inner decoder don't account for the width byte.
        self.decoder.get_batch(out).map_err(|e| e.offset_by(1))
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.decoder.skip(count).map_err(|e| e.offset_by(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RleBpEncoder;

    #[test]
    fn decode_indices() {
        let mut enc = RleBpEncoder::new(2);
        enc.put_literal(&[0, 1, 2, 3, 3, 2, 1, 0]);
        enc.put_run(2, 3);

        let mut data = vec![2];
        data.extend_from_slice(&enc.finish());
        let mut dec = DictIndexDecoder::try_new(Bytes::from(data)).unwrap();

        let mut out = Vec::new();
        dec.skip(2).unwrap();
        dec.decode(8, &mut out).unwrap();
        assert_eq!(vec![2, 3, 3, 2, 1, 0, 2, 2], out);
    }

    #[test]
    fn bad_bit_width() {
        let err = DictIndexDecoder::try_new(Bytes::from_static(&[33, 0])).unwrap_err();
        assert!(err.is_corruption());
    }
}
