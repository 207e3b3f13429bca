pub mod unpack;

use num::PrimInt;
use unpack::{unpack32, unpack64};

pub trait BitPackable: PrimInt + Default {
    /// Number of values unpacked at a time.
    const LANES: usize;

    type PackedArray: AsRef<[Self]>;

    fn zero_packed_array() -> Self::PackedArray;

    /// Unpacks `LANES` bitpacked values into `output`.
    fn unpack(input: &[u8], num_bits: usize, output: &mut Self::PackedArray);
}

impl BitPackable for u32 {
    const LANES: usize = 32;
    type PackedArray = [u32; 32];

    fn zero_packed_array() -> Self::PackedArray {
        [0; 32]
    }

    fn unpack(input: &[u8], num_bits: usize, output: &mut Self::PackedArray) {
        unpack32(input, output, num_bits)
    }
}

impl BitPackable for u64 {
    const LANES: usize = 64;
    type PackedArray = [u64; 64];

    fn zero_packed_array() -> Self::PackedArray {
        [0; 64]
    }

    fn unpack(input: &[u8], num_bits: usize, output: &mut Self::PackedArray) {
        unpack64(input, output, num_bits)
    }
}

/// Unpack `out.len()` values that are `num_bits` wide from the start of
/// `input`.
///
/// Input that runs out early is treated as zero padded, writers are allowed to
/// omit the padding of a final bit packed group.
pub fn unpack_into<T: BitPackable>(input: &[u8], num_bits: usize, out: &mut [T]) {
    // Fits 64 lanes of 64 bits.
    let mut padded = [0u8; 512];
    let mut packed = T::zero_packed_array();
    let chunk_bytes = T::LANES * num_bits / 8;

    for (chunk_idx, out_chunk) in out.chunks_mut(T::LANES).enumerate() {
        let start = chunk_idx * chunk_bytes;
        let src = match input.get(start..start + chunk_bytes) {
            Some(src) => src,
            None => {
                let avail = input.get(start..).unwrap_or_default();
                padded[..chunk_bytes].fill(0);
                padded[..avail.len()].copy_from_slice(avail);
                &padded[..chunk_bytes]
            }
        };

        T::unpack(src, num_bits, &mut packed);
        out_chunk.copy_from_slice(&packed.as_ref()[..out_chunk.len()]);
    }
}

/// Number of bytes needed to bit pack `num_values` values of `num_bits` each.
pub const fn packed_len(num_values: usize, num_bits: usize) -> usize {
    (num_values * num_bits).div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pack_bits;

    #[test]
    fn unpack_u32_width_5() {
        let values: Vec<u64> = (0..32).collect();
        let packed = pack_bits(&values, 5);
        assert_eq!(20, packed.len());

        let mut out = [0u32; 32];
        unpack_into(&packed, 5, &mut out);
        let expected: Vec<u32> = (0..32).collect();
        assert_eq!(expected.as_slice(), out.as_slice());
    }

    #[test]
    fn unpack_partial_chunk_short_input() {
        // 10 values at 3 bits, input not padded out to a full 32 value chunk.
        let values: Vec<u64> = (0..10).map(|v| v % 8).collect();
        let packed = pack_bits(&values, 3);

        let mut out = [0u32; 10];
        unpack_into(&packed, 3, &mut out);
        let expected: Vec<u32> = values.iter().map(|&v| v as u32).collect();
        assert_eq!(expected.as_slice(), out.as_slice());
    }

    #[test]
    fn unpack_u64_wide() {
        let values: Vec<u64> = (0..70).map(|v| (v as u64) << 40 | 0xAB).collect();
        let packed = pack_bits(&values, 47);

        let mut out = vec![0u64; 70];
        unpack_into(&packed, 47, &mut out);
        assert_eq!(values, out);
    }

    #[test]
    fn unpack_zero_width() {
        let mut out = [7u32; 12];
        unpack_into(&[], 0, &mut out);
        assert_eq!([0; 12], out);
    }
}
