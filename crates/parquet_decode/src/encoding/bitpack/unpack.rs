//! Unpacking of bit packed values into fixed size lanes.
use num::traits::FromBytes;
use num::PrimInt;

pub fn unpack32(input: &[u8], output: &mut [u32; 32], num_bits: usize) {
    unpack_jump::<u32, 4, 32>(input, output, num_bits);
}

pub fn unpack64(input: &[u8], output: &mut [u64; 64], num_bits: usize) {
    unpack_jump::<u64, 8, 64>(input, output, num_bits);
}

/// Unpack `BITS` values that are `NUM_BITS` wide.
///
/// Input is read as little endian words of `BYTES` bytes, and must contain at
/// least `NUM_BITS` words.
fn unpack<const NUM_BITS: usize, T, const BYTES: usize, const BITS: usize>(
    input: &[u8],
    output: &mut [T; BITS],
) where
    T: PrimInt + FromBytes<Bytes = [u8; BYTES]>,
{
    if NUM_BITS == 0 {
        output.fill(T::zero());
        return;
    }

    assert!(NUM_BITS <= BITS);
    assert!(input.len() >= NUM_BITS * BYTES);

    let mask = if NUM_BITS == BITS {
        T::max_value()
    } else {
        (T::one() << NUM_BITS) - T::one()
    };

    for (i, out) in output.iter_mut().enumerate() {
        let start_bit = i * NUM_BITS;
        let end_bit = start_bit + NUM_BITS;

        let start_word = start_bit / BITS;
        let end_word = end_bit / BITS;
        let start_offset = start_bit % BITS;
        let end_offset = end_bit % BITS;

        let low = read_word::<T, BYTES>(start_word, input) >> start_offset;
        *out = if start_word != end_word && end_offset != 0 {
            // Value straddles two words.
            let high = read_word::<T, BYTES>(end_word, input) << (NUM_BITS - end_offset);
            low | (high & mask)
        } else {
            low & mask
        };
    }
}

fn read_word<T, const BYTES: usize>(idx: usize, bytes: &[u8]) -> T
where
    T: FromBytes<Bytes = [u8; BYTES]>,
{
    let mut word = [0; BYTES];
    word.copy_from_slice(&bytes[idx * BYTES..idx * BYTES + BYTES]);
    T::from_le_bytes(&word)
}

macro_rules! unpack_arms {
    ($num_bits:expr, $input:expr, $output:expr, $($n:literal)*) => {
        match $num_bits {
            $($n => unpack::<$n, T, BYTES, BITS>($input, $output),)*
            other => panic!("Unsupported bit width: {other}"),
        }
    };
}

fn unpack_jump<T, const BYTES: usize, const BITS: usize>(
    input: &[u8],
    output: &mut [T; BITS],
    num_bits: usize,
) where
    T: PrimInt + FromBytes<Bytes = [u8; BYTES]>,
{
    unpack_arms!(
        num_bits, input, output,
        0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16
        17 18 19 20 21 22 23 24 25 26 27 28 29 30 31 32
        33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48
        49 50 51 52 53 54 55 56 57 58 59 60 61 62 63 64
    )
}
