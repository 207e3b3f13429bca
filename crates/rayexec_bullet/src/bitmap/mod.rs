pub mod concat;

use std::borrow::BorrowMut;

/// An LSB ordered bitmap.
///
/// Bits past `len` in the last byte are always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    len: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create a new bitmap with all bits set.
    pub fn new_with_all_true(len: usize) -> Self {
        let mut bitmap = Bitmap::default();
        bitmap.push_n(true, len);
        bitmap
    }

    /// Create a new bitmap with all bits unset.
    pub fn new_with_all_false(len: usize) -> Self {
        Bitmap {
            len,
            data: vec![0; len.div_ceil(8)],
        }
    }

    pub fn from_bool_iter(iter: impl IntoIterator<Item = bool>) -> Self {
        let mut iter = iter.into_iter();

        let mut data = Vec::new();
        let mut len = 0;

        loop {
            let mut byte = 0;
            let mut bit_len = 0;

            for (idx, bit) in iter.borrow_mut().take(8).enumerate() {
                bit_len += 1;
                if bit {
                    byte |= 1 << idx;
                }
            }

            // No more bits, exit loop.
            if bit_len == 0 {
                break;
            }

            // Push byte, continue loop to get next 8 values.
            data.push(byte);
            len += bit_len;
        }

        Bitmap { len, data }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw bytes backing the bitmap.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bits we can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.capacity() * 8
    }

    /// Get the value at index.
    ///
    /// Panics if index is out of bounds.
    pub fn value(&self, idx: usize) -> bool {
        assert!(idx < self.len);
        self.data[idx / 8] & (1 << (idx % 8)) != 0
    }

    /// Set a bit at index.
    pub fn set(&mut self, idx: usize, val: bool) {
        assert!(idx < self.len);
        if val {
            // Set bit.
            self.data[idx / 8] |= 1 << (idx % 8)
        } else {
            // Unset bit
            self.data[idx / 8] &= !(1 << (idx % 8))
        }
    }

    /// Count the number of set bits.
    pub fn popcnt(&self) -> usize {
        // Trailing bits are always zero, so whole bytes can be counted.
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Count the number of set bits in `start..end`.
    pub fn popcnt_range(&self, start: usize, end: usize) -> usize {
        assert!(start <= end && end <= self.len);
        (start..end).filter(|&idx| self.value(idx)).count()
    }

    /// Check if every bit in `start..end` equals `val`.
    pub fn is_all_set(&self, start: usize, end: usize, val: bool) -> bool {
        assert!(start <= end && end <= self.len);
        (start..end).all(|idx| self.value(idx) == val)
    }

    /// Clear the bitmap, keeping the allocation around.
    pub fn clear(&mut self) {
        self.data.clear();
        self.len = 0;
    }

    /// Grow storage so that `additional` more bits fit.
    ///
    /// Capacity at least doubles when we need to reallocate. Existing bytes
    /// are preserved as-is.
    pub fn reserve(&mut self, additional: usize) {
        let needed = (self.len + additional).div_ceil(8);
        if needed > self.data.capacity() {
            let new_cap = usize::max(needed, self.data.capacity() * 2);
            self.data.reserve_exact(new_cap - self.data.len());
        }
    }

    /// Extend the length to `new_len`, zero filling.
    fn grow_to(&mut self, new_len: usize) {
        self.reserve(new_len - self.len);
        self.data.resize(new_len.div_ceil(8), 0);
        self.len = new_len;
    }

    pub fn push(&mut self, val: bool) {
        let idx = self.len;
        self.grow_to(idx + 1);
        if val {
            self.data[idx / 8] |= 1 << (idx % 8);
        }
    }

    /// Push `count` copies of `val`.
    pub fn push_n(&mut self, val: bool, count: usize) {
        let start = self.len;
        self.grow_to(start + count);
        if !val || count == 0 {
            // Storage is already zeroed.
            return;
        }

        let end = start + count;
        let mut idx = start;

        // Leading bits until byte aligned.
        while idx < end && idx % 8 != 0 {
            self.data[idx / 8] |= 1 << (idx % 8);
            idx += 1;
        }

        // Full bytes.
        let full_end = end - (end - idx) % 8;
        self.data[idx / 8..full_end / 8].fill(0xFF);
        idx = full_end;

        // Trailing bits.
        while idx < end {
            self.data[idx / 8] |= 1 << (idx % 8);
            idx += 1;
        }
    }

    /// Append bits `start..end` from `other` to the end of this bitmap.
    pub fn extend_from_range(&mut self, other: &Bitmap, start: usize, end: usize) {
        assert!(start <= end && end <= other.len);

        let count = end - start;
        let dest = self.len;
        self.grow_to(dest + count);

        if dest % 8 == 0 && start % 8 == 0 {
            // Both byte aligned, copy whole bytes then fix up the tail.
            let num_bytes = count / 8;
            self.data[dest / 8..dest / 8 + num_bytes]
                .copy_from_slice(&other.data[start / 8..start / 8 + num_bytes]);
            for idx in (num_bytes * 8)..count {
                if other.value(start + idx) {
                    let dest_idx = dest + idx;
                    self.data[dest_idx / 8] |= 1 << (dest_idx % 8);
                }
            }
            return;
        }

        for idx in 0..count {
            if other.value(start + idx) {
                let dest_idx = dest + idx;
                self.data[dest_idx / 8] |= 1 << (dest_idx % 8);
            }
        }
    }

    /// Get an iterator over the bitmap.
    pub const fn iter(&self) -> BitmapIter {
        BitmapIter {
            idx: 0,
            bitmap: self,
        }
    }

    /// Iterate over the indices of all set bits.
    pub fn index_iter(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        (0..self.len).filter(|&idx| self.value(idx))
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self::from_bool_iter(iter)
    }
}

#[derive(Debug)]
pub struct BitmapIter<'a> {
    idx: usize,
    bitmap: &'a Bitmap,
}

impl<'a> Iterator for BitmapIter<'a> {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.bitmap.len() {
            return None;
        }

        let v = self.bitmap.value(self.idx);
        self.idx += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (
            self.bitmap.len() - self.idx,
            Some(self.bitmap.len() - self.idx),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let bits = [true, false, true, false, true, true, true, true];
        let bm = Bitmap::from_bool_iter(bits);

        assert_eq!(8, bm.len());

        let got: Vec<_> = bm.iter().collect();
        assert_eq!(bits.as_slice(), got);
    }

    #[test]
    fn not_multiple_of_eight() {
        let bits = [
            true, false, true, false, true, true, true, true, //
            true, false, true, false,
        ];
        let bm = Bitmap::from_bool_iter(bits);

        assert_eq!(12, bm.len());

        let got: Vec<_> = bm.iter().collect();
        assert_eq!(bits.as_slice(), got);
    }

    #[test]
    fn set_simple() {
        let bits = [true, false, true, false, true, true, true, true];
        let mut bm = Bitmap::from_bool_iter(bits);

        bm.set(0, false);
        assert!(!bm.value(0));

        bm.set(1, true);
        assert!(bm.value(1));
    }

    #[test]
    fn push_n_unaligned() {
        let mut bm = Bitmap::default();
        bm.push(false);
        bm.push_n(true, 20);
        bm.push_n(false, 3);
        bm.push_n(true, 2);

        assert_eq!(26, bm.len());
        assert!(!bm.value(0));
        assert!(bm.is_all_set(1, 21, true));
        assert!(bm.is_all_set(21, 24, false));
        assert!(bm.is_all_set(24, 26, true));
        assert_eq!(22, bm.popcnt());
    }

    #[test]
    fn extend_from_range_unaligned() {
        let src = Bitmap::from_bool_iter((0..40).map(|i| i % 3 == 0));
        let mut bm = Bitmap::new_with_all_true(5);
        bm.extend_from_range(&src, 7, 33);

        assert_eq!(31, bm.len());
        for idx in 0..26 {
            assert_eq!(src.value(7 + idx), bm.value(5 + idx), "idx: {idx}");
        }
    }

    #[test]
    fn extend_from_range_aligned() {
        let src = Bitmap::from_bool_iter((0..21).map(|i| i % 2 == 0));
        let mut bm = Bitmap::default();
        bm.extend_from_range(&src, 8, 21);

        let expected: Vec<_> = (8..21).map(|i| i % 2 == 0).collect();
        let got: Vec<_> = bm.iter().collect();
        assert_eq!(expected, got);
    }

    #[test]
    fn reserve_doubles() {
        let mut bm = Bitmap::new_with_all_true(64);
        let cap = bm.capacity();
        bm.reserve(cap);
        assert!(bm.capacity() >= cap * 2);
        assert!(bm.is_all_set(0, 64, true));
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut bm = Bitmap::new_with_all_true(100);
        let cap = bm.capacity();
        bm.clear();
        assert_eq!(0, bm.len());
        assert_eq!(cap, bm.capacity());
        bm.push_n(false, 4);
        assert_eq!(0, bm.popcnt());
    }

    #[test]
    fn index_iter_set_bits() {
        let bm = Bitmap::from_bool_iter([false, true, true, false, true]);
        let got: Vec<_> = bm.index_iter().collect();
        assert_eq!(vec![1, 2, 4], got);
        let got: Vec<_> = bm.index_iter().rev().collect();
        assert_eq!(vec![4, 2, 1], got);
    }

    #[test]
    fn popcnt_range_partial() {
        let bm = Bitmap::from_bool_iter([
            true, false, true, true, false, true, true, true, true, false,
        ]);
        assert_eq!(2, bm.popcnt_range(1, 4));
        assert_eq!(7, bm.popcnt_range(0, 10));
        assert_eq!(0, bm.popcnt_range(4, 5));
    }
}
