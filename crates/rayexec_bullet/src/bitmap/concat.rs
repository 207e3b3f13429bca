use std::sync::Arc;

use super::Bitmap;

/// Concatenates runs of bits from multiple sources into a single bitmap.
///
/// Mostly used for stitching together null flags from different pages. Storage
/// is only allocated once a run that isn't all set is appended. If everything
/// appended between two resets was set, `finish` returns None, which callers
/// treat as "no nulls".
#[derive(Debug, Default)]
pub struct BitConcatenation {
    /// Materialized bits, None while every appended bit has been set.
    bitmap: Option<Bitmap>,
    /// Storage handed to us on reset, used when we need to materialize.
    spare: Option<Bitmap>,
    /// Total bits appended since the last reset.
    num_bits: usize,
}

impl BitConcatenation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new logical bitmap.
    ///
    /// `buffer` is a previous output. Its storage is reused only if we're the
    /// sole owner, otherwise it's left to whoever else holds on to it.
    pub fn reset(&mut self, buffer: Option<Arc<Bitmap>>) {
        self.num_bits = 0;
        self.bitmap = None;

        let reusable = buffer.and_then(|buf| Arc::try_unwrap(buf).ok());
        self.spare = match reusable {
            Some(mut bitmap) => {
                bitmap.clear();
                Some(bitmap)
            }
            None => self.spare.take().map(|mut bitmap| {
                bitmap.clear();
                bitmap
            }),
        };
    }

    /// Append `count` set bits.
    pub fn append_ones(&mut self, count: usize) {
        if let Some(bitmap) = &mut self.bitmap {
            bitmap.push_n(true, count);
        }
        self.num_bits += count;
    }

    /// Append bits `start..end` from `source`.
    pub fn append(&mut self, source: &Bitmap, start: usize, end: usize) {
        if self.bitmap.is_none() && source.is_all_set(start, end, true) {
            self.append_ones(end - start);
            return;
        }

        let bitmap = self.materialize();
        bitmap.extend_from_range(source, start, end);
        self.num_bits += end - start;
    }

    /// Total number of bits appended since the last reset, whether or not
    /// they've been materialized.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Take the concatenated bitmap.
    ///
    /// Returns None if every bit appended was set.
    pub fn finish(&mut self) -> Option<Arc<Bitmap>> {
        self.bitmap.take().map(Arc::new)
    }

    fn materialize(&mut self) -> &mut Bitmap {
        let num_bits = self.num_bits;
        let spare = &mut self.spare;
        self.bitmap.get_or_insert_with(|| {
            // Retroactively write out the ones we've been deferring.
            let mut bitmap = spare.take().unwrap_or_default();
            bitmap.push_n(true, num_bits);
            bitmap
        })
    }
}
