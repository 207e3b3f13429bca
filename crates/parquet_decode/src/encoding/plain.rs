//! Plain encoding for fixed width and byte array values.

use bytes::Bytes;
use rayexec_error::{RayexecError, Result};

/// Reads plain encoded values sequentially from a buffer.
#[derive(Debug)]
pub struct PlainDecoder {
    data: Bytes,
    pos: usize,
}

impl PlainDecoder {
    pub fn new(data: Bytes) -> Self {
        PlainDecoder { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Decode `count` fixed width values, converting each from its little
    /// endian bytes.
    pub fn decode_fixed<T, const N: usize>(
        &mut self,
        count: usize,
        out: &mut Vec<T>,
        from_le: impl Fn([u8; N]) -> T,
    ) -> Result<()> {
        let buf = self.take(count * N)?;
        out.extend(buf.chunks_exact(N).map(|chunk| {
            let mut bytes = [0; N];
            bytes.copy_from_slice(chunk);
            from_le(bytes)
        }));
        Ok(())
    }

    pub fn skip_fixed(&mut self, count: usize, width: usize) -> Result<()> {
        self.take(count * width)?;
        Ok(())
    }

    /// Read a single length prefixed byte array.
    ///
    /// The returned value shares the underlying buffer.
    pub fn next_byte_array(&mut self) -> Result<Bytes> {
        let prefix = self.take(4)?;
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let start = self.pos;
        self.take(len)?;
        Ok(self.data.slice(start..start + len))
    }

    pub fn skip_byte_arrays(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            let prefix = self.take(4)?;
            let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            self.take(len)?;
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if len > self.remaining() {
            return Err(RayexecError::corruption(
                format!(
                    "Plain data needs {len} bytes, only {} remaining",
                    self.remaining()
                ),
                self.pos as u64,
            ));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }
}
