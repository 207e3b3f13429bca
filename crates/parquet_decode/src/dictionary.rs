use bytes::Bytes;
use rayexec_error::{not_implemented, RayexecError, Result};

use crate::types::PhysicalType;

/// Decoded dictionary values for a single column chunk.
///
/// Holds a view of the (uncompressed) dictionary page. Values are plain
/// encoded, lookups decode on access.
#[derive(Debug, Clone)]
pub struct DictionaryStore {
    physical_type: PhysicalType,
    data: Bytes,
    num_values: usize,
    /// Byte ranges of each value in `data`, only populated for byte arrays.
    ranges: Vec<(usize, usize)>,
}

impl DictionaryStore {
    /// Create a dictionary from the plain encoded values of a dictionary page.
    ///
    /// Errors are corruption errors relative to the start of `data`.
    pub fn try_new(physical_type: PhysicalType, data: Bytes, num_values: usize) -> Result<Self> {
        let mut ranges = Vec::new();

        match physical_type {
            PhysicalType::Boolean => not_implemented!("Dictionary encoded booleans"),
            PhysicalType::ByteArray => {
                // Every value has at least its 4 byte length prefix.
                if num_values > data.len() / 4 {
                    return Err(RayexecError::corruption(
                        format!(
                            "Dictionary page has {} bytes, too few for {num_values} values",
                            data.len()
                        ),
                        0,
                    ));
                }
                ranges.reserve(num_values);
                let mut pos = 0;
                for _ in 0..num_values {
                    let prefix: [u8; 4] = data
                        .get(pos..pos + 4)
                        .and_then(|b| b.try_into().ok())
                        .ok_or_else(|| {
                            RayexecError::corruption(
                                "Truncated dictionary value length",
                                pos as u64,
                            )
                        })?;
                    let len = u32::from_le_bytes(prefix) as usize;
                    let start = pos + 4;
                    if start + len > data.len() {
                        return Err(RayexecError::corruption(
                            "Dictionary value exceeds dictionary page",
                            pos as u64,
                        ));
                    }
                    ranges.push((start, start + len));
                    pos = start + len;
                }
            }
            other => {
                // Fixed width, checked above for booleans and byte arrays.
                let width = other.fixed_width().unwrap_or(0);
                let needed = width.checked_mul(num_values);
                if needed.map(|needed| needed > data.len()).unwrap_or(true) {
                    return Err(RayexecError::corruption(
                        format!(
                            "Dictionary page has {} bytes, too few for {num_values} values of width {width}",
                            data.len(),
                        ),
                        0,
                    ));
                }
            }
        }

        Ok(DictionaryStore {
            physical_type,
            data,
            num_values,
            ranges,
        })
    }

    pub fn len(&self) -> usize {
        self.num_values
    }

    pub fn is_empty(&self) -> bool {
        self.num_values == 0
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    /// Get a fixed width value at `idx`.
    pub fn fixed<const N: usize>(&self, idx: usize) -> Result<[u8; N]> {
        self.check_index(idx)?;
        let bytes = self.data.get(idx * N..idx * N + N).ok_or_else(|| {
            RayexecError::corruption("Dictionary value out of bounds", (idx * N) as u64)
        })?;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Get a byte array value at `idx`, sharing the dictionary's buffer.
    pub fn byte_array(&self, idx: usize) -> Result<Bytes> {
        self.check_index(idx)?;
        let (start, end) = self.ranges[idx];
        Ok(self.data.slice(start..end))
    }

    /// Check that every index in `indices` is in range.
    pub fn validate_indices(&self, indices: &[u32]) -> Result<()> {
        match indices.iter().max() {
            Some(&max) => self.check_index(max as usize),
            None => Ok(()),
        }
    }

    fn check_index(&self, idx: usize) -> Result<()> {
        if idx >= self.num_values {
            return Err(RayexecError::corruption(
                format!(
                    "Dictionary index {idx} out of range for dictionary with {} values",
                    self.num_values
                ),
                0,
            ));
        }
        Ok(())
    }
}
