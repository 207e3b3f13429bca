use rayexec_error::{RayexecError, Result};

use crate::array::Array;
use crate::scalar::ScalarValue;

/// A batch of same-length arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Columns that make up this batch.
    cols: Vec<Array>,

    /// Number of rows in this batch. Needed to allow for a batch that has no
    /// columns but a non-zero number of rows.
    num_rows: usize,
}

impl Batch {
    pub const fn empty() -> Self {
        Batch {
            cols: Vec::new(),
            num_rows: 0,
        }
    }

    pub fn empty_with_num_rows(num_rows: usize) -> Self {
        Batch {
            cols: Vec::new(),
            num_rows,
        }
    }

    /// Create a new batch from some number of arrays.
    ///
    /// All arrays should have the same length.
    pub fn try_new(cols: impl IntoIterator<Item = Array>) -> Result<Self> {
        let cols: Vec<_> = cols.into_iter().collect();
        let len = match cols.first() {
            Some(arr) => arr.len(),
            None => return Ok(Self::empty()),
        };

        for (idx, col) in cols.iter().enumerate() {
            if col.len() != len {
                return Err(RayexecError::new(format!(
                    "Expected column length to be {len}, got {}. Column idx: {idx}",
                    col.len()
                )));
            }
        }

        Ok(Batch {
            cols,
            num_rows: len,
        })
    }

    pub fn column(&self, idx: usize) -> Option<&Array> {
        self.cols.get(idx)
    }

    pub fn columns(&self) -> &[Array] {
        &self.cols
    }

    pub fn into_columns(self) -> Vec<Array> {
        self.cols
    }

    pub fn num_columns(&self) -> usize {
        self.cols.len()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Get the row at some index.
    pub fn row(&self, idx: usize) -> Option<Vec<ScalarValue>> {
        if idx >= self.num_rows {
            return None;
        }

        self.cols.iter().map(|col| col.scalar(idx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayData;
    use crate::datatype::DataType;

    #[test]
    fn mismatched_lengths() {
        let a = Array::try_new(DataType::Int32, None, ArrayData::Int32(vec![1, 2])).unwrap();
        let b = Array::try_new(DataType::Int64, None, ArrayData::Int64(vec![1])).unwrap();
        assert!(Batch::try_new([a, b]).is_err());
    }

    #[test]
    fn get_row() {
        let a = Array::try_new(DataType::Int32, None, ArrayData::Int32(vec![1, 2])).unwrap();
        let b =
            Array::try_new(DataType::Float64, None, ArrayData::Float64(vec![0.5, 1.5])).unwrap();
        let batch = Batch::try_new([a, b]).unwrap();

        assert_eq!(2, batch.num_rows());
        assert_eq!(
            Some(vec![ScalarValue::Int32(2), ScalarValue::Float64(1.5)]),
            batch.row(1)
        );
        assert_eq!(None, batch.row(2));
    }
}
