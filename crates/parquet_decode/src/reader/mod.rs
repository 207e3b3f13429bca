//! Selective column readers.
//!
//! Readers are built from a column descriptor and scan spec, and produce
//! only the rows a caller asks for that pass the scan spec's filters.

pub mod primitive;
pub mod structure;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use rayexec_bullet::array::Array;
use rayexec_bullet::bitmap::Bitmap;
use rayexec_bullet::datatype::DataType;
use rayexec_error::{not_implemented, RayexecError, Result};

use crate::compression::Decompressor;
use crate::filter::ScanSpec;
use crate::options::ParquetReaderOptions;
use crate::row_group::RowGroupSource;
use crate::schema::ColumnTypeDescriptor;
use crate::types::PhysicalType;
use primitive::PrimitiveReader;
use structure::StructReader;

/// Reads rows of one column (or struct of columns) within a row group.
///
/// Rows passed to `read` are relative to `offset`, the row group row the
/// read starts at. Offsets never move backwards, rows between the end of
/// the last read and `offset` are skipped.
pub trait SelectiveColumnReader: Debug + Send {
    fn datatype(&self) -> &DataType;

    /// Read `rows`, keeping the ones that pass the column's filter.
    ///
    /// `incoming_nulls` is only for columns that get their nulls from a
    /// parent. Columns in this format get nulls from their own definition
    /// levels, so passing nulls in is an error.
    fn read(&mut self, offset: usize, rows: &[usize], incoming_nulls: Option<&Bitmap>)
        -> Result<()>;

    /// Skip the next `num_rows` rows.
    fn skip(&mut self, num_rows: usize) -> Result<()>;

    /// Rows from the last read that passed, relative to that read's offset.
    fn output_rows(&self) -> &[usize];

    /// Get values for `rows`, which must be a subset of `output_rows`.
    fn get_values(&mut self, rows: &[usize]) -> Result<Array>;

    /// Mark row groups in `skipped` that statistics show can't have any
    /// passing rows.
    fn filter_row_groups(&self, source: &dyn RowGroupSource, skipped: &mut [bool]) -> Result<()>;

    /// Position the reader at the start of a row group.
    fn seek_to_row_group(&mut self, source: &dyn RowGroupSource, row_group: usize) -> Result<()>;
}

/// Creates readers for columns in a schema.
#[derive(Debug, Clone)]
pub struct ReaderFactory {
    pub(crate) decompressor: Arc<dyn Decompressor>,
    pub(crate) validate_dictionary: bool,
}

impl ReaderFactory {
    pub fn new(decompressor: Arc<dyn Decompressor>, options: &ParquetReaderOptions) -> Self {
        ReaderFactory {
            decompressor,
            validate_dictionary: options.validate_dictionary_indices,
        }
    }

    /// Create a reader for `column` according to `spec`.
    pub fn create(
        &self,
        column: &ColumnTypeDescriptor,
        spec: &ScanSpec,
    ) -> Result<Box<dyn SelectiveColumnReader>> {
        if spec.constant.is_some() {
            return Err(RayexecError::contract_violation(format!(
                "Constant field '{}' does not read column data",
                spec.field
            )));
        }

        let physical_type = match column.physical_type {
            Some(physical_type) => physical_type,
            None => return Ok(Box::new(StructReader::try_new(self, column, spec)?)),
        };

        if column.max_repeat > 0 {
            not_implemented!("Reading repeated column '{}'", column.name);
        }

        let reader: Box<dyn SelectiveColumnReader> = match physical_type {
            PhysicalType::Boolean => Box::new(PrimitiveReader::<bool>::new(self, column, spec)),
            PhysicalType::Int32 => Box::new(PrimitiveReader::<i32>::new(self, column, spec)),
            PhysicalType::Int64 => Box::new(PrimitiveReader::<i64>::new(self, column, spec)),
            PhysicalType::Float => Box::new(PrimitiveReader::<f32>::new(self, column, spec)),
            PhysicalType::Double => Box::new(PrimitiveReader::<f64>::new(self, column, spec)),
            PhysicalType::ByteArray => Box::new(PrimitiveReader::<Bytes>::new(self, column, spec)),
            other => not_implemented!("Reader for {other:?} column '{}'", column.name),
        };

        Ok(reader)
    }
}

/// Number of rows to skip to get a reader at `position` to `offset`.
pub(crate) fn rows_to_skip(position: usize, offset: usize, column: &str) -> Result<usize> {
    if offset < position {
        return Err(RayexecError::contract_violation(format!(
            "Read at row {offset} of column '{column}' is before the current position {position}"
        )));
    }
    Ok(offset - position)
}

/// Find the index of each of `rows` in `output_rows`.
///
/// Both must be strictly increasing.
pub(crate) fn output_indices(
    output_rows: &[usize],
    rows: &[usize],
    indices: &mut Vec<usize>,
) -> Result<()> {
    indices.clear();
    let mut idx = 0;
    for &row in rows {
        idx += output_rows[idx..].partition_point(|&r| r < row);
        if output_rows.get(idx) != Some(&row) {
            return Err(RayexecError::contract_violation(format!(
                "Row {row} was not output by the last read"
            )));
        }
        indices.push(idx);
        idx += 1;
    }
    Ok(())
}

/// Gather validity at `indices`, None if all are valid.
pub(crate) fn gather_validity(validity: Option<&Bitmap>, indices: &[usize]) -> Option<Arc<Bitmap>> {
    let validity = validity?;
    if indices.iter().all(|&idx| validity.value(idx)) {
        return None;
    }
    Some(Arc::new(indices.iter().map(|&idx| validity.value(idx)).collect()))
}
