use std::sync::Arc;

use rayexec_bullet::array::Array;
use rayexec_bullet::bitmap::Bitmap;
use rayexec_bullet::datatype::DataType;
use rayexec_error::{RayexecError, Result};
use tracing::debug;

use super::{gather_validity, output_indices, rows_to_skip, ReaderFactory, SelectiveColumnReader};
use crate::column::page_cursor::PageCursor;
use crate::compression::Decompressor;
use crate::filter::{Filter, ScanSpec};
use crate::row_group::RowGroupSource;
use crate::schema::ColumnTypeDescriptor;
use crate::value::ParquetValue;
use crate::visitor::{
    AlwaysTrue,
    DropValues,
    ExtractValues,
    HookValues,
    SelectiveVisitor,
    ValueHook,
};

/// Reader for a leaf column holding values of type `T`.
#[derive(Debug)]
pub struct PrimitiveReader<T: ParquetValue> {
    column: ColumnTypeDescriptor,
    filter: Option<Filter>,
    project: bool,
    decompressor: Arc<dyn Decompressor>,
    validate_dictionary: bool,

    /// Set once seeked to a row group.
    cursor: Option<PageCursor>,
    /// Next row in the row group that hasn't been read or skipped.
    position: usize,

    /// Positions in the last read's rows that passed.
    passed: Vec<usize>,
    output_rows: Vec<usize>,
    /// Values for output rows.
    values: Vec<T>,
    /// Validity for output rows.
    validity: Option<Arc<Bitmap>>,
    indices: Vec<usize>,
}

impl<T: ParquetValue> PrimitiveReader<T> {
    pub fn new(factory: &ReaderFactory, column: &ColumnTypeDescriptor, spec: &ScanSpec) -> Self {
        PrimitiveReader {
            column: column.clone(),
            filter: spec.filter.clone(),
            project: spec.project,
            decompressor: factory.decompressor.clone(),
            validate_dictionary: factory.validate_dictionary,
            cursor: None,
            position: 0,
            passed: Vec::new(),
            output_rows: Vec::new(),
            values: Vec::new(),
            validity: None,
            indices: Vec::new(),
        }
    }

    /// Read rows passing the filter into a hook instead of buffering values.
    ///
    /// Output rows are still recorded, but `get_values` can't be called
    /// afterwards.
    pub fn read_with_hook<H: ValueHook<T>>(
        &mut self,
        offset: usize,
        rows: &[usize],
        hook: &mut H,
    ) -> Result<()> {
        self.skip_to(offset)?;
        let cursor = cursor_mut(&mut self.cursor, &self.column)?;

        let sink = HookValues { hook };
        match &self.filter {
            Some(filter) => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, filter, sink, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?;
            }
            None => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, AlwaysTrue, sink, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?;
            }
        }

        self.finish_read(offset, rows, None, false);
        Ok(())
    }

    fn skip_to(&mut self, offset: usize) -> Result<()> {
        let gap = rows_to_skip(self.position, offset, &self.column.name)?;
        if gap > 0 {
            self.skip(gap)?;
        }
        Ok(())
    }

    fn finish_read(
        &mut self,
        offset: usize,
        rows: &[usize],
        nulls: Option<Arc<Bitmap>>,
        has_values: bool,
    ) {
        self.position = offset + rows.last().map(|&row| row + 1).unwrap_or(0);

        self.output_rows.clear();
        self.output_rows
            .extend(self.passed.iter().map(|&pos| rows[pos]));

        self.validity = match nulls {
            Some(nulls) if has_values => {
                if self.passed.len() == rows.len() {
                    Some(nulls)
                } else {
                    gather_validity(Some(&nulls), &self.passed)
                }
            }
            _ => None,
        };
        if !has_values {
            self.values.clear();
        }
    }
}

impl<T: ParquetValue> SelectiveColumnReader for PrimitiveReader<T> {
    fn datatype(&self) -> &DataType {
        &self.column.datatype
    }

    fn read(
        &mut self,
        offset: usize,
        rows: &[usize],
        incoming_nulls: Option<&Bitmap>,
    ) -> Result<()> {
        if incoming_nulls.is_some() {
            return Err(RayexecError::contract_violation(format!(
                "Column '{}' does not accept incoming nulls",
                self.column.name
            )));
        }

        self.skip_to(offset)?;
        let cursor = cursor_mut(&mut self.cursor, &self.column)?;

        self.values.clear();
        let extract = ExtractValues {
            values: &mut self.values,
        };

        let nulls = match (&self.filter, self.project) {
            (Some(filter), true) => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, filter, extract, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?
            }
            (Some(filter), false) => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, filter, DropValues, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?
            }
            (None, true) => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, AlwaysTrue, extract, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?
            }
            (None, false) => {
                let mut visitor: SelectiveVisitor<T, _, _> =
                    SelectiveVisitor::new(rows, AlwaysTrue, DropValues, &mut self.passed);
                cursor.read_with_visitor(&mut visitor)?
            }
        };

        let project = self.project;
        self.finish_read(offset, rows, nulls, project);
        Ok(())
    }

    fn skip(&mut self, num_rows: usize) -> Result<()> {
        let cursor = cursor_mut(&mut self.cursor, &self.column)?;
        cursor.skip(num_rows)?;
        self.position += num_rows;
        Ok(())
    }

    fn output_rows(&self) -> &[usize] {
        &self.output_rows
    }

    fn get_values(&mut self, rows: &[usize]) -> Result<Array> {
        if !self.project {
            return Err(RayexecError::contract_violation(format!(
                "Column '{}' is only read for filtering",
                self.column.name
            )));
        }
        if self.values.len() != self.output_rows.len() {
            return Err(RayexecError::contract_violation(format!(
                "Values for column '{}' have already been taken",
                self.column.name
            )));
        }

        let (values, validity) = if rows == self.output_rows.as_slice() {
            self.output_rows.clear();
            (std::mem::take(&mut self.values), self.validity.take())
        } else {
            output_indices(&self.output_rows, rows, &mut self.indices)?;
            let values = self
                .indices
                .iter()
                .map(|&idx| self.values[idx].clone())
                .collect();
            let validity = gather_validity(self.validity.as_deref(), &self.indices);
            (values, validity)
        };

        let data = T::into_array_data(values, &self.column.datatype)?;
        Array::try_new(self.column.datatype.clone(), validity, data)
    }

    fn filter_row_groups(&self, source: &dyn RowGroupSource, skipped: &mut [bool]) -> Result<()> {
        let (filter, leaf, physical_type) =
            match (&self.filter, self.column.leaf_index, self.column.physical_type) {
                (Some(filter), Some(leaf), Some(physical_type)) => (filter, leaf, physical_type),
                _ => return Ok(()),
            };

        for (row_group, skip) in skipped.iter_mut().enumerate() {
            if *skip {
                continue;
            }
            let stats = match source.statistics(row_group, leaf)? {
                Some(stats) => stats,
                None => continue,
            };
            let num_rows = source.num_rows(row_group)?;
            if !filter.test_stats(physical_type, &stats, num_rows) {
                *skip = true;
            }
        }

        Ok(())
    }

    fn seek_to_row_group(&mut self, source: &dyn RowGroupSource, row_group: usize) -> Result<()> {
        let leaf = match self.column.leaf_index {
            Some(leaf) => leaf,
            None => {
                return Err(RayexecError::new(format!(
                    "Expected leaf index for column '{}'",
                    self.column.name
                )))
            }
        };

        debug!(column = %self.column.name, row_group, "seeking column reader");

        let chunk = source.column_chunk(row_group, leaf)?;
        self.cursor = Some(PageCursor::try_new(
            chunk,
            self.decompressor.clone(),
            &self.column,
            self.validate_dictionary,
        )?);
        self.position = 0;
        self.output_rows.clear();
        self.values.clear();
        self.validity = None;

        Ok(())
    }
}

fn cursor_mut<'a>(
    cursor: &'a mut Option<PageCursor>,
    column: &ColumnTypeDescriptor,
) -> Result<&'a mut PageCursor> {
    match cursor {
        Some(cursor) => Ok(cursor),
        None => Err(RayexecError::contract_violation(format!(
            "Column reader for '{}' hasn't been seeked to a row group",
            column.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use rayexec_bullet::scalar::ScalarValue;

    use super::*;
    use crate::compression::DefaultDecompressor;
    use crate::options::ParquetReaderOptions;
    use crate::page::Statistics;
    use crate::testutil::{leaf_column, ChunkWriter, MemoryRowGroup, MemorySource};
    use crate::types::PhysicalType;

    fn source(values: &[Option<i64>], page_size: usize) -> MemorySource {
        let mut writer = ChunkWriter::new(1);
        for page in values.chunks(page_size) {
            writer.write_plain_page(page);
        }
        MemorySource {
            row_groups: vec![MemoryRowGroup {
                num_rows: values.len(),
                chunks: vec![writer.finish()],
                statistics: vec![None],
            }],
        }
    }

    fn reader(spec: ScanSpec) -> PrimitiveReader<i64> {
        let factory =
            ReaderFactory::new(Arc::new(DefaultDecompressor), &ParquetReaderOptions::default());
        PrimitiveReader::new(&factory, &leaf_column(PhysicalType::Int64, 1), &spec)
    }

    fn scalars(array: &Array) -> Vec<Option<i64>> {
        (0..array.len())
            .map(|idx| match array.scalar(idx).unwrap() {
                ScalarValue::Int64(v) => Some(v),
                ScalarValue::Null => None,
                other => panic!("unexpected scalar: {other:?}"),
            })
            .collect()
    }

    fn test_values() -> Vec<Option<i64>> {
        (0..50)
            .map(|i| if i % 5 == 0 { None } else { Some(i) })
            .collect()
    }

    #[test]
    fn read_all_rows() {
        let source = source(&test_values(), 16);
        let mut reader = reader(ScanSpec::new("c"));
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..50).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(rows, reader.output_rows());

        let array = reader.get_values(&rows).unwrap();
        assert_eq!(test_values(), scalars(&array));
    }

    #[test]
    fn read_with_offsets_and_gaps() {
        let source = source(&test_values(), 16);
        let mut reader = reader(ScanSpec::new("c"));
        reader.seek_to_row_group(&source, 0).unwrap();

        reader.read(0, &[1, 2], None).unwrap();
        let array = reader.get_values(&[1, 2]).unwrap();
        assert_eq!(vec![Some(1), Some(2)], scalars(&array));

        // Rows 3 through 19 get skipped.
        reader.read(20, &[0, 1, 15], None).unwrap();
        let array = reader.get_values(&[0, 15]).unwrap();
        assert_eq!(vec![None, None], scalars(&array));

        let err = reader.read(30, &[0], None).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn filter_rows() {
        let source = source(&test_values(), 16);
        let spec = ScanSpec::new("c").with_filter(Filter::Int64Range {
            lower: 10,
            upper: 20,
            null_allowed: true,
        });
        let mut reader = reader(spec);
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..50).collect();
        reader.read(0, &rows, None).unwrap();

        let mut expected: Vec<usize> = vec![0, 5];
        expected.extend(10..=20);
        expected.extend([25, 30, 35, 40, 45]);
        assert_eq!(expected, reader.output_rows());

        let array = reader.get_values(&[5, 11, 20]).unwrap();
        assert_eq!(vec![None, Some(11), None], scalars(&array));

        let out = reader.output_rows().to_vec();
        let array = reader.get_values(&out).unwrap();
        assert_eq!(out.len(), array.len());
        assert_eq!(10, array.null_count());
    }

    #[test]
    fn values_taken_once() {
        let source = source(&test_values(), 50);
        let mut reader = reader(ScanSpec::new("c"));
        reader.seek_to_row_group(&source, 0).unwrap();

        reader.read(0, &[1, 2, 3], None).unwrap();
        reader.get_values(&[1, 2, 3]).unwrap();
        let err = reader.get_values(&[1]).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn filter_only_has_no_values() {
        let source = source(&test_values(), 16);
        let spec = ScanSpec::new("c")
            .with_filter(Filter::IsNull)
            .filter_only();
        let mut reader = reader(spec);
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..20).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(&[0, 5, 10, 15], reader.output_rows());
        assert!(reader.get_values(&[0]).unwrap_err().is_contract_violation());
    }

    #[test]
    fn incoming_nulls_rejected() {
        let source = source(&test_values(), 16);
        let mut reader = reader(ScanSpec::new("c"));
        reader.seek_to_row_group(&source, 0).unwrap();

        let nulls = Bitmap::new_with_all_true(2);
        let err = reader.read(0, &[0, 1], Some(&nulls)).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn read_before_seek() {
        let mut reader = reader(ScanSpec::new("c"));
        let err = reader.read(0, &[0], None).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[derive(Debug, Default)]
    struct Sum {
        sum: i64,
        nulls: usize,
    }

    impl ValueHook<i64> for Sum {
        fn add_value(&mut self, _row: usize, value: &i64) {
            self.sum += value;
        }

        fn add_null(&mut self, _row: usize) {
            self.nulls += 1;
        }
    }

    #[test]
    fn hook_sums_passing_rows() {
        let source = source(&test_values(), 16);
        let spec = ScanSpec::new("c").with_filter(Filter::Int64Range {
            lower: 0,
            upper: 9,
            null_allowed: false,
        });
        let mut reader = reader(spec);
        reader.seek_to_row_group(&source, 0).unwrap();

        let mut hook = Sum::default();
        let rows: Vec<usize> = (0..50).collect();
        reader.read_with_hook(0, &rows, &mut hook).unwrap();

        // 1 + 2 + 3 + 4 + 6 + 7 + 8 + 9
        assert_eq!(40, hook.sum);
        assert_eq!(0, hook.nulls);
        assert_eq!(&[1, 2, 3, 4, 6, 7, 8, 9], reader.output_rows());
    }

    #[test]
    fn prune_with_statistics() {
        let mut source = source(&test_values(), 16);
        let mut second = source.row_groups[0].clone();
        second.statistics = vec![Some(Statistics {
            min_value: Some(100_i64.to_le_bytes().to_vec()),
            max_value: Some(200_i64.to_le_bytes().to_vec()),
            null_count: Some(0),
            ..Default::default()
        })];
        source.row_groups.push(second);

        let spec = ScanSpec::new("c").with_filter(Filter::Int64Range {
            lower: 0,
            upper: 50,
            null_allowed: false,
        });
        let reader = reader(spec);

        let mut skipped = vec![false; 2];
        reader.filter_row_groups(&source, &mut skipped).unwrap();
        // First group has no statistics.
        assert_eq!(vec![false, true], skipped);
    }
}
