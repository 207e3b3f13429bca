use std::sync::Arc;

use rayexec_bullet::array::Array;
use rayexec_bullet::bitmap::Bitmap;
use rayexec_bullet::datatype::{DataType, StructTypeMeta};
use rayexec_bullet::scalar::OwnedScalarValue;
use rayexec_error::{not_implemented, RayexecError, Result};
use tracing::debug;

use super::{output_indices, rows_to_skip, ReaderFactory, SelectiveColumnReader};
use crate::column::page_cursor::PageCursor;
use crate::compression::Decompressor;
use crate::filter::ScanSpec;
use crate::row_group::RowGroupSource;
use crate::schema::ColumnTypeDescriptor;
use crate::types::Repetition;

#[derive(Debug)]
enum StructField {
    /// Value supplied from outside the file.
    Constant {
        name: String,
        value: OwnedScalarValue,
    },
    Reader {
        name: String,
        reader: Box<dyn SelectiveColumnReader>,
        has_filter: bool,
        /// If rows where the struct is null pass this field's filters.
        null_passes: bool,
        project: bool,
    },
}

/// Reader for a struct column.
///
/// A null struct is null once, at the struct. Children are only read for
/// rows where the struct is present, and their output gets placeholder
/// values for rows where it isn't.
#[derive(Debug)]
pub struct StructReader {
    column: ColumnTypeDescriptor,
    datatype: DataType,
    project: bool,
    fields: Vec<StructField>,
    /// Field indices in read order, filtered fields first.
    read_order: Vec<usize>,

    decompressor: Arc<dyn Decompressor>,
    validate_dictionary: bool,
    /// Leaf whose definition levels hold this struct's nulls. None for
    /// required structs.
    nulls_leaf: Option<ColumnTypeDescriptor>,
    nulls_cursor: Option<PageCursor>,

    position: usize,
    output_rows: Vec<usize>,
    /// Presence of the struct for rows of the last read, None if present
    /// everywhere.
    nulls: Option<Arc<Bitmap>>,

    candidates: Vec<usize>,
    next_candidates: Vec<usize>,
    present: Vec<usize>,
    indices: Vec<usize>,
}

impl StructReader {
    pub fn try_new(
        factory: &ReaderFactory,
        column: &ColumnTypeDescriptor,
        spec: &ScanSpec,
    ) -> Result<Self> {
        if column.is_leaf() {
            return Err(RayexecError::contract_violation(format!(
                "Column '{}' is not a struct",
                column.name
            )));
        }
        if spec.filter.is_some() {
            not_implemented!("Filter on struct column '{}'", column.name);
        }
        if column.max_repeat > 0 {
            not_implemented!("Reading repeated column '{}'", column.name);
        }

        let mut fields = Vec::with_capacity(spec.children.len());
        let mut output_fields = Vec::new();

        for child_spec in &spec.children {
            if let Some(value) = &child_spec.constant {
                output_fields.push((child_spec.field.clone(), value.datatype()));
                fields.push(StructField::Constant {
                    name: child_spec.field.clone(),
                    value: value.clone(),
                });
                continue;
            }

            let child = match column.child(&child_spec.field) {
                Some(child) => child,
                None => {
                    return Err(RayexecError::contract_violation(format!(
                        "Field '{}' not found in struct '{}'",
                        child_spec.field, column.name
                    )))
                }
            };

            let reader = factory.create(child, child_spec)?;
            if child_spec.project {
                output_fields.push((child_spec.field.clone(), reader.datatype().clone()));
            }
            fields.push(StructField::Reader {
                name: child_spec.field.clone(),
                reader,
                has_filter: child_spec.has_filter(),
                null_passes: null_passes(child_spec),
                project: child_spec.project,
            });
        }

        let filtered = |field: &StructField| {
            matches!(
                field,
                StructField::Reader {
                    has_filter: true,
                    ..
                }
            )
        };
        let mut read_order: Vec<usize> = (0..fields.len())
            .filter(|&idx| filtered(&fields[idx]))
            .collect();
        read_order.extend((0..fields.len()).filter(|&idx| !filtered(&fields[idx])));

        let nulls_leaf = match column.repetition {
            Repetition::Optional => {
                let leaf = match column.first_leaf() {
                    Some(leaf) => leaf,
                    None => {
                        return Err(RayexecError::new(format!(
                            "Expected struct '{}' to have a leaf column",
                            column.name
                        )))
                    }
                };
                if leaf.max_repeat > 0 {
                    not_implemented!(
                        "Reading nulls for struct '{}' from repeated column '{}'",
                        column.name,
                        leaf.name
                    );
                }
                Some(leaf.clone())
            }
            _ => None,
        };

        Ok(StructReader {
            column: column.clone(),
            datatype: DataType::Struct(StructTypeMeta {
                fields: output_fields,
            }),
            project: spec.project,
            fields,
            read_order,
            decompressor: factory.decompressor.clone(),
            validate_dictionary: factory.validate_dictionary,
            nulls_leaf,
            nulls_cursor: None,
            position: 0,
            output_rows: Vec::new(),
            nulls: None,
            candidates: Vec::new(),
            next_candidates: Vec::new(),
            present: Vec::new(),
            indices: Vec::new(),
        })
    }

    /// Get the projected fields for `rows` as separate arrays.
    ///
    /// Struct nulls are applied to the children as placeholders only.
    pub fn get_children(&mut self, rows: &[usize]) -> Result<Vec<(String, Array)>> {
        let validity = self.validity_for(rows)?;
        self.children_for(rows, validity.as_deref())
    }

    /// Struct validity for `rows` of the last read, None if all present.
    fn validity_for(&mut self, rows: &[usize]) -> Result<Option<Arc<Bitmap>>> {
        output_indices(&self.output_rows, rows, &mut self.indices)?;

        let nulls = match &self.nulls {
            Some(nulls) => nulls,
            None => return Ok(None),
        };
        if rows.iter().all(|&row| nulls.value(row)) {
            return Ok(None);
        }
        Ok(Some(Arc::new(
            rows.iter().map(|&row| nulls.value(row)).collect(),
        )))
    }

    fn children_for(
        &mut self,
        rows: &[usize],
        validity: Option<&Bitmap>,
    ) -> Result<Vec<(String, Array)>> {
        present_rows(self.nulls.as_deref(), rows, &mut self.present);

        let mut children = Vec::with_capacity(self.fields.len());
        for field in &mut self.fields {
            match field {
                StructField::Constant { name, value } => {
                    children.push((name.clone(), Array::try_new_constant(value, rows.len())?));
                }
                StructField::Reader { project: false, .. } => (),
                StructField::Reader { name, reader, .. } => {
                    let array = reader.get_values(&self.present)?;
                    let array = match validity {
                        Some(validity) => array.expand_placeholders(validity)?,
                        None => array,
                    };
                    children.push((name.clone(), array));
                }
            }
        }

        Ok(children)
    }

    fn read_nulls(&mut self, num_rows: usize) -> Result<Option<Arc<Bitmap>>> {
        match (&mut self.nulls_cursor, &self.nulls_leaf) {
            (Some(cursor), _) => cursor.read_nulls_only(num_rows),
            (None, None) => Ok(None),
            (None, Some(_)) => Err(not_seeked(&self.column)),
        }
    }
}

impl SelectiveColumnReader for StructReader {
    fn datatype(&self) -> &DataType {
        &self.datatype
    }

    fn read(
        &mut self,
        offset: usize,
        rows: &[usize],
        incoming_nulls: Option<&Bitmap>,
    ) -> Result<()> {
        if incoming_nulls.is_some() {
            return Err(RayexecError::contract_violation(format!(
                "Struct '{}' does not accept incoming nulls",
                self.column.name
            )));
        }
        if rows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RayexecError::contract_violation(
                "Rows to read must be strictly increasing",
            ));
        }

        let gap = rows_to_skip(self.position, offset, &self.column.name)?;
        if gap > 0 {
            self.skip(gap)?;
        }

        self.output_rows.clear();
        self.nulls = None;
        let num_rows = match rows.last() {
            Some(&last) => last + 1,
            None => return Ok(()),
        };

        self.nulls = self.read_nulls(num_rows)?;
        let nulls = self.nulls.as_deref();

        self.candidates.clear();
        self.candidates.extend_from_slice(rows);

        // Each filtered field narrows down the rows for the next.
        let mut filtered = 0;
        for &idx in &self.read_order {
            let (reader, null_passes) = match &mut self.fields[idx] {
                StructField::Reader {
                    reader,
                    has_filter: true,
                    null_passes,
                    ..
                } => (reader, *null_passes),
                _ => break,
            };
            filtered += 1;

            present_rows(nulls, &self.candidates, &mut self.present);
            reader.read(offset, &self.present, None)?;

            let passed = reader.output_rows();
            let mut passed_idx = 0;
            self.next_candidates.clear();
            for &row in &self.candidates {
                if is_present(nulls, row) {
                    if passed.get(passed_idx) == Some(&row) {
                        self.next_candidates.push(row);
                        passed_idx += 1;
                    }
                } else if null_passes {
                    self.next_candidates.push(row);
                }
            }
            std::mem::swap(&mut self.candidates, &mut self.next_candidates);
        }

        present_rows(nulls, &self.candidates, &mut self.present);
        for &idx in &self.read_order[filtered..] {
            if let StructField::Reader { reader, .. } = &mut self.fields[idx] {
                reader.read(offset, &self.present, None)?;
            }
        }

        self.output_rows.extend_from_slice(&self.candidates);
        self.position = offset + num_rows;

        Ok(())
    }

    fn skip(&mut self, num_rows: usize) -> Result<()> {
        match (&mut self.nulls_cursor, &self.nulls_leaf) {
            (Some(cursor), _) => cursor.skip(num_rows)?,
            (None, None) => (),
            (None, Some(_)) => return Err(not_seeked(&self.column)),
        }
        // Children catch up on their next read.
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

        let validity = self.validity_for(rows)?;
        let children = self.children_for(rows, validity.as_deref())?;
        Array::try_new_struct(children, validity, rows.len())
    }

    fn filter_row_groups(&self, source: &dyn RowGroupSource, skipped: &mut [bool]) -> Result<()> {
        // No statistics for structs, leaves decide.
        for field in &self.fields {
            if let StructField::Reader { reader, .. } = field {
                reader.filter_row_groups(source, skipped)?;
            }
        }
        Ok(())
    }

    fn seek_to_row_group(&mut self, source: &dyn RowGroupSource, row_group: usize) -> Result<()> {
        debug!(column = %self.column.name, row_group, "seeking struct reader");

        for field in &mut self.fields {
            if let StructField::Reader { reader, .. } = field {
                reader.seek_to_row_group(source, row_group)?;
            }
        }

        if let Some(leaf) = &self.nulls_leaf {
            let leaf_index = match leaf.leaf_index {
                Some(idx) => idx,
                None => {
                    return Err(RayexecError::new(format!(
                        "Expected leaf index for column '{}'",
                        leaf.name
                    )))
                }
            };
            let chunk = source.column_chunk(row_group, leaf_index)?;
            let cursor = PageCursor::try_new(
                chunk,
                self.decompressor.clone(),
                leaf,
                self.validate_dictionary,
            )?;
            self.nulls_cursor = Some(cursor.levels_only(self.column.max_define));
        }

        self.position = 0;
        self.output_rows.clear();
        self.nulls = None;

        Ok(())
    }
}

/// Check if rows that are null because of a null parent pass the filters in
/// `spec`.
fn null_passes(spec: &ScanSpec) -> bool {
    spec.filter.as_ref().map(|f| f.test_null()).unwrap_or(true)
        && spec.children.iter().all(null_passes)
}

fn is_present(nulls: Option<&Bitmap>, row: usize) -> bool {
    nulls.map(|n| n.value(row)).unwrap_or(true)
}

fn present_rows(nulls: Option<&Bitmap>, rows: &[usize], out: &mut Vec<usize>) {
    out.clear();
    out.extend(rows.iter().copied().filter(|&row| is_present(nulls, row)));
}

fn not_seeked(column: &ColumnTypeDescriptor) -> RayexecError {
    RayexecError::contract_violation(format!(
        "Struct reader for '{}' hasn't been seeked to a row group",
        column.name
    ))
}

#[cfg(test)]
mod tests {
    use rayexec_bullet::array::ArrayData;
    use rayexec_bullet::scalar::ScalarValue;

    use super::*;
    use crate::column::ColumnChunk;
    use crate::compression::DefaultDecompressor;
    use crate::encoding::Encoding;
    use crate::filter::Filter;
    use crate::options::ParquetReaderOptions;
    use crate::testutil::{plain_encode, ChunkWriter, MemoryRowGroup, MemorySource};
    use crate::types::{ParquetType, PhysicalType};

    /// `s` is null at rows 2 and 5, `s.a` is null at row 7.
    const STRUCT_NULLS: [usize; 2] = [2, 5];
    const A_NULL: usize = 7;

    fn schema() -> ColumnTypeDescriptor {
        let root = ParquetType::group(
            "schema",
            Repetition::Required,
            vec![ParquetType::group(
                "s",
                Repetition::Optional,
                vec![
                    ParquetType::primitive("a", Repetition::Optional, PhysicalType::Int64),
                    ParquetType::primitive("b", Repetition::Required, PhysicalType::Int64),
                ],
            )],
        );
        ColumnTypeDescriptor::try_from_schema(&root).unwrap()
    }

    fn leaf_chunk(max_define: i16, levels: &[u32], values: &[i64]) -> ColumnChunk {
        let num_present = |levels: &[u32]| {
            levels
                .iter()
                .filter(|&&level| level == max_define as u32)
                .count()
        };

        // Two pages so struct nulls get stitched together.
        let (first, second) = levels.split_at(levels.len() / 2);
        let split = num_present(first);

        let mut writer = ChunkWriter::new(max_define);
        writer.write_data_page(
            Some(first),
            Encoding::Plain,
            &plain_encode(&values[..split]),
            first.len(),
        );
        writer.write_data_page(
            Some(second),
            Encoding::Plain,
            &plain_encode(&values[split..]),
            second.len(),
        );
        writer.finish()
    }

    fn source() -> MemorySource {
        let mut a_levels = Vec::new();
        let mut a_values = Vec::new();
        let mut b_levels = Vec::new();
        let mut b_values = Vec::new();

        for row in 0..10 {
            if STRUCT_NULLS.contains(&row) {
                a_levels.push(0);
                b_levels.push(0);
                continue;
            }
            b_levels.push(1);
            b_values.push(row as i64);
            if row == A_NULL {
                a_levels.push(1);
            } else {
                a_levels.push(2);
                a_values.push(row as i64 * 10);
            }
        }

        MemorySource {
            row_groups: vec![MemoryRowGroup {
                num_rows: 10,
                chunks: vec![
                    leaf_chunk(2, &a_levels, &a_values),
                    leaf_chunk(1, &b_levels, &b_values),
                ],
                statistics: vec![None, None],
            }],
        }
    }

    fn struct_reader(spec: ScanSpec) -> StructReader {
        let factory =
            ReaderFactory::new(Arc::new(DefaultDecompressor), &ParquetReaderOptions::default());
        let root = schema();
        StructReader::try_new(&factory, root.child("s").unwrap(), &spec).unwrap()
    }

    fn child<'a>(array: &'a Array, idx: usize) -> &'a Array {
        match array.data() {
            ArrayData::Struct(s) => &s.children[idx],
            other => panic!("not a struct: {other:?}"),
        }
    }

    fn ints(array: &Array) -> Vec<Option<i64>> {
        (0..array.len())
            .map(|idx| match array.scalar(idx).unwrap() {
                ScalarValue::Int64(v) => Some(v),
                ScalarValue::Null => None,
                other => panic!("unexpected scalar: {other:?}"),
            })
            .collect()
    }

    fn validity(array: &Array) -> Vec<bool> {
        (0..array.len())
            .map(|idx| array.is_valid(idx).unwrap())
            .collect()
    }

    fn full_spec() -> ScanSpec {
        ScanSpec::new("s").with_children([ScanSpec::new("a"), ScanSpec::new("b")])
    }

    #[test]
    fn struct_nulls_applied_once() {
        let source = source();
        let mut reader = struct_reader(full_spec());
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..10).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(rows, reader.output_rows());

        let array = reader.get_values(&rows).unwrap();
        let expected_struct: Vec<bool> = (0..10).map(|row| !STRUCT_NULLS.contains(&row)).collect();
        assert_eq!(expected_struct, validity(&array));

        // Children are only null on their own account.
        let a = child(&array, 0);
        let expected_a: Vec<bool> = (0..10).map(|row| row != A_NULL).collect();
        assert_eq!(expected_a, validity(a));
        assert_eq!(Some(30), ints(a)[3]);
        assert_eq!(Some(90), ints(a)[9]);

        let b = child(&array, 1);
        assert_eq!(0, b.null_count());
        assert_eq!(Some(8), ints(b)[8]);
    }

    #[test]
    fn filter_on_child() {
        let source = source();
        let spec = ScanSpec::new("s").with_children([
            ScanSpec::new("a"),
            ScanSpec::new("b").with_filter(Filter::Int64Range {
                lower: 3,
                upper: 8,
                null_allowed: false,
            }),
        ]);
        let mut reader = struct_reader(spec);
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..10).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(&[3, 4, 6, 7, 8], reader.output_rows());

        let out = reader.output_rows().to_vec();
        let array = reader.get_values(&out).unwrap();
        assert_eq!(vec![true; 5], validity(&array));
        assert_eq!(
            vec![Some(30), Some(40), Some(60), None, Some(80)],
            ints(child(&array, 0))
        );
        assert_eq!(
            vec![Some(3), Some(4), Some(6), Some(7), Some(8)],
            ints(child(&array, 1))
        );
    }

    #[test]
    fn null_structs_pass_filter_allowing_nulls() {
        let source = source();
        let spec = ScanSpec::new("s").with_children([
            ScanSpec::new("a"),
            ScanSpec::new("b").with_filter(Filter::Int64Range {
                lower: 3,
                upper: 8,
                null_allowed: true,
            }),
        ]);
        let mut reader = struct_reader(spec);
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..10).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(&[2, 3, 4, 5, 6, 7, 8], reader.output_rows());

        let out = reader.output_rows().to_vec();
        let array = reader.get_values(&out).unwrap();
        assert_eq!(
            vec![false, true, true, false, true, true, true],
            validity(&array)
        );
    }

    #[test]
    fn constant_and_filter_only_fields() {
        let source = source();
        let spec = ScanSpec::new("s").with_children([
            ScanSpec::new("b")
                .with_filter(Filter::Int64Range {
                    lower: 0,
                    upper: 4,
                    null_allowed: false,
                })
                .filter_only(),
            ScanSpec::new("k").with_constant(ScalarValue::Int64(7)),
            ScanSpec::new("a"),
        ]);
        let mut reader = struct_reader(spec);
        assert_eq!(
            &DataType::Struct(StructTypeMeta {
                fields: vec![
                    ("k".to_string(), DataType::Int64),
                    ("a".to_string(), DataType::Int64),
                ]
            }),
            reader.datatype()
        );
        reader.seek_to_row_group(&source, 0).unwrap();

        let rows: Vec<usize> = (0..10).collect();
        reader.read(0, &rows, None).unwrap();
        assert_eq!(&[0, 1, 3, 4], reader.output_rows());

        let array = reader.get_values(&[0, 1, 3, 4]).unwrap();
        assert_eq!(vec![Some(7); 4], ints(child(&array, 0)));
        assert_eq!(
            vec![Some(0), Some(10), Some(30), Some(40)],
            ints(child(&array, 1))
        );
    }

    #[test]
    fn sparse_reads_and_skip() {
        let source = source();
        let mut reader = struct_reader(full_spec());
        reader.seek_to_row_group(&source, 0).unwrap();

        reader.read(0, &[1, 2], None).unwrap();
        let array = reader.get_values(&[1, 2]).unwrap();
        assert_eq!(vec![true, false], validity(&array));
        assert_eq!(vec![Some(10), Some(0)], ints(child(&array, 0)));

        reader.skip(2).unwrap();

        // Rows 5 through 9.
        reader.read(5, &[0, 2, 4], None).unwrap();
        let array = reader.get_values(&[0, 2, 4]).unwrap();
        assert_eq!(vec![false, true, true], validity(&array));
        assert_eq!(vec![Some(0), None, Some(90)], ints(child(&array, 0)));
        assert_eq!(vec![Some(0), Some(7), Some(9)], ints(child(&array, 1)));
    }

    #[test]
    fn unknown_field() {
        let factory =
            ReaderFactory::new(Arc::new(DefaultDecompressor), &ParquetReaderOptions::default());
        let root = schema();
        let spec = ScanSpec::new("s").with_children([ScanSpec::new("missing")]);
        let err = StructReader::try_new(&factory, root.child("s").unwrap(), &spec).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn struct_filter_not_implemented() {
        let factory =
            ReaderFactory::new(Arc::new(DefaultDecompressor), &ParquetReaderOptions::default());
        let root = schema();
        let spec = full_spec().with_filter(Filter::IsNotNull);
        let err = StructReader::try_new(&factory, root.child("s").unwrap(), &spec).unwrap_err();
        assert!(err.is_not_implemented());
    }
}
