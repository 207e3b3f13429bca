//! Reading batches across row groups.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use rayexec_bullet::batch::Batch;
use rayexec_error::Result;
use tracing::{debug, trace};

use crate::column::ColumnChunk;
use crate::compression::Decompressor;
use crate::filter::ScanSpec;
use crate::options::ParquetReaderOptions;
use crate::page::Statistics;
use crate::reader::structure::StructReader;
use crate::reader::{ReaderFactory, SelectiveColumnReader};
use crate::schema::ColumnTypeDescriptor;

/// Provides buffered column chunks and statistics for row groups.
///
/// Fetching bytes is up to the implementation, chunks are expected to be
/// fully available once returned.
pub trait RowGroupSource: Debug {
    fn num_row_groups(&self) -> usize;

    fn num_rows(&self, row_group: usize) -> Result<usize>;

    /// Get the chunk for a leaf column.
    fn column_chunk(&self, row_group: usize, leaf: usize) -> Result<ColumnChunk>;

    /// Get statistics for a leaf column, if the file has them.
    fn statistics(&self, row_group: usize, leaf: usize) -> Result<Option<Statistics>>;
}

#[derive(Debug, Clone, Copy)]
struct RowGroupState {
    row_group: usize,
    num_rows: usize,
    /// Next row to read.
    row: usize,
}

/// Reads batches of rows matching a scan spec from a sequence of row groups.
#[derive(Debug)]
pub struct RowGroupReader<S: RowGroupSource> {
    source: S,
    batch_size: usize,
    reader: StructReader,
    /// Row groups left to read, after pruning.
    row_groups: VecDeque<usize>,
    current: Option<RowGroupState>,
    rows: Vec<usize>,
}

impl<S: RowGroupSource> RowGroupReader<S> {
    /// Create a reader over all row groups of `source`.
    ///
    /// `schema` is the root of the file schema, and `spec` the scan spec for
    /// it. Row groups are pruned using statistics here if enabled.
    pub fn try_new(
        source: S,
        schema: &ColumnTypeDescriptor,
        spec: &ScanSpec,
        decompressor: Arc<dyn Decompressor>,
        options: ParquetReaderOptions,
    ) -> Result<Self> {
        let factory = ReaderFactory::new(decompressor, &options);
        let reader = StructReader::try_new(&factory, schema, spec)?;

        let mut skipped = vec![false; source.num_row_groups()];
        if options.prune_row_groups {
            reader.filter_row_groups(&source, &mut skipped)?;
        }

        let mut row_groups = VecDeque::with_capacity(skipped.len());
        for (row_group, skip) in skipped.into_iter().enumerate() {
            if skip {
                debug!(row_group, "pruned row group using statistics");
            } else {
                row_groups.push_back(row_group);
            }
        }

        Ok(RowGroupReader {
            source,
            batch_size: usize::max(options.batch_size, 1),
            reader,
            row_groups,
            current: None,
            rows: Vec::new(),
        })
    }

    /// Row groups that haven't been read yet.
    pub fn remaining_row_groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.row_groups.iter().copied()
    }

    /// Read the next batch of rows passing the filters.
    ///
    /// Returns None once all row groups have been read. Batches may have
    /// fewer than `batch_size` rows, but never zero.
    pub fn next(&mut self) -> Result<Option<Batch>> {
        loop {
            let state = match self.current_row_group()? {
                Some(state) => state,
                None => return Ok(None),
            };

            let count = usize::min(self.batch_size, state.num_rows - state.row);
            trace!(row_group = state.row_group, row = state.row, count, "reading rows");
            self.rows.clear();
            self.rows.extend(0..count);

            self.reader.read(state.row, &self.rows, None)?;
            self.advance(count);

            let output = self.reader.output_rows().to_vec();
            if output.is_empty() {
                continue;
            }

            let columns = self.reader.get_children(&output)?;
            let batch = if columns.is_empty() {
                Batch::empty_with_num_rows(output.len())
            } else {
                Batch::try_new(columns.into_iter().map(|(_, array)| array))?
            };

            return Ok(Some(batch));
        }
    }

    /// Skip the next `num_rows` rows, before filtering.
    ///
    /// Returns the number of rows skipped, less than `num_rows` only if we
    /// ran out of row groups.
    pub fn skip_rows(&mut self, num_rows: usize) -> Result<usize> {
        let mut remaining = num_rows;
        while remaining > 0 {
            let state = match self.current_row_group()? {
                Some(state) => state,
                None => break,
            };

            let count = usize::min(remaining, state.num_rows - state.row);
            self.reader.skip(count)?;
            self.advance(count);
            remaining -= count;
        }

        Ok(num_rows - remaining)
    }

    /// Get the row group we're currently in, seeking to the next one if
    /// needed.
    fn current_row_group(&mut self) -> Result<Option<RowGroupState>> {
        loop {
            if let Some(state) = self.current {
                if state.row < state.num_rows {
                    return Ok(Some(state));
                }
                self.current = None;
            }

            let row_group = match self.row_groups.pop_front() {
                Some(row_group) => row_group,
                None => return Ok(None),
            };

            let num_rows = self.source.num_rows(row_group)?;
            debug!(row_group, num_rows, "seeking to row group");
            self.reader.seek_to_row_group(&self.source, row_group)?;

            self.current = Some(RowGroupState {
                row_group,
                num_rows,
                row: 0,
            });
        }
    }

    fn advance(&mut self, count: usize) {
        if let Some(state) = &mut self.current {
            state.row += count;
        }
    }
}
