//! Page level decoding for a column chunk.

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use rayexec_bullet::bitmap::concat::BitConcatenation;
use rayexec_bullet::bitmap::Bitmap;
use rayexec_error::{not_implemented, RayexecError, Result};
use tracing::{debug, trace};

use super::decoder::PageDecoder;
use super::ColumnChunk;
use crate::compression::{CompressionCodec, Decompressor};
use crate::dictionary::DictionaryStore;
use crate::encoding::rle_bp::RleBpDecoder;
use crate::encoding::{num_required_bits, Encoding};
use crate::page::{DataPageHeaderV1, DataPageHeaderV2, PageHeader, PageType};
use crate::schema::ColumnTypeDescriptor;
use crate::types::PhysicalType;
use crate::visitor::ColumnVisitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing read yet.
    Uninitialized,
    /// Need to read the next page header.
    AwaitingPage,
    /// Positioned inside a data page with rows left.
    DataPage(PageVersion),
    /// All rows of the current data page have been consumed.
    PageConsumed,
    /// No pages left in the chunk.
    ChunkExhausted,
}

/// Walks the pages of a single column chunk.
///
/// Rows are addressed relative to the first row the cursor hasn't consumed
/// yet. Consuming rows only ever moves forward, reading a chunk from the
/// start again requires a new cursor.
#[derive(Debug)]
pub struct PageCursor {
    chunk: Bytes,
    codec: CompressionCodec,
    decompressor: Arc<dyn Decompressor>,
    physical_type: PhysicalType,

    max_define: i16,
    max_repeat: i16,
    /// Definition level at or above which a row counts as present.
    null_threshold: i16,
    /// Only definition levels are read, values are never decoded.
    levels_only: bool,
    validate_dictionary: bool,

    state: CursorState,
    /// Offset of the current page's header within the chunk.
    page_start: usize,
    /// Offset of the current page's data within the chunk.
    page_data_start: usize,
    /// Offsets of the definition levels and values of the current page,
    /// used for reporting corruption. For compressed pages these are the
    /// page data start plus the position in the decompressed buffer.
    levels_start: usize,
    values_start: usize,
    next_page_start: usize,
    /// Chunk row of the first row of the current page.
    row_of_page: usize,
    num_rows_in_page: usize,
    /// Rows consumed in the current page.
    rows_consumed: usize,

    def_levels: Option<RleBpDecoder>,
    decoder: Option<PageDecoder>,
    dictionary: Option<DictionaryStore>,

    /// Decompressed data for the current page. Kept around so the allocation
    /// can be reused for the next page if nothing else references it.
    page_buffer: Option<Bytes>,
    level_scratch: Vec<u32>,
    /// Null flags for the rows touched in the current page.
    nulls_in_read_range: Option<Arc<Bitmap>>,
    /// Null flags returned from the last read that spanned multiple pages.
    multi_page_nulls: Option<Arc<Bitmap>>,
    concat: BitConcatenation,
    gathered: Bitmap,
    visit_rows: Vec<usize>,
}

impl PageCursor {
    pub fn try_new(
        chunk: ColumnChunk,
        decompressor: Arc<dyn Decompressor>,
        column: &ColumnTypeDescriptor,
        validate_dictionary: bool,
    ) -> Result<Self> {
        let physical_type = match column.physical_type {
            Some(physical_type) => physical_type,
            None => {
                return Err(RayexecError::contract_violation(format!(
                    "Column '{}' is not a leaf column",
                    column.name
                )))
            }
        };

        Ok(PageCursor {
            chunk: chunk.data,
            codec: chunk.codec,
            decompressor,
            physical_type,
            max_define: column.max_define,
            max_repeat: column.max_repeat,
            null_threshold: column.max_define,
            levels_only: false,
            validate_dictionary,
            state: CursorState::Uninitialized,
            page_start: 0,
            page_data_start: 0,
            levels_start: 0,
            values_start: 0,
            next_page_start: 0,
            row_of_page: 0,
            num_rows_in_page: 0,
            rows_consumed: 0,
            def_levels: None,
            decoder: None,
            dictionary: None,
            page_buffer: None,
            level_scratch: Vec::new(),
            nulls_in_read_range: None,
            multi_page_nulls: None,
            concat: BitConcatenation::new(),
            gathered: Bitmap::default(),
            visit_rows: Vec::new(),
        })
    }

    /// Turn this into a cursor that only reads definition levels, with rows
    /// considered present when their level is at least `null_threshold`.
    ///
    /// Used for nulls of a struct, read through one of its leaves.
    pub fn levels_only(mut self, null_threshold: i16) -> Self {
        self.levels_only = true;
        self.null_threshold = null_threshold;
        self
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn dictionary(&self) -> Option<&DictionaryStore> {
        self.dictionary.as_ref()
    }

    /// Index of the next row in the chunk that hasn't been consumed.
    pub fn chunk_row(&self) -> usize {
        self.row_of_page + self.rows_consumed
    }

    /// Read the rows requested by `visitor`, passing values and nulls to it.
    ///
    /// Returns null flags for each of the visitor's rows, None if none of
    /// them are null. Afterwards the cursor is positioned after the last
    /// visited row.
    pub fn read_with_visitor<V: ColumnVisitor>(
        &mut self,
        visitor: &mut V,
    ) -> Result<Option<Arc<Bitmap>>> {
        let mut rows = std::mem::take(&mut self.visit_rows);
        rows.clear();
        rows.extend_from_slice(visitor.rows());

        let result = self.read_rows(visitor, &rows);
        self.visit_rows = rows;

        result
    }

    /// Skip the next `num_rows` rows.
    pub fn skip(&mut self, num_rows: usize) -> Result<()> {
        let mut remaining = num_rows;
        while remaining > 0 {
            if !self.ensure_page()? {
                return Err(RayexecError::contract_violation(format!(
                    "Cannot skip {remaining} rows past the end of the column chunk at row {}",
                    self.chunk_row()
                )));
            }

            let left_in_page = self.num_rows_in_page - self.rows_consumed;
            if remaining >= left_in_page {
                // Nothing else is needed from this page.
                self.abandon_page();
                remaining -= left_in_page;
                continue;
            }

            let nulls = self.decode_nulls(remaining)?;
            let num_values = nulls.as_ref().map(|n| n.popcnt()).unwrap_or(remaining);
            self.skip_values(num_values)?;
            self.consume(remaining);
            remaining = 0;
        }

        Ok(())
    }

    /// Read null flags for the next `num_rows` rows without materializing
    /// values.
    ///
    /// Returns None if none of the rows are null.
    pub fn read_nulls_only(&mut self, num_rows: usize) -> Result<Option<Arc<Bitmap>>> {
        let mut remaining = num_rows;
        let mut multi_page = false;
        let mut result = None;

        while remaining > 0 {
            if !self.ensure_page()? {
                return Err(RayexecError::contract_violation(format!(
                    "Cannot read {remaining} rows past the end of the column chunk at row {}",
                    self.chunk_row()
                )));
            }

            let count = usize::min(remaining, self.num_rows_in_page - self.rows_consumed);
            let nulls = self.decode_nulls(count)?;
            let num_values = nulls.as_ref().map(|n| n.popcnt()).unwrap_or(count);
            self.skip_values(num_values)?;
            self.consume(count);
            remaining -= count;

            if !multi_page && remaining == 0 {
                result = nulls;
                break;
            }

            if !multi_page {
                self.concat.reset(self.multi_page_nulls.take());
                multi_page = true;
            }
            match &nulls {
                Some(nulls) => self.concat.append(nulls, 0, count),
                None => self.concat.append_ones(count),
            }
        }

        if multi_page {
            result = self.concat.finish();
            self.multi_page_nulls = result.clone();
        }

        Ok(result)
    }

    fn read_rows<V: ColumnVisitor>(
        &mut self,
        visitor: &mut V,
        rows: &[usize],
    ) -> Result<Option<Arc<Bitmap>>> {
        if rows.is_empty() {
            return Ok(None);
        }
        if rows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RayexecError::contract_violation(
                "Rows to visit must be strictly increasing",
            ));
        }
        if self.levels_only {
            return Err(RayexecError::contract_violation(
                "Cannot visit values with a cursor that only reads levels",
            ));
        }

        let base = self.chunk_row();
        let mut values: Vec<V::Value> = Vec::new();
        let mut pos = 0;
        let mut multi_page = false;
        let mut result = None;

        while pos < rows.len() {
            if !self.ensure_page()? {
                return Err(RayexecError::contract_violation(format!(
                    "Requested row {} is past the end of the column chunk with {} rows",
                    base + rows[pos],
                    self.chunk_row()
                )));
            }

            // Request relative bounds of the current page's remaining rows.
            let page_first = self.chunk_row() - base;
            let page_end = page_first + (self.num_rows_in_page - self.rows_consumed);

            if rows[pos] >= page_end {
                trace!(page_start = self.page_start, "skipping page without decoding");
                self.abandon_page();
                continue;
            }

            let end = pos + rows[pos..].partition_point(|&row| row < page_end);
            let span = rows[end - 1] + 1 - page_first;

            trace!(
                page_start = self.page_start,
                first_row = base + rows[pos],
                num_rows = end - pos,
                span,
                "visiting page"
            );

            let nulls = self.decode_nulls(span)?;
            self.visit_page(visitor, rows, pos..end, page_first, nulls.as_deref(), &mut values)?;
            self.consume(span);

            // Rows visited in this page are exactly the first `span` rows.
            let dense = end - pos == span;

            if !multi_page && end == rows.len() {
                // Whole request landed on one page.
                result = match nulls {
                    None => None,
                    Some(nulls) if dense => Some(nulls),
                    Some(nulls) => {
                        gather(&mut self.gathered, &nulls, &rows[pos..end], page_first);
                        if self.gathered.is_all_set(0, self.gathered.len(), true) {
                            None
                        } else {
                            Some(Arc::new(self.gathered.clone()))
                        }
                    }
                };
            } else {
                if !multi_page {
                    self.concat.reset(self.multi_page_nulls.take());
                    multi_page = true;
                }
                match &nulls {
                    None => self.concat.append_ones(end - pos),
                    Some(nulls) if dense => self.concat.append(nulls, 0, span),
                    Some(nulls) => {
                        gather(&mut self.gathered, nulls, &rows[pos..end], page_first);
                        self.concat.append(&self.gathered, 0, self.gathered.len());
                    }
                }
            }

            pos = end;
        }

        if multi_page {
            result = self.concat.finish();
            self.multi_page_nulls = result.clone();
        }

        Ok(result)
    }

    /// Decode values for `rows[range]`, all of which are in the current page,
    /// and pass them to the visitor.
    ///
    /// `page_first` is the request relative index of the first unconsumed row
    /// in the page, `nulls` covers rows starting from there.
    fn visit_page<V: ColumnVisitor>(
        &mut self,
        visitor: &mut V,
        rows: &[usize],
        range: Range<usize>,
        page_first: usize,
        nulls: Option<&Bitmap>,
        values: &mut Vec<V::Value>,
    ) -> Result<()> {
        let decoder = match &mut self.decoder {
            Some(decoder) => decoder,
            None => return Err(RayexecError::new("Expected page decoder to be Some")),
        };
        let dict = self.dictionary.as_ref();
        let data_start = self.values_start as u64;

        let count_present = |start: usize, end: usize| match nulls {
            Some(nulls) => nulls.popcnt_range(start, end),
            None => end - start,
        };
        let is_present = |idx: usize| nulls.map(|n| n.value(idx)).unwrap_or(true);

        // Page relative index of the next row whose value hasn't been
        // decoded or skipped.
        let mut next = 0;
        let mut idx = range.start;

        while idx < range.end {
            // Find a run of consecutive rows.
            let run_start = idx;
            idx += 1;
            while idx < range.end && rows[idx] == rows[idx - 1] + 1 {
                idx += 1;
            }

            let first = rows[run_start] - page_first;
            let run_end = first + (idx - run_start);

            decoder
                .skip(count_present(next, first))
                .map_err(|e| e.offset_by(data_start))?;
            let num_values = count_present(first, run_end);

            if !V::HAS_FILTER && !V::EXTRACT_VALUES {
                decoder
                    .skip(num_values)
                    .map_err(|e| e.offset_by(data_start))?;
                for (page_row, pos) in (first..run_end).zip(run_start..idx) {
                    if is_present(page_row) {
                        visitor.visit_present(pos);
                    } else {
                        visitor.visit_null(pos);
                    }
                }
            } else {
                values.clear();
                decoder
                    .decode_into(dict, num_values, values)
                    .map_err(|e| e.offset_by(data_start))?;

                let mut decoded = values.drain(..);
                for (page_row, pos) in (first..run_end).zip(run_start..idx) {
                    if is_present(page_row) {
                        let Some(value) = decoded.next() else {
                            return Err(RayexecError::new("Decoded fewer values than expected"));
                        };
                        visitor.visit_value(pos, value);
                    } else {
                        visitor.visit_null(pos);
                    }
                }
            }

            next = run_end;
        }

        Ok(())
    }

    /// Make sure we're positioned in a data page with rows left.
    ///
    /// Returns false if the chunk has no more data pages.
    fn ensure_page(&mut self) -> Result<bool> {
        loop {
            match self.state {
                CursorState::DataPage(_) => {
                    if self.rows_consumed < self.num_rows_in_page {
                        return Ok(true);
                    }
                    self.state = CursorState::PageConsumed;
                }
                CursorState::ChunkExhausted => return Ok(false),
                CursorState::Uninitialized
                | CursorState::AwaitingPage
                | CursorState::PageConsumed => self.read_next_page()?,
            }
        }
    }

    fn read_next_page(&mut self) -> Result<()> {
        // Done with the previous page.
        self.row_of_page += self.num_rows_in_page;
        self.num_rows_in_page = 0;
        self.rows_consumed = 0;
        self.decoder = None;
        self.def_levels = None;

        let start = self.next_page_start;
        if start >= self.chunk.len() {
            self.state = CursorState::ChunkExhausted;
            return Ok(());
        }

        let (header, header_len) =
            PageHeader::try_decode(&self.chunk[start..]).map_err(|e| e.offset_by(start as u64))?;

        let compressed_size =
            non_negative(header.compressed_page_size, "compressed page size", start)?;
        let uncompressed_size =
            non_negative(header.uncompressed_page_size, "uncompressed page size", start)?;
        let data_start = start + header_len;
        let remaining = self.chunk.len() - data_start;
        if compressed_size > remaining {
            return Err(RayexecError::corruption(
                format!(
                    "Page size {compressed_size} exceeds the {remaining} bytes left in the column chunk"
                ),
                start as u64,
            ));
        }

        trace!(
            offset = start,
            page_type = ?header.page_type,
            compressed_size,
            uncompressed_size,
            "read page header"
        );

        self.page_start = start;
        self.page_data_start = data_start;
        self.levels_start = data_start;
        self.values_start = data_start;
        self.next_page_start = data_start + compressed_size;
        let data = data_start..data_start + compressed_size;

        match header.page_type {
            PageType::DictionaryPage => {
                self.load_dictionary(&header, data, uncompressed_size)?;
                self.state = CursorState::AwaitingPage;
            }
            PageType::DataPage => {
                let page_header = match &header.data_page_header {
                    Some(page_header) => page_header,
                    None => {
                        return Err(RayexecError::corruption(
                            "Data page missing data page header",
                            start as u64,
                        ))
                    }
                };
                self.init_v1(page_header, data, uncompressed_size)?;
                self.state = CursorState::DataPage(PageVersion::V1);
            }
            PageType::DataPageV2 => {
                let page_header = match &header.data_page_header_v2 {
                    Some(page_header) => page_header,
                    None => {
                        return Err(RayexecError::corruption(
                            "Data page missing data page v2 header",
                            start as u64,
                        ))
                    }
                };
                self.init_v2(page_header, data, uncompressed_size)?;
                self.state = CursorState::DataPage(PageVersion::V2);
            }
            PageType::IndexPage => self.state = CursorState::AwaitingPage,
        }

        Ok(())
    }

    fn load_dictionary(
        &mut self,
        header: &PageHeader,
        data: Range<usize>,
        uncompressed_size: usize,
    ) -> Result<()> {
        if self.levels_only {
            return Ok(());
        }

        let dict_header = match &header.dictionary_page_header {
            Some(dict_header) => dict_header,
            None => {
                return Err(RayexecError::corruption(
                    "Dictionary page missing dictionary page header",
                    self.page_start as u64,
                ))
            }
        };
        if !matches!(
            dict_header.encoding,
            Encoding::Plain | Encoding::PlainDictionary
        ) {
            not_implemented!("{:?} encoded dictionary page", dict_header.encoding);
        }
        if self.dictionary.is_some() {
            return Err(RayexecError::corruption(
                "Column chunk contains more than one dictionary page",
                self.page_start as u64,
            ));
        }

        let num_values = non_negative(
            dict_header.num_values,
            "dictionary value count",
            self.page_start,
        )?;
        // Dictionary outlives the data pages, give it its own buffer.
        let data = self.decompress(data, uncompressed_size, false)?;
        let dictionary = DictionaryStore::try_new(self.physical_type, data, num_values)
            .map_err(|e| e.offset_by(self.page_data_start as u64))?;

        debug!(
            offset = self.page_start,
            num_values,
            physical_type = ?self.physical_type,
            "loaded dictionary page"
        );

        self.dictionary = Some(dictionary);
        Ok(())
    }

    fn init_v1(
        &mut self,
        header: &DataPageHeaderV1,
        data: Range<usize>,
        uncompressed_size: usize,
    ) -> Result<()> {
        let num_rows = non_negative(header.num_values, "page value count", self.page_start)?;
        let data = self.decompress(data, uncompressed_size, true)?;
        let data_start = self.page_data_start as u64;

        // Levels are each prefixed with their length, repetition levels
        // first.
        let mut offset = 0;
        if self.max_repeat > 0 {
            self.check_level_encoding(header.repetition_level_encoding)?;
            let bit_width = num_required_bits(self.max_repeat as u64);
            let (_, len) = RleBpDecoder::try_new_length_prefixed(&data, bit_width)
                .map_err(|e| e.offset_by(data_start))?;
            offset += len;
        }
        if self.max_define > 0 {
            self.check_level_encoding(header.definition_level_encoding)?;
            let bit_width = num_required_bits(self.max_define as u64);
            let (levels, len) =
                RleBpDecoder::try_new_length_prefixed(&data.slice(offset..), bit_width)
                    .map_err(|e| e.offset_by(data_start + offset as u64))?;
            self.def_levels = Some(levels);
            // Past the length prefix.
            self.levels_start = self.page_data_start + offset + 4;
            offset += len;
        }

        self.values_start = self.page_data_start + offset;
        self.init_values(header.encoding, data.slice(offset..))?;
        self.num_rows_in_page = num_rows;

        Ok(())
    }

    fn init_v2(
        &mut self,
        header: &DataPageHeaderV2,
        data: Range<usize>,
        uncompressed_size: usize,
    ) -> Result<()> {
        let num_rows = non_negative(header.num_rows, "page row count", self.page_start)?;
        let rep_len = non_negative(
            header.repetition_levels_byte_length,
            "repetition levels length",
            self.page_start,
        )?;
        let def_len = non_negative(
            header.definition_levels_byte_length,
            "definition levels length",
            self.page_start,
        )?;

        let levels_len = rep_len + def_len;
        if levels_len > data.len() || levels_len > uncompressed_size {
            return Err(RayexecError::corruption(
                format!(
                    "Level lengths {rep_len} and {def_len} exceed page size {}",
                    data.len()
                ),
                self.page_start as u64,
            ));
        }

        // Levels are never compressed.
        if self.max_define > 0 {
            let levels_start = data.start + rep_len;
            self.levels_start = levels_start;
            self.def_levels = Some(RleBpDecoder::new(
                self.chunk.slice(levels_start..levels_start + def_len),
                num_required_bits(self.max_define as u64),
            ));
        }

        if !self.levels_only {
            let values_range = data.start + levels_len..data.end;
            self.values_start = values_range.start;
            let values = if header.is_compressed.unwrap_or(true) {
                self.decompress(values_range, uncompressed_size - levels_len, true)?
            } else {
                self.chunk.slice(values_range)
            };
            self.init_values(header.encoding, values)?;
        }
        self.num_rows_in_page = num_rows;

        Ok(())
    }

    fn init_values(&mut self, encoding: Encoding, data: Bytes) -> Result<()> {
        if self.levels_only {
            return Ok(());
        }

        let decoder = PageDecoder::try_new(
            encoding,
            self.physical_type,
            data,
            self.dictionary.is_some(),
            self.validate_dictionary,
        )
        .map_err(|e| e.offset_by(self.values_start as u64))?;
        self.decoder = Some(decoder);

        Ok(())
    }

    fn check_level_encoding(&self, encoding: Encoding) -> Result<()> {
        match encoding {
            Encoding::Rle => Ok(()),
            Encoding::BitPacked => not_implemented!("BIT_PACKED level encoding"),
            other => Err(RayexecError::corruption(
                format!("Invalid level encoding: {other:?}"),
                self.page_start as u64,
            )),
        }
    }

    /// Get the uncompressed bytes for `range` of the chunk.
    ///
    /// Uncompressed data is sliced from the chunk without copying. With
    /// `reuse`, the page buffer's allocation is used if we're its only owner.
    fn decompress(
        &mut self,
        range: Range<usize>,
        uncompressed_size: usize,
        reuse: bool,
    ) -> Result<Bytes> {
        if self.codec == CompressionCodec::Uncompressed {
            return Ok(self.chunk.slice(range));
        }

        // Codecs reserve space themselves, the header's size isn't trusted.
        let mut buf = if reuse {
            self.take_page_buffer()
        } else {
            Vec::new()
        };

        let start = range.start as u64;
        self.decompressor
            .decompress(self.codec, &self.chunk[range], uncompressed_size, &mut buf)
            .map_err(|e| e.offset_by(start))?;

        let data = Bytes::from(buf);
        if reuse {
            self.page_buffer = Some(data.clone());
        }

        Ok(data)
    }

    fn take_page_buffer(&mut self) -> Vec<u8> {
        match self.page_buffer.take().map(Bytes::try_into_mut) {
            Some(Ok(buf)) => {
                let mut buf = Vec::from(buf);
                buf.clear();
                buf
            }
            // Still referenced elsewhere, or never allocated.
            _ => Vec::new(),
        }
    }

    /// Decode null flags for the next `count` rows of the current page.
    ///
    /// Returns None if all rows are present.
    fn decode_nulls(&mut self, count: usize) -> Result<Option<Arc<Bitmap>>> {
        let levels = match &mut self.def_levels {
            Some(levels) => levels,
            None => return Ok(None),
        };

        self.level_scratch.clear();
        self.level_scratch.resize(count, 0);
        levels
            .get_batch(&mut self.level_scratch)
            .map_err(|e| e.offset_by(self.levels_start as u64))?;

        let threshold = self.null_threshold as u32;
        if self.level_scratch.iter().all(|&level| level >= threshold) {
            return Ok(None);
        }

        let mut bitmap = match self.nulls_in_read_range.take().map(Arc::try_unwrap) {
            Some(Ok(mut bitmap)) => {
                bitmap.clear();
                bitmap
            }
            _ => Bitmap::default(),
        };
        bitmap.reserve(count);
        for &level in &self.level_scratch {
            bitmap.push(level >= threshold);
        }

        let bitmap = Arc::new(bitmap);
        self.nulls_in_read_range = Some(bitmap.clone());

        Ok(Some(bitmap))
    }

    fn skip_values(&mut self, count: usize) -> Result<()> {
        match &mut self.decoder {
            Some(decoder) => decoder
                .skip(count)
                .map_err(|e| e.offset_by(self.values_start as u64)),
            None => Ok(()),
        }
    }

    fn consume(&mut self, count: usize) {
        self.rows_consumed += count;
        if self.rows_consumed == self.num_rows_in_page {
            self.state = CursorState::PageConsumed;
        }
    }

    /// Drop the rest of the current page without decoding it.
    fn abandon_page(&mut self) {
        self.rows_consumed = self.num_rows_in_page;
        self.state = CursorState::PageConsumed;
    }
}

fn non_negative(v: i32, what: &str, offset: usize) -> Result<usize> {
    usize::try_from(v)
        .map_err(|_| RayexecError::corruption(format!("Negative {what}: {v}"), offset as u64))
}

/// Collect the flags for `rows` into `out`, replacing its contents.
fn gather(out: &mut Bitmap, nulls: &Bitmap, rows: &[usize], page_first: usize) {
    out.clear();
    out.reserve(rows.len());
    for &row in rows {
        out.push(nulls.value(row - page_first));
    }
}
