//! Encoders for building column chunks in tests.

use std::io::Write;

use bytes::Bytes;
use rayexec_bullet::datatype::DataType;
use rayexec_error::{RayexecError, Result};

use crate::column::page_cursor::PageVersion;
use crate::column::ColumnChunk;
use crate::compression::CompressionCodec;
use crate::encoding::uleb128::{encode_uleb128, encode_zigzag_uleb128};
use crate::encoding::{num_required_bits, Encoding};
use crate::page::{
    DataPageHeaderV1,
    DataPageHeaderV2,
    DictionaryPageHeader,
    PageHeader,
    PageType,
    Statistics,
};
use crate::row_group::RowGroupSource;
use crate::schema::ColumnTypeDescriptor;
use crate::types::{PhysicalType, Repetition};

/// Pack values LSB first using `num_bits` per value.
pub fn pack_bits(values: &[u64], num_bits: usize) -> Vec<u8> {
    let mut out = vec![0u8; (values.len() * num_bits).div_ceil(8)];
    for (idx, &value) in values.iter().enumerate() {
        for bit in 0..num_bits {
            if value & (1 << bit) != 0 {
                let pos = idx * num_bits + bit;
                out[pos / 8] |= 1 << (pos % 8);
            }
        }
    }
    out
}

#[derive(Debug)]
pub struct RleBpEncoder {
    bit_width: u8,
    buf: Vec<u8>,
}

impl RleBpEncoder {
    pub fn new(bit_width: u8) -> Self {
        RleBpEncoder {
            bit_width,
            buf: Vec::new(),
        }
    }

    pub fn put_run(&mut self, value: u32, count: usize) {
        encode_uleb128((count as u64) << 1, &mut self.buf);
        let num_bytes = (self.bit_width as usize).div_ceil(8);
        self.buf
            .extend_from_slice(&value.to_le_bytes()[..num_bytes]);
    }

    /// Write a bit packed run, padded with zeros to a multiple of 8 values.
    pub fn put_literal(&mut self, values: &[u32]) {
        let num_groups = values.len().div_ceil(8);
        encode_uleb128(((num_groups as u64) << 1) | 1, &mut self.buf);

        let mut padded: Vec<u64> = values.iter().map(|&v| v as u64).collect();
        padded.resize(num_groups * 8, 0);
        self.buf
            .extend_from_slice(&pack_bits(&padded, self.bit_width as usize));
    }

    /// Write levels as a sequence of RLE runs.
    pub fn put_levels(&mut self, levels: &[u32]) {
        let mut idx = 0;
        while idx < levels.len() {
            let value = levels[idx];
            let len = levels[idx..].iter().take_while(|&&v| v == value).count();
            self.put_run(value, len);
            idx += len;
        }
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Delta binary packed encoding with 128 value blocks and 4 miniblocks.
pub fn encode_delta_binary(values: &[i64]) -> Vec<u8> {
    const BLOCK_SIZE: usize = 128;
    const MINIBLOCKS: usize = 4;
    const MINIBLOCK_SIZE: usize = BLOCK_SIZE / MINIBLOCKS;

    let mut out = Vec::new();
    encode_uleb128(BLOCK_SIZE as u64, &mut out);
    encode_uleb128(MINIBLOCKS as u64, &mut out);
    encode_uleb128(values.len() as u64, &mut out);
    encode_zigzag_uleb128(values.first().copied().unwrap_or(0), &mut out);

    let deltas: Vec<i64> = values.windows(2).map(|w| w[1].wrapping_sub(w[0])).collect();

    for block in deltas.chunks(BLOCK_SIZE) {
        let min_delta = block.iter().copied().min().unwrap_or(0);
        encode_zigzag_uleb128(min_delta, &mut out);

        let relative: Vec<u64> = block
            .iter()
            .map(|&d| d.wrapping_sub(min_delta) as u64)
            .collect();
        let miniblocks: Vec<&[u64]> = relative.chunks(MINIBLOCK_SIZE).collect();

        let widths: Vec<usize> = (0..MINIBLOCKS)
            .map(|idx| match miniblocks.get(idx) {
                Some(mini) => {
                    let max = mini.iter().copied().max().unwrap_or(0);
                    64 - max.leading_zeros() as usize
                }
                None => 0,
            })
            .collect();
        out.extend(widths.iter().map(|&w| w as u8));

        for (mini, &width) in miniblocks.iter().zip(&widths) {
            let mut padded = mini.to_vec();
            padded.resize(MINIBLOCK_SIZE, 0);
            out.extend_from_slice(&pack_bits(&padded, width));
        }
    }

    out
}

/// Values that can be plain encoded.
pub trait PlainEncode {
    fn encode_plain(values: &[Self], out: &mut Vec<u8>)
    where
        Self: Sized;
}

macro_rules! impl_plain_encode_le {
    ($($prim:ty),*) => {
        $(
            impl PlainEncode for $prim {
                fn encode_plain(values: &[Self], out: &mut Vec<u8>) {
                    for v in values {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
        )*
    };
}

impl_plain_encode_le!(i32, i64, f32, f64);

impl PlainEncode for &str {
    fn encode_plain(values: &[Self], out: &mut Vec<u8>) {
        for v in values {
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
    }
}

impl PlainEncode for bool {
    fn encode_plain(values: &[Self], out: &mut Vec<u8>) {
        let bits: Vec<u64> = values.iter().map(|&v| v as u64).collect();
        out.extend_from_slice(&pack_bits(&bits, 1));
    }
}

pub fn plain_encode<T: PlainEncode>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    T::encode_plain(values, &mut out);
    out
}

/// Dictionary indices with the leading bit width byte.
pub fn encode_dictionary_indices(indices: &[u32]) -> Vec<u8> {
    let max = indices.iter().copied().max().unwrap_or(0);
    let bit_width = num_required_bits(max as u64);
    let mut enc = RleBpEncoder::new(bit_width);
    enc.put_literal(indices);

    let mut out = vec![bit_width];
    out.extend_from_slice(&enc.finish());
    out
}

pub fn compress(codec: CompressionCodec, data: &[u8]) -> Vec<u8> {
    match codec {
        CompressionCodec::Uncompressed => data.to_vec(),
        CompressionCodec::Snappy => snap::raw::Encoder::new().compress_vec(data).unwrap(),
        CompressionCodec::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }
        CompressionCodec::Zstd => zstd::encode_all(data, 3).unwrap(),
        other => panic!("unsupported codec in tests: {other:?}"),
    }
}

/// Descriptor for a top level leaf column.
pub fn leaf_column(physical_type: PhysicalType, max_define: i16) -> ColumnTypeDescriptor {
    let datatype = match physical_type {
        PhysicalType::Boolean => DataType::Boolean,
        PhysicalType::Int32 => DataType::Int32,
        PhysicalType::Int64 => DataType::Int64,
        PhysicalType::Float => DataType::Float32,
        PhysicalType::Double => DataType::Float64,
        _ => DataType::Binary,
    };
    ColumnTypeDescriptor {
        id: 1,
        name: "c".to_string(),
        datatype,
        repetition: if max_define > 0 {
            Repetition::Optional
        } else {
            Repetition::Required
        },
        physical_type: Some(physical_type),
        leaf_index: Some(0),
        max_define,
        max_repeat: 0,
        children: Vec::new(),
    }
}

/// Writes pages for a single column chunk.
#[derive(Debug)]
pub struct ChunkWriter {
    max_define: i16,
    codec: CompressionCodec,
    version: PageVersion,
    buf: Vec<u8>,
}

impl ChunkWriter {
    pub fn new(max_define: i16) -> Self {
        ChunkWriter {
            max_define,
            codec: CompressionCodec::Uncompressed,
            version: PageVersion::V1,
            buf: Vec::new(),
        }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_version(mut self, version: PageVersion) -> Self {
        self.version = version;
        self
    }

    /// Offset the next page will start at.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_dictionary_page(&mut self, plain_values: &[u8], num_values: usize) {
        let compressed = compress(self.codec, plain_values);
        let header = PageHeader {
            page_type: PageType::DictionaryPage,
            uncompressed_page_size: plain_values.len() as i32,
            compressed_page_size: compressed.len() as i32,
            crc: None,
            data_page_header: None,
            dictionary_page_header: Some(DictionaryPageHeader {
                num_values: num_values as i32,
                encoding: Encoding::Plain,
                is_sorted: None,
            }),
            data_page_header_v2: None,
        };
        header.encode(&mut self.buf).unwrap();
        self.buf.extend_from_slice(&compressed);
    }

    /// Write a data page.
    ///
    /// `def_levels` must be provided if the column has definition levels,
    /// one level per row.
    pub fn write_data_page(
        &mut self,
        def_levels: Option<&[u32]>,
        encoding: Encoding,
        values: &[u8],
        num_rows: usize,
    ) {
        let levels = match def_levels {
            Some(levels) => {
                assert!(self.max_define > 0);
                assert_eq!(num_rows, levels.len());
                let mut enc = RleBpEncoder::new(num_required_bits(self.max_define as u64));
                enc.put_levels(levels);
                enc.finish().to_vec()
            }
            None => {
                assert_eq!(0, self.max_define);
                Vec::new()
            }
        };
        let num_nulls = def_levels
            .map(|l| l.iter().filter(|&&l| l < self.max_define as u32).count())
            .unwrap_or(0);

        match self.version {
            PageVersion::V1 => {
                let mut body = Vec::new();
                if def_levels.is_some() {
                    body.extend_from_slice(&(levels.len() as u32).to_le_bytes());
                    body.extend_from_slice(&levels);
                }
                body.extend_from_slice(values);
                let compressed = compress(self.codec, &body);

                let header = PageHeader {
                    page_type: PageType::DataPage,
                    uncompressed_page_size: body.len() as i32,
                    compressed_page_size: compressed.len() as i32,
                    crc: None,
                    data_page_header: Some(DataPageHeaderV1 {
                        num_values: num_rows as i32,
                        encoding,
                        definition_level_encoding: Encoding::Rle,
                        repetition_level_encoding: Encoding::Rle,
                        statistics: None,
                    }),
                    dictionary_page_header: None,
                    data_page_header_v2: None,
                };
                header.encode(&mut self.buf).unwrap();
                self.buf.extend_from_slice(&compressed);
            }
            PageVersion::V2 => {
                let compressed = compress(self.codec, values);
                let header = PageHeader {
                    page_type: PageType::DataPageV2,
                    uncompressed_page_size: (levels.len() + values.len()) as i32,
                    compressed_page_size: (levels.len() + compressed.len()) as i32,
                    crc: None,
                    data_page_header: None,
                    dictionary_page_header: None,
                    data_page_header_v2: Some(DataPageHeaderV2 {
                        num_values: num_rows as i32,
                        num_nulls: num_nulls as i32,
                        num_rows: num_rows as i32,
                        encoding,
                        definition_levels_byte_length: levels.len() as i32,
                        repetition_levels_byte_length: 0,
                        is_compressed: Some(self.codec != CompressionCodec::Uncompressed),
                        statistics: None,
                    }),
                };
                header.encode(&mut self.buf).unwrap();
                self.buf.extend_from_slice(&levels);
                self.buf.extend_from_slice(&compressed);
            }
        }
    }

    /// Write a plain encoded page, None values are written as nulls.
    pub fn write_plain_page<T: PlainEncode + Clone>(&mut self, values: &[Option<T>]) {
        let present: Vec<T> = values.iter().flatten().cloned().collect();
        let plain = plain_encode(&present);
        if self.max_define > 0 {
            let levels = self.levels_for(values.iter().map(|v| v.is_some()));
            self.write_data_page(Some(&levels), Encoding::Plain, &plain, values.len());
        } else {
            assert_eq!(present.len(), values.len());
            self.write_data_page(None, Encoding::Plain, &plain, values.len());
        }
    }

    /// Write a dictionary encoded page of indices, None values are written
    /// as nulls.
    pub fn write_dictionary_indices_page(&mut self, indices: &[Option<u32>]) {
        let present: Vec<u32> = indices.iter().flatten().copied().collect();
        let encoded = encode_dictionary_indices(&present);
        if self.max_define > 0 {
            let levels = self.levels_for(indices.iter().map(|v| v.is_some()));
            self.write_data_page(Some(&levels), Encoding::RleDictionary, &encoded, indices.len());
        } else {
            self.write_data_page(None, Encoding::RleDictionary, &encoded, indices.len());
        }
    }

    /// Append raw bytes, for writing corrupt chunks.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn finish(self) -> ColumnChunk {
        ColumnChunk::new(self.buf, self.codec)
    }

    fn levels_for(&self, present: impl Iterator<Item = bool>) -> Vec<u32> {
        let max = self.max_define as u32;
        present.map(|p| if p { max } else { max - 1 }).collect()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryRowGroup {
    pub num_rows: usize,
    pub chunks: Vec<ColumnChunk>,
    pub statistics: Vec<Option<Statistics>>,
}

/// Row groups held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub row_groups: Vec<MemoryRowGroup>,
}

impl MemorySource {
    fn row_group(&self, row_group: usize) -> Result<&MemoryRowGroup> {
        self.row_groups.get(row_group).ok_or_else(|| {
            RayexecError::contract_violation(format!("Missing row group {row_group}"))
        })
    }
}

impl RowGroupSource for MemorySource {
    fn num_row_groups(&self) -> usize {
        self.row_groups.len()
    }

    fn num_rows(&self, row_group: usize) -> Result<usize> {
        Ok(self.row_group(row_group)?.num_rows)
    }

    fn column_chunk(&self, row_group: usize, leaf: usize) -> Result<ColumnChunk> {
        self.row_group(row_group)?
            .chunks
            .get(leaf)
            .cloned()
            .ok_or_else(|| RayexecError::contract_violation(format!("Missing column {leaf}")))
    }

    fn statistics(&self, row_group: usize, leaf: usize) -> Result<Option<Statistics>> {
        Ok(self
            .row_group(row_group)?
            .statistics
            .get(leaf)
            .cloned()
            .flatten())
    }
}
