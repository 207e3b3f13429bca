//! Page headers.
//!
//! Headers are thrift compact protocol structs that precede every page in a
//! column chunk.

use rayexec_error::{RayexecError, Result};
use thrift::protocol::{
    TCompactInputProtocol, TCompactOutputProtocol, TInputProtocol, TOutputProtocol,
    TStructIdentifier, TType,
};

use crate::encoding::Encoding;
use crate::thrift_ext::{
    field_id, invalid_data, required, write_binary_field, write_bool_field, write_i32_field,
    write_i64_field, write_struct_field, TSerializable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    DataPage,
    IndexPage,
    DictionaryPage,
    DataPageV2,
}

impl PageType {
    pub const fn from_thrift(id: i32) -> Option<Self> {
        Some(match id {
            0 => Self::DataPage,
            1 => Self::IndexPage,
            2 => Self::DictionaryPage,
            3 => Self::DataPageV2,
            _ => return None,
        })
    }

    pub const fn to_thrift(self) -> i32 {
        match self {
            Self::DataPage => 0,
            Self::IndexPage => 1,
            Self::DictionaryPage => 2,
            Self::DataPageV2 => 3,
        }
    }
}

/// Statistics stored alongside a page or column chunk.
///
/// Values are plain encoded and left uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub max: Option<Vec<u8>>,
    pub min: Option<Vec<u8>>,
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
    pub max_value: Option<Vec<u8>>,
    pub min_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPageHeaderV1 {
    pub num_values: i32,
    pub encoding: Encoding,
    pub definition_level_encoding: Encoding,
    pub repetition_level_encoding: Encoding,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPageHeaderV2 {
    pub num_values: i32,
    pub num_nulls: i32,
    pub num_rows: i32,
    pub encoding: Encoding,
    pub definition_levels_byte_length: i32,
    pub repetition_levels_byte_length: i32,
    /// Whether the values section is compressed, defaults to true.
    pub is_compressed: Option<bool>,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
    pub is_sorted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub uncompressed_page_size: i32,
    pub compressed_page_size: i32,
    pub crc: Option<i32>,
    pub data_page_header: Option<DataPageHeaderV1>,
    pub dictionary_page_header: Option<DictionaryPageHeader>,
    pub data_page_header_v2: Option<DataPageHeaderV2>,
}

impl PageHeader {
    /// Decode a header from the start of `buf`.
    ///
    /// Returns the header along with the number of bytes it took up. Errors
    /// are corruption errors relative to the start of `buf`.
    pub fn try_decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut remaining = buf;
        let mut input = TCompactInputProtocol::new(&mut remaining);
        let header = PageHeader::read_from_in_protocol(&mut input)
            .map_err(|e| RayexecError::corruption(format!("Failed to read page header: {e}"), 0))?;
        drop(input);

        Ok((header, buf.len() - remaining.len()))
    }

    /// Encode this header onto the end of `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut output = TCompactOutputProtocol::new(out);
        self.write_to_out_protocol(&mut output)
            .map_err(|e| RayexecError::new(format!("Failed to write page header: {e}")))?;
        output
            .flush()
            .map_err(|e| RayexecError::new(format!("Failed to flush page header: {e}")))
    }
}

fn read_encoding<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Encoding> {
    let id = i_prot.read_i32()?;
    Encoding::from_thrift(id).ok_or_else(|| invalid_data(format!("Unknown encoding: {id}")))
}

impl TSerializable for Statistics {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        let mut stats = Statistics::default();
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => stats.max = Some(i_prot.read_bytes()?),
                2 => stats.min = Some(i_prot.read_bytes()?),
                3 => stats.null_count = Some(i_prot.read_i64()?),
                4 => stats.distinct_count = Some(i_prot.read_i64()?),
                5 => stats.max_value = Some(i_prot.read_bytes()?),
                6 => stats.min_value = Some(i_prot.read_bytes()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;
        Ok(stats)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Statistics"))?;
        if let Some(v) = &self.max {
            write_binary_field(o_prot, "max", 1, v)?;
        }
        if let Some(v) = &self.min {
            write_binary_field(o_prot, "min", 2, v)?;
        }
        if let Some(v) = self.null_count {
            write_i64_field(o_prot, "null_count", 3, v)?;
        }
        if let Some(v) = self.distinct_count {
            write_i64_field(o_prot, "distinct_count", 4, v)?;
        }
        if let Some(v) = &self.max_value {
            write_binary_field(o_prot, "max_value", 5, v)?;
        }
        if let Some(v) = &self.min_value {
            write_binary_field(o_prot, "min_value", 6, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl TSerializable for DataPageHeaderV1 {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        let mut num_values = None;
        let mut encoding = None;
        let mut def_encoding = None;
        let mut rep_encoding = None;
        let mut statistics = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => num_values = Some(i_prot.read_i32()?),
                2 => encoding = Some(read_encoding(i_prot)?),
                3 => def_encoding = Some(read_encoding(i_prot)?),
                4 => rep_encoding = Some(read_encoding(i_prot)?),
                5 => statistics = Some(Statistics::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        Ok(DataPageHeaderV1 {
            num_values: required("DataPageHeader.num_values", num_values)?,
            encoding: required("DataPageHeader.encoding", encoding)?,
            definition_level_encoding: required(
                "DataPageHeader.definition_level_encoding",
                def_encoding,
            )?,
            repetition_level_encoding: required(
                "DataPageHeader.repetition_level_encoding",
                rep_encoding,
            )?,
            statistics,
        })
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DataPageHeader"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "encoding", 2, self.encoding.to_thrift())?;
        write_i32_field(
            o_prot,
            "definition_level_encoding",
            3,
            self.definition_level_encoding.to_thrift(),
        )?;
        write_i32_field(
            o_prot,
            "repetition_level_encoding",
            4,
            self.repetition_level_encoding.to_thrift(),
        )?;
        if let Some(stats) = &self.statistics {
            write_struct_field(o_prot, "statistics", 5, stats)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl TSerializable for DataPageHeaderV2 {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        let mut num_values = None;
        let mut num_nulls = None;
        let mut num_rows = None;
        let mut encoding = None;
        let mut def_len = None;
        let mut rep_len = None;
        let mut is_compressed = None;
        let mut statistics = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => num_values = Some(i_prot.read_i32()?),
                2 => num_nulls = Some(i_prot.read_i32()?),
                3 => num_rows = Some(i_prot.read_i32()?),
                4 => encoding = Some(read_encoding(i_prot)?),
                5 => def_len = Some(i_prot.read_i32()?),
                6 => rep_len = Some(i_prot.read_i32()?),
                7 => is_compressed = Some(i_prot.read_bool()?),
                8 => statistics = Some(Statistics::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        Ok(DataPageHeaderV2 {
            num_values: required("DataPageHeaderV2.num_values", num_values)?,
            num_nulls: required("DataPageHeaderV2.num_nulls", num_nulls)?,
            num_rows: required("DataPageHeaderV2.num_rows", num_rows)?,
            encoding: required("DataPageHeaderV2.encoding", encoding)?,
            definition_levels_byte_length: required(
                "DataPageHeaderV2.definition_levels_byte_length",
                def_len,
            )?,
            repetition_levels_byte_length: required(
                "DataPageHeaderV2.repetition_levels_byte_length",
                rep_len,
            )?,
            is_compressed,
            statistics,
        })
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DataPageHeaderV2"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "num_nulls", 2, self.num_nulls)?;
        write_i32_field(o_prot, "num_rows", 3, self.num_rows)?;
        write_i32_field(o_prot, "encoding", 4, self.encoding.to_thrift())?;
        write_i32_field(
            o_prot,
            "definition_levels_byte_length",
            5,
            self.definition_levels_byte_length,
        )?;
        write_i32_field(
            o_prot,
            "repetition_levels_byte_length",
            6,
            self.repetition_levels_byte_length,
        )?;
        if let Some(v) = self.is_compressed {
            write_bool_field(o_prot, "is_compressed", 7, v)?;
        }
        if let Some(stats) = &self.statistics {
            write_struct_field(o_prot, "statistics", 8, stats)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl TSerializable for DictionaryPageHeader {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        let mut num_values = None;
        let mut encoding = None;
        let mut is_sorted = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => num_values = Some(i_prot.read_i32()?),
                2 => encoding = Some(read_encoding(i_prot)?),
                3 => is_sorted = Some(i_prot.read_bool()?),
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        Ok(DictionaryPageHeader {
            num_values: required("DictionaryPageHeader.num_values", num_values)?,
            encoding: required("DictionaryPageHeader.encoding", encoding)?,
            is_sorted,
        })
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DictionaryPageHeader"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "encoding", 2, self.encoding.to_thrift())?;
        if let Some(v) = self.is_sorted {
            write_bool_field(o_prot, "is_sorted", 3, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

impl TSerializable for PageHeader {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        i_prot.read_struct_begin()?;
        let mut page_type = None;
        let mut uncompressed_page_size = None;
        let mut compressed_page_size = None;
        let mut crc = None;
        let mut data_page_header = None;
        let mut dictionary_page_header = None;
        let mut data_page_header_v2 = None;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_id(&field_ident)? {
                1 => {
                    let id = i_prot.read_i32()?;
                    page_type = Some(
                        PageType::from_thrift(id)
                            .ok_or_else(|| invalid_data(format!("Unknown page type: {id}")))?,
                    );
                }
                2 => uncompressed_page_size = Some(i_prot.read_i32()?),
                3 => compressed_page_size = Some(i_prot.read_i32()?),
                4 => crc = Some(i_prot.read_i32()?),
                5 => data_page_header = Some(DataPageHeaderV1::read_from_in_protocol(i_prot)?),
                7 => {
                    dictionary_page_header =
                        Some(DictionaryPageHeader::read_from_in_protocol(i_prot)?)
                }
                8 => data_page_header_v2 = Some(DataPageHeaderV2::read_from_in_protocol(i_prot)?),
                // Index page header (6) has no fields we use.
                _ => i_prot.skip(field_ident.field_type)?,
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        Ok(PageHeader {
            page_type: required("PageHeader.type", page_type)?,
            uncompressed_page_size: required(
                "PageHeader.uncompressed_page_size",
                uncompressed_page_size,
            )?,
            compressed_page_size: required(
                "PageHeader.compressed_page_size",
                compressed_page_size,
            )?,
            crc,
            data_page_header,
            dictionary_page_header,
            data_page_header_v2,
        })
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("PageHeader"))?;
        write_i32_field(o_prot, "type", 1, self.page_type.to_thrift())?;
        write_i32_field(o_prot, "uncompressed_page_size", 2, self.uncompressed_page_size)?;
        write_i32_field(o_prot, "compressed_page_size", 3, self.compressed_page_size)?;
        if let Some(crc) = self.crc {
            write_i32_field(o_prot, "crc", 4, crc)?;
        }
        if let Some(header) = &self.data_page_header {
            write_struct_field(o_prot, "data_page_header", 5, header)?;
        }
        if let Some(header) = &self.dictionary_page_header {
            write_struct_field(o_prot, "dictionary_page_header", 7, header)?;
        }
        if let Some(header) = &self.data_page_header_v2 {
            write_struct_field(o_prot, "data_page_header_v2", 8, header)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}
