//! Physical value types that can be decoded from pages.

use std::fmt::Debug;

use bytes::Bytes;
use num::traits::AsPrimitive;
use rayexec_bullet::array::{ArrayData, VarlenStorage};
use rayexec_bullet::bitmap::Bitmap;
use rayexec_bullet::datatype::DataType;
use rayexec_error::{not_implemented, RayexecError, Result};

use crate::dictionary::DictionaryStore;
use crate::encoding::plain::PlainDecoder;
use crate::filter::Filter;
use crate::types::PhysicalType;

/// A value of some physical type.
///
/// `Default` provides the placeholder used for null rows.
pub trait ParquetValue: Debug + Clone + Default + PartialEq + Send + Sync + 'static {
    const PHYSICAL_TYPE: PhysicalType;

    /// Decode `count` plain encoded values onto the end of `out`.
    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()>;

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self>;

    /// Convert a value from a boolean decoder.
    fn from_bool(_v: bool) -> Result<Self> {
        not_implemented!("Boolean decoding for {:?}", Self::PHYSICAL_TYPE)
    }

    /// Convert a value from a delta binary decoder.
    fn from_delta(_v: i64) -> Result<Self> {
        not_implemented!("Delta decoding for {:?}", Self::PHYSICAL_TYPE)
    }

    /// Check if this value passes a filter.
    fn test_filter(&self, filter: &Filter) -> bool;

    /// Build array data for the output datatype.
    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData>;
}

fn unknown_conversion(physical: PhysicalType, datatype: &DataType) -> RayexecError {
    RayexecError::not_implemented(format!(
        "Unknown conversion from parquet to bullet type; parquet: {physical:?}, bullet: {datatype}"
    ))
}

impl ParquetValue for bool {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Boolean;

    fn decode_plain(
        _decoder: &mut PlainDecoder,
        _count: usize,
        _out: &mut Vec<Self>,
    ) -> Result<()> {
        // Plain booleans are bit packed and go through the boolean decoder.
        Err(RayexecError::new("Booleans cannot be decoded as byte aligned plain values"))
    }

    fn from_dictionary(_dict: &DictionaryStore, _idx: u32) -> Result<Self> {
        not_implemented!("Dictionary encoded booleans")
    }

    fn from_bool(v: bool) -> Result<Self> {
        Ok(v)
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_bool(*self)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        match datatype {
            DataType::Boolean => Ok(ArrayData::Boolean(Bitmap::from_iter(values))),
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

impl ParquetValue for i32 {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Int32;

    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()> {
        decoder.decode_fixed(count, out, i32::from_le_bytes)
    }

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self> {
        Ok(i32::from_le_bytes(dict.fixed(idx as usize)?))
    }

    fn from_delta(v: i64) -> Result<Self> {
        // Deltas wrap at 32 bits for INT32 columns.
        Ok(v as i32)
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_i64(*self as i64)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        // 8 and 16 bit integers are stored as INT32.
        match datatype {
            DataType::Int32 => Ok(ArrayData::Int32(values)),
            DataType::Int16 => Ok(ArrayData::Int16(narrow(values))),
            DataType::Int8 => Ok(ArrayData::Int8(narrow(values))),
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

impl ParquetValue for i64 {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Int64;

    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()> {
        decoder.decode_fixed(count, out, i64::from_le_bytes)
    }

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self> {
        Ok(i64::from_le_bytes(dict.fixed(idx as usize)?))
    }

    fn from_delta(v: i64) -> Result<Self> {
        Ok(v)
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_i64(*self)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        match datatype {
            DataType::Int64 => Ok(ArrayData::Int64(values)),
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

impl ParquetValue for f32 {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Float;

    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()> {
        decoder.decode_fixed(count, out, f32::from_le_bytes)
    }

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self> {
        Ok(f32::from_le_bytes(dict.fixed(idx as usize)?))
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_f64(*self as f64)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        match datatype {
            DataType::Float32 => Ok(ArrayData::Float32(values)),
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

impl ParquetValue for f64 {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Double;

    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()> {
        decoder.decode_fixed(count, out, f64::from_le_bytes)
    }

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self> {
        Ok(f64::from_le_bytes(dict.fixed(idx as usize)?))
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_f64(*self)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        match datatype {
            DataType::Float64 => Ok(ArrayData::Float64(values)),
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

/// Byte arrays share the page (or dictionary) buffer they were decoded from.
impl ParquetValue for Bytes {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::ByteArray;

    fn decode_plain(decoder: &mut PlainDecoder, count: usize, out: &mut Vec<Self>) -> Result<()> {
        out.reserve(count);
        for _ in 0..count {
            out.push(decoder.next_byte_array()?);
        }
        Ok(())
    }

    fn from_dictionary(dict: &DictionaryStore, idx: u32) -> Result<Self> {
        dict.byte_array(idx as usize)
    }

    fn test_filter(&self, filter: &Filter) -> bool {
        filter.test_bytes(self)
    }

    fn into_array_data(values: Vec<Self>, datatype: &DataType) -> Result<ArrayData> {
        match datatype {
            DataType::Utf8 | DataType::Binary => {
                let data_len = values.iter().map(|v| v.len()).sum();
                let mut storage = VarlenStorage::with_capacity(values.len(), data_len);
                for v in &values {
                    storage.push(v);
                }
                Ok(ArrayData::Binary(storage))
            }
            other => Err(unknown_conversion(Self::PHYSICAL_TYPE, other)),
        }
    }
}

fn narrow<T>(values: Vec<i32>) -> Vec<T>
where
    T: Copy + 'static,
    i32: AsPrimitive<T>,
{
    values.into_iter().map(|v| v.as_()).collect()
}
