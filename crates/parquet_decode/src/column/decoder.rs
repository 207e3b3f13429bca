use bytes::Bytes;
use rayexec_error::{not_implemented, RayexecError, Result};

use crate::dictionary::DictionaryStore;
use crate::encoding::boolean::BooleanDecoder;
use crate::encoding::delta_binary::DeltaBinaryDecoder;
use crate::encoding::dictionary::DictIndexDecoder;
use crate::encoding::plain::PlainDecoder;
use crate::encoding::rle_bp::RleBpDecoder;
use crate::encoding::Encoding;
use crate::types::PhysicalType;
use crate::value::ParquetValue;

/// Decoder for the values section of a single data page.
///
/// Selected once per page from the page's encoding.
#[derive(Debug)]
pub enum PageDecoder {
    Plain {
        decoder: PlainDecoder,
        physical_type: PhysicalType,
    },
    PlainBoolean {
        decoder: BooleanDecoder,
        scratch: Vec<bool>,
    },
    RleBoolean {
        decoder: RleBpDecoder,
        scratch: Vec<u32>,
    },
    Dictionary {
        decoder: DictIndexDecoder,
        indices: Vec<u32>,
        /// Check all indices of a batch before looking them up.
        validate: bool,
    },
    DeltaBinary(DeltaBinaryDecoder),
}

impl PageDecoder {
    /// Create a decoder for a page's values.
    ///
    /// New encodings get added here.
    pub fn try_new(
        encoding: Encoding,
        physical_type: PhysicalType,
        data: Bytes,
        has_dictionary: bool,
        validate: bool,
    ) -> Result<Self> {
        Ok(match (encoding, physical_type) {
            (Encoding::Plain, PhysicalType::Boolean) => PageDecoder::PlainBoolean {
                decoder: BooleanDecoder::new(data),
                scratch: Vec::new(),
            },
            (Encoding::Plain, physical_type) => PageDecoder::Plain {
                decoder: PlainDecoder::new(data),
                physical_type,
            },
            (Encoding::Rle, PhysicalType::Boolean) => {
                let (decoder, _) = RleBpDecoder::try_new_length_prefixed(&data, 1)?;
                PageDecoder::RleBoolean {
                    decoder,
                    scratch: Vec::new(),
                }
            }
            (Encoding::PlainDictionary | Encoding::RleDictionary, _) => {
                if !has_dictionary {
                    return Err(RayexecError::corruption(
                        "Dictionary encoded page without a dictionary page",
                        0,
                    ));
                }
                PageDecoder::Dictionary {
                    decoder: DictIndexDecoder::try_new(data)?,
                    indices: Vec::new(),
                    validate,
                }
            }
            (Encoding::DeltaBinaryPacked, PhysicalType::Int32 | PhysicalType::Int64) => {
                PageDecoder::DeltaBinary(DeltaBinaryDecoder::try_new(&data)?)
            }
            (encoding, physical_type) => {
                not_implemented!("{encoding:?} encoding for {physical_type:?} values")
            }
        })
    }

    /// Decode the next `count` values onto the end of `out`.
    pub fn decode_into<T: ParquetValue>(
        &mut self,
        dict: Option<&DictionaryStore>,
        count: usize,
        out: &mut Vec<T>,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        match self {
            Self::Plain { decoder, .. } => T::decode_plain(decoder, count, out),
            Self::PlainBoolean { decoder, scratch } => {
                scratch.clear();
                decoder.decode(count, scratch)?;
                out.reserve(count);
                for &v in scratch.iter() {
                    out.push(T::from_bool(v)?);
                }
                Ok(())
            }
            Self::RleBoolean { decoder, scratch } => {
                scratch.clear();
                scratch.resize(count, 0);
                decoder.get_batch(scratch)?;
                out.reserve(count);
                for &v in scratch.iter() {
                    out.push(T::from_bool(v != 0)?);
                }
                Ok(())
            }
            Self::Dictionary {
                decoder,
                indices,
                validate,
            } => {
                let dict = dict.ok_or_else(|| {
                    RayexecError::corruption("Missing dictionary for dictionary encoded page", 0)
                })?;
                decoder.decode(count, indices)?;
                if *validate {
                    dict.validate_indices(indices)?;
                }
                out.reserve(count);
                for &idx in indices.iter() {
                    out.push(T::from_dictionary(dict, idx)?);
                }
                Ok(())
            }
            Self::DeltaBinary(decoder) => {
                let values = decoder.next_values(count)?;
                out.reserve(count);
                for &v in values {
                    out.push(T::from_delta(v)?);
                }
                Ok(())
            }
        }
    }

    /// Skip the next `count` values.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        match self {
            Self::Plain {
                decoder,
                physical_type,
            } => match physical_type.fixed_width() {
                Some(width) => decoder.skip_fixed(count, width),
                None => decoder.skip_byte_arrays(count),
            },
            Self::PlainBoolean { decoder, .. } => decoder.skip(count),
            Self::RleBoolean { decoder, .. } => decoder.skip(count),
            Self::Dictionary { decoder, .. } => decoder.skip(count),
            Self::DeltaBinary(decoder) => decoder.skip(count),
        }
    }
}
