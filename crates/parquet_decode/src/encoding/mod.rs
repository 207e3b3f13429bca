//! Encodings for levels and values.
//!
//! See <https://parquet.apache.org/docs/file-format/data-pages/encodings/>

pub mod bitpack;
pub mod boolean;
pub mod delta_binary;
pub mod dictionary;
pub mod plain;
pub mod rle_bp;
pub mod uleb128;

/// Value and level encodings as they appear in page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
}

impl Encoding {
    /// Get the encoding for its thrift id.
    pub const fn from_thrift(id: i32) -> Option<Self> {
        Some(match id {
            0 => Self::Plain,
            2 => Self::PlainDictionary,
            3 => Self::Rle,
            4 => Self::BitPacked,
            5 => Self::DeltaBinaryPacked,
            6 => Self::DeltaLengthByteArray,
            7 => Self::DeltaByteArray,
            8 => Self::RleDictionary,
            9 => Self::ByteStreamSplit,
            _ => return None,
        })
    }

    pub const fn to_thrift(self) -> i32 {
        match self {
            Self::Plain => 0,
            Self::PlainDictionary => 2,
            Self::Rle => 3,
            Self::BitPacked => 4,
            Self::DeltaBinaryPacked => 5,
            Self::DeltaLengthByteArray => 6,
            Self::DeltaByteArray => 7,
            Self::RleDictionary => 8,
            Self::ByteStreamSplit => 9,
        }
    }

    pub const fn is_dictionary(self) -> bool {
        matches!(self, Self::PlainDictionary | Self::RleDictionary)
    }
}

/// Number of bits needed to hold values up to and including `max`.
pub const fn num_required_bits(max: u64) -> u8 {
    (u64::BITS - max.leading_zeros()) as u8
}
