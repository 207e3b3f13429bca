//! Decoding of a single column chunk.

pub mod decoder;
pub mod page_cursor;

use bytes::Bytes;

use crate::compression::CompressionCodec;

/// Raw bytes of a column chunk, all of its pages back to back.
#[derive(Debug, Clone)]
pub struct ColumnChunk {
    pub data: Bytes,
    pub codec: CompressionCodec,
}

impl ColumnChunk {
    pub fn new(data: impl Into<Bytes>, codec: CompressionCodec) -> Self {
        ColumnChunk {
            data: data.into(),
            codec,
        }
    }
}
