//! Decoding of parquet column chunks into bullet arrays.
//!
//! Column chunks are walked page by page with a `PageCursor`. Selective
//! readers sit on top of cursors and only produce rows passing a scan spec's
//! filters, and `RowGroupReader` drives them across row groups.

pub mod column;
pub mod compression;
pub mod dictionary;
pub mod encoding;
pub mod filter;
pub mod options;
pub mod page;
pub mod reader;
pub mod row_group;
pub mod schema;
pub mod types;
pub mod value;
pub mod visitor;

pub(crate) mod thrift_ext;

#[cfg(test)]
pub mod testutil;
