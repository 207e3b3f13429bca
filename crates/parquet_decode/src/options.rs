use serde::{Deserialize, Serialize};

/// Options for reading row groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetReaderOptions {
    /// Max number of rows read per batch.
    pub batch_size: usize,
    /// Skip row groups whose statistics rule out any rows passing the
    /// filters.
    pub prune_row_groups: bool,
    /// Check dictionary indices against the dictionary size before lookups.
    ///
    /// Out of range indices are reported as corrupt either way, this just
    /// produces a better error.
    pub validate_dictionary_indices: bool,
}

impl Default for ParquetReaderOptions {
    fn default() -> Self {
        ParquetReaderOptions {
            batch_size: 4096,
            prune_row_groups: true,
            validate_dictionary_indices: cfg!(debug_assertions),
        }
    }
}
