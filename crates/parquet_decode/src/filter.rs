//! Per column filters and the projection descriptor passed to readers.

use rayexec_bullet::scalar::OwnedScalarValue;

use crate::page::Statistics;
use crate::types::PhysicalType;

/// A predicate on the values of a single column.
///
/// Filters are conjunctive: a row passes only if it passes every filter in
/// the scan spec.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    IsNull,
    IsNotNull,
    BoolValue {
        value: bool,
        null_allowed: bool,
    },
    /// Inclusive range on integers.
    Int64Range {
        lower: i64,
        upper: i64,
        null_allowed: bool,
    },
    /// Inclusive range on floating point values. NaN never passes.
    DoubleRange {
        lower: f64,
        upper: f64,
        null_allowed: bool,
    },
    /// Byte strings that are in a set of values.
    BytesIn {
        values: Vec<Vec<u8>>,
        null_allowed: bool,
    },
}

impl Filter {
    pub fn test_null(&self) -> bool {
        match self {
            Self::IsNull => true,
            Self::IsNotNull => false,
            Self::BoolValue { null_allowed, .. }
            | Self::Int64Range { null_allowed, .. }
            | Self::DoubleRange { null_allowed, .. }
            | Self::BytesIn { null_allowed, .. } => *null_allowed,
        }
    }

    pub fn test_bool(&self, v: bool) -> bool {
        match self {
            Self::IsNotNull => true,
            Self::BoolValue { value, .. } => *value == v,
            _ => false,
        }
    }

    pub fn test_i64(&self, v: i64) -> bool {
        match self {
            Self::IsNotNull => true,
            Self::Int64Range { lower, upper, .. } => *lower <= v && v <= *upper,
            Self::DoubleRange { .. } => self.test_f64(v as f64),
            _ => false,
        }
    }

    pub fn test_f64(&self, v: f64) -> bool {
        match self {
            Self::IsNotNull => true,
            Self::DoubleRange { lower, upper, .. } => *lower <= v && v <= *upper,
            _ => false,
        }
    }

    pub fn test_bytes(&self, v: &[u8]) -> bool {
        match self {
            Self::IsNotNull => true,
            Self::BytesIn { values, .. } => values.iter().any(|val| val == v),
            _ => false,
        }
    }

    /// Check if a column chunk with the given statistics may contain rows
    /// that pass this filter.
    ///
    /// Returns true whenever the statistics aren't enough to tell.
    pub fn test_stats(
        &self,
        physical_type: PhysicalType,
        stats: &Statistics,
        num_rows: usize,
    ) -> bool {
        let null_count = stats.null_count.map(|c| c.max(0) as usize);
        let all_null = null_count == Some(num_rows);

        if let Self::IsNull = self {
            return null_count != Some(0);
        }
        if let Self::IsNotNull = self {
            return !all_null;
        }

        if all_null {
            return self.test_null();
        }
        if null_count.map(|c| c > 0).unwrap_or(true) && self.test_null() {
            return true;
        }

        match self {
            Self::BoolValue { value, .. } => {
                match min_max(stats, false, |b| decode_bool(b)) {
                    Some((min, max)) => min <= *value && *value <= max,
                    None => true,
                }
            }
            Self::Int64Range { lower, upper, .. } => {
                match min_max(stats, false, |b| decode_int(physical_type, b)) {
                    Some((min, max)) => !(max < *lower || min > *upper),
                    None => true,
                }
            }
            Self::DoubleRange { lower, upper, .. } => {
                match min_max(stats, false, |b| decode_float(physical_type, b)) {
                    Some((min, max)) => !(max < *lower || min > *upper),
                    None => true,
                }
            }
            Self::BytesIn { values, .. } => {
                if physical_type != PhysicalType::ByteArray {
                    return true;
                }
                // Deprecated min/max used signed byte comparisons, only the
                // newer fields can be trusted for byte arrays.
                match min_max(stats, true, |b| Some(b.to_vec())) {
                    Some((min, max)) => values
                        .iter()
                        .any(|v| min.as_slice() <= v.as_slice() && v.as_slice() <= max.as_slice()),
                    None => true,
                }
            }
            Self::IsNull | Self::IsNotNull => true,
        }
    }
}

fn min_max<T>(
    stats: &Statistics,
    only_new: bool,
    decode: impl Fn(&[u8]) -> Option<T>,
) -> Option<(T, T)> {
    let (min, max) = match (&stats.min_value, &stats.max_value) {
        (Some(min), Some(max)) => (min, max),
        _ if only_new => return None,
        _ => match (&stats.min, &stats.max) {
            (Some(min), Some(max)) => (min, max),
            _ => return None,
        },
    };
    Some((decode(min)?, decode(max)?))
}

fn decode_bool(buf: &[u8]) -> Option<bool> {
    buf.first().map(|b| *b != 0)
}

fn decode_int(physical_type: PhysicalType, buf: &[u8]) -> Option<i64> {
    match physical_type {
        PhysicalType::Int32 => Some(i32::from_le_bytes(buf.try_into().ok()?) as i64),
        PhysicalType::Int64 => Some(i64::from_le_bytes(buf.try_into().ok()?)),
        _ => None,
    }
}

fn decode_float(physical_type: PhysicalType, buf: &[u8]) -> Option<f64> {
    let v = match physical_type {
        PhysicalType::Float => f32::from_le_bytes(buf.try_into().ok()?) as f64,
        PhysicalType::Double => f64::from_le_bytes(buf.try_into().ok()?),
        PhysicalType::Int32 | PhysicalType::Int64 => decode_int(physical_type, buf)? as f64,
        _ => return None,
    };
    // Writers may record NaN bounds which can't be compared against.
    if v.is_nan() {
        return None;
    }
    Some(v)
}

/// Describes what to read for a column and what to do with its values.
///
/// A scan spec mirrors the schema for the columns being read. Children of a
/// struct are read in the order they appear here, filtered children first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSpec {
    pub field: String,
    pub filter: Option<Filter>,
    /// Value supplied from outside the file. Constant fields never touch
    /// column data.
    pub constant: Option<OwnedScalarValue>,
    /// If values are output. Columns only read for filtering don't need
    /// their values materialized.
    pub project: bool,
    pub children: Vec<ScanSpec>,
}

impl ScanSpec {
    pub fn new(field: impl Into<String>) -> Self {
        ScanSpec {
            field: field.into(),
            filter: None,
            constant: None,
            project: true,
            children: Vec::new(),
        }
    }

    /// Read this column for filtering only.
    pub fn filter_only(mut self) -> Self {
        self.project = false;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_constant(mut self, value: OwnedScalarValue) -> Self {
        self.constant = Some(value);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ScanSpec>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    pub fn child(&self, name: &str) -> Option<&ScanSpec> {
        self.children.iter().find(|c| c.field == name)
    }

    /// Check if this spec or any of its descendants filter rows.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some() || self.children.iter().any(|c| c.has_filter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_stats(min: i64, max: i64, null_count: i64) -> Statistics {
        Statistics {
            min_value: Some(min.to_le_bytes().to_vec()),
            max_value: Some(max.to_le_bytes().to_vec()),
            null_count: Some(null_count),
            ..Default::default()
        }
    }

    #[test]
    fn int_range_values() {
        let filter = Filter::Int64Range {
            lower: 10,
            upper: 20,
            null_allowed: false,
        };
        assert!(filter.test_i64(10));
        assert!(filter.test_i64(20));
        assert!(!filter.test_i64(21));
        assert!(!filter.test_null());
    }

    #[test]
    fn int_range_stats() {
        let filter = Filter::Int64Range {
            lower: 10,
            upper: 20,
            null_allowed: false,
        };
        assert!(!filter.test_stats(PhysicalType::Int64, &int_stats(21, 40, 0), 100));
        assert!(filter.test_stats(PhysicalType::Int64, &int_stats(0, 10, 0), 100));
        assert!(!filter.test_stats(PhysicalType::Int64, &int_stats(0, 0, 100), 100));
        assert!(filter.test_stats(PhysicalType::Int64, &Statistics::default(), 100));
    }

    #[test]
    fn int32_stats() {
        let filter = Filter::Int64Range {
            lower: -5,
            upper: -1,
            null_allowed: false,
        };
        let stats = Statistics {
            min_value: Some((-3_i32).to_le_bytes().to_vec()),
            max_value: Some(8_i32.to_le_bytes().to_vec()),
            ..Default::default()
        };
        assert!(filter.test_stats(PhysicalType::Int32, &stats, 10));
    }

    #[test]
    fn null_filters_stats() {
        let stats = int_stats(1, 2, 0);
        assert!(!Filter::IsNull.test_stats(PhysicalType::Int64, &stats, 5));
        assert!(Filter::IsNotNull.test_stats(PhysicalType::Int64, &stats, 5));

        let stats = int_stats(0, 0, 5);
        assert!(Filter::IsNull.test_stats(PhysicalType::Int64, &stats, 5));
        assert!(!Filter::IsNotNull.test_stats(PhysicalType::Int64, &stats, 5));
    }

    #[test]
    fn bytes_in_stats_ignore_deprecated() {
        let filter = Filter::BytesIn {
            values: vec![b"zebra".to_vec()],
            null_allowed: false,
        };
        let old = Statistics {
            min: Some(b"apple".to_vec()),
            max: Some(b"mango".to_vec()),
            null_count: Some(0),
            ..Default::default()
        };
        assert!(filter.test_stats(PhysicalType::ByteArray, &old, 10));

        let new = Statistics {
            min_value: Some(b"apple".to_vec()),
            max_value: Some(b"mango".to_vec()),
            null_count: Some(0),
            ..Default::default()
        };
        assert!(!filter.test_stats(PhysicalType::ByteArray, &new, 10));
    }

    #[test]
    fn scan_spec_has_filter() {
        let spec = ScanSpec::new("root").with_children([
            ScanSpec::new("a"),
            ScanSpec::new("s").with_children([ScanSpec::new("b").with_filter(Filter::IsNull)]),
        ]);
        assert!(spec.has_filter());
        assert!(!spec.child("a").unwrap().has_filter());
        assert!(spec.child("missing").is_none());
    }
}
