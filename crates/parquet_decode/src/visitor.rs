//! Visitors receive decoded values from a page cursor.
//!
//! Visitors are generic over how rows are filtered and what happens with the
//! values that pass. Everything gets monomorphized, the cursor checks the
//! associated constants to skip work the visitor doesn't need.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::filter::Filter;
use crate::value::ParquetValue;

/// Receives values for a set of rows read through a page cursor.
///
/// Rows are passed to visitor methods by their position in `rows()`.
pub trait ColumnVisitor {
    type Value: ParquetValue;

    /// If the visitor filters rows. When false and values aren't extracted,
    /// the cursor skips decoding values entirely.
    const HAS_FILTER: bool;

    /// If the visitor wants decoded values.
    const EXTRACT_VALUES: bool;

    /// Strictly increasing row indices to visit, relative to the first row
    /// not yet consumed by the cursor.
    fn rows(&self) -> &[usize];

    fn visit_value(&mut self, pos: usize, value: Self::Value);

    fn visit_null(&mut self, pos: usize);

    /// Visit a non-null row whose value wasn't decoded.
    fn visit_present(&mut self, pos: usize);
}

/// Decides if a row passes.
pub trait RowFilter {
    const ALWAYS_TRUE: bool;

    fn test_value<T: ParquetValue>(&self, value: &T) -> bool;

    fn test_null(&self) -> bool;
}

/// Every row passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl RowFilter for AlwaysTrue {
    const ALWAYS_TRUE: bool = true;

    fn test_value<T: ParquetValue>(&self, _value: &T) -> bool {
        true
    }

    fn test_null(&self) -> bool {
        true
    }
}

impl RowFilter for &Filter {
    const ALWAYS_TRUE: bool = false;

    fn test_value<T: ParquetValue>(&self, value: &T) -> bool {
        value.test_filter(self)
    }

    fn test_null(&self) -> bool {
        Filter::test_null(self)
    }
}

/// Receives values for rows that passed the filter.
pub trait ValueSink<T> {
    const EXTRACT: bool;

    fn add_value(&mut self, row: usize, value: T);

    fn add_null(&mut self, row: usize);
}

/// Values are thrown away, only passing rows are recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropValues;

impl<T> ValueSink<T> for DropValues {
    const EXTRACT: bool = false;

    fn add_value(&mut self, _row: usize, _value: T) {}

    fn add_null(&mut self, _row: usize) {}
}

/// Collects values for passing rows. Nulls get a default placeholder.
#[derive(Debug)]
pub struct ExtractValues<'a, T> {
    pub values: &'a mut Vec<T>,
}

impl<'a, T: ParquetValue> ValueSink<T> for ExtractValues<'a, T> {
    const EXTRACT: bool = true;

    fn add_value(&mut self, _row: usize, value: T) {
        self.values.push(value);
    }

    fn add_null(&mut self, _row: usize) {
        self.values.push(T::default());
    }
}

/// Consumer for values that never get materialized into an array, for
/// example an aggregate pushed into the scan.
pub trait ValueHook<T>: Debug {
    fn add_value(&mut self, row: usize, value: &T);

    fn add_null(&mut self, row: usize);
}

/// Passes values for passing rows to a hook.
#[derive(Debug)]
pub struct HookValues<'a, H> {
    pub hook: &'a mut H,
}

impl<'a, T, H: ValueHook<T>> ValueSink<T> for HookValues<'a, H> {
    const EXTRACT: bool = true;

    fn add_value(&mut self, row: usize, value: T) {
        self.hook.add_value(row, &value);
    }

    fn add_null(&mut self, row: usize) {
        self.hook.add_null(row);
    }
}

/// Visitor combining a filter with a value sink.
///
/// Records positions (indices into `rows`) of rows that passed.
#[derive(Debug)]
pub struct SelectiveVisitor<'a, T, F, S> {
    rows: &'a [usize],
    filter: F,
    sink: S,
    passed: &'a mut Vec<usize>,
    _value: PhantomData<T>,
}

impl<'a, T, F, S> SelectiveVisitor<'a, T, F, S>
where
    T: ParquetValue,
    F: RowFilter,
    S: ValueSink<T>,
{
    /// Create a new visitor. `passed` is cleared.
    pub fn new(rows: &'a [usize], filter: F, sink: S, passed: &'a mut Vec<usize>) -> Self {
        passed.clear();
        SelectiveVisitor {
            rows,
            filter,
            sink,
            passed,
            _value: PhantomData,
        }
    }
}

impl<'a, T, F, S> ColumnVisitor for SelectiveVisitor<'a, T, F, S>
where
    T: ParquetValue,
    F: RowFilter,
    S: ValueSink<T>,
{
    type Value = T;

    const HAS_FILTER: bool = !F::ALWAYS_TRUE;
    const EXTRACT_VALUES: bool = S::EXTRACT;

    fn rows(&self) -> &[usize] {
        self.rows
    }

    fn visit_value(&mut self, pos: usize, value: T) {
        if self.filter.test_value(&value) {
            self.passed.push(pos);
            self.sink.add_value(self.rows[pos], value);
        }
    }

    fn visit_null(&mut self, pos: usize) {
        if self.filter.test_null() {
            self.passed.push(pos);
            self.sink.add_null(self.rows[pos]);
        }
    }

    fn visit_present(&mut self, pos: usize) {
        self.passed.push(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_and_extract() {
        let rows = [0, 2, 3, 5];
        let filter = Filter::Int64Range {
            lower: 0,
            upper: 10,
            null_allowed: true,
        };
        let mut values: Vec<i64> = Vec::new();
        let mut passed = Vec::new();

        let mut visitor: SelectiveVisitor<i64, _, _> = SelectiveVisitor::new(
            &rows,
            &filter,
            ExtractValues {
                values: &mut values,
            },
            &mut passed,
        );
        visitor.visit_value(0, 4);
        visitor.visit_value(1, 40);
        visitor.visit_null(2);
        visitor.visit_value(3, 10);

        assert_eq!(vec![0, 2, 3], passed);
        assert_eq!(vec![4, 0, 10], values);
    }

    #[test]
    fn visitor_constants() {
        type Plain<'a> = SelectiveVisitor<'a, i32, AlwaysTrue, DropValues>;
        type Filtered<'a> = SelectiveVisitor<'a, i32, &'a Filter, DropValues>;
        type Extract<'a> = SelectiveVisitor<'a, i32, AlwaysTrue, ExtractValues<'a, i32>>;

        assert!(!Plain::HAS_FILTER && !Plain::EXTRACT_VALUES);
        assert!(Filtered::HAS_FILTER && !Filtered::EXTRACT_VALUES);
        assert!(!Extract::HAS_FILTER && Extract::EXTRACT_VALUES);
    }

    #[derive(Debug, Default)]
    struct SumHook {
        sum: i64,
        nulls: Vec<usize>,
    }

    impl ValueHook<i64> for SumHook {
        fn add_value(&mut self, _row: usize, value: &i64) {
            self.sum += value;
        }

        fn add_null(&mut self, row: usize) {
            self.nulls.push(row);
        }
    }

    #[test]
    fn hook_receives_row_numbers() {
        let rows = [3, 7, 9];
        let mut hook = SumHook::default();
        let mut passed = Vec::new();

        let mut visitor: SelectiveVisitor<i64, _, _> =
            SelectiveVisitor::new(&rows, AlwaysTrue, HookValues { hook: &mut hook }, &mut passed);
        visitor.visit_value(0, 5);
        visitor.visit_null(1);
        visitor.visit_value(2, 6);

        assert_eq!(vec![0, 1, 2], passed);
        assert_eq!(11, hook.sum);
        assert_eq!(vec![7], hook.nulls);
    }
}
