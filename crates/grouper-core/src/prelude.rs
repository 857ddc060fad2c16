pub use grouper_error::{GrouperError, GrouperResult};
pub use grouper_utils::IdxSize;

pub use crate::datatypes::{Column, ColumnKind, RowSelection, MISSING_INT};
pub use crate::group_by::aggregations::AggFn;
pub use crate::group_by::{group_by_columns, GroupOptions, Groups, KeyMode};
pub use crate::sort::comparators::{arg_sort_rows, KeyCmp};
