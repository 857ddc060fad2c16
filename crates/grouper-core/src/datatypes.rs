use grouper_error::{grouper_ensure, GrouperResult};
use grouper_utils::IdxSize;
use num_traits::ToPrimitive;

/// Missing sentinel for integer columns. Sorts above every real value, both
/// as a key and through the unsigned comparator image.
pub const MISSING_INT: i64 = i64::MAX;

/// Bit pattern every NaN payload is collapsed onto inside key images, so the
/// float missing value compares equal only to itself.
pub(crate) const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Int64,
    Float64,
    Bytes,
}

/// A read-only column view exchanged with the host: 64-bit integers, 64-bit
/// floats, or fixed-width byte strings stored row-major.
#[derive(Clone, Debug)]
pub enum Column {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bytes { width: usize, data: Vec<u8> },
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Bytes { width, data } => {
                if *width == 0 {
                    0
                } else {
                    data.len() / width
                }
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Int64(_) => ColumnKind::Int64,
            Column::Float64(_) => ColumnKind::Float64,
            Column::Bytes { .. } => ColumnKind::Bytes,
        }
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Int64(v) => v[row] == MISSING_INT,
            Column::Float64(v) => v[row].is_nan(),
            Column::Bytes { width, data } => {
                data[row * width..(row + 1) * width].iter().all(|&b| b == 0)
            },
        }
    }

    /// Numeric view used by the aggregator; missing maps onto NaN.
    pub fn f64_at(&self, row: usize) -> f64 {
        match self {
            Column::Int64(v) => {
                let x = v[row];
                if x == MISSING_INT {
                    f64::NAN
                } else {
                    x.to_f64().unwrap_or(f64::NAN)
                }
            },
            Column::Float64(v) => v[row],
            Column::Bytes { .. } => f64::NAN,
        }
    }

    pub(crate) fn bytes_at(&self, row: usize) -> &[u8] {
        match self {
            Column::Bytes { width, data } => &data[row * width..(row + 1) * width],
            _ => &[],
        }
    }
}

/// Optional `if`/`in` style row filtering, resolved once before hashing.
/// Filtered-out rows are absent from every downstream stage.
#[derive(Clone, Debug, Default)]
pub struct RowSelection {
    /// Half-open row range.
    pub range: Option<(usize, usize)>,
    /// Per-row predicate mask, length N.
    pub mask: Option<Vec<bool>>,
}

impl RowSelection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Selected original row ids, ascending.
    pub fn select(&self, n_rows: usize) -> GrouperResult<Vec<IdxSize>> {
        let (start, end) = self.range.unwrap_or((0, n_rows));
        grouper_ensure!(
            start <= end && end <= n_rows,
            ComputeError: "row range {start}..{end} out of bounds for {n_rows} rows"
        );
        if let Some(mask) = &self.mask {
            grouper_ensure!(
                mask.len() == n_rows,
                SchemaMismatch: "selection mask has length {} but the table has {} rows",
                mask.len(), n_rows
            );
            Ok((start..end)
                .filter(|&i| mask[i])
                .map(|i| i as IdxSize)
                .collect())
        } else {
            Ok((start..end).map(|i| i as IdxSize).collect())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_sentinels() {
        let c = Column::Int64(vec![1, MISSING_INT]);
        assert!(!c.is_missing(0));
        assert!(c.is_missing(1));
        assert!(c.f64_at(1).is_nan());

        let c = Column::Float64(vec![f64::NAN, 0.5]);
        assert!(c.is_missing(0));
        assert!(!c.is_missing(1));

        let c = Column::Bytes {
            width: 2,
            data: vec![0, 0, b'a', 0],
        };
        assert!(c.is_missing(0));
        assert!(!c.is_missing(1));
    }

    #[test]
    fn test_selection_mask_and_range() {
        let sel = RowSelection {
            range: Some((1, 4)),
            mask: Some(vec![true, true, false, true, true]),
        };
        assert_eq!(sel.select(5).unwrap(), vec![1, 3]);
        assert_eq!(RowSelection::all().select(3).unwrap(), vec![0, 1, 2]);

        let bad = RowSelection {
            range: Some((0, 9)),
            mask: None,
        };
        assert!(bad.select(3).is_err());
    }
}
