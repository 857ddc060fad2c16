use std::cmp::Ordering;

use grouper_utils::total_ord::canonical_f64_bits;
use grouper_utils::IdxSize;

use crate::datatypes::Column;

/// Keyed comparator over one column. Instead of the raw byte-offset
/// comparators a C engine would carry, the key is a typed descriptor: the
/// column it reads and its direction. Missing values order last in the
/// forward direction for every kind.
#[derive(Clone, Copy)]
pub struct KeyCmp<'a> {
    column: &'a Column,
    descending: bool,
}

impl<'a> KeyCmp<'a> {
    pub fn new(column: &'a Column) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn descending(column: &'a Column) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    pub fn compare(&self, a: IdxSize, b: IdxSize) -> Ordering {
        let (a, b) = (a as usize, b as usize);
        let ord = match self.column {
            // order-preserving unsigned image; the integer missing sentinel
            // maps onto u64::MAX and therefore sorts last by construction
            Column::Int64(v) => int_image(v[a]).cmp(&int_image(v[b])),
            Column::Float64(v) => canonical_f64_bits(v[a]).cmp(&canonical_f64_bits(v[b])),
            Column::Bytes { .. } => self.column.bytes_at(a).cmp(self.column.bytes_at(b)),
        };
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

#[inline]
fn int_image(x: i64) -> u64 {
    (x as u64) ^ (1 << 63)
}

/// Deterministic stable argsort of row ids by a chain of keyed comparators,
/// falling back to the row id itself so the output order never depends on
/// hash values.
pub fn arg_sort_rows(keys: &[KeyCmp<'_>], rows: &[IdxSize]) -> Vec<IdxSize> {
    let mut out = rows.to_vec();
    out.sort_by(|&a, &b| {
        for key in keys {
            match key.compare(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        a.cmp(&b)
    });
    out
}
