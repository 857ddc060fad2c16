use grouper_error::GrouperResult;
use grouper_utils::IdxSize;
use xxhash_rust::xxh3::xxh3_128;

use crate::config;
use crate::datatypes::{Column, CANONICAL_NAN_BITS, MISSING_INT};
use crate::engine::{EngineContext, EngineState};

/// Per-row key fingerprints. `Biject` holds an exact integer encoding of the
/// key tuple; `Hash128` holds both halves of a 128-bit hash of the row's
/// canonical byte image. Only `h1` drives sort order, `h2` exists to break
/// 64-bit collisions.
#[derive(Clone, Debug)]
pub enum KeyHashes {
    Biject { h1: Vec<u64> },
    Hash128 { h1: Vec<u64>, h2: Vec<u64> },
}

impl KeyHashes {
    pub fn is_biject(&self) -> bool {
        matches!(self, KeyHashes::Biject { .. })
    }
}

struct BijectField {
    min: i64,
    range: u64,
}

/// Fingerprint the selected rows of the key columns.
///
/// Equal key tuples always map to equal fingerprints; in bijection mode the
/// converse holds as well, so no collision handling is ever needed there.
pub(crate) fn hash_rows(
    ctx: &mut EngineContext,
    by: &[Column],
    rows: &[IdxSize],
    force_hash: bool,
) -> GrouperResult<KeyHashes> {
    debug_assert!(!rows.is_empty());
    let out = if force_hash || config::force_hash() {
        hash128_rows(ctx, by, rows)?
    } else if let Some(layout) = biject_layout(by, rows) {
        biject_rows(by, rows, &layout)?
    } else {
        hash128_rows(ctx, by, rows)?
    };
    ctx.advance(EngineState::Hashed);
    Ok(out)
}

/// The bijection applies iff every key column is integer typed and the
/// product of the per-column value ranges stays below 2^63. A column that
/// contains the missing sentinel gets one extra slot at the top of its range
/// so missing keys form their own level.
fn biject_layout(by: &[Column], rows: &[IdxSize]) -> Option<Vec<BijectField>> {
    let mut layout = Vec::with_capacity(by.len());
    for col in by {
        let Column::Int64(vals) = col else {
            return None;
        };
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        let mut any_value = false;
        let mut any_missing = false;
        for &r in rows {
            let x = vals[r as usize];
            if x == MISSING_INT {
                any_missing = true;
            } else {
                any_value = true;
                min = min.min(x);
                max = max.max(x);
            }
        }
        let (min, mut range) = if any_value {
            (min, max.wrapping_sub(min) as u64 + 1)
        } else {
            (0, 0)
        };
        if any_missing {
            range += 1;
        }
        layout.push(BijectField { min, range });
    }

    let mut span: u128 = 1;
    for field in &layout {
        span = span.checked_mul(field.range as u128)?;
        if span >= 1u128 << 63 {
            return None;
        }
    }
    if config::verbose() {
        eprintln!("all key columns are integers; bijecting into {span} level(s)");
    }
    Some(layout)
}

fn biject_rows(
    by: &[Column],
    rows: &[IdxSize],
    layout: &[BijectField],
) -> GrouperResult<KeyHashes> {
    let mut h1 = Vec::new();
    h1.try_reserve_exact(rows.len())?;
    for &r in rows {
        let mut acc: u64 = 0;
        let mut stride: u64 = 1;
        for (col, field) in by.iter().zip(layout) {
            let Column::Int64(vals) = col else {
                unreachable!()
            };
            let x = vals[r as usize];
            let offset = if x == MISSING_INT {
                field.range - 1
            } else {
                x.wrapping_sub(field.min) as u64
            };
            acc += offset * stride;
            stride *= field.range;
        }
        h1.push(acc);
    }
    Ok(KeyHashes::Biject { h1 })
}

fn hash128_rows(
    ctx: &mut EngineContext,
    by: &[Column],
    rows: &[IdxSize],
) -> GrouperResult<KeyHashes> {
    let n = rows.len();
    let mut h1 = Vec::new();
    h1.try_reserve_exact(n)?;
    let mut h2 = Vec::new();
    h2.try_reserve_exact(n)?;
    for &r in rows {
        encode_row(&mut ctx.row_buf, by, r as usize);
        let h = xxh3_128(&ctx.row_buf);
        h1.push(h as u64);
        h2.push((h >> 64) as u64);
    }
    Ok(KeyHashes::Hash128 { h1, h2 })
}

/// Canonical byte image of one row's key tuple: integers little-endian,
/// floats as canonicalized bits (every NaN collapses onto one pattern,
/// negative zero onto zero), byte strings at their declared width. Equal
/// tuples produce equal images, so equal 128-bit hashes.
pub(crate) fn encode_row(buf: &mut Vec<u8>, by: &[Column], row: usize) {
    buf.clear();
    for col in by {
        match col {
            Column::Int64(v) => buf.extend_from_slice(&v[row].to_le_bytes()),
            Column::Float64(v) => {
                let x = v[row];
                let bits = if x.is_nan() {
                    CANONICAL_NAN_BITS
                } else if x == 0.0 {
                    0
                } else {
                    x.to_bits()
                };
                buf.extend_from_slice(&bits.to_le_bytes());
            },
            Column::Bytes { .. } => buf.extend_from_slice(col.bytes_at(row)),
        }
    }
}
