pub mod aggregations;

use grouper_error::{grouper_ensure, GrouperResult};
use grouper_utils::IdxSize;

use crate::config;
use crate::datatypes::{Column, RowSelection, MISSING_INT};
use crate::engine::{EngineContext, EngineState};
use crate::hashing::{hash_rows, KeyHashes};
use crate::sort::comparators::{arg_sort_rows, KeyCmp};
use crate::sort::sort_hash;

#[derive(Clone, Debug, Default)]
pub struct GroupOptions {
    /// `if`/`in` style row filtering; filtered rows take part in nothing.
    pub selection: RowSelection,
    /// Skip the integer bijection even when the key columns admit it.
    pub force_hash: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMode {
    Biject,
    Hash128,
}

/// The grouped layout of one invocation: a stable permutation of the
/// selected rows plus the group boundaries within it. Every range holds
/// exactly one key tuple; rows inside a range keep ascending original order.
#[derive(Clone, Debug)]
pub struct Groups {
    perm: Vec<IdxSize>,
    info: Vec<IdxSize>,
    mode: KeyMode,
    collisions: usize,
    n_rows: usize,
}

/// Group the table by the given key columns. Runs the whole pipeline:
/// fingerprint, stable sort, panel setup with collision recovery.
pub fn group_by_columns(by: &[Column], options: &GroupOptions) -> GrouperResult<Groups> {
    grouper_ensure!(
        !by.is_empty(),
        SchemaMismatch: "at least one key column is required in a group_by operation"
    );
    let n_rows = by[0].len();
    for col in by {
        grouper_ensure!(
            col.len() == n_rows,
            SchemaMismatch: "key columns must share one length: {} != {}",
            col.len(), n_rows
        );
        if let Column::Bytes { width, .. } = col {
            grouper_ensure!(
                *width > 0,
                SchemaMismatch: "byte-string key columns need a non-zero width"
            );
        }
    }

    let rows = options.selection.select(n_rows)?;
    if rows.is_empty() {
        return Ok(Groups {
            perm: Vec::new(),
            info: vec![0],
            mode: KeyMode::Biject,
            collisions: 0,
            n_rows,
        });
    }

    let mut ctx = EngineContext::new();
    let hashes = hash_rows(&mut ctx, by, &rows, options.force_hash)?;
    groups_from_hashes(&mut ctx, hashes, rows, n_rows)
}

/// Sort + panel setup over already-computed fingerprints. Split out from
/// [`group_by_columns`] so collision recovery can be driven with synthetic
/// hashes in tests.
pub(crate) fn groups_from_hashes(
    ctx: &mut EngineContext,
    hashes: KeyHashes,
    rows: Vec<IdxSize>,
    n_rows: usize,
) -> GrouperResult<Groups> {
    let n = rows.len();
    let mut pos: Vec<IdxSize> = Vec::new();
    pos.try_reserve_exact(n)?;
    pos.extend(0..n as IdxSize);

    let (info, collisions, mode) = match hashes {
        KeyHashes::Biject { mut h1 } => {
            sort_hash(ctx, &mut h1, &mut pos)?;
            ctx.advance(EngineState::Sorted);
            let (info, _) = panel_setup(ctx, &h1, None, &mut pos)?;
            (info, 0, KeyMode::Biject)
        },
        KeyHashes::Hash128 { mut h1, h2 } => {
            sort_hash(ctx, &mut h1, &mut pos)?;
            ctx.advance(EngineState::Sorted);
            // bring the high halves into sorted order before the walk
            let mut h2_sorted: Vec<u64> = Vec::new();
            h2_sorted.try_reserve_exact(n)?;
            h2_sorted.extend(pos.iter().map(|&p| h2[p as usize]));
            let (info, collisions) = panel_setup(ctx, &h1, Some(&mut h2_sorted), &mut pos)?;
            (info, collisions, KeyMode::Hash128)
        },
    };
    ctx.advance(EngineState::Grouped);

    let mut perm: Vec<IdxSize> = Vec::new();
    perm.try_reserve_exact(n)?;
    perm.extend(pos.iter().map(|&p| rows[p as usize]));
    ctx.advance(EngineState::Done);
    Ok(Groups {
        perm,
        info,
        mode,
        collisions,
        n_rows,
    })
}

/// Walk the sorted `h1` and emit group boundaries. With `h2` present, a
/// provisional range whose high halves disagree is a 64-bit collision: the
/// range is locally re-sorted by `h2` (patching the global permutation) and
/// then split for real, so every final range holds exactly one key tuple.
fn panel_setup(
    ctx: &mut EngineContext,
    h1: &[u64],
    h2: Option<&mut [u64]>,
    pos: &mut [IdxSize],
) -> GrouperResult<(Vec<IdxSize>, usize)> {
    let n = h1.len();
    debug_assert!(n > 0);
    let mut info: Vec<IdxSize> = Vec::new();
    info.try_reserve(n + 1)?;
    info.push(0);
    let mut collisions = 0usize;

    match h2 {
        None => {
            for i in 1..n {
                if h1[i] != h1[i - 1] {
                    info.push(i as IdxSize);
                }
            }
        },
        Some(h2) => {
            let mut start = 0usize;
            for i in 1..=n {
                if i < n && h1[i] == h1[i - 1] {
                    continue;
                }
                if !all_equal(&h2[start..i]) {
                    collisions += 1;
                    let len = i - start;
                    let mut local_h: Vec<u64> = Vec::new();
                    local_h.try_reserve_exact(len)?;
                    local_h.extend_from_slice(&h2[start..i]);
                    let mut local_idx: Vec<IdxSize> = Vec::new();
                    local_idx.try_reserve_exact(len)?;
                    local_idx.extend(0..len as IdxSize);

                    sort_hash(ctx, &mut local_h, &mut local_idx)?;

                    let patched: Vec<IdxSize> = local_idx
                        .iter()
                        .map(|&k| pos[start + k as usize])
                        .collect();
                    pos[start..i].copy_from_slice(&patched);
                    h2[start..i].copy_from_slice(&local_h);

                    for k in start + 1..i {
                        if h2[k] != h2[k - 1] {
                            info.push(k as IdxSize);
                        }
                    }
                }
                if i < n {
                    info.push(i as IdxSize);
                }
                start = i;
            }
        },
    }
    info.push(n as IdxSize);

    if collisions > 0 && config::verbose() {
        eprintln!("found {collisions} 64-bit hash collision(s); fell back on the 128-bit hash");
    }
    Ok((info, collisions))
}

fn all_equal(h: &[u64]) -> bool {
    h.windows(2).all(|w| w[0] == w[1])
}

impl Groups {
    pub fn num_groups(&self) -> usize {
        self.info.len() - 1
    }

    /// Row count of the underlying table, selected or not.
    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of rows that survived `if`/`in` filtering.
    pub fn num_selected(&self) -> usize {
        self.perm.len()
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// 64-bit hash collisions recovered during panel setup. Informational;
    /// results are unaffected thanks to the 128-bit tiebreak.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn perm(&self) -> &[IdxSize] {
        &self.perm
    }

    pub fn info(&self) -> &[IdxSize] {
        &self.info
    }

    /// Original row ids of group `j`, ascending.
    pub fn group_rows(&self, j: usize) -> &[IdxSize] {
        &self.perm[self.info[j] as usize..self.info[j + 1] as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[IdxSize]> + '_ {
        (0..self.num_groups()).map(|j| self.group_rows(j))
    }

    pub fn group_sizes(&self) -> Vec<IdxSize> {
        self.info.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Dense 1..=J label per row, in sort order. Unselected rows carry the
    /// integer missing sentinel.
    pub fn group_id_column(&self) -> Vec<i64> {
        let mut out = vec![MISSING_INT; self.n_rows];
        for (j, rows) in self.iter().enumerate() {
            for &r in rows {
                out[r as usize] = (j + 1) as i64;
            }
        }
        out
    }

    /// 1 on the first row of its group in original order, else 0.
    pub fn tag_column(&self) -> Vec<i64> {
        let mut out = vec![0i64; self.n_rows];
        for rows in self.iter() {
            out[rows[0] as usize] = 1;
        }
        out
    }

    /// One representative row per group: the first in original order, which
    /// stability guarantees is `perm[info[j]]`.
    pub fn distinct_rows(&self) -> Vec<IdxSize> {
        self.iter().map(|rows| rows[0]).collect()
    }

    /// Whether the key columns identify rows uniquely (every group is a
    /// singleton).
    pub fn is_unique_key(&self) -> bool {
        self.num_groups() == self.num_selected()
    }

    /// Representative rows, optionally in deterministic key order rather
    /// than hash order.
    pub fn levels(&self, by: &[Column], sorted: bool) -> Vec<IdxSize> {
        let reps = self.distinct_rows();
        if !sorted {
            return reps;
        }
        let keys: Vec<KeyCmp<'_>> = by.iter().map(KeyCmp::new).collect();
        arg_sort_rows(&keys, &reps)
    }
}
