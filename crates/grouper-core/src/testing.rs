//! Cross-checking helpers shared by the test suites.

use grouper_utils::aliases::GrHashMap;
use grouper_utils::IdxSize;

use crate::datatypes::Column;
use crate::group_by::Groups;
use crate::hashing::encode_row;

/// Straight-equality reference grouping: first-appearance order, one bucket
/// per distinct key tuple. Shares no code path with the sort pipeline apart
/// from the canonical row image.
pub fn reference_groups(by: &[Column], rows: &[IdxSize]) -> Vec<Vec<IdxSize>> {
    let mut ids: GrHashMap<Vec<u8>, usize> = GrHashMap::default();
    let mut out: Vec<Vec<IdxSize>> = Vec::new();
    let mut buf = Vec::new();
    for &r in rows {
        encode_row(&mut buf, by, r as usize);
        let next = out.len();
        let id = *ids.entry(buf.clone()).or_insert(next);
        if id == next {
            out.push(Vec::new());
        }
        out[id].push(r);
    }
    out
}

/// Assert the engine's groups equal the reference partitioning of `rows`,
/// including stability (rows inside each engine group must be ascending,
/// i.e. in original order).
pub fn assert_groups_match(groups: &Groups, by: &[Column], rows: &[IdxSize]) {
    let reference = reference_groups(by, rows);
    assert_eq!(
        groups.num_groups(),
        reference.len(),
        "group count differs from the straight-equality reference"
    );
    let mut engine: Vec<Vec<IdxSize>> = groups.iter().map(|g| g.to_vec()).collect();
    let mut reference = reference;
    engine.sort_by_key(|g| g[0]);
    reference.sort_by_key(|g| g[0]);
    assert_eq!(engine, reference);
}
