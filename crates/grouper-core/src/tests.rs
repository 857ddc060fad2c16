use proptest::prelude::*;

use crate::engine::{EngineContext, EngineState};
use crate::group_by::groups_from_hashes;
use crate::hashing::KeyHashes;
use crate::prelude::*;
use crate::testing::assert_groups_match;

fn single_key(keys: Vec<i64>) -> Groups {
    group_by_columns(&[Column::Int64(keys)], &GroupOptions::default()).unwrap()
}

#[test]
fn test_no_key_columns_is_schema_error() {
    let err = group_by_columns(&[], &GroupOptions::default()).unwrap_err();
    assert_eq!(err.code(), 3);
}

#[test]
fn test_single_group_moments() {
    let g = single_key(vec![1, 1, 1]);
    let values = Column::Float64(vec![2.0, 3.0, 5.0]);
    let out = g
        .agg(&values, &[AggFn::Sum, AggFn::Mean, AggFn::Sd])
        .unwrap();
    assert_eq!(g.num_groups(), 1);
    assert_eq!(out[0], vec![10.0]);
    let mean = 10.0 / 3.0;
    assert!((out[1][0] - mean).abs() < 1e-12);
    let sd = (((2.0 - mean).powi(2) + (3.0 - mean).powi(2) + (5.0 - mean).powi(2)) / 2.0).sqrt();
    assert!((out[2][0] - sd).abs() < 1e-12);
}

#[test]
fn test_median_of_two() {
    let g = single_key(vec![1, 1]);
    let values = Column::Float64(vec![4.0, 6.0]);
    let out = g
        .agg(
            &values,
            &[
                AggFn::Median,
                AggFn::Quantile(10.0),
                AggFn::Quantile(90.0),
                AggFn::Quantile(50.0),
            ],
        )
        .unwrap();
    assert_eq!(out[0], vec![5.0]);
    assert_eq!(out[1], vec![4.0]);
    assert_eq!(out[2], vec![6.0]);
    assert_eq!(out[3], vec![5.0]);
}

#[test]
fn test_missing_values_are_skipped() {
    let g = single_key(vec![1, 1, 1]);
    let values = Column::Float64(vec![f64::NAN, 2.0, 4.0]);
    let out = g
        .agg(
            &values,
            &[
                AggFn::Sum,
                AggFn::Mean,
                AggFn::Count,
                AggFn::FirstNm,
                AggFn::First,
            ],
        )
        .unwrap();
    assert_eq!(out[0], vec![6.0]);
    assert_eq!(out[1], vec![3.0]);
    assert_eq!(out[2], vec![2.0]);
    assert_eq!(out[3], vec![2.0]);
    assert!(out[4][0].is_nan());
}

#[test]
fn test_forced_64bit_collision() {
    // two distinct tuples sharing the low hash half, two rows each
    let hashes = KeyHashes::Hash128 {
        h1: vec![0xdead, 0xdead, 0xdead, 0xdead],
        h2: vec![7, 9, 7, 9],
    };
    let mut ctx = EngineContext::new();
    ctx.advance(EngineState::Hashed);
    let g = groups_from_hashes(&mut ctx, hashes, vec![0, 1, 2, 3], 4).unwrap();
    assert_eq!(g.num_groups(), 2);
    assert_eq!(g.collisions(), 1);

    let values = Column::Float64(vec![1.0, 10.0, 2.0, 20.0]);
    let sums = g.agg(&values, &[AggFn::Sum]).unwrap();
    let mut per_group: Vec<(IdxSize, f64)> = g
        .distinct_rows()
        .into_iter()
        .zip(sums[0].iter().copied())
        .collect();
    per_group.sort_by_key(|&(r, _)| r);
    assert_eq!(per_group, vec![(0, 3.0), (1, 30.0)]);
}

#[test]
fn test_biject_and_forced_hash_agree() {
    let by = vec![
        Column::Int64(vec![0, 0, 1, 0]),
        Column::Int64(vec![0, 1, 0, 0]),
    ];
    let values = Column::Float64(vec![1.0, 2.0, 4.0, 8.0]);

    let fast = group_by_columns(&by, &GroupOptions::default()).unwrap();
    let slow = group_by_columns(
        &by,
        &GroupOptions {
            force_hash: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(fast.mode(), KeyMode::Biject);
    assert_eq!(slow.mode(), KeyMode::Hash128);
    assert_eq!(fast.num_groups(), 3);
    assert_eq!(slow.num_groups(), fast.num_groups());

    // group order may differ between the modes; compare per-representative
    let collect = |g: &Groups| {
        let sums = g.agg(&values, &[AggFn::Sum]).unwrap();
        let mut rows: Vec<(Vec<IdxSize>, f64)> = g
            .iter()
            .map(|r| r.to_vec())
            .zip(sums[0].iter().copied())
            .collect();
        rows.sort_by_key(|(r, _)| r[0]);
        rows
    };
    assert_eq!(collect(&fast), collect(&slow));
    assert_eq!(fast.tag_column(), slow.tag_column());
}

#[test]
fn test_percent_sums_to_hundred() {
    let g = single_key(vec![1, 2, 1, 2, 2]);
    let values = Column::Float64(vec![1.0, 1.0, f64::NAN, 1.0, 1.0]);
    let out = g.agg(&values, &[AggFn::Percent, AggFn::Count]).unwrap();
    let total: f64 = out[0].iter().sum();
    assert!((total - 100.0).abs() < 1e-12);
    assert_eq!(out[1], vec![1.0, 3.0]);
}

#[test]
fn test_broadcast_assigns_group_values() {
    let by = vec![Column::Int64(vec![5, 9, 5, 9, 5])];
    let options = GroupOptions {
        selection: RowSelection {
            range: None,
            mask: Some(vec![true, true, true, true, false]),
        },
        ..Default::default()
    };
    let g = group_by_columns(&by, &options).unwrap();
    let values = Column::Float64(vec![1.0, 10.0, 3.0, 30.0, 999.0]);
    let means = g.agg_broadcast(&values, AggFn::Mean).unwrap();
    assert_eq!(means[0], 2.0);
    assert_eq!(means[2], 2.0);
    assert_eq!(means[1], 20.0);
    assert_eq!(means[3], 20.0);
    // the deselected row stays missing
    assert!(means[4].is_nan());
}

#[test]
fn test_bytes_keys_group_and_level() {
    let by = vec![
        Column::Bytes {
            width: 2,
            data: b"aaabaaabcc".to_vec(),
        },
        Column::Int64(vec![1, 1, 1, 2, 1]),
    ];
    let g = group_by_columns(&by, &GroupOptions::default()).unwrap();
    assert_eq!(g.num_groups(), 4);
    let rows: Vec<IdxSize> = (0..5).collect();
    assert_groups_match(&g, &by, &rows);
    assert_eq!(g.levels(&by, true), vec![0, 1, 3, 4]);
}

#[test]
fn test_empty_table_aggregates_to_empty() {
    let g = group_by_columns(&[Column::Int64(vec![])], &GroupOptions::default()).unwrap();
    assert_eq!(g.num_groups(), 0);
    let out = g
        .agg(&Column::Float64(vec![]), &[AggFn::Sum, AggFn::Median])
        .unwrap();
    assert!(out.iter().all(|col| col.is_empty()));
}

#[test]
fn test_bad_percentile_is_invariant_violation() {
    let g = single_key(vec![1]);
    let values = Column::Float64(vec![1.0]);
    for p in [-5.0, 0.0, 100.5, f64::NAN] {
        let err = g.agg(&values, &[AggFn::Quantile(p)]).unwrap_err();
        assert_eq!(err.code(), 4);
    }
}

fn int_pairs() -> impl Strategy<Value = Vec<(i64, i64)>> {
    proptest::collection::vec((0i64..5, -2i64..3), 0..120)
}

proptest! {
    #[test]
    fn prop_grouping_matches_reference(pairs in int_pairs()) {
        let (a, b): (Vec<i64>, Vec<i64>) = pairs.into_iter().unzip();
        let n = a.len();
        let by = vec![Column::Int64(a), Column::Int64(b)];
        let g = group_by_columns(&by, &GroupOptions::default()).unwrap();

        let rows: Vec<IdxSize> = (0..n as IdxSize).collect();
        assert_groups_match(&g, &by, &rows);

        let info = g.info();
        prop_assert_eq!(info[0], 0);
        prop_assert_eq!(*info.last().unwrap() as usize, g.num_selected());
        prop_assert!(info.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_hash_mode_matches_reference(keys in proptest::collection::vec(
        prop_oneof![Just(f64::NAN), Just(-1.5), Just(0.0), Just(2.0), Just(7.25)],
        1..100,
    )) {
        let n = keys.len();
        let by = vec![Column::Float64(keys)];
        let g = group_by_columns(&by, &GroupOptions::default()).unwrap();
        prop_assert_eq!(g.mode(), KeyMode::Hash128);
        let rows: Vec<IdxSize> = (0..n as IdxSize).collect();
        assert_groups_match(&g, &by, &rows);
    }

    #[test]
    fn prop_biject_equals_hash(keys in proptest::collection::vec(0i64..6, 1..80)) {
        let by = vec![Column::Int64(keys)];
        let fast = group_by_columns(&by, &GroupOptions::default()).unwrap();
        let slow = group_by_columns(&by, &GroupOptions { force_hash: true, ..Default::default() }).unwrap();
        prop_assert_eq!(fast.num_groups(), slow.num_groups());
        let mut f: Vec<Vec<IdxSize>> = fast.iter().map(|r| r.to_vec()).collect();
        let mut s: Vec<Vec<IdxSize>> = slow.iter().map(|r| r.to_vec()).collect();
        f.sort_by_key(|r| r[0]);
        s.sort_by_key(|r| r[0]);
        prop_assert_eq!(f, s);
    }

    #[test]
    fn prop_percentiles_monotone(
        vals in proptest::collection::vec(-100.0f64..100.0, 1..60),
        p1 in 1.0f64..100.0,
        p2 in 1.0f64..100.0,
    ) {
        let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let g = single_key(vec![0; vals.len()]);
        let values = Column::Float64(vals);
        let out = g.agg(&values, &[AggFn::Quantile(lo), AggFn::Quantile(hi), AggFn::Iqr]).unwrap();
        prop_assert!(out[0][0] <= out[1][0]);
        // IQR is exactly the percentile difference
        let q = g.agg(&values, &[AggFn::Quantile(75.0), AggFn::Quantile(25.0)]).unwrap();
        prop_assert_eq!(out[2][0], q[0][0] - q[1][0]);
    }

    #[test]
    fn prop_sum_and_count_additive(pairs in proptest::collection::vec((0i64..3, -10.0f64..10.0), 1..60)) {
        let (keys, vals): (Vec<i64>, Vec<f64>) = pairs.into_iter().unzip();
        let g = single_key(keys);
        let values = Column::Float64(vals.clone());
        let out = g.agg(&values, &[AggFn::Sum, AggFn::Count, AggFn::Mean]).unwrap();

        let total: f64 = vals.iter().sum();
        let grouped: f64 = out[0].iter().sum();
        prop_assert!((grouped - total).abs() < 1e-9);

        let count: f64 = out[1].iter().sum();
        prop_assert_eq!(count, vals.len() as f64);

        // mean recombines as the count-weighted average of group means
        let weighted: f64 = out[1].iter().zip(&out[2]).map(|(c, m)| c * m).sum();
        prop_assert!((weighted / count - total / vals.len() as f64).abs() < 1e-9);
    }

    #[test]
    fn prop_sorted_perm_roundtrip(keys in proptest::collection::vec(0i64..50, 1..100)) {
        let n = keys.len();
        let by = vec![Column::Int64(keys.clone())];
        let g = group_by_columns(&by, &GroupOptions::default()).unwrap();

        // the permutation is invertible: every row appears exactly once
        prop_assert_eq!(g.perm().len(), n);
        let inv = grouper_utils::index::invert_permutation(g.perm());
        for r in 0..n {
            prop_assert_eq!(g.perm()[inv[r] as usize] as usize, r);
        }

        // stability within groups
        for rows in g.iter() {
            prop_assert!(rows.windows(2).all(|w| w[0] < w[1]));
            let key = keys[rows[0] as usize];
            prop_assert!(rows.iter().all(|&r| keys[r as usize] == key));
        }
    }
}
