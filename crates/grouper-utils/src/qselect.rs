use std::cmp::Ordering;

use crate::total_ord::TotalOrd;

/// Select the k-th smallest element (0-indexed, total order), partially
/// reordering `v` in place. Expected linear time; quadratic worst case is
/// accepted because inputs are not adversarial.
///
/// Callers must not request an empty range or an out-of-range k.
pub fn qselect(v: &mut [f64], k: usize) -> f64 {
    debug_assert!(!v.is_empty());
    debug_assert!(k < v.len());
    let mut lo = 0usize;
    let mut hi = v.len() - 1;
    loop {
        if lo == hi {
            return v[lo];
        }
        let p = partition(v, lo, hi);
        match k.cmp(&p) {
            Ordering::Equal => return v[p],
            Ordering::Less => hi = p - 1,
            Ordering::Greater => lo = p + 1,
        }
    }
}

// Median-of-three pivot, Lomuto partition. Returns the pivot's final
// position; everything left of it is tot_cmp-smaller, right is not-smaller.
fn partition(v: &mut [f64], lo: usize, hi: usize) -> usize {
    let mid = lo + (hi - lo) / 2;
    if v[mid].tot_lt(&v[lo]) {
        v.swap(mid, lo);
    }
    if v[hi].tot_lt(&v[lo]) {
        v.swap(hi, lo);
    }
    if v[hi].tot_lt(&v[mid]) {
        v.swap(hi, mid);
    }
    v.swap(mid, hi);
    let pivot = v[hi];
    let mut store = lo;
    for i in lo..hi {
        if v[i].tot_lt(&pivot) {
            v.swap(i, store);
            store += 1;
        }
    }
    v.swap(store, hi);
    store
}

/// Whether `v` is non-decreasing under the total order. Repeated quantile
/// queries on the same scratch buffer use this to skip re-selection once the
/// buffer has become ordered.
pub fn is_sorted_total(v: &[f64]) -> bool {
    v.windows(2).all(|w| w[0].tot_cmp(&w[1]) != Ordering::Greater)
}

#[cfg(test)]
mod test {
    use rand::prelude::*;

    use super::*;

    #[test]
    fn test_qselect_small() {
        let mut v = vec![3.0, 1.0, 2.0];
        assert_eq!(qselect(&mut v, 0), 1.0);
        assert_eq!(qselect(&mut v, 1), 2.0);
        assert_eq!(qselect(&mut v, 2), 3.0);

        let mut v = vec![5.0];
        assert_eq!(qselect(&mut v, 0), 5.0);

        // duplicates
        let mut v = vec![2.0, 2.0, 1.0, 2.0];
        assert_eq!(qselect(&mut v, 0), 1.0);
        assert_eq!(qselect(&mut v, 2), 2.0);
    }

    #[test]
    fn test_qselect_matches_sort() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [2usize, 3, 7, 64, 257] {
            let v: Vec<f64> = (0..n).map(|_| rng.gen_range(-100.0..100.0)).collect();
            let mut sorted = v.clone();
            sorted.sort_by(|a, b| a.tot_cmp(b));
            for k in [0, n / 3, n / 2, n - 1] {
                let mut scratch = v.clone();
                assert_eq!(qselect(&mut scratch, k), sorted[k]);
            }
        }
    }

    #[test]
    fn test_is_sorted_total() {
        assert!(is_sorted_total(&[]));
        assert!(is_sorted_total(&[1.0]));
        assert!(is_sorted_total(&[1.0, 1.0, 2.0, f64::NAN]));
        assert!(!is_sorted_total(&[2.0, 1.0]));
        assert!(!is_sorted_total(&[f64::NAN, 1.0]));
    }
}
