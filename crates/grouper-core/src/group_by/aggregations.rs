use grouper_error::{grouper_ensure, GrouperResult};
use grouper_utils::qselect::{is_sorted_total, qselect};
use grouper_utils::total_ord::TotalOrd;
use grouper_utils::IdxSize;
use num_traits::Float;

use super::Groups;
use crate::datatypes::{Column, ColumnKind};

/// Summary functions over one group's values. Dispatch is a constant-time
/// match on this tag; the percentile carries its parameter inline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AggFn {
    Sum,
    Mean,
    Sd,
    Min,
    Max,
    Count,
    Percent,
    Median,
    Iqr,
    Quantile(f64),
    First,
    Last,
    FirstNm,
    LastNm,
}

impl AggFn {
    pub(crate) fn validate(&self) -> GrouperResult<()> {
        if let AggFn::Quantile(p) = self {
            grouper_ensure!(
                p.is_finite() && *p > 0.0 && *p <= 100.0,
                InvariantViolation: "percentile must lie in (0, 100], got {p}"
            );
        }
        Ok(())
    }

    fn is_order_stat(&self) -> bool {
        matches!(self, AggFn::Median | AggFn::Iqr | AggFn::Quantile(_))
    }
}

impl Groups {
    /// Reduce `values` over every group, one output row per group and one
    /// output column per requested function. Missing values are skipped by
    /// every function except `First`/`Last`; a group with no usable values
    /// reduces to missing. No groups at all (empty selection) yields empty
    /// columns.
    pub fn agg(&self, values: &Column, funcs: &[AggFn]) -> GrouperResult<Vec<Vec<f64>>> {
        self.validate_values(values)?;
        for func in funcs {
            func.validate()?;
        }

        let j = self.num_groups();
        let mut out: Vec<Vec<f64>> = funcs.iter().map(|_| Vec::with_capacity(j)).collect();

        let total_count = if funcs.iter().any(|f| matches!(f, AggFn::Percent)) {
            self.perm()
                .iter()
                .filter(|&&r| !values.f64_at(r as usize).is_nan())
                .count()
        } else {
            0
        };

        let gather = funcs.iter().any(AggFn::is_order_stat);
        let mut scratch: Vec<f64> = Vec::new();
        for g in 0..j {
            let rows = self.group_rows(g);
            scratch.clear();
            if gather {
                scratch.extend(
                    rows.iter()
                        .map(|&r| values.f64_at(r as usize))
                        .filter(|v| !v.is_nan()),
                );
            }
            for (fi, func) in funcs.iter().enumerate() {
                out[fi].push(agg_group(values, rows, *func, &mut scratch, total_count));
            }
        }
        Ok(out)
    }

    /// Like [`Groups::agg`] but broadcast back onto rows: every selected row
    /// receives its group's reduced value, unselected rows stay missing.
    pub fn agg_broadcast(&self, values: &Column, func: AggFn) -> GrouperResult<Vec<f64>> {
        let reduced = self.agg(values, std::slice::from_ref(&func))?;
        let per_group = &reduced[0];
        let mut out = vec![f64::NAN; self.num_rows()];
        for (g, rows) in self.iter().enumerate() {
            for &r in rows {
                out[r as usize] = per_group[g];
            }
        }
        Ok(out)
    }

    fn validate_values(&self, values: &Column) -> GrouperResult<()> {
        grouper_ensure!(
            values.kind() != ColumnKind::Bytes,
            SchemaMismatch: "cannot aggregate a byte-string column"
        );
        grouper_ensure!(
            values.len() == self.num_rows(),
            SchemaMismatch: "value column has {} rows but the table has {}",
            values.len(), self.num_rows()
        );
        Ok(())
    }
}

fn agg_group(
    values: &Column,
    rows: &[IdxSize],
    func: AggFn,
    scratch: &mut Vec<f64>,
    total_count: usize,
) -> f64 {
    let vals = || rows.iter().map(|&r| values.f64_at(r as usize));
    match func {
        AggFn::Sum => {
            let (sum, n) = sum_skipna(vals());
            if n == 0 {
                f64::NAN
            } else {
                sum
            }
        },
        AggFn::Mean => {
            let (sum, n) = sum_skipna(vals());
            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        },
        AggFn::Sd => sd_skipna(vals()),
        AggFn::Min => min_max_skipna(vals()).map_or(f64::NAN, |(mn, _)| mn),
        AggFn::Max => min_max_skipna(vals()).map_or(f64::NAN, |(_, mx)| mx),
        AggFn::Count => vals().filter(|v| !v.is_nan()).count() as f64,
        AggFn::Percent => {
            if total_count == 0 {
                f64::NAN
            } else {
                let n = vals().filter(|v| !v.is_nan()).count();
                100.0 * n as f64 / total_count as f64
            }
        },
        AggFn::Median => quantile_or_missing(scratch, 50.0),
        AggFn::Iqr => {
            quantile_or_missing(scratch, 75.0) - quantile_or_missing(scratch, 25.0)
        },
        AggFn::Quantile(p) => quantile_or_missing(scratch, p),
        AggFn::First => values.f64_at(rows[0] as usize),
        AggFn::Last => values.f64_at(rows[rows.len() - 1] as usize),
        AggFn::FirstNm => vals().find(|v| !v.is_nan()).unwrap_or(f64::NAN),
        AggFn::LastNm => vals().rev().find(|v| !v.is_nan()).unwrap_or(f64::NAN),
    }
}

fn sum_skipna<T: Float>(values: impl Iterator<Item = T>) -> (T, usize) {
    let mut sum = T::zero();
    let mut count = 0usize;
    for v in values {
        if !v.is_nan() {
            sum = sum + v;
            count += 1;
        }
    }
    (sum, count)
}

// Two passes, mean then squared deviations; single-pass sum of squares is
// not worth its precision loss here.
fn sd_skipna<T: Float>(values: impl Iterator<Item = T> + Clone) -> T {
    let (sum, n) = sum_skipna(values.clone());
    if n < 2 {
        return T::nan();
    }
    let mean = sum / T::from(n).unwrap();
    let mut acc = T::zero();
    for v in values {
        if !v.is_nan() {
            let d = v - mean;
            acc = acc + d * d;
        }
    }
    (acc / T::from(n - 1).unwrap()).sqrt()
}

fn min_max_skipna<T: Float>(values: impl Iterator<Item = T>) -> Option<(T, T)> {
    let mut it = values.filter(|v| !v.is_nan());
    let first = it.next()?;
    let mut mn = first;
    let mut mx = first;
    for v in it {
        if v < mn {
            mn = v;
        }
        if v > mx {
            mx = v;
        }
    }
    Some((mn, mx))
}

fn quantile_or_missing(scratch: &mut [f64], p: f64) -> f64 {
    if scratch.is_empty() {
        f64::NAN
    } else {
        quantile(scratch, p)
    }
}

/// The p-th percentile of a non-empty, missing-free buffer: the
/// floor(p·n/100)-th order statistic, averaged with its predecessor when
/// p·n/100 is integral. Tiny groups and the 0th statistic short-circuit.
/// Selection partially orders `scratch`; repeated queries on the same buffer
/// skip selection once it has become sorted.
pub(crate) fn quantile(scratch: &mut [f64], p: f64) -> f64 {
    let n = scratch.len();
    debug_assert!(n > 0);
    debug_assert!(p > 0.0 && p <= 100.0);

    if n == 1 {
        return scratch[0];
    }
    if n == 2 {
        let (lo, hi) = if scratch[0].tot_gt(&scratch[1]) {
            (scratch[1], scratch[0])
        } else {
            (scratch[0], scratch[1])
        };
        if p > 50.0 {
            return hi;
        } else if p < 50.0 {
            return lo;
        }
        return (lo + hi) / 2.0;
    }

    let target = p * n as f64 / 100.0;
    let qth = target.floor() as usize;
    if qth == 0 {
        return select_or_index(scratch, 0);
    }

    let upper = select_or_index(scratch, qth.min(n - 1));
    if qth >= n {
        // p == 100
        return upper;
    }
    if qth as f64 == target {
        let lower = select_or_index(scratch, qth - 1);
        (upper + lower) / 2.0
    } else {
        upper
    }
}

fn select_or_index(v: &mut [f64], k: usize) -> f64 {
    if is_sorted_total(v) {
        v[k]
    } else {
        qselect(v, k)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quantile_special_cases() {
        assert_eq!(quantile(&mut [7.0], 25.0), 7.0);

        // two values: min / max / mean split at p = 50
        assert_eq!(quantile(&mut [4.0, 6.0], 10.0), 4.0);
        assert_eq!(quantile(&mut [4.0, 6.0], 90.0), 6.0);
        assert_eq!(quantile(&mut [4.0, 6.0], 50.0), 5.0);

        // qth == 0 falls back to the minimum
        assert_eq!(quantile(&mut [3.0, 1.0, 2.0], 10.0), 1.0);
    }

    #[test]
    fn test_quantile_integral_rank_averages() {
        let mut v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&mut v, 50.0), 2.5);
        assert_eq!(quantile(&mut v, 75.0), 3.5);
        assert_eq!(quantile(&mut v, 25.0), 1.5);
        assert_eq!(quantile(&mut v, 100.0), 4.0);

        let mut v = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(quantile(&mut v, 50.0), 3.0);
        assert_eq!(quantile(&mut v, 40.0), 2.5);
    }

    #[test]
    fn test_quantile_monotone_on_shared_scratch() {
        let mut v = [9.0, 2.0, 7.0, 4.0, 1.0, 8.0, 3.0];
        let mut last = f64::NEG_INFINITY;
        for p in [5.0, 25.0, 50.0, 75.0, 95.0] {
            let q = quantile(&mut v, p);
            assert!(q >= last, "p{p} went backwards");
            last = q;
        }
    }

    #[test]
    fn test_sd_two_values() {
        let sd = sd_skipna([2.0f64, 4.0].into_iter());
        assert!((sd - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!(sd_skipna([2.0f64].into_iter()).is_nan());
        assert!(sd_skipna([2.0f64, f64::NAN].into_iter()).is_nan());
    }

    #[test]
    fn test_min_max_skip_missing() {
        let (mn, mx) = min_max_skipna([f64::NAN, 3.0, -1.0, f64::NAN].into_iter()).unwrap();
        assert_eq!((mn, mx), (-1.0, 3.0));
        assert!(min_max_skipna(std::iter::empty::<f64>()).is_none());
    }
}
