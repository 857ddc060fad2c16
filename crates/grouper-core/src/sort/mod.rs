pub mod comparators;

use grouper_error::GrouperResult;
use grouper_utils::IdxSize;
use rayon::prelude::*;

use crate::config;
use crate::engine::EngineContext;
use crate::POOL;

/// Hash ranges below this use the one-shot counting sort; anything wider
/// goes through the LSD radix sort.
pub(crate) const COUNTING_SORT_MAX_RANGE: u64 = 1 << 24;

/// Below this length the parallel histogram phase is not worth the fan-out.
const PARALLEL_COUNT_THRESHOLD: usize = 4096;

/// Stable in-place sort of `h`, carrying `perm` through the same
/// permutation. Equal hashes keep their input order, which is what makes
/// first/last aggregates well-defined downstream.
///
/// Scratch is acquired before any element moves, so an allocation failure
/// leaves both arrays untouched.
pub(crate) fn sort_hash(
    ctx: &mut EngineContext,
    h: &mut [u64],
    perm: &mut [IdxSize],
) -> GrouperResult<()> {
    debug_assert_eq!(h.len(), perm.len());
    if h.len() <= 1 {
        return Ok(());
    }

    let mut min = u64::MAX;
    let mut max = 0u64;
    for &x in h.iter() {
        min = min.min(x);
        max = max.max(x);
    }

    if let Some(range) = (max - min).checked_add(1) {
        if range < COUNTING_SORT_MAX_RANGE {
            counting_sort(ctx, h, perm, min, range)?;
            if config::verbose() {
                eprintln!("counting sort on hash; min = {min}, max = {max}");
            }
            return Ok(());
        }
    }

    let bits = config::radix_bits();
    radix_sort(ctx, h, perm, bits)?;
    if config::verbose() {
        eprintln!("radix sort on hash; {} passes, {bits} bits at a time", 64 / bits);
    }
    Ok(())
}

fn counting_sort(
    ctx: &mut EngineContext,
    h: &mut [u64],
    perm: &mut [IdxSize],
    min: u64,
    range: u64,
) -> GrouperResult<()> {
    let n = h.len();
    let mut counts: Vec<IdxSize> = Vec::new();
    counts.try_reserve_exact(range as usize)?;
    counts.resize(range as usize, 0);
    let (hcopy, pcopy) = ctx.sort_scratch(n)?;

    for &x in h.iter() {
        counts[(x - min) as usize] += 1;
    }

    // counts become start offsets
    let mut acc: IdxSize = 0;
    for c in counts.iter_mut() {
        let freq = *c;
        *c = acc;
        acc += freq;
    }

    // stable scatter: left to right, bump the offset after placing
    for i in 0..n {
        let bucket = (h[i] - min) as usize;
        let dst = counts[bucket] as usize;
        counts[bucket] += 1;
        hcopy[dst] = h[i];
        pcopy[dst] = perm[i];
    }

    h.copy_from_slice(hcopy);
    perm.copy_from_slice(pcopy);
    Ok(())
}

/// LSD radix sort, `64 / bits` stable counting passes over `bits`-wide
/// digits. Output ping-pongs between the caller arrays and scratch; the pass
/// count is even for both supported widths, so the final order always lands
/// back in the caller arrays.
fn radix_sort(
    ctx: &mut EngineContext,
    h: &mut [u64],
    perm: &mut [IdxSize],
    bits: u32,
) -> GrouperResult<()> {
    debug_assert!(bits == 8 || bits == 16);
    let n = h.len();
    let passes = (64 / bits) as usize;
    let size = 1usize << bits;
    let mask = (size - 1) as u64;

    let mut counts: Vec<Vec<IdxSize>> = Vec::with_capacity(passes);
    for _ in 0..passes {
        let mut c: Vec<IdxSize> = Vec::new();
        c.try_reserve_exact(size)?;
        c.resize(size, 0);
        counts.push(c);
    }

    // One histogram per pass over disjoint memory; with enough rows they are
    // filled by one worker each, joined before any scatter starts.
    let src: &[u64] = h;
    if n >= PARALLEL_COUNT_THRESHOLD && POOL.current_num_threads() > 1 {
        POOL.install(|| {
            counts.par_iter_mut().enumerate().for_each(|(pass, c)| {
                let shift = bits * pass as u32;
                for &x in src {
                    c[((x >> shift) & mask) as usize] += 1;
                }
            })
        });
    } else {
        for &x in src {
            for (pass, c) in counts.iter_mut().enumerate() {
                let shift = bits * pass as u32;
                c[((x >> shift) & mask) as usize] += 1;
            }
        }
    }

    for c in counts.iter_mut() {
        let mut acc: IdxSize = 0;
        for slot in c.iter_mut() {
            let freq = *slot;
            *slot = acc;
            acc += freq;
        }
    }

    let (hcopy, pcopy) = ctx.sort_scratch(n)?;
    for (pass, offsets) in counts.iter_mut().enumerate() {
        let shift = bits * pass as u32;
        if pass % 2 == 0 {
            scatter(h, perm, hcopy, pcopy, offsets, shift, mask);
        } else {
            scatter(hcopy, pcopy, h, perm, offsets, shift, mask);
        }
    }
    Ok(())
}

fn scatter(
    src_h: &[u64],
    src_p: &[IdxSize],
    dst_h: &mut [u64],
    dst_p: &mut [IdxSize],
    offsets: &mut [IdxSize],
    shift: u32,
    mask: u64,
) {
    for i in 0..src_h.len() {
        let bucket = ((src_h[i] >> shift) & mask) as usize;
        let dst = offsets[bucket] as usize;
        offsets[bucket] += 1;
        dst_h[dst] = src_h[i];
        dst_p[dst] = src_p[i];
    }
}
