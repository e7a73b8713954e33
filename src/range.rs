//! # Range — Streaming and Counting Primes over Arbitrary Intervals
//!
//! The range driver accepts an inclusive interval [Zs, Ze] whose start may
//! be an arbitrarily large integer (width ≤ 2⁶⁴), maps it into VX segments
//! via [`RangeInfo`], and drives the segmented engine across the y-span.
//!
//! [`siz_stream`] walks segments in order and writes every prime to a sink
//! (file or stdout), so output is strictly ascending. [`siz_count`] skips
//! the sink and, when more than one core is requested, partitions the
//! segment span into contiguous blocks and fans the blocks out to a pool of
//! workers — each owning a deep clone of the wheel context, sharing nothing
//! writable. Worker counts are summed and two endpoint candidates are
//! reconciled against the closed interval. A failed worker reports zero for
//! its block and the count degrades rather than erroring out; no detached
//! work survives the call.

use anyhow::{ensure, Context, Result};
use rayon::prelude::*;
use rug::{Complete, Integer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::iz::{check_primality, compute_l2_vx, iz_big, VX6};
use crate::platform;
use crate::segment::{Izm, RangeInfo, VxSegment};
use crate::sieve;

/// Input parameters for range sieving and counting.
///
/// The interval is `[start, start + range − 1]`.
#[derive(Clone, Debug, Default)]
pub struct RangeInput {
    /// Start of the interval as a base-10 numeric string.
    pub start: String,
    /// Interval width (number of integers covered).
    pub range: u64,
    /// Miller–Rabin rounds for large-candidate cleanup (0 = default).
    pub mr_rounds: u32,
    /// Output path for streamed primes; `None` streams to stdout.
    pub filepath: Option<PathBuf>,
}

fn open_sink(input: &RangeInput) -> Result<Box<dyn Write>> {
    match &input.filepath {
        Some(path) if !path.as_os_str().is_empty() && path.as_os_str() != "/dev/stdout" => {
            let file = File::create(path)
                .with_context(|| format!("failed to open output sink {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

/// Stream every prime in the interval to the configured sink, in ascending
/// order, and return how many fell inside [Zs, Ze].
///
/// The first segment (y = 0) is produced by the full segmented sieve and
/// filtered into the interval; later segments stream straight out of
/// [`VxSegment`]s, with Miller–Rabin cleanup applied on the fly once the
/// segments outgrow the deterministic root-prime reach.
pub fn siz_stream(input: &RangeInput) -> Result<u64> {
    let mut out = open_sink(input)?;

    let vx = VX6; // fixed stream segment width: 1 616 615 x-units
    let mr_rounds = input.mr_rounds.clamp(5, 50);

    let info = RangeInfo::new(&input.start, input.range, vx)?;
    let mut total = 0u64;

    let mut current_y = info.ys.clone();
    let mut start_x = (&info.xs % vx).complete().to_u64().expect("x offset fits u64");
    let end_x = (&info.xe % vx).complete().to_u64().expect("x offset fits u64");

    if current_y == 0 {
        // first segment comes from the full segmented sieve
        let limit = if info.ye > 0 { vx } else { end_x };
        let primes = sieve::sizm(limit * 6 + 1)?;

        let zs = info.zs.to_u64().expect("first-segment start fits u64");
        let ze = info.ze.to_u64().unwrap_or(u64::MAX);

        for &p in primes.iter() {
            if p >= zs && p <= ze {
                total += 1;
                write!(out, "{} ", p).context("failed to write prime to sink")?;
            }
        }

        start_x = 1;
        current_y += 1;
    }

    if current_y > info.ye {
        out.flush().context("failed to flush output sink")?;
        return Ok(total);
    }

    let izm = Izm::new(vx)?;

    let mut first_segment = true;
    while current_y <= info.ye {
        let seg_start_x = if first_segment { start_x } else { 1 };
        let seg_end_x = if current_y == info.ye { end_x } else { vx };

        let mut segment = VxSegment::new(&izm, seg_start_x, seg_end_x, current_y.clone(), mr_rounds)?;
        segment.stream(&mut out)?;
        total += segment.p_count;

        first_segment = false;
        current_y += 1;
    }

    out.flush().context("failed to flush output sink")?;
    Ok(total)
}

/// Count the primes in the interval, optionally fanning segments out across
/// `cores` workers.
///
/// The requested core count is clamped to the detected CPU count and the
/// number of segments. Workers receive contiguous segment blocks and a deep
/// clone of the wheel context each; the driver sums their partial counts and
/// applies the endpoint corrections. A worker that fails contributes zero to
/// the total instead of failing the call. Requires `range > 100`.
pub fn siz_count(input: &RangeInput, cores: usize) -> Result<u64> {
    ensure!(input.range > 100, "count requires a range wider than 100, got {}", input.range);

    let vx = compute_l2_vx(1_000_000_000); // segment width balancing workload and overhead
    let cores = cores.clamp(1, platform::cpu_cores());

    let info = RangeInfo::new(&input.start, input.range, vx)?;
    let mut total = 0u64;

    let mut current_y = info.ys.clone();
    let mut start_x = (&info.xs % vx).complete().to_u64().expect("x offset fits u64");
    let end_x = (&info.xe % vx).complete().to_u64().expect("x offset fits u64");

    if current_y == 0 {
        let limit = if info.ye > 0 { vx } else { end_x };
        let primes = sieve::sizm(limit * 6 + 1)?;

        let zs = info.zs.to_u64().expect("first-segment start fits u64");
        let ze = info.ze.to_u64().unwrap_or(u64::MAX);
        total += primes.iter().filter(|&&p| p >= zs && p <= ze).count() as u64;

        start_x = 1;
        current_y += 1;
    }

    if current_y > info.ye {
        return Ok(total);
    }

    let izm = Izm::new(vx)?;

    // endpoint candidates that fall outside the closed interval but inside
    // the aligned segment x-ranges
    let mut corrections = 0u64;
    if info.ys > 0 && (&info.zs % 6u32).complete() <= 1 {
        let candidate = iz_big(&info.xs, -1);
        if candidate < info.zs && check_primality(&candidate, 25) {
            corrections += 1;
        }
    }
    if info.ye > 0 && (&info.ze % 6u32).complete() <= 1 {
        let candidate = iz_big(&info.xe, 1);
        if candidate > info.ze && check_primality(&candidate, 25) {
            corrections += 1;
        }
    }

    let total_segments = (&info.ye - &current_y)
        .complete()
        .to_i64()
        .context("segment span exceeds supported bounds")?
        + 1;

    if cores == 1 || total_segments == 1 {
        total += sum_block_counts(
            &izm,
            &current_y,
            &[(0, total_segments)],
            total_segments,
            start_x,
            end_x,
            input.mr_rounds,
        );
        return Ok(total.saturating_sub(corrections));
    }

    // contiguous block partition, one block per worker
    let cores = cores.min(total_segments as usize);
    let per_core = total_segments / cores as i64;
    let remainder = total_segments % cores as i64;

    let blocks: Vec<(i64, i64)> = (0..cores as i64)
        .map(|c| {
            let offset = c * per_core + c.min(remainder);
            let count = per_core + if c < remainder { 1 } else { 0 };
            (offset, count)
        })
        .collect();

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(cores).build() {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "worker pool creation failed; falling back to single-process mode");
            total += sum_block_counts(
                &izm,
                &current_y,
                &[(0, total_segments)],
                total_segments,
                start_x,
                end_x,
                input.mr_rounds,
            );
            return Ok(total.saturating_sub(corrections));
        }
    };

    total += pool.install(|| {
        sum_block_counts(
            &izm,
            &current_y,
            &blocks,
            total_segments,
            start_x,
            end_x,
            input.mr_rounds,
        )
    });

    Ok(total.saturating_sub(corrections))
}

/// Run every block through [`count_block`] in parallel and sum the results.
///
/// A failed worker reports zero for its segments; the failure is logged and
/// the count degrades instead of erroring out. All workers are joined before
/// this returns.
#[allow(clippy::too_many_arguments)]
fn sum_block_counts(
    izm: &Izm,
    base_y: &Integer,
    blocks: &[(i64, i64)],
    total_segments: i64,
    start_x: u64,
    end_x: u64,
    mr_rounds: u32,
) -> u64 {
    blocks
        .par_iter()
        .map(|&(offset, count)| {
            count_block(izm, base_y, offset, count, total_segments, start_x, end_x, mr_rounds)
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, offset, "worker failed; reporting zero for its segments");
                    0
                })
        })
        .sum()
}

/// Sieve `count` consecutive segments starting at `base_y + offset` and
/// return their summed prime count.
///
/// Each call deep-clones the wheel context, so concurrent blocks share no
/// mutable state.
#[allow(clippy::too_many_arguments)]
fn count_block(
    izm: &Izm,
    base_y: &Integer,
    offset: i64,
    count: i64,
    total_segments: i64,
    start_x: u64,
    end_x: u64,
    mr_rounds: u32,
) -> Result<u64> {
    let izm = izm.clone();
    let mut y = (base_y + offset).complete();
    let mut sum = 0u64;

    for i in 0..count {
        let global = offset + i;
        let seg_start_x = if global == 0 { start_x } else { 1 };
        let seg_end_x = if global == total_segments - 1 { end_x } else { izm.vx };

        let mut segment = VxSegment::new(&izm, seg_start_x, seg_end_x, y.clone(), mr_rounds)?;
        segment.full_sieve(false);
        sum += segment.p_count;

        y += 1;
    }

    Ok(sum)
}
