//! # Segment — Shared Wheel Context and Per-Segment Sieve State
//!
//! An [`Izm`] bundles everything the segmented engine reuses across
//! segments: the wheel width vx, the pre-sieved base templates for both iZ
//! lines, and the root primes up to vx. It is built once, never mutated, and
//! deep-cloned for each worker so that multi-worker runs share nothing
//! writable.
//!
//! A [`VxSegment`] is the mutable state for one y-indexed segment: bitmaps
//! cloned from the base, deterministically marked on construction, and
//! optionally finished with a probabilistic cleanup when the segment lies
//! beyond the reach of the root primes (√(segment upper) > vx). Surviving
//! bits can then be counted, streamed in order, or compressed into a
//! prime-gap encoding.
//!
//! [`RangeInfo`] maps a numeric interval [Zs, Ze] into this segment space.

use anyhow::{ensure, Context, Result};
use rug::{Complete, Integer};
use std::io::Write;

use crate::bitmap::Bitmap;
use crate::int_array::{UInt16Array, UInt64Array};
use crate::iz::{self, check_primality, iz_big, solve_x0, solve_x0_big, MR_ROUNDS};
use crate::sieve;

/// Immutable wheel context shared by all segments of one run.
///
/// Cloning is a deep copy (root primes and both base bitmaps); workers each
/// own a clone, so no synchronization is ever needed.
#[derive(Clone, Debug)]
pub struct Izm {
    /// Segment width in iZ x-units; a primorial-style product of small primes.
    pub vx: u64,
    /// Count of small primes > 3 dividing vx (pre-sieved into the base).
    pub k_vx: usize,
    /// Pre-sieved template for the 6x − 1 line.
    pub base_x5: Bitmap,
    /// Pre-sieved template for the 6x + 1 line.
    pub base_x7: Bitmap,
    /// All primes ≤ vx, ascending; the deterministic marking set.
    pub root_primes: UInt64Array,
}

impl Izm {
    /// Build the wheel context for a given width. `vx` must be at least 35
    /// (the smallest useful wheel, 5·7).
    pub fn new(vx: u64) -> Result<Self> {
        ensure!(vx >= 35, "vx must be at least 35, got {}", vx);

        let root_primes = sieve::siz(vx).context("root prime generation failed")?;

        let mut k_vx = 0;
        while vx % iz::SMALL_PRIMES[k_vx + 2] == 0 {
            k_vx += 1;
        }

        let mut base_x5 = Bitmap::new(vx + 10, true)?;
        let mut base_x7 = Bitmap::new(vx + 10, true)?;
        iz::construct_vx_base(vx, &mut base_x5, &mut base_x7);

        Ok(Izm {
            vx,
            k_vx,
            base_x5,
            base_x7,
            root_primes,
        })
    }
}

/// Mutable sieve state for the segment at index y.
#[derive(Debug)]
pub struct VxSegment {
    /// Wheel width, copied from the owning context.
    pub vx: u64,
    /// Segment index; may exceed 64 bits.
    pub y: Integer,
    /// Cached y·vx.
    pub yvx: Integer,
    /// √(iZ(y·vx + vx, +1)): the prime bound deterministic marking needs.
    pub root_limit: Integer,
    /// True while √(segment upper) > vx, i.e. root primes cannot finish the
    /// job and survivors still need probabilistic cleanup.
    pub is_large_limit: bool,
    /// Miller–Rabin rounds for the cleanup stage.
    pub mr_rounds: u32,
    /// Inclusive local x bounds for this segment.
    pub start_x: u64,
    pub end_x: u64,
    /// Candidate bitmap for the 6x − 1 line.
    pub x5: Bitmap,
    /// Candidate bitmap for the 6x + 1 line.
    pub x7: Bitmap,
    /// Primes confirmed in this segment.
    pub p_count: u64,
    /// Optional gap encoding of the confirmed primes.
    pub p_gaps: Option<UInt16Array>,
    /// Approximate deterministic mark operations (observability).
    pub bit_ops: u64,
    /// Probabilistic tests executed (observability).
    pub p_test_ops: u64,
}

impl VxSegment {
    /// Initialize the segment at `y` and run the deterministic marking pass.
    ///
    /// Bitmaps start as clones of the context's pre-sieved base; `start_x`
    /// is clamped to ≥ 1 and `end_x` to ≤ vx. `mr_rounds = 0` selects the
    /// default round count.
    pub fn new(izm: &Izm, start_x: u64, end_x: u64, y: Integer, mr_rounds: u32) -> Result<Self> {
        ensure!(y >= 0, "segment index must be non-negative");

        let vx = izm.vx;
        let yvx = (&y * vx).complete();

        let mut root_limit = (&yvx + vx).complete();
        root_limit = iz_big(&root_limit, 1);
        root_limit.sqrt_mut();
        let is_large_limit = root_limit > vx;

        let mut segment = VxSegment {
            vx,
            y,
            yvx,
            root_limit,
            is_large_limit,
            mr_rounds: if mr_rounds == 0 { MR_ROUNDS } else { mr_rounds },
            start_x: start_x.max(1),
            end_x: end_x.min(vx),
            x5: izm.base_x5.clone(),
            x7: izm.base_x7.clone(),
            p_count: 0,
            p_gaps: None,
            bit_ops: 0,
            p_test_ops: 0,
        };

        segment.det_sieve(izm);
        Ok(segment)
    }

    /// Deterministic phase: clear composites of every root prime past the
    /// pre-sieved ones, up to the segment's root limit.
    fn det_sieve(&mut self, izm: &Izm) {
        let vx = self.vx;
        let end_x = self.end_x;
        let skip = 2 + izm.k_vx; // 2, 3 and the primes dividing vx

        if let Some(y) = self.y.to_u64() {
            // segment index fits u64: fast solver path
            let root_limit = self.root_limit.to_u64().unwrap_or(u64::MAX);

            for &p in izm.root_primes.iter().skip(skip) {
                if p > root_limit {
                    break;
                }
                self.x5.clear_steps(p, solve_x0(-1, p, vx, y), end_x);
                self.x7.clear_steps(p, solve_x0(1, p, vx, y), end_x);
                self.bit_ops += 2 * end_x / p;
            }
        } else {
            for &p in izm.root_primes.iter().skip(skip) {
                self.x5.clear_steps(p, solve_x0_big(-1, p, vx, &self.y), end_x);
                self.x7.clear_steps(p, solve_x0_big(1, p, vx, &self.y), end_x);
                self.bit_ops += 2 * end_x / p;
            }
        }

        // without a probabilistic stage the survivors are already primes
        if !self.is_large_limit {
            self.p_count = 0;
            for x in self.start_x..=self.end_x {
                if self.x5.get(x) {
                    self.p_count += 1;
                }
                if self.x7.get(x) {
                    self.p_count += 1;
                }
            }
        }
    }

    /// Probabilistic phase: Miller–Rabin every surviving candidate, clearing
    /// composites and counting primes. No-op unless the segment has a large
    /// root limit.
    fn prob_sieve(&mut self) {
        if !self.is_large_limit {
            tracing::debug!("segment root limit within vx; probabilistic cleanup skipped");
            return;
        }

        let rounds = self.mr_rounds;
        for x in self.start_x.max(1)..=self.end_x {
            if self.x5.get(x) {
                let p = iz_big(&(&self.yvx + x).complete(), -1);
                self.p_test_ops += 1;
                if check_primality(&p, rounds) {
                    self.p_count += 1;
                } else {
                    self.x5.clear(x);
                }
            }

            if self.x7.get(x) {
                let p = iz_big(&(&self.yvx + x).complete(), 1);
                self.p_test_ops += 1;
                if check_primality(&p, rounds) {
                    self.p_count += 1;
                } else {
                    self.x7.clear(x);
                }
            }
        }

        self.is_large_limit = false; // all composites cleared
    }

    /// Finish the segment: run the probabilistic stage if required and
    /// optionally collect the gap encoding.
    pub fn full_sieve(&mut self, collect_gaps: bool) {
        if self.is_large_limit {
            self.prob_sieve();
        }
        if collect_gaps {
            self.collect_p_gaps();
        }
    }

    /// Compress the confirmed survivors into consecutive prime gaps.
    ///
    /// Walking x, the distance iZ(x, −1) − iZ(x−1, +1) contributes 4 and
    /// iZ(x, +1) − iZ(x, −1) contributes 2; a trailing gap is appended for
    /// backward reconstruction. Requires a fully sieved segment at y > 0.
    pub fn collect_p_gaps(&mut self) {
        assert!(self.p_count > 0, "no primes to encode in collect_p_gaps");
        assert!(self.y > 0, "first segment requires special handling in collect_p_gaps");
        if self.is_large_limit {
            self.full_sieve(false);
        }

        let mut gaps = UInt16Array::with_capacity(self.p_count as usize + 2);
        let mut gap = 0u16;

        for x in self.start_x..=self.end_x {
            gap += 4;
            if self.x5.get(x) {
                gaps.push(gap);
                gap = 0;
            }

            gap += 2;
            if self.x7.get(x) {
                gaps.push(gap);
                gap = 0;
            }
        }

        gaps.push(gap);
        self.p_gaps = Some(gaps);
    }

    /// Emit the segment's primes to `out` as space-terminated decimals, in
    /// ascending x then line order.
    ///
    /// With a large root limit each candidate is tested on the fly;
    /// composites are cleared and survivors counted into `p_count` (already
    /// counted during marking otherwise).
    pub fn stream<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let rounds = self.mr_rounds;

        for x in self.start_x..=self.end_x {
            if self.x5.get(x) {
                let p = iz_big(&(&self.yvx + x).complete(), -1);
                let mut is_prime = true;
                if self.is_large_limit {
                    self.p_test_ops += 1;
                    is_prime = check_primality(&p, rounds);
                }

                if is_prime {
                    if self.is_large_limit {
                        self.p_count += 1;
                    }
                    write!(out, "{} ", p).context("failed to write prime to sink")?;
                } else {
                    self.x5.clear(x);
                }
            }

            if self.x7.get(x) {
                let p = iz_big(&(&self.yvx + x).complete(), 1);
                let mut is_prime = true;
                if self.is_large_limit {
                    self.p_test_ops += 1;
                    is_prime = check_primality(&p, rounds);
                }

                if is_prime {
                    if self.is_large_limit {
                        self.p_count += 1;
                    }
                    write!(out, "{} ", p).context("failed to write prime to sink")?;
                } else {
                    self.x7.clear(x);
                }
            }
        }

        Ok(())
    }
}

/// A numeric interval [Zs, Ze] mapped into iZ segment coordinates at a given
/// wheel width.
#[derive(Debug)]
pub struct RangeInfo {
    /// Wheel width the mapping was computed for.
    pub vx: u64,
    /// Inclusive numeric bounds.
    pub zs: Integer,
    pub ze: Integer,
    /// x-coordinates: ⌊Z/6⌋.
    pub xs: Integer,
    pub xe: Integer,
    /// Segment indices: ⌊X/vx⌋.
    pub ys: Integer,
    pub ye: Integer,
    /// Ye − Ys; guaranteed to fit i32.
    pub y_range: i32,
}

impl RangeInfo {
    /// Map `[start, start + range − 1]` into segment coordinates.
    ///
    /// Fails on an unparseable or negative start, vx < 35, or a y-span that
    /// does not fit a signed 32-bit integer.
    pub fn new(start: &str, range: u64, vx: u64) -> Result<Self> {
        ensure!(vx >= 35, "vx must be at least 35, got {}", vx);

        let zs = Integer::parse(start)
            .map(|v| v.complete())
            .with_context(|| format!("invalid numeric start {:?}", start))?;
        ensure!(zs >= 0, "range start must be non-negative");

        // inclusive upper bound: [start, start + range − 1]
        let ze = if range == 0 {
            zs.clone()
        } else {
            (&zs + (range - 1)).complete()
        };

        let xs = (&zs / 6u32).complete();
        let xe = (&ze / 6u32).complete();
        let ys = (&xs / vx).complete();
        let ye = (&xe / vx).complete();

        let y_delta = (&ye - &ys).complete();
        let y_range = y_delta
            .to_i32()
            .filter(|&d| d >= 0)
            .context("computed y-range is out of supported bounds")?;

        Ok(RangeInfo {
            vx,
            zs,
            ze,
            xs,
            xe,
            ys,
            ye,
            y_range,
        })
    }
}
