//! # Search — Random and Sequential Probable-Prime Generation
//!
//! Probabilistic prime searches built on the same iZm filtering the sieves
//! use. The horizontal search ([`vx_search_prime`]) sieves one VX-wide row
//! at a random y and walks surviving candidates; the vertical search
//! ([`vy_search_prime`]) fixes a random coprime column and climbs y. Both
//! avoid ever testing a candidate with a small factor, which is where naive
//! random-and-test generators burn most of their time.
//!
//! [`vx_random_prime`] / [`vy_random_prime`] race several workers over
//! independently seeded searches and return the first hit; losers are
//! cancelled through a shared stop flag, and every worker is joined before
//! returning. [`iz_next_prime`] walks the pre-sieved base template forward
//! or backward from an arbitrary starting point.

use anyhow::{Context, Result};
use rug::rand::RandState;
use rug::{Complete, Integer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::bitmap::Bitmap;
use crate::iz::{check_primality, compute_max_vx, iz_big, solve_x0_big, MR_ROUNDS, VX5, VX6};
use crate::segment::Izm;
use crate::sieve;

/// Distinguishes concurrently created random states within one nanosecond.
static SEED_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn seeded_state() -> RandState<'static> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let sequence = SEED_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    let mut state = RandState::new();
    state.seed(&Integer::from(nanos ^ sequence.rotate_left(32)));
    state
}

fn pick_line(m: i32, state: &mut RandState) -> i32 {
    if m == -1 || m == 1 {
        m
    } else if state.bits(1) == 1 {
        1
    } else {
        -1
    }
}

#[inline]
fn stopped(stop: Option<&AtomicBool>) -> bool {
    stop.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Horizontal random-prime search: sieve a VX row at a random y with the
/// root primes, then Miller–Rabin the survivors from a random column on.
///
/// `m` selects the iZ line (−1 or +1; any other value picks one at random).
/// Returns `Ok(None)` when cancelled through `stop`.
pub fn vx_search_prime(
    m: i32,
    vx: u64,
    bit_size: u32,
    stop: Option<&AtomicBool>,
) -> Result<Option<Integer>> {
    let bit_size = bit_size.max(10);
    let mut state = seeded_state();
    let m = pick_line(m, &mut state);

    let root_primes = sieve::sizm(vx).context("root prime generation failed in vx_search_prime")?;

    let mut y = Integer::from(Integer::random_bits(bit_size, &mut state));
    y /= 6 * vx;
    let mut yvx = (&y * vx).complete();

    loop {
        if stopped(stop) {
            return Ok(None);
        }

        let mut row = Bitmap::new(vx + 10, true)?;
        for &q in root_primes.iter().skip(2) {
            row.clear_steps(q, solve_x0_big(m, q, vx, &y), vx);
        }

        let random_x = state.below((vx / 2) as u32) as u64;
        for x in random_x..vx {
            if !row.get(x) {
                continue;
            }
            if stopped(stop) {
                return Ok(None);
            }

            let z = iz_big(&(&yvx + x).complete(), m);
            if check_primality(&z, MR_ROUNDS) {
                return Ok(Some(z));
            }
        }

        y += 1;
        yvx += vx;
    }
}

/// Vertical random-prime search: pick a random column coprime to vx, then
/// climb y in 6·vx strides testing each candidate.
///
/// Returns `Ok(None)` when cancelled through `stop`.
pub fn vy_search_prime(m: i32, vx: &Integer, stop: Option<&AtomicBool>) -> Result<Option<Integer>> {
    let mut state = seeded_state();
    let m = pick_line(m, &mut state);

    let mut z = iz_big(&Integer::from(vx.random_below_ref(&mut state)), m);

    // advance x until the candidate line is coprime to vx
    loop {
        z += 6;
        if (&z).gcd_ref(vx).complete() == 1 {
            break;
        }
    }

    // stride one full segment per step, from a random starting row
    let stride = (vx * 6u32).complete();
    let offset = state.below(100);
    z += (&stride * offset).complete();

    loop {
        if stopped(stop) {
            return Ok(None);
        }

        z += &stride;
        if check_primality(&z, MR_ROUNDS) {
            return Ok(Some(z));
        }
    }
}

/// Race `cores` independently seeded search workers; the first prime wins
/// and the rest are cancelled. `run` is invoked once per worker.
fn race_searches<F>(cores: usize, run: F) -> Result<Integer>
where
    F: Fn(Option<&AtomicBool>) -> Result<Option<Integer>> + Sync,
{
    let stop = AtomicBool::new(false);

    let winner = std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<Integer>();

        for _ in 0..cores {
            let tx = tx.clone();
            let stop = &stop;
            let run = &run;
            scope.spawn(move || {
                match run(Some(stop)) {
                    Ok(Some(p)) => {
                        let _ = tx.send(p);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "prime search worker failed"),
                }
            });
        }
        drop(tx);

        // blocks until the first hit, or until every worker failed
        let first = rx.recv().ok();
        stop.store(true, Ordering::Relaxed);
        first
    });

    winner.context("no search worker produced a prime")
}

/// Generate a random probable prime of roughly `bit_size` bits using the
/// horizontal search, fanning out to `cores` racing workers when more than
/// one is requested.
pub fn vx_random_prime(bit_size: u32, cores: usize) -> Result<Integer> {
    let bit_size = bit_size.max(10);
    let vx = if bit_size <= 2048 { VX5 } else { VX6 };

    if cores < 2 {
        return vx_search_prime(0, vx, bit_size, None)?
            .context("horizontal search ended without a prime");
    }

    race_searches(cores, |stop| vx_search_prime(0, vx, bit_size, stop))
}

/// Generate a random probable prime of roughly `bit_size` bits using the
/// vertical search over the widest wheel fitting the bit budget.
pub fn vy_random_prime(bit_size: u32, cores: usize) -> Result<Integer> {
    let bit_size = bit_size.max(10);
    let vx = compute_max_vx(bit_size)?;

    if cores < 2 {
        return vy_search_prime(0, &vx, None)?.context("vertical search ended without a prime");
    }

    race_searches(cores, |stop| vy_search_prime(0, &vx, stop))
}

/// Find the next (or previous) probable prime from `base`.
///
/// Checks the twin-side shortcut first, then walks the pre-sieved base
/// template segment by segment in the requested direction, Miller–Rabin
/// testing each surviving candidate.
pub fn iz_next_prime(base: &Integer, forward: bool) -> Result<Integer> {
    let mut z = base.clone();
    let rem = (&z % 6u32).complete();

    // twin-side shortcut: the adjacent candidate two away
    if forward && rem == 5 {
        z += 2;
        if check_primality(&z, MR_ROUNDS) {
            return Ok(z);
        }
    } else if !forward && rem == 1 {
        z -= 2;
        if check_primality(&z, MR_ROUNDS) {
            return Ok(z);
        }
    }

    let vx = if base.significant_bits() > 2048 { VX6 } else { VX5 };
    let izm = Izm::new(vx)?;

    let y = (base / (6 * vx)).complete();
    let mut yvx = (&y * vx).complete();
    let x_p = (&z / 6u32).complete();

    let step: i64 = if forward { 1 } else { -1 };
    let mut start_x = (&x_p % vx).complete().to_i64().expect("x offset fits i64") + step;
    let end_x: i64 = if forward { vx as i64 } else { 1 };

    let mut segment = 0u64;
    loop {
        if forward {
            if segment > 0 {
                start_x = 1;
            }

            for x in start_x..=end_x {
                let x = x as u64;
                if izm.base_x5.get(x) {
                    let z = iz_big(&(&yvx + x).complete(), -1);
                    if check_primality(&z, MR_ROUNDS) {
                        return Ok(z);
                    }
                }
                if izm.base_x7.get(x) {
                    let z = iz_big(&(&yvx + x).complete(), 1);
                    if check_primality(&z, MR_ROUNDS) {
                        return Ok(z);
                    }
                }
            }

            yvx += vx;
        } else {
            if segment > 0 {
                start_x = vx as i64;
            }

            // descending, so the x7 line comes first at each x
            let mut x = start_x;
            while x >= end_x {
                let xu = x as u64;
                if izm.base_x7.get(xu) {
                    let z = iz_big(&(&yvx + xu).complete(), 1);
                    if check_primality(&z, MR_ROUNDS) {
                        return Ok(z);
                    }
                }
                if izm.base_x5.get(xu) {
                    let z = iz_big(&(&yvx + xu).complete(), -1);
                    if check_primality(&z, MR_ROUNDS) {
                        return Ok(z);
                    }
                }
                x -= 1;
            }

            yvx -= vx;
        }

        segment += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_prime_forward_small() {
        assert_eq!(iz_next_prime(&Integer::from(1_000_000u32), true).unwrap(), 1_000_003);
        assert_eq!(iz_next_prime(&Integer::from(10_000u32), true).unwrap(), 10_007);
    }

    #[test]
    fn next_prime_twin_shortcut() {
        // base ≡ 5 (mod 6) with base + 2 prime
        assert_eq!(iz_next_prime(&Integer::from(5u32), true).unwrap(), 7);
        assert_eq!(iz_next_prime(&Integer::from(11u32), true).unwrap(), 13);
        // backward: base ≡ 1 (mod 6) with base − 2 prime
        assert_eq!(iz_next_prime(&Integer::from(13u32), false).unwrap(), 11);
    }

    #[test]
    fn next_prime_backward() {
        assert_eq!(iz_next_prime(&Integer::from(1_000_000u32), false).unwrap(), 999_983);
    }

    /// The canonical large jump: the first probable prime past 10¹² is
    /// 10¹² + 39.
    #[test]
    fn next_prime_past_1e12() {
        let base = Integer::from(1_000_000_000_000u64);
        let expected = Integer::from(1_000_000_000_039u64);
        assert_eq!(iz_next_prime(&base, true).unwrap(), expected);
    }

    #[test]
    fn vx_random_prime_single_worker() {
        let p = vx_random_prime(48, 1).unwrap();
        assert!(p > 1);
        assert!(check_primality(&p, 40));
    }

    #[test]
    fn vx_random_prime_racing_workers() {
        let p = vx_random_prime(48, 3).unwrap();
        assert!(check_primality(&p, 40));
    }

    #[test]
    fn vy_random_prime_produces_prime() {
        let p = vy_random_prime(64, 1).unwrap();
        assert!(check_primality(&p, 40));

        let raced = vy_random_prime(64, 2).unwrap();
        assert!(check_primality(&raced, 40));
    }

    #[test]
    fn search_lines_are_respected() {
        let p = vx_search_prime(-1, VX5, 32, None).unwrap().unwrap();
        assert_eq!((&p % 6u32).complete(), 5, "iZ− candidate must be ≡ 5 (mod 6)");

        let p = vx_search_prime(1, VX5, 32, None).unwrap().unwrap();
        assert_eq!((&p % 6u32).complete(), 1, "iZ+ candidate must be ≡ 1 (mod 6)");
    }
}
