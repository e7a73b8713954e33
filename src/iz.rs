//! # iZ — Index-Space Mapping, Wheel Construction, and Hit Solvers
//!
//! Every integer n > 3 coprime to 6 has a unique representation n = 6x + m
//! with m ∈ {−1, +1}. The crate stores the two residue lines as a pair of
//! bitmaps indexed by x: the x5 line (6x − 1) and the x7 line (6x + 1). This
//! module provides the coordinate mapping, the pre-sieved wheel template used
//! by the segmented sieves, and the modular solvers that locate the first
//! composite of a prime inside a segment.
//!
//! ## The marking identity
//!
//! For a prime p with xₚ = (p + 1) / 6 and iₚ = +1 when p ≡ 1 (mod 6) else
//! −1, the composites of p on line m in segment y = 0 start at
//! `p·xₚ + m·iₚ·xₚ` and continue with step p. For y > 0, normalize
//! xₚ′ = xₚ when iₚ = m else p − xₚ, then the first hit solves
//! `(x + vx·y) ≡ xₚ′ (mod p)`. The vertical traversal solves the same
//! congruence for y at a fixed x, which needs the modular inverse of vx
//! modulo p and therefore gcd(vx, p) = 1.

use anyhow::Result;
use rug::integer::IsPrime;
use rug::{Complete, Integer};

use crate::bitmap::Bitmap;
use crate::int_array::UInt64Array;

/// Small primes used to compose wheel widths and pre-sieve the VX base.
pub const SMALL_PRIMES: [u64; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Default Miller–Rabin rounds for probabilistic primality checks.
pub const MR_ROUNDS: u32 = 25;

/// Standard wheel widths: primorial products excluding 2 and 3.
pub const VX2: u64 = 5 * 7; // 35
pub const VX3: u64 = VX2 * 11; // 385
pub const VX4: u64 = VX3 * 13; // 5005
pub const VX5: u64 = VX4 * 17; // 85085
pub const VX6: u64 = VX5 * 19; // 1616615
pub const VX7: u64 = VX6 * 23; // 37260615
pub const VX8: u64 = VX7 * 29; // 1080558835

/// Map iZ coordinates to an integer: `6x + m` with m ∈ {−1, +1}.
#[inline]
pub fn iz(x: u64, m: i32) -> u64 {
    if m >= 0 {
        6 * x + m as u64
    } else {
        6 * x - (-m) as u64
    }
}

/// Arbitrary-precision variant of [`iz`].
pub fn iz_big(x: &Integer, m: i32) -> Integer {
    let mut z = Integer::from(x * 6u32);
    z += m;
    z
}

/// Probabilistic primality check, the single source of truth for the crate.
///
/// Wraps GMP's Miller–Rabin implementation so the underlying test can change
/// without touching call sites.
#[inline]
pub fn check_primality(n: &Integer, rounds: u32) -> bool {
    n.is_probably_prime(rounds) != IsPrime::No
}

/// Greatest common divisor.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Modular inverse of `a` modulo `m` via the extended Euclidean algorithm.
///
/// Returns `None` when gcd(a, m) ≠ 1 (no inverse exists).
pub fn modular_inverse(a: u64, m: u64) -> Option<u64> {
    if m == 1 {
        return Some(0);
    }
    if gcd(a, m) != 1 {
        return None;
    }

    let m0 = m as i64;
    let (mut a, mut m) = (a as i64, m as i64);
    let (mut x0, mut x1) = (0i64, 1i64);

    while a > 1 {
        let q = a / m;
        let t = m;
        m = a % m;
        a = t;
        let t = x0;
        x0 = x1 - q * x0;
        x1 = t;
    }

    if x1 < 0 {
        x1 += m0;
    }
    Some(x1 as u64)
}

/// First x to clear for prime `p` on line `m` of segment `y`.
///
/// Every x ≥ x₀ on that line congruent to x₀ (mod p) maps to a composite of
/// p. For y = 0 the closed form applies directly; for y > 0 the congruence
/// is solved against the normalized xₚ′.
pub fn solve_x0(m: i32, p: u64, vx: u64, y: u64) -> u64 {
    let xp = (p + 1) / 6;
    let ip: i32 = if p % 6 == 1 { 1 } else { -1 };

    if y == 0 {
        return if m == ip { p * xp + xp } else { p * xp - xp };
    }

    let xp = if m == ip { xp } else { p - xp };
    let yvx = vx * y;
    let r = (yvx % p + p - xp % p) % p;

    if p < vx {
        p - r
    } else {
        r
    }
}

/// Arbitrary-precision variant of [`solve_x0`] for segment indices beyond
/// 64 bits.
pub fn solve_x0_big(m: i32, p: u64, vx: u64, y: &Integer) -> u64 {
    let xp = (p + 1) / 6;
    let ip: i32 = if p % 6 == 1 { 1 } else { -1 };
    let xp = if m == ip { xp } else { p - xp };

    let mut t = (y * vx).complete();
    t -= xp;
    let (_, r) = t.div_rem_floor(Integer::from(p));
    let r = r.to_u64().expect("floor residue fits u64");

    if p < vx {
        p - r
    } else {
        r
    }
}

/// First y to clear for prime `p` at fixed column `x` in vertical traversal.
///
/// Solves `(x + vx·y) ≡ xₚ′ (mod p)` for y. Returns `None` when
/// gcd(vx, p) ≠ 1, in which case no modular solution exists.
pub fn solve_y0(m: i32, p: u64, vx: u64, x: u64) -> Option<u64> {
    if gcd(vx, p) != 1 {
        return None;
    }

    let xp = (p + 1) / 6;
    let ip: i32 = if p % 6 == 1 { 1 } else { -1 };
    let xp = if m == ip { xp } else { p - xp };

    if x % p == xp {
        return Some(0);
    }

    let delta = (xp + p - x % p) % p;
    let vx_inv = modular_inverse(vx % p, p)?;
    Some((delta as u128 * vx_inv as u128 % p as u128) as u64)
}

/// VX_k: the product of the first `k` small primes starting at 5.
pub fn compute_vx_k(k: usize) -> u64 {
    let mut vx = 1u64;
    for &p in SMALL_PRIMES.iter().skip(2).take(k) {
        match vx.checked_mul(p) {
            Some(next) => vx = next,
            None => break,
        }
    }
    vx
}

/// Choose a cache-aware VX: the largest primorial-style width whose bit
/// count stays below both the L2 cache size and x_n = n / 6. Never below 35.
pub fn compute_l2_vx(n: u64) -> u64 {
    let l2 = crate::platform::l2_cache_size_bits();
    let x_n = n / 6;
    let bound = l2.min(x_n);

    let mut vx = VX2;
    let mut k = 4; // next factor: SMALL_PRIMES[4] = 11
    while k < SMALL_PRIMES.len() && vx * SMALL_PRIMES[k] < bound {
        vx *= SMALL_PRIMES[k];
        k += 1;
    }
    vx
}

/// Largest primorial-style VX with bit length below `bit_size`.
pub fn compute_max_vx(bit_size: u32) -> Result<Integer> {
    let primes = crate::sieve::siz(10_000)?;

    let mut i = 2; // skip 2, 3
    let mut vx = Integer::from(primes[i]);
    while vx.significant_bits() < bit_size {
        i += 1;
        vx *= primes[i];
    }
    vx /= primes[i];
    Ok(vx)
}

/// Build the pre-sieved VX base: set all bits, clear x = 0, then clear every
/// composite of each small prime dividing `vx` on both lines, plus the
/// prime's own bit on its line.
///
/// Reading x ∈ [0, vx) from the result is equivalent to testing coprimality
/// of iZ(x, ±1) with 2·3·vx.
pub fn construct_vx_base(vx: u64, base_x5: &mut Bitmap, base_x7: &mut Bitmap) {
    base_x5.set_all();
    base_x7.set_all();
    base_x5.clear(0);
    base_x7.clear(0);

    for &p in SMALL_PRIMES.iter().skip(2) {
        if vx % p != 0 {
            continue;
        }

        let ip: i32 = if p % 6 == 1 { 1 } else { -1 };
        let xp = (p + 1) / 6;
        if ip == -1 {
            base_x5.clear(xp);
            base_x5.clear_steps(p, p * xp + xp, vx);
            base_x7.clear_steps(p, p * xp - xp, vx);
        } else {
            base_x7.clear(xp);
            base_x5.clear_steps(p, p * xp - xp, vx);
            base_x7.clear_steps(p, p * xp + xp, vx);
        }
    }
}

/// Walk both candidate bitmaps in ascending x, emit surviving primes, and
/// mark composites of every emitted root prime as it is found.
///
/// The x5 candidate at a given x is emitted before the x7 candidate, so the
/// output is strictly ascending. `x_limit` is exclusive.
pub fn process_iz_bitmaps(primes: &mut UInt64Array, x5: &mut Bitmap, x7: &mut Bitmap, x_limit: u64) {
    let root_limit = ((6 * x_limit) as f64).sqrt() as u64 + 1;

    for x in 1..x_limit {
        if x5.get(x) {
            let p = iz(x, -1);
            primes.push(p);

            if p < root_limit {
                x5.clear_steps(p, p * x + x, x_limit);
                x7.clear_steps(p, p * x - x, x_limit);
            }
        }

        if x7.get(x) {
            let p = iz(x, 1);
            primes.push(p);

            if p < root_limit {
                x5.clear_steps(p, p * x - x, x_limit);
                x7.clear_steps(p, p * x + x, x_limit);
            }
        }
    }
}

/// Generate all primes up to `limit` with the full (non-segmented) iZ sieve,
/// 2 and 3 prepended. Output is ascending.
pub fn root_primes(limit: u64) -> Result<UInt64Array> {
    let mut primes = UInt64Array::with_capacity(16);
    primes.push(2);
    primes.push(3);

    let x_n = limit / 6 + 1;
    let mut x5 = Bitmap::new(x_n + 1, true)?;
    let mut x7 = Bitmap::new(x_n + 1, true)?;

    process_iz_bitmaps(&mut primes, &mut x5, &mut x7, x_n);
    Ok(primes)
}
