//! # Sieve — Classical Algorithms and the SiZ Family
//!
//! Full-range prime enumeration up to n ≤ 10¹². Two groups share the bitmap
//! primitive:
//!
//! 1. **Classical sieves** over the integer domain: [`soe`] (optimized
//!    Eratosthenes), [`ssoe`] (segmented Eratosthenes), [`soeu`] (Euler's
//!    linear sieve), [`sos`] (Sundaram), [`soa`] (Atkin). These are baseline
//!    and comparison implementations.
//! 2. **The SiZ family** operating in the 6x ± 1 index space: [`siz`] (solid,
//!    two bitmaps over the whole range), [`sizm`] (VX-segmented, horizontal,
//!    cache-resident working set), [`sizm_vy`] (vertical traversal, highest
//!    throughput, unordered output).
//!
//! All entry points require 10 < n ≤ 10¹² and return the primes ≤ n in an
//! ordered [`UInt64Array`] — except `sizm_vy`, whose result has the
//! `ordered` flag cleared.

use anyhow::{ensure, Result};

use crate::bitmap::Bitmap;
use crate::int_array::UInt64Array;
use crate::iz::{
    self, compute_l2_vx, construct_vx_base, gcd, iz, process_iz_bitmaps, solve_x0, solve_y0,
};

/// Maximum supported sieve limit for the standard entry points.
pub const N_LIMIT: u64 = 1_000_000_000_000;

fn validate_limit(n: u64) -> Result<()> {
    ensure!(n > 10 && n <= N_LIMIT, "sieve limit {} outside (10, 10^12]", n);
    Ok(())
}

/// Prime-counting estimate used for initial array sizing, padded 40% to
/// avoid reallocations.
fn padded_pi(n: u64) -> usize {
    let nf = n as f64;
    (nf / nf.ln() * 1.4) as usize
}

/// Shared Eratosthenes walk: emit odd survivors and mark odd multiples of
/// root primes. Pushes 2 first so the loop can skip even numbers entirely.
fn process_n_bitmap(primes: &mut UInt64Array, sieve: &mut Bitmap, n: u64) {
    primes.push(2);
    let n_sqrt = (n as f64).sqrt() as u64;

    let mut i = 3;
    while i <= n {
        if sieve.get(i) {
            primes.push(i);
            if i <= n_sqrt {
                sieve.clear_steps(2 * i, i * i, n + 1);
            }
        }
        i += 2;
    }
}

/// Optimized Sieve of Eratosthenes: odd-only traversal, marking from p².
pub fn soe(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    let mut sieve = Bitmap::new(n + 1, true)?;

    process_n_bitmap(&mut primes, &mut sieve, n);

    primes.resize_to_fit();
    Ok(primes)
}

/// Segmented Sieve of Eratosthenes with √n-sized segments.
pub fn ssoe(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    let segment_size = (n as f64).sqrt() as u64;

    let mut sieve = Bitmap::new(segment_size + 8, true)?;
    process_n_bitmap(&mut primes, &mut sieve, segment_size);

    let mut low = segment_size + 1;
    let mut high = low + segment_size - 1;

    while low <= n {
        sieve.set_all();
        let root_limit = (high as f64).sqrt() as u64;

        for &p in primes.iter().skip(1) {
            if p > root_limit {
                break;
            }

            // first odd multiple of p inside [low, high], at least p²
            let mut start = (low / p) * p;
            if start < low {
                start += p;
            }
            if start % 2 == 0 {
                start += p;
            }
            let start = start.max(p * p);

            sieve.clear_steps(2 * p, start - low, high - low + 1);
        }

        let mut i = if low % 2 == 0 { low + 1 } else { low };
        while i <= high {
            if sieve.get(i - low) {
                primes.push(i);
            }
            i += 2;
        }

        low += segment_size;
        high += segment_size;
        if high > n {
            high = n;
        }
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Euler's linear sieve: every composite is cleared exactly once by its
/// smallest prime factor.
pub fn soeu(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    let mut sieve = Bitmap::new(n + 1, true)?;

    primes.push(2);

    let mut i = 3;
    while i <= n {
        if sieve.get(i) {
            primes.push(i);
        }

        for j in 1..primes.count() {
            let p = primes[j];
            if p * i > n {
                break;
            }
            sieve.clear(p * i);
            if i % p == 0 {
                break;
            }
        }

        i += 2;
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Sieve of Sundaram: eliminate i + j + 2ij over the odd index set.
pub fn sos(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let k = (n - 1) / 2 + 1;
    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    primes.push(2);

    let mut sieve = Bitmap::new(k + 8, true)?;
    let n_sqrt = (n as f64).sqrt() as u64 + 1;

    for i in 1..k {
        if sieve.get(i) {
            let p = 2 * i + 1;
            primes.push(p);
            if p < n_sqrt {
                // first mark p·i + i corresponds to p² in the odd set
                sieve.clear_steps(p, p * i + i, k);
            }
        }
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Sieve of Atkin: quadratic-form toggles followed by square-multiple
/// elimination.
pub fn soa(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    let mut sieve = Bitmap::new(n + 1, false)?;

    primes.push(2);
    primes.push(3);

    // candidates with 4x² + y² ≡ 1 or 5 (mod 12)
    let mut x = 1;
    while 4 * x * x < n {
        let a = 4 * x * x;
        let mut y = 1;
        while a + y * y <= n {
            let b = a + y * y;
            if b % 12 == 1 || b % 12 == 5 {
                sieve.flip(b);
            }
            y += 1;
        }
        x += 1;
    }

    // candidates with 3x² + y² ≡ 7 (mod 12)
    let mut x = 1;
    while 3 * x * x < n {
        let a = 3 * x * x;
        let mut y = 1;
        while a + y * y <= n {
            let b = a + y * y;
            if b % 12 == 7 {
                sieve.flip(b);
            }
            y += 1;
        }
        x += 1;
    }

    // candidates with 3x² − y² ≡ 11 (mod 12), x > y
    let mut x = 1u64;
    while 2 * x * x < n {
        let a = 3 * x * x;
        let mut y = x.saturating_sub(1);
        while y > 0 {
            let b = a - y * y;
            if b > n {
                break;
            }
            if b % 12 == 11 {
                sieve.flip(b);
            }
            y -= 1;
        }
        x += 1;
    }

    // eliminate multiples of squares of surviving roots
    let n_sqrt = (n as f64).sqrt() as u64;
    let mut p = 5;
    while p <= n_sqrt {
        if sieve.get(p) {
            sieve.clear_steps(2 * p * p, p * p, n + 1);
        }
        p += 2;
    }

    let mut p = 5;
    while p <= n {
        if sieve.get(p) {
            primes.push(p);
        }
        p += 2;
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Solid Sieve-iZ: the full 6x ± 1 index space as two bitmaps.
///
/// A wheel-6 factorization — roughly a third of the candidates of a
/// classical sieve, and the generator of root-prime tables for the
/// segmented variants.
pub fn siz(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    primes.push(2);
    primes.push(3);

    let x_n = n / 6 + 1;
    let mut x5 = Bitmap::new(x_n + 1, true)?;
    let mut x7 = Bitmap::new(x_n + 1, true)?;

    process_iz_bitmaps(&mut primes, &mut x5, &mut x7, x_n);

    // the top x position may map past n
    if primes.last().is_some_and(|&p| p > n) {
        primes.pop();
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Segmented Sieve-iZm, horizontal traversal.
///
/// Partitions the x-axis into VX-sized segments, clones a pre-sieved base
/// template per segment, and marks only the root primes that do not divide
/// VX. The working set stays L2-resident; output is ascending.
pub fn sizm(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    // below this, segmentation overhead dominates
    if n < 10_000 {
        return siz(n);
    }

    let mut primes = UInt64Array::with_capacity(padded_pi(n));
    let vx = compute_l2_vx(n);

    let mut base_x5 = Bitmap::new(vx + 8, true)?;
    let mut base_x7 = Bitmap::new(vx + 8, true)?;
    construct_vx_base(vx, &mut base_x5, &mut base_x7);

    // primes pre-sieved into the base divide 6·vx and are emitted up front
    let mut k = 0;
    while (6 * vx) % iz::SMALL_PRIMES[k] == 0 {
        primes.push(iz::SMALL_PRIMES[k]);
        k += 1;
    }

    // first segment (y = 0) collects the root primes for the rest
    let x_n = n / 6 + 1;
    let mut x5 = base_x5.clone();
    let mut x7 = base_x7.clone();
    process_iz_bitmaps(&mut primes, &mut x5, &mut x7, vx + 1);

    let y_limit = x_n / vx;
    let mut yvx = vx;
    for y in 1..=y_limit {
        x5.copy_bits_from(&base_x5);
        x7.copy_bits_from(&base_x7);

        let x_limit = if y < y_limit { vx } else { x_n % vx };
        let root_limit = ((6 * (yvx + x_limit)) as f64).sqrt() as u64 + 1;

        for &p in primes.iter().skip(k) {
            if p > root_limit {
                break;
            }
            x5.clear_steps(p, solve_x0(-1, p, vx, y), x_limit);
            x7.clear_steps(p, solve_x0(1, p, vx, y), x_limit);
        }

        for x in 2..=x_limit {
            if x5.get(x) {
                primes.push(iz(yvx + x, -1));
            }
            if x7.get(x) {
                primes.push(iz(yvx + x, 1));
            }
        }

        yvx += vx;
    }

    if primes.last().is_some_and(|&p| p > n) {
        primes.pop();
    }

    primes.resize_to_fit();
    Ok(primes)
}

/// Segmented Sieve-iZm, vertical traversal.
///
/// Fixes a column x and sieves all segment rows at once via the y-solver.
/// Trades output order for throughput: the result is complete but unsorted,
/// and its `ordered` flag is cleared.
pub fn sizm_vy(n: u64) -> Result<UInt64Array> {
    validate_limit(n)?;

    if n < 10_000 {
        return siz(n);
    }

    let mut primes = UInt64Array::with_capacity(padded_pi(n));

    let x_n = n / 6 + 1;
    let root_limit = (n as f64).sqrt() as u64 + 1;

    let roots = iz::root_primes(root_limit)?;
    primes.extend(roots.iter().copied());
    let root_count = primes.count();

    let mut k = 4; // skip 2, 3 and the primes dividing vx
    let mut vx = 35u64;
    if n >= 1_000_000_000 {
        vx *= 11;
        k += 1;
    }
    if n >= 100_000_000_000 {
        vx *= 13;
        k += 1;
    }

    let vy = x_n / vx;
    let mut sieve = Bitmap::new(vy + 8, true)?;

    for x in 2..=vx {
        for m in [-1i32, 1] {
            // columns sharing a factor with vx hold no primes past the roots
            if gcd(iz(x, m), vx) != 1 {
                continue;
            }

            sieve.set_all();

            for &p in primes.iter().take(root_count).skip(k) {
                if let Some(y0) = solve_y0(m, p, vx, x) {
                    sieve.clear_steps(p, y0, vy);
                }
            }

            for y in 0..vy {
                if sieve.get(y) {
                    primes.push(iz(y * vx + x, m));
                }
            }
            // partial last row: emit only below the numeric bound
            if sieve.get(vy) {
                let p = iz(vy * vx + x, m);
                if p < n {
                    primes.push(p);
                }
            }
        }
    }

    primes.resize_to_fit();
    primes.ordered = false;
    Ok(primes)
}
