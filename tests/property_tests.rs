//! Property-based tests using proptest.
//!
//! These tests verify mathematical invariants hold across random inputs.
//! Run with: cargo test --test property_tests

use proptest::prelude::*;
use rug::ops::Pow;
use rug::Integer;

use izprime::bitmap::Bitmap;
use izprime::int_array::{IntArray, UInt16Array, UInt64Array};
use izprime::iz::{self, iz, solve_x0, solve_y0};
use izprime::sieve;

/// Root primes exercised by the solver properties.
const TEST_PRIMES: [u64; 12] = [11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 101, 1009];

// --- Bitmap properties ---

proptest! {
    /// clear_steps agrees with a naive Vec<bool> model for arbitrary
    /// (step, start, limit) combinations.
    #[test]
    fn prop_clear_steps_matches_model(
        size in 1u64..5000,
        step in 1u64..600,
        start in 0u64..5000,
        limit in 0u64..6000,
    ) {
        let mut bm = Bitmap::new(size, true).unwrap();
        bm.clear_steps(step, start, limit);

        let mut model = vec![true; size as usize];
        let capped = limit.min(size - 1);
        let mut idx = start;
        while idx <= capped {
            model[idx as usize] = false;
            idx += step;
        }

        for i in 0..size {
            prop_assert_eq!(bm.get(i), model[i as usize], "bit {} differs", i);
        }
    }

    /// The dispatched (possibly vectorized) path and the scalar reference
    /// are bit-identical.
    #[test]
    fn prop_clear_steps_simd_equals_scalar(
        size in 64u64..4096,
        step in 1u64..500,
        start in 0u64..4096,
    ) {
        let mut fast = Bitmap::new(size, true).unwrap();
        let mut scalar = Bitmap::new(size, true).unwrap();
        fast.clear_steps(step, start, size);
        scalar.clear_steps_scalar(step, start, size);
        prop_assert_eq!(fast, scalar);
    }

    /// Serialization round-trips bit-exactly, checksum included.
    #[test]
    fn prop_bitmap_stream_roundtrip(
        size in 1u64..2000,
        seed_bits in proptest::collection::vec(0u64..2000, 0..64),
    ) {
        let mut bm = Bitmap::new(size, false).unwrap();
        for &b in &seed_bits {
            if b < size {
                bm.set(b);
            }
        }
        bm.compute_checksum();

        let mut buf = Vec::new();
        bm.write_stream(&mut buf).unwrap();
        let restored = Bitmap::read_stream(&mut std::io::Cursor::new(&buf)).unwrap();
        prop_assert_eq!(restored, bm);
    }
}

// --- Integer array properties ---

proptest! {
    /// Stream round-trip preserves contents for 64-bit arrays.
    #[test]
    fn prop_u64_array_roundtrip(values in proptest::collection::vec(any::<u64>(), 0..200)) {
        let mut arr: UInt64Array = IntArray::with_capacity(values.len());
        arr.extend(values.iter().copied());

        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();
        let restored = UInt64Array::read_stream(&mut std::io::Cursor::new(&buf)).unwrap();
        prop_assert_eq!(restored.as_slice(), values.as_slice());
    }

    /// Stream round-trip preserves contents for 16-bit arrays.
    #[test]
    fn prop_u16_array_roundtrip(values in proptest::collection::vec(any::<u16>(), 0..200)) {
        let mut arr: UInt16Array = IntArray::with_capacity(1);
        arr.extend(values.iter().copied());

        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();
        let restored = UInt16Array::read_stream(&mut std::io::Cursor::new(&buf)).unwrap();
        prop_assert_eq!(restored.as_slice(), values.as_slice());
    }

    /// resize_to_fit is idempotent and never loses elements.
    #[test]
    fn prop_resize_to_fit_idempotent(values in proptest::collection::vec(any::<u64>(), 0..300)) {
        let mut arr: UInt64Array = IntArray::with_capacity(512);
        arr.extend(values.iter().copied());

        arr.resize_to_fit();
        let cap_once = arr.capacity();
        arr.resize_to_fit();
        prop_assert_eq!(arr.capacity(), cap_once);
        prop_assert_eq!(arr.as_slice(), values.as_slice());
    }
}

// --- Hit solver properties ---

proptest! {
    /// solve_x0 returns a position whose iZ value is divisible by p, with no
    /// earlier hit on the same line in the same segment.
    #[test]
    fn prop_solve_x0_first_hit(
        p_idx in 0usize..11, // root primes below the wheel width
        y in 0u64..500,
        m_bit in any::<bool>(),
    ) {
        let vx = iz::VX3; // 385, coprime to all TEST_PRIMES
        let p = TEST_PRIMES[p_idx];
        let m = if m_bit { 1 } else { -1 };

        let x0 = solve_x0(m, p, vx, y);
        prop_assert_eq!(iz(y * vx + x0, m) % p, 0);

        if y > 0 {
            prop_assert!(x0 >= 1 && x0 <= p);
            for x in 1..x0 {
                prop_assert_ne!(iz(y * vx + x, m) % p, 0, "earlier hit at x={}", x);
            }
        }
    }

    /// The big-integer solver agrees with the 64-bit solver wherever both
    /// apply.
    #[test]
    fn prop_solve_x0_big_matches(
        p_idx in 0usize..TEST_PRIMES.len(),
        y in 1u64..100_000,
        m_bit in any::<bool>(),
    ) {
        let vx = iz::VX4;
        let p = TEST_PRIMES[p_idx];
        let m = if m_bit { 1 } else { -1 };
        prop_assert_eq!(
            iz::solve_x0_big(m, p, vx, &Integer::from(y)),
            solve_x0(m, p, vx, y)
        );
    }

    /// solve_y0 finds the first row hit for a fixed column.
    #[test]
    fn prop_solve_y0_first_hit(
        p_idx in 1usize..TEST_PRIMES.len(), // skip 11, which divides the wheel
        x in 1u64..385,
        m_bit in any::<bool>(),
    ) {
        let vx = iz::VX3;
        let p = TEST_PRIMES[p_idx];
        let m = if m_bit { 1 } else { -1 };

        let y0 = solve_y0(m, p, vx, x).expect("test primes are coprime to vx");
        prop_assert!(y0 < p);
        prop_assert_eq!(iz(y0 * vx + x, m) % p, 0);
        for y in 0..y0 {
            prop_assert_ne!(iz(y * vx + x, m) % p, 0, "earlier hit at y={}", y);
        }
    }
}

// --- Sieve equivalence ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// The solid iZ sieve agrees with Eratosthenes on arbitrary bounds,
    /// including bounds adjacent to primes and wheel multiples.
    #[test]
    fn prop_siz_matches_soe(n in 11u64..30_000) {
        let reference = sieve::soe(n).unwrap();
        let result = sieve::siz(n).unwrap();
        prop_assert_eq!(result.as_slice(), reference.as_slice());
    }

    /// The segmented sieve agrees with Eratosthenes across the segmentation
    /// threshold.
    #[test]
    fn prop_sizm_matches_soe(n in 9_000u64..60_000) {
        let reference = sieve::soe(n).unwrap();
        let result = sieve::sizm(n).unwrap();
        prop_assert_eq!(result.as_slice(), reference.as_slice());
    }

    /// Every prime the engine reports passes an independent Miller-Rabin
    /// check, and none are skipped.
    #[test]
    fn prop_sieve_output_is_prime(n in 11u64..5_000) {
        let primes = sieve::siz(n).unwrap();
        for &p in primes.iter() {
            prop_assert!(
                izprime::iz::check_primality(&Integer::from(p), 25),
                "{} reported prime", p
            );
        }
        prop_assert_eq!(primes.count() as u64, count_primes_naive(n));
    }
}

fn count_primes_naive(n: u64) -> u64 {
    (2..=n)
        .filter(|&v| izprime::iz::check_primality(&Integer::from(v), 25))
        .count() as u64
}

// --- Expression grammar ---

proptest! {
    /// Any u64 formatted with 3-digit comma grouping parses back to itself.
    #[test]
    fn prop_comma_grouping_roundtrip(value in any::<u64>()) {
        let digits = value.to_string();
        let mut grouped = String::new();
        let head = digits.len() % 3;
        if head > 0 {
            grouped.push_str(&digits[..head]);
        }
        for (i, chunk) in digits[head..].as_bytes().chunks(3).enumerate() {
            if head > 0 || i > 0 {
                grouped.push(',');
            }
            grouped.push_str(std::str::from_utf8(chunk).unwrap());
        }

        let parsed = izprime::expr::parse_numeric_expr_u64(&grouped).unwrap();
        prop_assert_eq!(parsed, value);
    }

    /// `a^b` parses to the exact power.
    #[test]
    fn prop_power_terms(base in 0u64..50, exp in 0u32..20) {
        let parsed = izprime::expr::parse_numeric_expr(&format!("{}^{}", base, exp)).unwrap();
        let expected = Integer::from(base).pow(exp);
        prop_assert_eq!(parsed, expected);
    }
}
