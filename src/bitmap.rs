//! # Bitmap — Packed Bit Array with Stepped Clearing and Checksummed I/O
//!
//! Fixed-size bit storage backing every sieve in the crate. Bits are packed
//! LSB-first within each byte, so bit `i` lives in byte `i / 8` at position
//! `i % 8`. A set bit means "candidate still possibly prime"; sieving clears
//! bits.
//!
//! The hot loop of all sieve work is [`Bitmap::clear_steps`]: clear every
//! `step`-th bit from a start index up to an inclusive limit. On x86_64 the
//! index arithmetic runs four lanes at a time under AVX2 (two under SSE2) and
//! on aarch64 two×two lanes under NEON, with scalar scatter to bytes — byte
//! stores have no efficient vector scatter, so the vectors only carry the
//! index progressions. Every path produces bit-identical results.
//!
//! Containers carry a SHA-256 digest of the payload for integrity-checked
//! binary persistence: `[size: u64 LE][payload][digest: 32 bytes]`. Reading
//! back a stream recomputes and verifies the digest before the bitmap is
//! handed to the caller.

use anyhow::{bail, ensure, Context, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Length of the SHA-256 payload digest stored alongside the bit data.
pub const CHECKSUM_LEN: usize = 32;

/// Packed bit array with a payload checksum.
///
/// Ownership is exclusive; [`Clone`] produces a fully independent deep copy
/// (payload and checksum included).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    size: u64,
    data: Vec<u8>,
    checksum: [u8; CHECKSUM_LEN],
}

impl Bitmap {
    /// Create a bitmap of `size` bits, all set when `set_bits` is true.
    ///
    /// Fails on a zero size or when the backing allocation cannot be made;
    /// no partially initialized bitmap is ever returned.
    pub fn new(size: u64, set_bits: bool) -> Result<Self> {
        ensure!(size > 0, "bitmap size must be positive");
        let byte_size = usize::try_from((size + 7) / 8).context("bitmap size exceeds addressable memory")?;

        let mut data = Vec::new();
        if data.try_reserve_exact(byte_size).is_err() {
            tracing::error!(bits = size, "bitmap allocation failed");
            bail!("bitmap allocation of {} bytes failed", byte_size);
        }
        data.resize(byte_size, if set_bits { 0xFF } else { 0x00 });

        Ok(Bitmap {
            size,
            data,
            checksum: [0u8; CHECKSUM_LEN],
        })
    }

    /// Number of bits.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of payload bytes (`⌈size/8⌉`).
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Read bit `idx`.
    #[inline]
    pub fn get(&self, idx: u64) -> bool {
        debug_assert!(idx < self.size, "bit index {} out of bounds ({})", idx, self.size);
        self.data[(idx / 8) as usize] & (1 << (idx % 8)) != 0
    }

    /// Set bit `idx` to 1.
    #[inline]
    pub fn set(&mut self, idx: u64) {
        debug_assert!(idx < self.size);
        self.data[(idx / 8) as usize] |= 1 << (idx % 8);
    }

    /// Clear bit `idx` to 0.
    #[inline]
    pub fn clear(&mut self, idx: u64) {
        debug_assert!(idx < self.size);
        self.data[(idx / 8) as usize] &= !(1 << (idx % 8));
    }

    /// Flip bit `idx`.
    #[inline]
    pub fn flip(&mut self, idx: u64) {
        debug_assert!(idx < self.size);
        self.data[(idx / 8) as usize] ^= 1 << (idx % 8);
    }

    /// Set every bit.
    pub fn set_all(&mut self) {
        self.data.fill(0xFF);
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.data.fill(0x00);
    }

    /// Overwrite this bitmap's payload from `src`. Sizes must match.
    ///
    /// Used to reset a working segment back to its pre-sieved template
    /// without reallocating.
    pub fn copy_bits_from(&mut self, src: &Bitmap) {
        assert_eq!(self.size, src.size, "bitmap size mismatch in copy_bits_from");
        self.data.copy_from_slice(&src.data);
    }

    /// Clear bits `start, start + step, start + 2·step, …` up to `limit`
    /// (inclusive, auto-capped to `size - 1`).
    ///
    /// `step` must be positive; a zero step is a programming error and
    /// aborts. Dispatches to the widest index-arithmetic path the CPU
    /// supports; all paths are bit-identical to [`Self::clear_steps_scalar`].
    pub fn clear_steps(&mut self, step: u64, start: u64, limit: u64) {
        assert!(step > 0, "step must be positive in clear_steps");
        let limit = limit.min(self.size - 1);
        if start > limit {
            return;
        }

        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("avx2") {
                // Safety: AVX2 presence verified at runtime.
                unsafe { clear_steps_avx2(&mut self.data, step, start, limit) };
            } else {
                // SSE2 is baseline on x86_64.
                unsafe { clear_steps_sse2(&mut self.data, step, start, limit) };
            }
            return;
        }

        #[cfg(target_arch = "aarch64")]
        {
            // NEON is baseline on aarch64.
            unsafe { clear_steps_neon(&mut self.data, step, start, limit) };
            return;
        }

        #[allow(unreachable_code)]
        clear_steps_fallback(&mut self.data, step, start, limit);
    }

    /// Scalar reference implementation of [`Self::clear_steps`].
    pub fn clear_steps_scalar(&mut self, step: u64, start: u64, limit: u64) {
        assert!(step > 0, "step must be positive in clear_steps_scalar");
        let limit = limit.min(self.size - 1);
        if start > limit {
            return;
        }
        clear_steps_fallback(&mut self.data, step, start, limit);
    }

    /// Count set bits across the whole array.
    pub fn count_ones(&self) -> u64 {
        self.data.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Compute the SHA-256 digest of the payload and store it.
    pub fn compute_checksum(&mut self) {
        self.checksum = sha256_digest(&self.data);
    }

    /// Recompute the payload digest and compare with the stored one.
    ///
    /// Returns false (and logs) on mismatch — including the case where the
    /// payload was mutated after the last [`Self::compute_checksum`].
    pub fn verify_checksum(&self) -> bool {
        let actual = sha256_digest(&self.data);
        if actual == self.checksum {
            true
        } else {
            tracing::error!("bitmap SHA-256 checksum validation failed");
            false
        }
    }

    /// Stored checksum bytes (all zero until computed).
    pub fn checksum(&self) -> &[u8; CHECKSUM_LEN] {
        &self.checksum
    }

    /// Write `[size: u64 LE][payload][checksum]` to `w`.
    ///
    /// Computes the checksum first if it has never been computed.
    pub fn write_stream<W: Write>(&mut self, w: &mut W) -> Result<()> {
        if self.checksum.iter().all(|&b| b == 0) {
            self.compute_checksum();
        }
        w.write_all(&self.size.to_le_bytes()).context("failed to write bitmap size")?;
        w.write_all(&self.data).context("failed to write bitmap payload")?;
        w.write_all(&self.checksum).context("failed to write bitmap checksum")?;
        Ok(())
    }

    /// Read a bitmap previously written by [`Self::write_stream`].
    ///
    /// Fails on a short read or when the stored checksum does not match the
    /// payload; partial state is dropped on every failure path.
    pub fn read_stream<R: Read>(r: &mut R) -> Result<Self> {
        let mut size_buf = [0u8; 8];
        r.read_exact(&mut size_buf).context("failed to read bitmap size")?;
        let size = u64::from_le_bytes(size_buf);

        let mut bitmap = Bitmap::new(size, false)?;
        r.read_exact(&mut bitmap.data).context("failed to read bitmap payload")?;
        r.read_exact(&mut bitmap.checksum).context("failed to read bitmap checksum")?;

        if !bitmap.verify_checksum() {
            bail!("bitmap checksum mismatch on deserialization");
        }
        Ok(bitmap)
    }
}

#[inline]
fn sha256_digest(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

#[inline]
fn clear_bit_raw(data: &mut [u8], idx: u64) {
    data[(idx / 8) as usize] &= !(1u8 << (idx % 8));
}

/// Scalar stepped clear; also the tail handler for the vector paths.
fn clear_steps_fallback(data: &mut [u8], step: u64, start: u64, limit: u64) {
    let mut idx = start;
    while idx <= limit {
        clear_bit_raw(data, idx);
        idx += step;
    }
}

/// AVX2: four 64-bit index lanes per iteration, scalar byte scatter.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn clear_steps_avx2(data: &mut [u8], step: u64, start: u64, limit: u64) {
    use std::arch::x86_64::*;

    let mut idx = start;
    if limit >= 3 * step && idx <= limit - 3 * step {
        let v_step4 = _mm256_set1_epi64x((4 * step) as i64);
        let mut v_idx = _mm256_set_epi64x(
            (idx + 3 * step) as i64,
            (idx + 2 * step) as i64,
            (idx + step) as i64,
            idx as i64,
        );

        while idx <= limit - 3 * step {
            let i0 = _mm256_extract_epi64(v_idx, 0) as u64;
            let i1 = _mm256_extract_epi64(v_idx, 1) as u64;
            let i2 = _mm256_extract_epi64(v_idx, 2) as u64;
            let i3 = _mm256_extract_epi64(v_idx, 3) as u64;

            clear_bit_raw(data, i0);
            clear_bit_raw(data, i1);
            clear_bit_raw(data, i2);
            clear_bit_raw(data, i3);

            v_idx = _mm256_add_epi64(v_idx, v_step4);
            idx += 4 * step;
        }
    }

    clear_steps_fallback(data, step, idx, limit);
}

/// SSE2: two 64-bit index lanes per iteration, scalar byte scatter.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn clear_steps_sse2(data: &mut [u8], step: u64, start: u64, limit: u64) {
    use std::arch::x86_64::*;

    let mut idx = start;
    if limit >= step && idx <= limit - step {
        let v_step2 = _mm_set1_epi64x((2 * step) as i64);
        let mut v_idx = _mm_set_epi64x((idx + step) as i64, idx as i64);

        while idx <= limit - step {
            let i0 = _mm_cvtsi128_si64(v_idx) as u64;
            let i1 = _mm_cvtsi128_si64(_mm_unpackhi_epi64(v_idx, v_idx)) as u64;

            clear_bit_raw(data, i0);
            clear_bit_raw(data, i1);

            v_idx = _mm_add_epi64(v_idx, v_step2);
            idx += 2 * step;
        }
    }

    clear_steps_fallback(data, step, idx, limit);
}

/// NEON: two 128-bit registers carrying four index lanes, scalar scatter.
#[cfg(target_arch = "aarch64")]
unsafe fn clear_steps_neon(data: &mut [u8], step: u64, start: u64, limit: u64) {
    use std::arch::aarch64::*;

    let mut idx = start;
    if limit >= 3 * step && idx <= limit - 3 * step {
        let v_step2 = vdupq_n_u64(2 * step);
        let v_step4 = vdupq_n_u64(4 * step);

        let mut v_idx_01 = vdupq_n_u64(idx);
        v_idx_01 = vsetq_lane_u64(idx + step, v_idx_01, 1);
        let mut v_idx_23 = vaddq_u64(v_idx_01, v_step2);

        while idx <= limit - 3 * step {
            let i0 = vgetq_lane_u64(v_idx_01, 0);
            let i1 = vgetq_lane_u64(v_idx_01, 1);
            let i2 = vgetq_lane_u64(v_idx_23, 0);
            let i3 = vgetq_lane_u64(v_idx_23, 1);

            clear_bit_raw(data, i0);
            clear_bit_raw(data, i1);
            clear_bit_raw(data, i2);
            clear_bit_raw(data, i3);

            v_idx_01 = vaddq_u64(v_idx_01, v_step4);
            v_idx_23 = vaddq_u64(v_idx_23, v_step4);
            idx += 4 * step;
        }
    }

    clear_steps_fallback(data, step, idx, limit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn new_all_set_and_all_clear() {
        let ones = Bitmap::new(100, true).unwrap();
        assert_eq!(ones.size(), 100);
        assert_eq!(ones.byte_size(), 13);
        for i in 0..100 {
            assert!(ones.get(i), "bit {} should be set", i);
        }

        let zeros = Bitmap::new(100, false).unwrap();
        for i in 0..100 {
            assert!(!zeros.get(i), "bit {} should be clear", i);
        }
    }

    #[test]
    fn zero_size_rejected() {
        assert!(Bitmap::new(0, false).is_err());
    }

    /// Point ops at byte boundaries (7, 8, 15, 16) are where the `idx / 8`
    /// and `idx % 8` split is most likely to go wrong.
    #[test]
    fn point_ops_at_byte_boundaries() {
        let mut bm = Bitmap::new(64, false).unwrap();
        for &i in &[0u64, 7, 8, 15, 16, 63] {
            bm.set(i);
            assert!(bm.get(i), "bit {} should be set", i);
        }
        assert!(!bm.get(1));
        assert!(!bm.get(9));

        bm.clear(8);
        assert!(!bm.get(8));
        assert!(bm.get(7));
        assert!(bm.get(15));

        bm.flip(8);
        assert!(bm.get(8));
        bm.flip(8);
        assert!(!bm.get(8));
    }

    #[test]
    fn set_all_then_clear_all_equals_clear_all() {
        let mut a = Bitmap::new(200, false).unwrap();
        a.set_all();
        a.clear_all();
        let b = Bitmap::new(200, false).unwrap();
        assert_eq!(a.count_ones(), 0);
        assert_eq!(a, b);
    }

    /// The dispatched clear_steps must agree bit-for-bit with the scalar
    /// reference across awkward (step, start) combinations.
    #[test]
    fn clear_steps_matches_scalar_reference() {
        let cases: &[(u64, u64, u64)] = &[
            (1, 0, 999),
            (2, 1, 999),
            (3, 9, 999),
            (5, 25, 999),
            (7, 7, 500),
            (13, 1, 77),
            (97, 3, 999),
            (400, 10, 999),
            (1000, 0, 999),
            (3, 998, 999),
        ];
        for &(step, start, limit) in cases {
            let mut simd = Bitmap::new(1000, true).unwrap();
            let mut scalar = Bitmap::new(1000, true).unwrap();
            simd.clear_steps(step, start, limit);
            scalar.clear_steps_scalar(step, start, limit);
            assert_eq!(
                simd, scalar,
                "clear_steps({}, {}, {}) diverged from scalar",
                step, start, limit
            );
        }
    }

    #[test]
    fn clear_steps_caps_limit_to_size() {
        let mut bm = Bitmap::new(100, true).unwrap();
        bm.clear_steps(10, 0, u64::MAX);
        for i in 0..100 {
            assert_eq!(bm.get(i), i % 10 != 0);
        }
    }

    #[test]
    #[should_panic(expected = "step must be positive")]
    fn clear_steps_zero_step_aborts() {
        let mut bm = Bitmap::new(10, true).unwrap();
        bm.clear_steps(0, 0, 9);
    }

    #[test]
    fn clone_is_deep() {
        let mut src = Bitmap::new(64, true).unwrap();
        src.compute_checksum();
        let mut copy = src.clone();
        assert_eq!(src, copy);

        copy.clear(3);
        assert!(src.get(3), "mutating the clone must not affect the source");
    }

    /// Checksum lifecycle: valid after compute, invalid after any mutation,
    /// valid again after recompute.
    #[test]
    fn checksum_tracks_mutation() {
        let mut bm = Bitmap::new(128, false).unwrap();
        for i in (0..128).step_by(2) {
            bm.set(i);
        }
        bm.compute_checksum();
        assert!(bm.verify_checksum());

        bm.flip(5);
        assert!(!bm.verify_checksum(), "stale checksum must fail verification");

        bm.compute_checksum();
        assert!(bm.verify_checksum());
    }

    #[test]
    fn stream_roundtrip_preserves_everything() {
        let mut bm = Bitmap::new(1000, false).unwrap();
        for i in (0..1000).step_by(2) {
            bm.set(i);
        }
        bm.compute_checksum();

        let mut buf = Vec::new();
        bm.write_stream(&mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 125 + CHECKSUM_LEN);

        let restored = Bitmap::read_stream(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(restored, bm);
        assert!(restored.verify_checksum());
    }

    #[test]
    fn stream_read_rejects_corrupted_payload() {
        let mut bm = Bitmap::new(256, true).unwrap();
        let mut buf = Vec::new();
        bm.write_stream(&mut buf).unwrap();

        buf[10] ^= 0xFF;
        assert!(Bitmap::read_stream(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn stream_read_rejects_truncated_input() {
        let mut bm = Bitmap::new(256, true).unwrap();
        let mut buf = Vec::new();
        bm.write_stream(&mut buf).unwrap();

        buf.truncate(buf.len() - 5);
        assert!(Bitmap::read_stream(&mut Cursor::new(&buf)).is_err());
    }
}
