//! # IntArray — Growable Unsigned-Integer Vectors with Checksummed I/O
//!
//! Dynamic arrays of 16/32/64-bit unsigned values used throughout the crate:
//! prime lists ([`UInt64Array`]), prime-gap encodings ([`UInt16Array`]), and
//! the 32-bit middle ground ([`UInt32Array`]). One generic implementation
//! covers all three widths through the sealed [`ArrayElement`] trait.
//!
//! Arrays grow by capacity doubling (amortized O(1) append), carry an
//! `ordered` hint flag (true means strictly ascending), and persist to binary
//! streams as `[count: i32 LE][payload LE][SHA-256: 32 bytes]`, symmetric to
//! the bitmap container's format. Deserialization verifies the digest.

use anyhow::{bail, ensure, Context, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

use crate::bitmap::CHECKSUM_LEN;

mod sealed {
    pub trait Sealed {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

/// Element widths supported by [`IntArray`]. Sealed: u16, u32, u64.
pub trait ArrayElement: Copy + Ord + Default + std::fmt::Debug + sealed::Sealed {
    /// Element width in bytes.
    const WIDTH: usize;
    /// Widen to u64 for serialization.
    fn widen(self) -> u64;
    /// Narrow from u64; values are produced by [`Self::widen`] so this never truncates.
    fn narrow(raw: u64) -> Self;
}

impl ArrayElement for u16 {
    const WIDTH: usize = 2;
    fn widen(self) -> u64 {
        self as u64
    }
    fn narrow(raw: u64) -> Self {
        raw as u16
    }
}

impl ArrayElement for u32 {
    const WIDTH: usize = 4;
    fn widen(self) -> u64 {
        self as u64
    }
    fn narrow(raw: u64) -> Self {
        raw as u32
    }
}

impl ArrayElement for u64 {
    const WIDTH: usize = 8;
    fn widen(self) -> u64 {
        self
    }
    fn narrow(raw: u64) -> Self {
        raw
    }
}

/// Growable array of unsigned integers with an order hint and a payload
/// checksum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntArray<T: ArrayElement> {
    data: Vec<T>,
    /// Hint only: true means the contents are strictly ascending.
    pub ordered: bool,
    checksum: [u8; CHECKSUM_LEN],
}

/// Gap encodings and other small-valued series.
pub type UInt16Array = IntArray<u16>;
/// Mid-width counters and indices.
pub type UInt32Array = IntArray<u32>;
/// Prime lists.
pub type UInt64Array = IntArray<u64>;

impl<T: ArrayElement> IntArray<T> {
    /// Create an empty array with at least `cap` slots reserved (minimum 1).
    pub fn with_capacity(cap: usize) -> Self {
        IntArray {
            data: Vec::with_capacity(cap.max(1)),
            ordered: true,
            checksum: [0u8; CHECKSUM_LEN],
        }
    }

    /// Append a value. Capacity doubles when full.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }

    /// Remove and return the last value.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.data.pop()
    }

    /// Number of stored values.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Current slot capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Sort ascending and set the `ordered` flag.
    pub fn sort(&mut self) {
        self.data.sort_unstable();
        self.ordered = true;
    }

    /// Adjust capacity to exactly `new_cap`. Fails when `new_cap < count`.
    pub fn resize(&mut self, new_cap: usize) -> Result<()> {
        ensure!(
            new_cap >= self.data.len(),
            "new capacity {} below element count {}",
            new_cap,
            self.data.len()
        );
        if new_cap > self.data.capacity() {
            self.data
                .try_reserve_exact(new_cap - self.data.len())
                .context("integer array reallocation failed")?;
        } else {
            self.data.shrink_to(new_cap);
        }
        Ok(())
    }

    /// Shrink capacity to the element count. Idempotent.
    pub fn resize_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    /// View the contents as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn payload_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * T::WIDTH);
        for &v in &self.data {
            bytes.extend_from_slice(&v.widen().to_le_bytes()[..T::WIDTH]);
        }
        bytes
    }

    /// Compute the SHA-256 digest of the little-endian payload and store it.
    pub fn compute_checksum(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.payload_bytes());
        self.checksum = hasher.finalize().into();
    }

    /// Recompute the payload digest and compare with the stored one.
    pub fn verify_checksum(&self) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(self.payload_bytes());
        let actual: [u8; CHECKSUM_LEN] = hasher.finalize().into();
        if actual == self.checksum {
            true
        } else {
            tracing::error!("integer array SHA-256 checksum validation failed");
            false
        }
    }

    /// Write `[count: i32 LE][payload][checksum]` to `w`, computing the
    /// checksum first if it has never been computed.
    pub fn write_stream<W: Write>(&mut self, w: &mut W) -> Result<()> {
        let count = i32::try_from(self.data.len()).context("element count exceeds i32 in write_stream")?;
        if self.checksum.iter().all(|&b| b == 0) {
            self.compute_checksum();
        }
        w.write_all(&count.to_le_bytes()).context("failed to write array count")?;
        w.write_all(&self.payload_bytes()).context("failed to write array payload")?;
        w.write_all(&self.checksum).context("failed to write array checksum")?;
        Ok(())
    }

    /// Read an array previously written by [`Self::write_stream`],
    /// verifying the checksum before returning it.
    pub fn read_stream<R: Read>(r: &mut R) -> Result<Self> {
        let mut count_buf = [0u8; 4];
        r.read_exact(&mut count_buf).context("failed to read array count")?;
        let count = i32::from_le_bytes(count_buf);
        ensure!(count >= 0, "negative element count in array stream");
        let count = count as usize;

        let mut payload = vec![0u8; count * T::WIDTH];
        r.read_exact(&mut payload).context("failed to read array payload")?;

        let mut array = IntArray::with_capacity(count);
        for chunk in payload.chunks_exact(T::WIDTH) {
            let mut raw = [0u8; 8];
            raw[..T::WIDTH].copy_from_slice(chunk);
            array.push(T::narrow(u64::from_le_bytes(raw)));
        }

        r.read_exact(&mut array.checksum).context("failed to read array checksum")?;
        if !array.verify_checksum() {
            bail!("integer array checksum mismatch on deserialization");
        }
        Ok(array)
    }
}

impl<T: ArrayElement> Deref for IntArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: ArrayElement> DerefMut for IntArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: ArrayElement> Extend<T> for IntArray<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.data.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn push_pop_and_growth() {
        let mut arr: UInt64Array = IntArray::with_capacity(0);
        assert!(arr.capacity() >= 1, "initial capacity must be at least 1");

        for v in 0..100u64 {
            arr.push(v);
        }
        assert_eq!(arr.count(), 100);
        assert_eq!(arr.pop(), Some(99));
        assert_eq!(arr.count(), 99);
        assert_eq!(arr[0], 0);
        assert_eq!(arr[98], 98);
    }

    #[test]
    fn sort_sets_ordered_flag() {
        let mut arr: UInt32Array = IntArray::with_capacity(4);
        arr.extend([5u32, 1, 9, 3]);
        arr.ordered = false;
        arr.sort();
        assert!(arr.ordered);
        assert_eq!(arr.as_slice(), &[1, 3, 5, 9]);
    }

    /// resize_to_fit is idempotent and resize rejects capacities below the
    /// element count.
    #[test]
    fn capacity_management() {
        let mut arr: UInt64Array = IntArray::with_capacity(1);
        for v in 1..=100u64 {
            arr.push(v);
        }

        arr.resize_to_fit();
        assert_eq!(arr.capacity(), 100);
        arr.resize_to_fit();
        assert_eq!(arr.capacity(), 100);

        arr.resize(150).unwrap();
        assert!(arr.capacity() >= 150);
        assert_eq!(arr.count(), 100);

        assert!(arr.resize(50).is_err());
    }

    #[test]
    fn checksum_tracks_mutation() {
        let mut arr: UInt16Array = IntArray::with_capacity(8);
        arr.extend([1u16, 2, 3]);
        arr.compute_checksum();
        assert!(arr.verify_checksum());

        arr.push(4);
        assert!(!arr.verify_checksum());

        arr.compute_checksum();
        assert!(arr.verify_checksum());
    }

    #[test]
    fn stream_roundtrip_u64() {
        let mut arr: UInt64Array = IntArray::with_capacity(4);
        arr.extend([2u64, 3, 5, 7, 11, u64::MAX]);
        arr.compute_checksum();

        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 6 * 8 + CHECKSUM_LEN);

        let restored = UInt64Array::read_stream(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(restored.as_slice(), arr.as_slice());
        assert!(restored.verify_checksum());
    }

    #[test]
    fn stream_roundtrip_u16_preserves_width() {
        let mut arr: UInt16Array = IntArray::with_capacity(4);
        arr.extend([4u16, 2, 65535, 0]);

        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 4 * 2 + CHECKSUM_LEN);

        let restored = UInt16Array::read_stream(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(restored.as_slice(), &[4, 2, 65535, 0]);
    }

    #[test]
    fn stream_read_rejects_corruption() {
        let mut arr: UInt64Array = IntArray::with_capacity(4);
        arr.extend([10u64, 20, 30]);

        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();
        buf[6] ^= 0x01;

        assert!(UInt64Array::read_stream(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn empty_array_roundtrip() {
        let mut arr: UInt32Array = IntArray::with_capacity(1);
        let mut buf = Vec::new();
        arr.write_stream(&mut buf).unwrap();

        let restored = UInt32Array::read_stream(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(restored.count(), 0);
    }
}
