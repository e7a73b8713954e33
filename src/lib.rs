//! # izprime — Core Library
//!
//! A prime sieving and prime-counting engine organized around one idea:
//! operate in the *iZ index space* of integers of the form 6x ± 1, stored as
//! two packed bit arrays, and drive all sieve work as segment-by-segment
//! composite marking over that space.
//!
//! ## Module Organization
//!
//! **Containers** (the two data structures everything is built on):
//! - [`bitmap`] — packed bit array with SIMD stepped clearing and
//!   checksummed binary I/O.
//! - [`int_array`] — growable 16/32/64-bit unsigned vectors with an order
//!   hint and checksummed binary I/O.
//!
//! **Index space**:
//! - [`iz`] — the x ↔ 6x ± 1 coordinate mapping, VX wheel construction,
//!   and the modular hit solvers that locate composites inside segments.
//! - [`segment`] — the shared immutable wheel context ([`segment::Izm`]),
//!   per-segment sieve state ([`segment::VxSegment`]), and the numeric →
//!   segment coordinate mapping ([`segment::RangeInfo`]).
//!
//! **Engines**:
//! - [`sieve`] — full-range enumeration up to 10¹²: classical sieves
//!   (Eratosthenes and friends) plus the SiZ family.
//! - [`range`] — streaming and multi-core counting over arbitrary
//!   intervals whose start may exceed 64 bits.
//! - [`search`] — random and sequential probable-prime generation on the
//!   same filtering machinery.
//!
//! **Support**:
//! - [`expr`] — the numeric/range expression grammar consumed at the CLI
//!   boundary.
//! - [`platform`] — L2 cache and core-count detection feeding VX selection
//!   and worker clamping.
//!
//! ## Design Philosophy
//!
//! Deterministic marking does the bulk of the work: every segment starts as
//! a clone of a pre-sieved base template and root primes clear their
//! composites via closed-form modular solves, never by trial division. Only
//! when a segment lies beyond the reach of its root primes (√upper > vx)
//! does a configurable-round Miller–Rabin cleanup run over the survivors.
//! Worker parallelism is share-nothing by construction: each worker owns a
//! deep clone of the wheel context.

pub mod bitmap;
pub mod expr;
pub mod int_array;
pub mod iz;
pub mod platform;
pub mod range;
pub mod search;
pub mod segment;
pub mod sieve;
