//! Threshold and multi-signature operations over the BLS12-381 curve.
//!
//! Public keys live in G1 (48 bytes compressed) and signatures in G2 (96
//! bytes compressed). All signing uses the `POP` ciphersuite domain
//! separation tags, as this code is expected to run in a Byzantine
//! environment where any signature may end up inside an aggregate.
//!
//! # Warning
//!
//! Aggregation functions assume the caller has collected a proof of
//! possession for every contributing public key. Without that, a rogue-key
//! attack can forge aggregates.

pub mod group;
pub mod ops;
pub mod poly;

use thiserror::Error;

/// Errors that can occur when operating on BLS12-381 elements.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not enough signature shares: {0}/{1}")]
    NotEnoughShares(usize, usize),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("duplicate share index: {0}")]
    DuplicateIndex(u32),
    #[error("scalar has no inverse")]
    NoInverse,
    #[error("invalid {0} encoding: {1}")]
    InvalidElement(&'static str, &'static str),
}
