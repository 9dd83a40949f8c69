//! Collection and aggregation of vote signatures for a single view.
//!
//! All aggregators share the same discipline: `trusted_add` stores a share
//! without verifying it (per-share verification is the expensive part of
//! BLS, and shares from known committee members are almost always valid),
//! and every aggregate or reconstructed signature is verified before it is
//! returned. A bad share can therefore cost an aggregation attempt
//! ([Error::InvalidAggregate] / [Error::InvalidReconstruction]) but can
//! never produce an invalid certificate. Callers needing early rejection of
//! individual shares use the separate `verify` entry points.
//!
//! Aggregators are single-use: after the first successful aggregation the
//! result is cached and returned unchanged to every later caller, and
//! further `trusted_add` calls are rejected.

mod beacon;
mod combined;
mod staking;

pub use beacon::BeaconReconstructor;
pub use combined::CombinedAggregator;
pub use staking::StakingAggregator;

use crate::types::SignerId;
use thiserror::Error;

/// Errors returned by the vote aggregators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The signer is not a committee member; the vote is dropped.
    #[error("signer is not a committee member: {0:?}")]
    UnknownSigner(SignerId),
    /// The signer already contributed a share of this type.
    #[error("signer already contributed: {0:?}")]
    DuplicateSigner(SignerId),
    /// A single-share verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// The vote carried an undecodable signature type.
    #[error("invalid signature type")]
    InvalidSigType,
    /// Aggregation was attempted below the weight threshold; retry once more
    /// votes arrive.
    #[error("insufficient weight: {collected}/{required}")]
    InsufficientWeight { collected: u64, required: u64 },
    /// Reconstruction was attempted below the share threshold; retry once
    /// more votes arrive.
    #[error("insufficient shares: {collected}/{required}")]
    InsufficientShares { collected: usize, required: usize },
    /// The aggregate failed its post-hoc verification: at least one share
    /// added via `trusted_add` was invalid. The instance is terminal; fall
    /// back to per-share verification to isolate the faulty signer and
    /// rebuild without it.
    #[error("aggregate failed verification")]
    InvalidAggregate,
    /// The reconstructed group signature failed its post-hoc verification;
    /// same recovery path as [Error::InvalidAggregate].
    #[error("reconstructed signature failed verification")]
    InvalidReconstruction,
    /// A share arrived after aggregation concluded; safe to ignore.
    #[error("aggregation already completed")]
    AlreadyAggregated,
}
