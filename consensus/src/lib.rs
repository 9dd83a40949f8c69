//! Vote aggregation and quorum certification for a single consensus view.
//!
//! A participant collects two kinds of vote signatures from committee
//! members over the same agreed message: staking signatures (weighted, plain
//! BLS) and random-beacon shares (threshold BLS). Once the collected staking
//! weight crosses the stake threshold and enough beacon shares are present,
//! the [aggregation::CombinedAggregator] produces the compound certificate
//! and the [packer::Packer] serializes it into the block header's signature
//! data field.
//!
//! Vote ingestion is hit concurrently by the network layer; every aggregator
//! operation admits concurrent callers. Signature shares are added without
//! verification (`trusted_add`) for throughput, compensated by a mandatory
//! verification of every aggregate before it is returned: a bad share can
//! waste an aggregation attempt but can never leak into a certificate.
//!
//! The crate is a library driven by the consensus engine, which supplies the
//! committee for each block, the canonical vote message for each view, and
//! the deserialized votes themselves.

pub mod aggregation;
pub mod collector;
pub mod committee;
pub mod packer;
mod types;
pub mod verifier;

pub use types::{
    BlockId, BlockSignatureData, SigType, SignerId, BLOCK_ID_LENGTH, SIGNER_ID_LENGTH,
};

#[cfg(test)]
pub(crate) mod mocks;
