//! Dual-path aggregation of staking signatures and random-beacon shares.

use super::{BeaconReconstructor, Error, StakingAggregator};
use crate::{
    committee::Committee,
    types::{BlockSignatureData, SigType, SignerId},
};
use hotqc_cryptography::bls12381::group::Signature;
use std::sync::Arc;

/// Drives a [StakingAggregator] and a [BeaconReconstructor] over the same
/// view, message, and committee, with independently configured thresholds:
/// a stake weight for the staking path and a share count for the beacon
/// path. Certification requires both.
///
/// Votes are dispatched to the matching sub-aggregator by [SigType]; all
/// operations are safe under concurrent invocation.
pub struct CombinedAggregator {
    staking: StakingAggregator,
    beacon: BeaconReconstructor,
}

impl CombinedAggregator {
    /// Creates the aggregator pair over one committee and agreed message.
    pub fn new(
        committee: Arc<Committee>,
        namespace: &[u8],
        message: Vec<u8>,
        staking_threshold: u64,
        beacon_threshold: u32,
    ) -> Self {
        Self {
            staking: StakingAggregator::new(
                committee.clone(),
                namespace,
                message.clone(),
                staking_threshold,
            ),
            beacon: BeaconReconstructor::new(committee, namespace, message, beacon_threshold),
        }
    }

    /// Returns the staking sub-aggregator.
    pub fn staking(&self) -> &StakingAggregator {
        &self.staking
    }

    /// Returns the beacon sub-aggregator.
    pub fn beacon(&self) -> &BeaconReconstructor {
        &self.beacon
    }

    /// Verifies a single vote signature of the provided type. Stateless.
    pub fn verify(
        &self,
        signer: &SignerId,
        signature: &Signature,
        sig_type: SigType,
    ) -> Result<(), Error> {
        match sig_type {
            SigType::Staking => self.staking.verify(signer, signature),
            SigType::RandomBeacon => self.beacon.verify(signer, signature),
            SigType::Invalid => Err(Error::InvalidSigType),
        }
    }

    /// Adds a vote signature of the provided type without verifying it and
    /// returns whether **both** sub-aggregators have crossed their
    /// thresholds. Sub-aggregator errors propagate unchanged.
    pub fn trusted_add(
        &self,
        signer: SignerId,
        signature: Signature,
        sig_type: SigType,
    ) -> Result<bool, Error> {
        match sig_type {
            SigType::Staking => {
                self.staking.trusted_add(signer, signature)?;
            }
            SigType::RandomBeacon => {
                self.beacon.trusted_add(signer, signature)?;
            }
            SigType::Invalid => return Err(Error::InvalidSigType),
        }
        Ok(self.has_sufficient_weight())
    }

    /// Returns whether both the stake threshold and the beacon share
    /// threshold have been crossed.
    pub fn has_sufficient_weight(&self) -> bool {
        self.staking.has_sufficient_weight() && self.beacon.has_sufficient_shares()
    }

    /// Runs both aggregation paths and assembles the compound certificate
    /// payload.
    ///
    /// Fails fast with [Error::InsufficientWeight] or
    /// [Error::InsufficientShares] if either path is below threshold. The
    /// two paths run in parallel and both must succeed; the staking and
    /// beacon signatures are never mixed into one aggregate. The first
    /// success is canonical: later calls return byte-identical data.
    pub fn aggregate(&self) -> Result<BlockSignatureData, Error> {
        let collected = self.staking.total_weight();
        if collected < self.staking.threshold() {
            return Err(Error::InsufficientWeight {
                collected,
                required: self.staking.threshold(),
            });
        }
        let shares = self.beacon.share_count();
        if shares < self.beacon.threshold() as usize {
            return Err(Error::InsufficientShares {
                collected: shares,
                required: self.beacon.threshold() as usize,
            });
        }

        let (staking_result, beacon_result) = rayon::join(
            || self.staking.aggregate(),
            || {
                let reconstructed = self.beacon.reconstruct()?;
                let (signers, aggregated) = self.beacon.aggregate_shares()?;
                Ok::<_, Error>((reconstructed, signers, aggregated))
            },
        );
        let (staking_signers, aggregated_staking_sig) = staking_result?;
        let (reconstructed, random_beacon_signers, aggregated_random_beacon_sig) = beacon_result?;

        Ok(BlockSignatureData {
            staking_signers,
            random_beacon_signers,
            aggregated_staking_sig,
            aggregated_random_beacon_sig,
            reconstructed_random_beacon_sig: reconstructed.to_bytes().to_vec(),
        })
    }
}
