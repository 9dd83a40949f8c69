//! Weighted aggregation of staking signatures.

use super::Error;
use crate::{committee::Committee, types::SignerId};
use hotqc_cryptography::bls12381::{group::Signature, ops};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

/// The aggregation lifecycle. Terminal states absorb: no transition leaves
/// [Phase::Aggregated] or [Phase::Failed].
enum Phase {
    Accepting,
    Aggregated {
        signers: Vec<SignerId>,
        signature: Vec<u8>,
    },
    Failed,
}

struct Accumulator {
    /// Keyed by signer id, so iteration yields canonical ascending order.
    collected: BTreeMap<SignerId, Signature>,
    weight: u64,
    phase: Phase,
}

/// Aggregates staking signatures from weighted signers over one agreed
/// message, reporting when the collected weight crosses the threshold.
///
/// Safe for concurrent use. Cryptographic work never runs under the
/// accumulator lock: `aggregate` snapshots the collected shares, releases
/// the lock, computes, and re-acquires it to publish.
pub struct StakingAggregator {
    committee: Arc<Committee>,
    namespace: Vec<u8>,
    message: Vec<u8>,
    threshold: u64,
    accumulator: Mutex<Accumulator>,
    /// Serializes `aggregate` callers so only one performs the computation;
    /// the rest observe the published result.
    turn: Mutex<()>,
}

impl StakingAggregator {
    /// Creates an aggregator over the provided committee and agreed message
    /// with a total-weight `threshold`.
    pub fn new(
        committee: Arc<Committee>,
        namespace: &[u8],
        message: Vec<u8>,
        threshold: u64,
    ) -> Self {
        Self {
            committee,
            namespace: namespace.to_vec(),
            message,
            threshold,
            accumulator: Mutex::new(Accumulator {
                collected: BTreeMap::new(),
                weight: 0,
                phase: Phase::Accepting,
            }),
            turn: Mutex::new(()),
        }
    }

    /// Verifies a single signature against the signer's staking key and the
    /// agreed message. Stateless.
    pub fn verify(&self, signer: &SignerId, signature: &Signature) -> Result<(), Error> {
        let key = self
            .committee
            .lookup(signer)
            .ok_or(Error::UnknownSigner(*signer))?;
        ops::verify_message(&key.public_key, &self.namespace, &self.message, signature)
            .map_err(|_| Error::InvalidSignature)
    }

    /// Stores a signature without verifying it and returns the total
    /// collected weight after the add.
    ///
    /// On [Error::DuplicateSigner] the stored share and weight are
    /// unchanged; the current total remains observable via
    /// [Self::total_weight].
    pub fn trusted_add(&self, signer: SignerId, signature: Signature) -> Result<u64, Error> {
        let weight = self
            .committee
            .lookup(&signer)
            .ok_or(Error::UnknownSigner(signer))?
            .weight;

        let mut acc = self.accumulator.lock();
        if !matches!(acc.phase, Phase::Accepting) {
            return Err(Error::AlreadyAggregated);
        }
        if acc.collected.contains_key(&signer) {
            return Err(Error::DuplicateSigner(signer));
        }
        acc.collected.insert(signer, signature);
        // Cannot overflow: the committee validated that all member weights
        // sum within u64, and each member contributes at most once.
        acc.weight += weight;
        Ok(acc.weight)
    }

    /// Returns the total weight of the collected signatures.
    pub fn total_weight(&self) -> u64 {
        self.accumulator.lock().weight
    }

    /// Returns whether the collected weight has crossed the threshold.
    pub fn has_sufficient_weight(&self) -> bool {
        self.total_weight() >= self.threshold
    }

    /// Returns the configured weight threshold.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Aggregates the collected signatures and verifies the aggregate
    /// against the contributing public keys and the agreed message.
    ///
    /// The verification compensates for `trusted_add` skipping per-share
    /// checks; on failure the aggregator is terminal and every later call
    /// returns [Error::InvalidAggregate]. The first success is canonical:
    /// later calls return the identical signer list and bytes.
    pub fn aggregate(&self) -> Result<(Vec<SignerId>, Vec<u8>), Error> {
        let _turn = self.turn.lock();
        let snapshot = {
            let acc = self.accumulator.lock();
            match &acc.phase {
                Phase::Aggregated { signers, signature } => {
                    return Ok((signers.clone(), signature.clone()))
                }
                Phase::Failed => return Err(Error::InvalidAggregate),
                Phase::Accepting => {}
            }
            if acc.weight < self.threshold {
                return Err(Error::InsufficientWeight {
                    collected: acc.weight,
                    required: self.threshold,
                });
            }
            acc.collected.clone()
        };

        let signers: Vec<SignerId> = snapshot.keys().copied().collect();
        let signature = ops::aggregate_signatures(snapshot.values());
        let publics = signers
            .iter()
            .map(|signer| {
                self.committee
                    .lookup(signer)
                    .map(|key| key.public_key)
                    .ok_or(Error::UnknownSigner(*signer))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ops::aggregate_verify_multiple_public_keys(
            &publics,
            &self.namespace,
            &self.message,
            &signature,
        )
        .is_err()
        {
            self.accumulator.lock().phase = Phase::Failed;
            return Err(Error::InvalidAggregate);
        }

        let bytes = signature.to_bytes().to_vec();
        self.accumulator.lock().phase = Phase::Aggregated {
            signers: signers.clone(),
            signature: bytes.clone(),
        };
        Ok((signers, bytes))
    }
}
