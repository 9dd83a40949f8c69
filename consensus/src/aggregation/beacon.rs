//! Collection of random-beacon shares and recovery of the group signature.

use super::Error;
use crate::{committee::Committee, types::SignerId};
use hotqc_cryptography::bls12381::{group::Signature, ops, poly::Eval};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

struct Accumulator {
    /// Keyed by signer id, so iteration yields canonical ascending order.
    /// Each entry carries the member's beacon evaluation index.
    collected: BTreeMap<SignerId, Eval<Signature>>,
    /// Set on the first successful recovery or aggregation; freezes the
    /// share set so every cached output refers to the same contributors.
    sealed: bool,
    /// Set when a post-hoc verification failed; terminal.
    failed: bool,
    reconstructed: Option<Signature>,
    aggregated: Option<(Vec<SignerId>, Vec<u8>)>,
}

/// Collects threshold signature shares over one agreed message and recovers
/// the committee's group signature once `threshold` shares are present.
///
/// Shares are interpolated over the ascending-index prefix of the collected
/// set, so the recovered signature is identical for any sufficient set of
/// valid shares regardless of arrival order; shares past the threshold are
/// accepted but cannot change the result.
///
/// Safe for concurrent use; recovery runs outside the accumulator lock.
pub struct BeaconReconstructor {
    committee: Arc<Committee>,
    namespace: Vec<u8>,
    message: Vec<u8>,
    threshold: u32,
    accumulator: Mutex<Accumulator>,
    /// Serializes `reconstruct` and `aggregate_shares` callers.
    turn: Mutex<()>,
}

impl BeaconReconstructor {
    /// Creates a reconstructor over the provided committee and agreed
    /// message requiring `threshold` shares.
    pub fn new(
        committee: Arc<Committee>,
        namespace: &[u8],
        message: Vec<u8>,
        threshold: u32,
    ) -> Self {
        Self {
            committee,
            namespace: namespace.to_vec(),
            message,
            threshold,
            accumulator: Mutex::new(Accumulator {
                collected: BTreeMap::new(),
                sealed: false,
                failed: false,
                reconstructed: None,
                aggregated: None,
            }),
            turn: Mutex::new(()),
        }
    }

    /// Verifies a single share against the signer's beacon key share and the
    /// agreed message. Stateless.
    pub fn verify(&self, signer: &SignerId, share: &Signature) -> Result<(), Error> {
        let key = self
            .committee
            .lookup_beacon(signer)
            .ok_or(Error::UnknownSigner(*signer))?;
        ops::verify_message(&key.public_key, &self.namespace, &self.message, share)
            .map_err(|_| Error::InvalidSignature)
    }

    /// Stores a share without verifying it and returns whether sufficient
    /// shares have been collected.
    ///
    /// [Error::DuplicateSigner] leaves the stored set unchanged; the
    /// sufficiency state remains observable via
    /// [Self::has_sufficient_shares].
    pub fn trusted_add(&self, signer: SignerId, share: Signature) -> Result<bool, Error> {
        let index = self
            .committee
            .lookup_beacon(&signer)
            .ok_or(Error::UnknownSigner(signer))?
            .index;

        let mut acc = self.accumulator.lock();
        if acc.sealed || acc.failed {
            return Err(Error::AlreadyAggregated);
        }
        if acc.collected.contains_key(&signer) {
            return Err(Error::DuplicateSigner(signer));
        }
        acc.collected.insert(signer, Eval { index, value: share });
        Ok(acc.collected.len() >= self.threshold as usize)
    }

    /// Returns whether sufficient shares have been collected.
    pub fn has_sufficient_shares(&self) -> bool {
        self.share_count() >= self.threshold as usize
    }

    /// Returns the number of collected shares.
    pub fn share_count(&self) -> usize {
        self.accumulator.lock().collected.len()
    }

    /// Returns the configured share threshold.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Returns the contributing signers in canonical ascending order.
    pub fn signers(&self) -> Vec<SignerId> {
        self.accumulator.lock().collected.keys().copied().collect()
    }

    /// Recovers the group signature and verifies it against the group public
    /// key and the agreed message.
    ///
    /// The verification compensates for `trusted_add` skipping per-share
    /// checks: failure means at least one collected share was invalid, the
    /// instance is terminal, and the caller must fall back to per-share
    /// verification to isolate the faulty contributor. The first success is
    /// cached and returned to every later caller.
    pub fn reconstruct(&self) -> Result<Signature, Error> {
        let _turn = self.turn.lock();
        let snapshot = {
            let acc = self.accumulator.lock();
            if acc.failed {
                return Err(Error::InvalidReconstruction);
            }
            if let Some(signature) = &acc.reconstructed {
                return Ok(*signature);
            }
            if acc.collected.len() < self.threshold as usize {
                return Err(Error::InsufficientShares {
                    collected: acc.collected.len(),
                    required: self.threshold as usize,
                });
            }
            acc.collected.values().cloned().collect::<Vec<_>>()
        };

        let signature = ops::threshold_signature_recover(self.threshold, &snapshot)
            .map_err(|_| Error::InvalidReconstruction)?;
        if ops::verify_message(
            self.committee.group_public(),
            &self.namespace,
            &self.message,
            &signature,
        )
        .is_err()
        {
            self.accumulator.lock().failed = true;
            return Err(Error::InvalidReconstruction);
        }

        let mut acc = self.accumulator.lock();
        acc.reconstructed = Some(signature);
        acc.sealed = true;
        Ok(signature)
    }

    /// Aggregates all collected shares into a single BLS signature and
    /// verifies it against the sum of the contributors' beacon key shares.
    ///
    /// This is the beacon half of the compound certificate; unlike
    /// [Self::reconstruct] it covers every collected share, so it also
    /// catches invalid shares that sit outside the interpolation subset.
    pub fn aggregate_shares(&self) -> Result<(Vec<SignerId>, Vec<u8>), Error> {
        let _turn = self.turn.lock();
        let snapshot = {
            let acc = self.accumulator.lock();
            if acc.failed {
                return Err(Error::InvalidAggregate);
            }
            if let Some((signers, signature)) = &acc.aggregated {
                return Ok((signers.clone(), signature.clone()));
            }
            if acc.collected.len() < self.threshold as usize {
                return Err(Error::InsufficientShares {
                    collected: acc.collected.len(),
                    required: self.threshold as usize,
                });
            }
            acc.collected.clone()
        };

        let signers: Vec<SignerId> = snapshot.keys().copied().collect();
        let signature = ops::aggregate_signatures(snapshot.values().map(|eval| &eval.value));
        let publics = signers
            .iter()
            .map(|signer| {
                self.committee
                    .lookup_beacon(signer)
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
            self.accumulator.lock().failed = true;
            return Err(Error::InvalidAggregate);
        }

        let bytes = signature.to_bytes().to_vec();
        let mut acc = self.accumulator.lock();
        acc.aggregated = Some((signers.clone(), bytes.clone()));
        acc.sealed = true;
        Ok((signers, bytes))
    }
}
