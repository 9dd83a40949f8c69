//! Per-view vote collection.
//!
//! The collector is the thin driver between the network layer and the
//! aggregation core: it feeds deserialized votes into the
//! [CombinedAggregator], applies the drop-and-log policy for rejected votes
//! (the cryptographic paths themselves never log), and emits the packed
//! certificate exactly once when both thresholds are met.

use crate::{
    aggregation::{CombinedAggregator, Error as AggregationError},
    packer::{CommitteeProvider, Packer},
    types::{BlockId, SigType, SignerId},
};
use hotqc_cryptography::bls12381::group::Signature;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Collects votes for one block during one view.
///
/// Discarded on view change; in-flight aggregation runs to completion and
/// its result is dropped with the collector.
pub struct VoteCollector<P: CommitteeProvider> {
    view: u64,
    block: BlockId,
    aggregator: CombinedAggregator,
    packer: Packer<P>,
    /// Verify each share before adding it. Enabled for ingress paths that
    /// cannot tolerate a wasted aggregation attempt.
    pre_verify: bool,
    certified: AtomicBool,
}

impl<P: CommitteeProvider> VoteCollector<P> {
    /// Creates a collector for the provided view and block.
    pub fn new(
        view: u64,
        block: BlockId,
        aggregator: CombinedAggregator,
        packer: Packer<P>,
        pre_verify: bool,
    ) -> Self {
        Self {
            view,
            block,
            aggregator,
            packer,
            pre_verify,
            certified: AtomicBool::new(false),
        }
    }

    /// The view this collector serves.
    pub fn view(&self) -> u64 {
        self.view
    }

    /// The block this collector certifies.
    pub fn block(&self) -> &BlockId {
        &self.block
    }

    /// The underlying aggregator.
    pub fn aggregator(&self) -> &CombinedAggregator {
        &self.aggregator
    }

    /// Ingests one vote. Returns the packed certificate bytes on the call
    /// that completes certification; every other call returns `None`.
    pub fn ingest(
        &self,
        signer: SignerId,
        signature: Signature,
        sig_type: SigType,
    ) -> Option<Vec<u8>> {
        if self.pre_verify {
            if let Err(err) = self.aggregator.verify(&signer, &signature, sig_type) {
                warn!(view = self.view, ?signer, %err, "dropping unverifiable vote");
                return None;
            }
        }

        match self.aggregator.trusted_add(signer, signature, sig_type) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err @ AggregationError::AlreadyAggregated) => {
                debug!(view = self.view, ?signer, %err, "dropping late vote");
                return None;
            }
            Err(err @ AggregationError::DuplicateSigner(_)) => {
                // Byzantine-adjacent: an honest signer votes once per type.
                warn!(view = self.view, ?signer, %err, "dropping duplicate vote");
                return None;
            }
            Err(err) => {
                warn!(view = self.view, ?signer, %err, "dropping vote");
                return None;
            }
        }

        if self.certified.load(Ordering::Acquire) {
            return None;
        }
        let data = match self.aggregator.aggregate() {
            Ok(data) => data,
            Err(err) => {
                warn!(view = self.view, %err, "aggregation failed");
                return None;
            }
        };
        let bytes = match self.packer.pack(&self.block, &data) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(view = self.view, %err, "packing failed");
                return None;
            }
        };
        if self.certified.swap(true, Ordering::AcqRel) {
            // Another caller already emitted the identical certificate.
            return None;
        }
        debug!(
            view = self.view,
            staking_signers = data.staking_signers.len(),
            beacon_signers = data.random_beacon_signers.len(),
            "block certified"
        );
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;
    use std::thread;

    fn collector(
        fixture: &mocks::Fixture,
        staking_threshold: u64,
        beacon_threshold: u32,
        pre_verify: bool,
    ) -> VoteCollector<mocks::Provider> {
        let aggregator = CombinedAggregator::new(
            fixture.committee.clone(),
            mocks::NAMESPACE,
            fixture.message.clone(),
            staking_threshold,
            beacon_threshold,
        );
        VoteCollector::new(
            7,
            fixture.block,
            aggregator,
            Packer::new(fixture.provider()),
            pre_verify,
        )
    }

    #[test]
    fn test_certifies_once() {
        let fixture = mocks::fixture(90, &[25, 25, 25, 25], 3);
        let collector = collector(&fixture, 67, 3, false);

        for i in 0..3 {
            assert!(collector
                .ingest(fixture.signer(i), fixture.staking_sig(i), SigType::Staking)
                .is_none());
        }
        assert!(collector
            .ingest(
                fixture.signer(0),
                fixture.beacon_sig(0),
                SigType::RandomBeacon
            )
            .is_none());
        assert!(collector
            .ingest(
                fixture.signer(1),
                fixture.beacon_sig(1),
                SigType::RandomBeacon
            )
            .is_none());

        // The vote that completes both thresholds yields the certificate.
        let bytes = collector
            .ingest(
                fixture.signer(2),
                fixture.beacon_sig(2),
                SigType::RandomBeacon,
            )
            .unwrap();
        assert!(!bytes.is_empty());

        // The packed bytes unpack to the aggregator's output.
        let packer = Packer::new(fixture.provider());
        let voters: Vec<_> = (0..3).map(|i| fixture.signer(i)).collect();
        let data = packer.unpack(&fixture.block, &voters, &bytes).unwrap();
        assert_eq!(data.staking_signers, voters);
        assert_eq!(data.random_beacon_signers, voters);

        // Late votes are dropped without a second certificate.
        assert!(collector
            .ingest(fixture.signer(3), fixture.staking_sig(3), SigType::Staking)
            .is_none());
    }

    #[test]
    fn test_drops_bad_votes() {
        let fixture = mocks::fixture(91, &[25, 25, 25, 25], 3);
        let collector = collector(&fixture, 67, 3, false);

        assert!(collector
            .ingest(fixture.signer(0), fixture.staking_sig(0), SigType::Staking)
            .is_none());
        // Duplicate, unknown signer, and invalid type are all dropped.
        assert!(collector
            .ingest(fixture.signer(0), fixture.staking_sig(0), SigType::Staking)
            .is_none());
        assert!(collector
            .ingest(
                SignerId::new([0xee; 32]),
                fixture.staking_sig(0),
                SigType::Staking
            )
            .is_none());
        assert!(collector
            .ingest(fixture.signer(1), fixture.staking_sig(1), SigType::Invalid)
            .is_none());
        assert_eq!(collector.aggregator().staking().total_weight(), 25);
    }

    #[test]
    fn test_pre_verify_rejects_forgery() {
        let fixture = mocks::fixture(92, &[25, 25, 25, 25], 3);
        let collector = collector(&fixture, 67, 3, true);

        // A signature from the wrong signer is rejected at the door and
        // never reaches the aggregator.
        assert!(collector
            .ingest(fixture.signer(0), fixture.staking_sig(1), SigType::Staking)
            .is_none());
        assert_eq!(collector.aggregator().staking().total_weight(), 0);

        // Valid votes pass.
        assert!(collector
            .ingest(fixture.signer(0), fixture.staking_sig(0), SigType::Staking)
            .is_none());
        assert_eq!(collector.aggregator().staking().total_weight(), 25);
    }

    #[test]
    fn test_concurrent_ingestion_single_certificate() {
        let fixture = mocks::fixture(93, &[1u64; 8], 6);
        let collector = collector(&fixture, 6, 6, false);

        let certificates: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let collector = &collector;
                    let signer = fixture.signer(i);
                    let staking = fixture.staking_sig(i);
                    let beacon = fixture.beacon_sig(i);
                    scope.spawn(move || {
                        let mut results = Vec::new();
                        results.push(collector.ingest(signer, staking, SigType::Staking));
                        results.push(collector.ingest(signer, beacon, SigType::RandomBeacon));
                        results
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let emitted: Vec<_> = certificates.into_iter().flatten().collect();
        assert_eq!(emitted.len(), 1);
    }
}
