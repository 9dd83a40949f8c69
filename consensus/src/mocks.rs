//! Shared test fixtures: a committee with real BLS key material.

use crate::{
    committee::{Committee, Member},
    packer::CommitteeProvider,
    types::{BlockId, SignerId},
};
use hotqc_cryptography::bls12381::{
    group::{Private, Share, Signature},
    ops,
};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::sync::Arc;

pub const NAMESPACE: &[u8] = b"_HOTQC_TEST";

/// One committee member's signing material, in committee canonical order.
pub struct FixtureMember {
    pub signer: SignerId,
    pub private: Private,
    pub share: Share,
}

/// A committee with signing material and a block to certify.
pub struct Fixture {
    pub committee: Arc<Committee>,
    pub block: BlockId,
    pub message: Vec<u8>,
    pub members: Vec<FixtureMember>,
}

/// Deterministically builds a committee with the provided weights and a
/// beacon sharing with the provided threshold. Member `i` (in canonical
/// order) is addressed through [Fixture::signer].
pub fn fixture(seed: u64, weights: &[u64], beacon_threshold: u32) -> Fixture {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = weights.len() as u32;
    let (beacon_public, shares) = ops::generate_shares(&mut rng, n, beacon_threshold);

    let mut members = Vec::with_capacity(weights.len());
    let mut material = Vec::with_capacity(weights.len());
    for (i, &weight) in weights.iter().enumerate() {
        let (private, public_key) = ops::keypair(&mut rng);
        let mut id = [0u8; 32];
        rng.fill_bytes(&mut id);
        let signer = SignerId::new(id);
        members.push(Member {
            signer,
            public_key,
            weight,
            beacon_index: i as u32,
        });
        material.push(FixtureMember {
            signer,
            private,
            share: shares[i].clone(),
        });
    }
    let committee = Arc::new(Committee::new(members, &beacon_public).unwrap());
    material.sort_by(|a, b| a.signer.cmp(&b.signer));

    let mut block = [0u8; 32];
    rng.fill_bytes(&mut block);
    let mut message = vec![0u8; 32];
    rng.fill_bytes(&mut message);

    Fixture {
        committee,
        block: BlockId::new(block),
        message,
        members: material,
    }
}

impl Fixture {
    /// The id of the member at canonical position `i`.
    pub fn signer(&self, i: usize) -> SignerId {
        self.members[i].signer
    }

    /// A valid staking signature from member `i` over the agreed message.
    pub fn staking_sig(&self, i: usize) -> Signature {
        ops::sign_message(&self.members[i].private, NAMESPACE, &self.message)
    }

    /// A valid beacon share from member `i` over the agreed message.
    pub fn beacon_sig(&self, i: usize) -> Signature {
        ops::partial_sign_message(&self.members[i].share, NAMESPACE, &self.message).value
    }

    /// A committee provider answering only for this fixture's block.
    pub fn provider(&self) -> Provider {
        Provider {
            block: self.block,
            committee: self.committee.clone(),
        }
    }
}

/// Single-block committee provider.
pub struct Provider {
    block: BlockId,
    committee: Arc<Committee>,
}

impl CommitteeProvider for Provider {
    fn committee(&self, block: &BlockId) -> Option<Arc<Committee>> {
        (block == &self.block).then(|| self.committee.clone())
    }
}
