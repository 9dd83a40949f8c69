//! Immutable per-view registry of authorized signers.
//!
//! A committee is constructed once at view entry from the protocol state and
//! then shared read-only with every component that needs to resolve a signer:
//! the aggregators, the packer, and the ingress verifier. Members are held in
//! canonical order (ascending [SignerId] bytes); that order defines the
//! signer-index bitmaps in the packed certificate.

use crate::types::SignerId;
use hotqc_cryptography::bls12381::{group::Public, poly};
use std::collections::HashMap;
use thiserror::Error;

/// Errors rejected at committee construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("committee has no members")]
    Empty,
    #[error("duplicate signer: {0:?}")]
    DuplicateSigner(SignerId),
    #[error("zero weight for signer: {0:?}")]
    ZeroWeight(SignerId),
    #[error("beacon index {0} out of range for {1} members")]
    BeaconIndexOutOfRange(u32, usize),
    #[error("duplicate beacon index: {0}")]
    DuplicateBeaconIndex(u32),
    #[error("total weight overflows u64")]
    WeightOverflow,
}

/// A committee member as provided by the protocol state.
#[derive(Clone, Debug)]
pub struct Member {
    pub signer: SignerId,
    /// Staking public key (proof of possession verified upstream).
    pub public_key: Public,
    /// Voting weight, proportional to stake.
    pub weight: u64,
    /// The member's evaluation index in the beacon key sharing.
    pub beacon_index: u32,
}

/// A member's staking key and weight.
#[derive(Clone, Debug)]
pub struct WeightedKey {
    pub signer: SignerId,
    pub public_key: Public,
    pub weight: u64,
}

/// A member's random-beacon key share.
#[derive(Clone, Debug)]
pub struct BeaconKeyShare {
    pub signer: SignerId,
    /// The beacon public polynomial evaluated at `index`.
    pub public_key: Public,
    pub index: u32,
}

/// The ordered set of authorized signers for one view.
#[derive(Clone, Debug)]
pub struct Committee {
    signers: Vec<SignerId>,
    positions: HashMap<SignerId, usize>,
    keys: Vec<WeightedKey>,
    beacon_keys: Vec<BeaconKeyShare>,
    total_weight: u64,
    group_public: Public,
}

impl Committee {
    /// Builds a committee from the member list and the beacon public
    /// polynomial, validating weights and beacon indices.
    pub fn new(mut members: Vec<Member>, beacon: &poly::Public) -> Result<Self, Error> {
        if members.is_empty() {
            return Err(Error::Empty);
        }
        members.sort_by(|a, b| a.signer.cmp(&b.signer));

        let count = members.len();
        let mut index_taken = vec![false; count];
        let mut positions = HashMap::with_capacity(count);
        let mut signers = Vec::with_capacity(count);
        let mut keys = Vec::with_capacity(count);
        let mut beacon_keys = Vec::with_capacity(count);
        let mut total_weight = 0u64;
        for (position, member) in members.into_iter().enumerate() {
            if positions.insert(member.signer, position).is_some() {
                return Err(Error::DuplicateSigner(member.signer));
            }
            if member.weight == 0 {
                return Err(Error::ZeroWeight(member.signer));
            }
            let index = member.beacon_index as usize;
            if index >= count {
                return Err(Error::BeaconIndexOutOfRange(member.beacon_index, count));
            }
            if index_taken[index] {
                return Err(Error::DuplicateBeaconIndex(member.beacon_index));
            }
            index_taken[index] = true;
            total_weight = total_weight
                .checked_add(member.weight)
                .ok_or(Error::WeightOverflow)?;

            signers.push(member.signer);
            keys.push(WeightedKey {
                signer: member.signer,
                public_key: member.public_key,
                weight: member.weight,
            });
            beacon_keys.push(BeaconKeyShare {
                signer: member.signer,
                public_key: beacon.evaluate(member.beacon_index).value,
                index: member.beacon_index,
            });
        }

        Ok(Self {
            signers,
            positions,
            keys,
            beacon_keys,
            total_weight,
            group_public: *beacon.constant(),
        })
    }

    /// Returns the member's staking key and weight, if a member.
    pub fn lookup(&self, signer: &SignerId) -> Option<&WeightedKey> {
        self.positions.get(signer).map(|&position| &self.keys[position])
    }

    /// Returns the member's beacon key share, if a member.
    pub fn lookup_beacon(&self, signer: &SignerId) -> Option<&BeaconKeyShare> {
        self.positions
            .get(signer)
            .map(|&position| &self.beacon_keys[position])
    }

    /// Returns the member's position in canonical order, if a member.
    pub fn position(&self, signer: &SignerId) -> Option<usize> {
        self.positions.get(signer).copied()
    }

    /// Returns the signer at the provided canonical position.
    pub fn signer(&self, position: usize) -> Option<&SignerId> {
        self.signers.get(position)
    }

    /// Returns all signers in canonical order.
    pub fn signers(&self) -> &[SignerId] {
        &self.signers
    }

    /// Returns the sum of all member weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    /// Returns whether the committee has no members (never true for a
    /// constructed committee).
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Returns the beacon group public key (the polynomial's constant term).
    pub fn group_public(&self) -> &Public {
        &self.group_public
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotqc_cryptography::bls12381::ops;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn members(rng: &mut StdRng, weights: &[u64]) -> Vec<Member> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &weight)| {
                let (_, public_key) = ops::keypair(rng);
                let mut id = [0u8; 32];
                rng.fill_bytes(&mut id);
                Member {
                    signer: SignerId::new(id),
                    public_key,
                    weight,
                    beacon_index: i as u32,
                }
            })
            .collect()
    }

    #[test]
    fn test_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        let (beacon, _) = ops::generate_shares(&mut rng, 4, 3);
        let members = members(&mut rng, &[25, 25, 25, 25]);
        let committee = Committee::new(members.clone(), &beacon).unwrap();

        assert_eq!(committee.len(), 4);
        assert_eq!(committee.total_weight(), 100);

        // Canonical order is ascending by signer id.
        let signers = committee.signers();
        assert!(signers.windows(2).all(|pair| pair[0] < pair[1]));

        // Lookups agree with positions.
        for member in &members {
            let key = committee.lookup(&member.signer).unwrap();
            assert_eq!(key.weight, member.weight);
            let beacon_key = committee.lookup_beacon(&member.signer).unwrap();
            assert_eq!(beacon_key.index, member.beacon_index);
            let position = committee.position(&member.signer).unwrap();
            assert_eq!(committee.signer(position), Some(&member.signer));
        }
        assert_eq!(committee.group_public(), beacon.constant());
    }

    #[test]
    fn test_unknown_signer() {
        let mut rng = StdRng::seed_from_u64(1);
        let (beacon, _) = ops::generate_shares(&mut rng, 3, 2);
        let committee = Committee::new(members(&mut rng, &[1, 2, 3]), &beacon).unwrap();
        let stranger = SignerId::new([0xff; 32]);
        assert!(committee.lookup(&stranger).is_none());
        assert!(committee.lookup_beacon(&stranger).is_none());
        assert!(committee.position(&stranger).is_none());
    }

    #[test]
    fn test_rejects_empty() {
        let mut rng = StdRng::seed_from_u64(2);
        let (beacon, _) = ops::generate_shares(&mut rng, 2, 2);
        assert!(matches!(Committee::new(vec![], &beacon), Err(Error::Empty)));
    }

    #[test]
    fn test_rejects_duplicate_signer() {
        let mut rng = StdRng::seed_from_u64(3);
        let (beacon, _) = ops::generate_shares(&mut rng, 2, 2);
        let mut members = members(&mut rng, &[1, 2]);
        members[1].signer = members[0].signer;
        assert!(matches!(
            Committee::new(members, &beacon),
            Err(Error::DuplicateSigner(_))
        ));
    }

    #[test]
    fn test_rejects_zero_weight() {
        let mut rng = StdRng::seed_from_u64(4);
        let (beacon, _) = ops::generate_shares(&mut rng, 2, 2);
        let mut members = members(&mut rng, &[1, 2]);
        members[0].weight = 0;
        assert!(matches!(
            Committee::new(members, &beacon),
            Err(Error::ZeroWeight(_))
        ));
    }

    #[test]
    fn test_rejects_bad_beacon_indices() {
        let mut rng = StdRng::seed_from_u64(5);
        let (beacon, _) = ops::generate_shares(&mut rng, 3, 2);

        let mut out_of_range = members(&mut rng, &[1, 2, 3]);
        out_of_range[2].beacon_index = 3;
        assert!(matches!(
            Committee::new(out_of_range, &beacon),
            Err(Error::BeaconIndexOutOfRange(3, 3))
        ));

        let mut duplicated = members(&mut rng, &[1, 2, 3]);
        duplicated[2].beacon_index = duplicated[0].beacon_index;
        assert!(matches!(
            Committee::new(duplicated, &beacon),
            Err(Error::DuplicateBeaconIndex(_))
        ));
    }

    #[test]
    fn test_rejects_weight_overflow() {
        let mut rng = StdRng::seed_from_u64(6);
        let (beacon, _) = ops::generate_shares(&mut rng, 2, 2);
        let members = members(&mut rng, &[u64::MAX, 1]);
        assert!(matches!(
            Committee::new(members, &beacon),
            Err(Error::WeightOverflow)
        ));
    }
}
