//! Single-signature verification for untrusted vote ingress.
//!
//! The aggregators deliberately skip per-share verification in
//! `trusted_add`; ingress paths that cannot tolerate a wasted aggregation
//! attempt (e.g. votes relayed by an untrusted peer) verify each share here
//! first and drop invalid ones at the door.

use crate::{
    aggregation::Error,
    committee::Committee,
    types::{SigType, SignerId},
};
use hotqc_cryptography::bls12381::{group::Signature, ops};
use std::sync::Arc;

/// Stateless verification of individual vote signatures against one
/// committee and agreed message. Safe under concurrent calls.
pub struct Verifier {
    committee: Arc<Committee>,
    namespace: Vec<u8>,
    message: Vec<u8>,
}

impl Verifier {
    /// Creates a verifier over the provided committee and agreed message.
    pub fn new(committee: Arc<Committee>, namespace: &[u8], message: Vec<u8>) -> Self {
        Self {
            committee,
            namespace: namespace.to_vec(),
            message,
        }
    }

    /// Verifies a vote signature of the provided type, resolving the key by
    /// signer and type.
    pub fn verify(
        &self,
        signer: &SignerId,
        signature: &Signature,
        sig_type: SigType,
    ) -> Result<(), Error> {
        let public_key = match sig_type {
            SigType::Staking => {
                self.committee
                    .lookup(signer)
                    .ok_or(Error::UnknownSigner(*signer))?
                    .public_key
            }
            SigType::RandomBeacon => {
                self.committee
                    .lookup_beacon(signer)
                    .ok_or(Error::UnknownSigner(*signer))?
                    .public_key
            }
            SigType::Invalid => return Err(Error::InvalidSigType),
        };
        ops::verify_message(&public_key, &self.namespace, &self.message, signature)
            .map_err(|_| Error::InvalidSignature)
    }
}
