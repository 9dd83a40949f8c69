//! Signing, verification, aggregation, and threshold recovery.
//!
//! All message signing is namespaced: the namespace is length-prefixed and
//! prepended to the message before hashing to the curve, so a signature
//! produced for one protocol context can never be replayed in another.
//!
//! # Determinism
//!
//! Signatures, aggregates, and recovered group signatures are deterministic
//! functions of their inputs and are safe to embed in consensus-critical
//! artifacts.

use super::{
    group::{self, Dst, Element, Scalar, Share, MESSAGE, PROOF_OF_POSSESSION},
    poly::{self, Eval},
    Error,
};
use bytes::{BufMut, BytesMut};
use rand::RngCore;

/// Concatenates a namespace and a message with a length prefix.
///
/// The prefix makes the framing collision-free: no `(namespace, message)`
/// pair shares a payload with any other.
fn namespaced(namespace: &[u8], message: &[u8]) -> Vec<u8> {
    let mut payload = BytesMut::with_capacity(4 + namespace.len() + message.len());
    payload.put_u32(namespace.len() as u32);
    payload.put_slice(namespace);
    payload.put_slice(message);
    payload.to_vec()
}

/// Returns a new keypair derived from the provided randomness.
pub fn keypair<R: RngCore>(rng: &mut R) -> (group::Private, group::Public) {
    let private = Scalar::rand(rng);
    let mut public = group::Public::one();
    public.mul(&private);
    (private, public)
}

/// Signs a pre-framed payload under `dst`.
fn sign(private: &group::Private, dst: Dst, payload: &[u8]) -> group::Signature {
    let mut sig = group::Signature::zero();
    sig.map(dst, payload);
    sig.mul(private);
    sig
}

/// Verifies a signature over a pre-framed payload.
fn verify(
    public: &group::Public,
    dst: Dst,
    payload: &[u8],
    signature: &group::Signature,
) -> Result<(), Error> {
    let mut hm = group::Signature::zero();
    hm.map(dst, payload);
    if !group::equal(public, signature, &hm) {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}

/// Signs the provided message within the provided namespace.
pub fn sign_message(
    private: &group::Private,
    namespace: &[u8],
    message: &[u8],
) -> group::Signature {
    sign(private, MESSAGE, &namespaced(namespace, message))
}

/// Verifies a signature over the provided namespaced message.
pub fn verify_message(
    public: &group::Public,
    namespace: &[u8],
    message: &[u8],
    signature: &group::Signature,
) -> Result<(), Error> {
    verify(public, MESSAGE, &namespaced(namespace, message), signature)
}

/// Generates a proof of possession for the private key.
pub fn sign_proof_of_possession(private: &group::Private) -> group::Signature {
    let mut public = group::Public::one();
    public.mul(private);
    sign(private, PROOF_OF_POSSESSION, &public.to_bytes())
}

/// Verifies a proof of possession for the provided public key.
pub fn verify_proof_of_possession(
    public: &group::Public,
    signature: &group::Signature,
) -> Result<(), Error> {
    verify(public, PROOF_OF_POSSESSION, &public.to_bytes(), signature)
}

/// Signs the provided namespaced message with a threshold key share.
pub fn partial_sign_message(
    share: &Share,
    namespace: &[u8],
    message: &[u8],
) -> Eval<group::Signature> {
    Eval {
        index: share.index,
        value: sign_message(&share.private, namespace, message),
    }
}

/// Verifies a partial signature against the public polynomial.
pub fn partial_verify_message(
    public: &poly::Public,
    namespace: &[u8],
    message: &[u8],
    partial: &Eval<group::Signature>,
) -> Result<(), Error> {
    let key_share = public.evaluate(partial.index);
    verify_message(&key_share.value, namespace, message, &partial.value)
}

/// Sums the provided signatures.
///
/// # Warning
///
/// The caller must ensure the signatures are unique; otherwise an attacker
/// can construct an aggregate that verifies against an incorrect key set.
pub fn aggregate_signatures<'a, I>(signatures: I) -> group::Signature
where
    I: IntoIterator<Item = &'a group::Signature>,
{
    let mut agg = group::Signature::zero();
    for signature in signatures {
        agg.add(signature);
    }
    agg
}

/// Sums the provided public keys.
///
/// # Warning
///
/// The caller must hold a proof of possession for every key and ensure the
/// keys are unique; otherwise aggregation is unsound.
pub fn aggregate_public_keys<'a, I>(publics: I) -> group::Public
where
    I: IntoIterator<Item = &'a group::Public>,
{
    let mut agg = group::Public::zero();
    for public in publics {
        agg.add(public);
    }
    agg
}

/// Verifies an aggregate signature over one message from multiple signers.
///
/// Bilinearity lets the public keys be summed first, so verification costs a
/// single pairing check regardless of the number of signers.
pub fn aggregate_verify_multiple_public_keys<'a, I>(
    publics: I,
    namespace: &[u8],
    message: &[u8],
    signature: &group::Signature,
) -> Result<(), Error>
where
    I: IntoIterator<Item = &'a group::Public>,
{
    let agg_public = aggregate_public_keys(publics);
    verify_message(&agg_public, namespace, message, signature)
}

/// Recovers the group signature from at least `threshold` partial signatures.
///
/// The result is identical for any sufficient set of valid partials; see
/// [`poly::recover`] for the interpolation-set discipline.
pub fn threshold_signature_recover(
    threshold: u32,
    partials: &[Eval<group::Signature>],
) -> Result<group::Signature, Error> {
    poly::recover(threshold, partials)
}

/// Deals `n` key shares with the provided `threshold`, returning the public
/// commitment alongside them.
///
/// This is a trusted-dealer derivation for fixtures and local setups; shares
/// produced by a distributed key generation ceremony plug into the same
/// [`Share`] type.
pub fn generate_shares<R: RngCore>(
    rng: &mut R,
    n: u32,
    threshold: u32,
) -> (poly::Public, Vec<Share>) {
    assert!(threshold > 0 && threshold <= n, "invalid threshold");
    let private = poly::Private::rand(rng, threshold - 1);
    let public = private.commit();
    let shares = (0..n)
        .map(|index| Share {
            index,
            private: private.evaluate(index).value,
        })
        .collect();
    (public, shares)
}
