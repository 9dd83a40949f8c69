//! Wrappers around the BLS12-381 scalar field and the G1/G2 groups.
//!
//! # Warning
//!
//! Points decoded from bytes must belong to the correct prime-order subgroup
//! to rule out small-subgroup attacks. [`G1::from_bytes`] and
//! [`G2::from_bytes`] perform these checks; never construct points from
//! untrusted data any other way.

use super::Error;
use crate::hex;
use blst::{
    blst_bendian_from_scalar, blst_fr, blst_fr_add, blst_fr_from_scalar, blst_fr_from_uint64,
    blst_fr_inverse, blst_fr_mul, blst_fr_sub, blst_hash_to_g2, blst_keygen, blst_p1,
    blst_p1_add_or_double, blst_p1_affine, blst_p1_compress, blst_p1_from_affine, blst_p1_in_g1,
    blst_p1_is_inf, blst_p1_mult, blst_p1_to_affine, blst_p1_uncompress, blst_p2,
    blst_p2_add_or_double, blst_p2_affine, blst_p2_compress, blst_p2_from_affine, blst_p2_in_g2,
    blst_p2_is_inf, blst_p2_mult, blst_p2_to_affine, blst_p2_uncompress, blst_scalar,
    blst_scalar_from_bendian, blst_scalar_from_fr, blst_sk_check, Pairing, BLS12_381_G1,
    BLS12_381_G2, BLS12_381_NEG_G1, BLST_ERROR,
};
use rand::RngCore;
use std::{
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
    ptr,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain separation tag applied when hashing a message to the curve.
///
/// Reference: <https://datatracker.ietf.org/doc/html/draft-irtf-cfrg-bls-signature-05#name-ciphersuites>
pub type Dst = &'static [u8];

/// Domain separation tag for hashing a message to G2.
///
/// The `POP` ciphersuite is used for all messages: any signature produced
/// here may be combined into an aggregate, and aggregation is only safe in a
/// Byzantine environment when every key carries a proof of possession.
pub const MESSAGE: Dst = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Domain separation tag for hashing a proof of possession to G2.
pub const PROOF_OF_POSSESSION: Dst = b"BLS_POP_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Length of a canonically encoded scalar (big-endian, 256 bits).
pub const SCALAR_LENGTH: usize = 32;

/// Length of a compressed G1 element.
pub const G1_LENGTH: usize = 48;

/// Length of a compressed G2 element.
pub const G2_LENGTH: usize = 96;

/// Effective bit-length of the scalar field modulus `r`.
///
/// Scalar multiplication always iterates over the full modulus width so the
/// operation count does not depend on the scalar value.
const SCALAR_BITS: usize = 255;

/// An element of an additive group with a scalar action.
pub trait Element: Clone + Eq + Send + Sync {
    /// Returns the additive identity.
    fn zero() -> Self;

    /// Returns the group generator (or the field's one, for scalars).
    fn one() -> Self;

    /// Adds `rhs` to self in-place.
    fn add(&mut self, rhs: &Self);

    /// Multiplies self by the scalar in-place.
    fn mul(&mut self, rhs: &Scalar);
}

/// An element of the BLS12-381 scalar field `F_r`.
///
/// `#[repr(transparent)]` over [`blst_fr`], so values pass across the FFI
/// boundary without conversion. Arithmetic is modulo the group order
/// `r = 0x73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001`.
#[derive(Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct Scalar(blst_fr);

/// `1` in the scalar field's Montgomery representation (`2^256 mod r`).
///
/// Reference: <https://github.com/filecoin-project/blstrs/blob/ffbb41d1495d84e40a712583346439924603b49a/src/scalar.rs#L77-L89>
const FR_ONE: Scalar = Scalar(blst_fr {
    l: [
        0x0000_0001_ffff_fffe,
        0x5884_b7fa_0003_4802,
        0x998c_4fef_ecbc_4ff5,
        0x1824_b159_acc5_056f,
    ],
});

/// A point on the G1 curve.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct G1(blst_p1);

/// A point on the G2 curve.
#[derive(Clone, Copy, Eq, PartialEq)]
#[repr(transparent)]
pub struct G2(blst_p2);

/// The private key type.
pub type Private = Scalar;

/// The public key type (G1, 48 bytes compressed).
pub type Public = G1;

/// The signature type (G2, 96 bytes compressed).
pub type Signature = G2;

/// Maps a `blst` decoding failure to a static reason.
fn decode_reason(err: BLST_ERROR) -> &'static str {
    match err {
        BLST_ERROR::BLST_BAD_ENCODING => "bad encoding",
        BLST_ERROR::BLST_POINT_NOT_ON_CURVE => "not on curve",
        BLST_ERROR::BLST_POINT_NOT_IN_GROUP => "not in group",
        _ => "invalid point",
    }
}

impl Scalar {
    /// Samples a uniformly random scalar from the provided RNG.
    pub fn rand<R: RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 64];
        rng.fill_bytes(&mut ikm);
        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_keygen(&mut sc, ikm.as_ptr(), ikm.len(), ptr::null(), 0);
            blst_fr_from_scalar(&mut ret, &sc);
        }
        ikm.zeroize();
        Self(ret)
    }

    /// Sets the scalar to the provided small integer.
    pub fn set_int(&mut self, i: u32) {
        // blst reads 4 limbs regardless of the value, so the buffer must be
        // fully populated.
        let limbs = [i as u64, 0, 0, 0];
        unsafe { blst_fr_from_uint64(&mut self.0, limbs.as_ptr()) };
    }

    /// Returns the multiplicative inverse, or `None` for zero.
    pub fn inverse(&self) -> Option<Self> {
        if *self == Self::zero() {
            return None;
        }
        let mut ret = blst_fr::default();
        unsafe { blst_fr_inverse(&mut ret, &self.0) };
        Some(Self(ret))
    }

    /// Subtracts `rhs` from self in-place.
    pub fn sub(&mut self, rhs: &Self) {
        unsafe { blst_fr_sub(&mut self.0, &self.0, &rhs.0) }
    }

    /// Encodes the scalar in canonical big-endian form.
    pub fn to_bytes(&self) -> [u8; SCALAR_LENGTH] {
        let mut out = [0u8; SCALAR_LENGTH];
        unsafe {
            let mut sc = blst_scalar::default();
            blst_scalar_from_fr(&mut sc, &self.0);
            blst_bendian_from_scalar(out.as_mut_ptr(), &sc);
        }
        out
    }

    /// Decodes a canonical big-endian scalar, rejecting zero and values
    /// outside `[1, r)`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; SCALAR_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidElement("scalar", "wrong length"))?;
        let mut ret = blst_fr::default();
        unsafe {
            let mut sc = blst_scalar::default();
            blst_scalar_from_bendian(&mut sc, bytes.as_ptr());
            // `blst_sk_check` validates the range and rejects zero, matching
            // post-draft-3 IETF key validation.
            if !blst_sk_check(&sc) {
                return Err(Error::InvalidElement("scalar", "out of range"));
            }
            blst_fr_from_scalar(&mut ret, &sc);
        }
        Ok(Self(ret))
    }
}

impl Element for Scalar {
    fn zero() -> Self {
        Self(blst_fr::default())
    }

    fn one() -> Self {
        FR_ONE
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_fr_add(&mut self.0, &self.0, &rhs.0) }
    }

    fn mul(&mut self, rhs: &Scalar) {
        unsafe { blst_fr_mul(&mut self.0, &self.0, &rhs.0) }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

impl Debug for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.to_bytes()))
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.l.zeroize();
    }
}

impl Drop for Scalar {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for Scalar {}

/// A share of a threshold signing key.
///
/// The share's secret is the dealing polynomial evaluated at `index + 1`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Share {
    /// The share's evaluation index in `[0, n)`.
    pub index: u32,
    /// The secret scalar for this share.
    pub private: Private,
}

impl Share {
    /// Returns the public key share, verifiable against the public polynomial.
    pub fn public(&self) -> Public {
        let mut public = G1::one();
        public.mul(&self.private);
        public
    }
}

impl Debug for Share {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        write!(f, "Share(index={})", self.index)
    }
}

impl G1 {
    /// Encodes the point in compressed form.
    pub fn to_bytes(&self) -> [u8; G1_LENGTH] {
        let mut out = [0u8; G1_LENGTH];
        unsafe { blst_p1_compress(out.as_mut_ptr(), &self.0) };
        out
    }

    /// Decodes a compressed point, enforcing subgroup membership and
    /// rejecting the point at infinity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; G1_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidElement("G1", "wrong length"))?;
        let mut ret = blst_p1::default();
        unsafe {
            let mut affine = blst_p1_affine::default();
            match blst_p1_uncompress(&mut affine, bytes.as_ptr()) {
                BLST_ERROR::BLST_SUCCESS => {}
                err => return Err(Error::InvalidElement("G1", decode_reason(err))),
            }
            blst_p1_from_affine(&mut ret, &affine);
            if blst_p1_is_inf(&ret) {
                return Err(Error::InvalidElement("G1", "infinity"));
            }
            if !blst_p1_in_g1(&ret) {
                return Err(Error::InvalidElement("G1", "outside subgroup"));
            }
        }
        Ok(Self(ret))
    }
}

impl Element for G1 {
    fn zero() -> Self {
        Self(blst_p1::default())
    }

    fn one() -> Self {
        let mut ret = blst_p1::default();
        unsafe { blst_p1_from_affine(&mut ret, &BLS12_381_G1) };
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_p1_add_or_double(&mut self.0, &self.0, &rhs.0) };
    }

    fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe {
            blst_scalar_from_fr(&mut scalar, &rhs.0);
            // Fixed iteration count, independent of the scalar value.
            blst_p1_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }
}

impl Hash for G1 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

impl Debug for G1 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.to_bytes()))
    }
}

impl G2 {
    /// Encodes the point in compressed form.
    pub fn to_bytes(&self) -> [u8; G2_LENGTH] {
        let mut out = [0u8; G2_LENGTH];
        unsafe { blst_p2_compress(out.as_mut_ptr(), &self.0) };
        out
    }

    /// Decodes a compressed point, enforcing subgroup membership and
    /// rejecting the point at infinity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; G2_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidElement("G2", "wrong length"))?;
        let mut ret = blst_p2::default();
        unsafe {
            let mut affine = blst_p2_affine::default();
            match blst_p2_uncompress(&mut affine, bytes.as_ptr()) {
                BLST_ERROR::BLST_SUCCESS => {}
                err => return Err(Error::InvalidElement("G2", decode_reason(err))),
            }
            blst_p2_from_affine(&mut ret, &affine);
            if blst_p2_is_inf(&ret) {
                return Err(Error::InvalidElement("G2", "infinity"));
            }
            if !blst_p2_in_g2(&ret) {
                return Err(Error::InvalidElement("G2", "outside subgroup"));
            }
        }
        Ok(Self(ret))
    }

    /// Hashes the provided message onto the curve under `dst`.
    pub fn map(&mut self, dst: Dst, message: &[u8]) {
        unsafe {
            blst_hash_to_g2(
                &mut self.0,
                message.as_ptr(),
                message.len(),
                dst.as_ptr(),
                dst.len(),
                ptr::null(),
                0,
            );
        }
    }
}

impl Element for G2 {
    fn zero() -> Self {
        Self(blst_p2::default())
    }

    fn one() -> Self {
        let mut ret = blst_p2::default();
        unsafe { blst_p2_from_affine(&mut ret, &BLS12_381_G2) };
        Self(ret)
    }

    fn add(&mut self, rhs: &Self) {
        unsafe { blst_p2_add_or_double(&mut self.0, &self.0, &rhs.0) };
    }

    fn mul(&mut self, rhs: &Scalar) {
        let mut scalar = blst_scalar::default();
        unsafe {
            blst_scalar_from_fr(&mut scalar, &rhs.0);
            // Fixed iteration count, independent of the scalar value.
            blst_p2_mult(&mut self.0, &self.0, scalar.b.as_ptr(), SCALAR_BITS);
        }
    }
}

impl Hash for G2 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

impl Debug for G2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.to_bytes()))
    }
}

/// Checks that `signature` was produced over the hashed message `hm` by the
/// secret key behind `public`, i.e. `e(public, hm) == e(G1::one(), signature)`.
///
/// Both sides are folded into one Miller-loop accumulation,
/// `e(public, hm) * e(-G1::one(), signature)`, which must land on the
/// identity; this saves a second final exponentiation.
pub(super) fn equal(public: &G1, signature: &G2, hm: &G2) -> bool {
    // The accumulator only consumes affine points, so convert everything up
    // front.
    let mut public_affine = blst_p1_affine::default();
    let mut hm_affine = blst_p2_affine::default();
    let mut sig_affine = blst_p2_affine::default();
    unsafe {
        blst_p1_to_affine(&mut public_affine, &public.0);
        blst_p2_to_affine(&mut hm_affine, &hm.0);
        blst_p2_to_affine(&mut sig_affine, &signature.0);
    }

    // Hashing to the curve happened upstream, so no DST is supplied here.
    let mut acc = Pairing::new(false, &[]);
    acc.raw_aggregate(&hm_affine, &public_affine);
    unsafe {
        acc.raw_aggregate(&sig_affine, &BLS12_381_NEG_G1);
    }
    acc.commit();
    acc.finalverify(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn test_scalar_arithmetic() {
        let s = Scalar::rand(&mut thread_rng());

        // (s + s) * s computed two ways.
        let mut lhs = s.clone();
        lhs.add(&s);
        lhs.mul(&s);
        let mut rhs = s.clone();
        rhs.mul(&s);
        let double = rhs.clone();
        rhs.add(&double);
        assert_eq!(lhs, rhs);

        // s * s^-1 == 1
        let mut inv = s.inverse().unwrap();
        inv.mul(&s);
        assert_eq!(inv, Scalar::one());
    }

    #[test]
    fn test_point_arithmetic() {
        let s = Scalar::rand(&mut thread_rng());
        let mut two_s = s.clone();
        two_s.add(&s);

        // (2s)G == sG + sG
        let mut p1 = G1::one();
        p1.mul(&two_s);
        let mut p2 = G1::one();
        p2.mul(&s);
        let half = p2;
        p2.add(&half);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_scalar_roundtrip() {
        let original = Scalar::rand(&mut thread_rng());
        let decoded = Scalar::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_scalar_rejects_zero() {
        assert!(Scalar::from_bytes(&[0u8; SCALAR_LENGTH]).is_err());
    }

    #[test]
    fn test_g1_roundtrip() {
        let mut original = G1::one();
        original.mul(&Scalar::rand(&mut thread_rng()));
        let decoded = G1::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
        assert!(G1::from_bytes(&[0u8; G1_LENGTH]).is_err());
        assert!(G1::from_bytes(&[7u8; 12]).is_err());
    }

    #[test]
    fn test_g2_roundtrip() {
        let mut original = G2::one();
        original.mul(&Scalar::rand(&mut thread_rng()));
        let decoded = G2::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
        assert!(G2::from_bytes(&[0u8; G2_LENGTH]).is_err());
    }

    #[test]
    fn test_share_public() {
        let private = Scalar::rand(&mut thread_rng());
        let share = Share {
            index: 3,
            private: private.clone(),
        };
        let mut expected = G1::one();
        expected.mul(&private);
        assert_eq!(share.public(), expected);
    }
}
