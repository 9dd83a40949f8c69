//! Cryptographic primitives for assembling quorum certificates.
//!
//! This crate wraps the [blst](https://github.com/supranational/blst) BLS12-381
//! backend with the operations a vote-certification core needs: plain and
//! partial (threshold) signatures over a namespaced message, signature and
//! public-key aggregation, and Lagrange recovery of a group signature from a
//! threshold number of shares.
//!
//! Keys and signatures are exposed as opaque group elements with fixed-size
//! compressed encodings; deserialization always performs subgroup membership
//! checks so elements received from untrusted peers are safe to use.

pub mod bls12381;

/// Converts a byte slice to a lowercase hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
