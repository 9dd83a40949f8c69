//! Packing of aggregated signature data into the block header.
//!
//! The layout is consensus-critical: every node must produce byte-identical
//! output for byte-identical input.
//!
//! ```text
//! +----+-----------------------------------------+
//! |  1 | version (0x01)                          |
//! |  2 | u16 BE: number of staking signers       |
//! |  2 | u16 BE: number of beacon signers        |
//! |  k | staking signer bitmap, k = ceil(N/8)    |
//! |  k | beacon signer bitmap                    |
//! |  4 | u32 BE: aggregated staking sig length   |
//! |    | aggregated staking sig                  |
//! |  4 | u32 BE: aggregated beacon sig length    |
//! |    | aggregated beacon sig                   |
//! |  4 | u32 BE: reconstructed sig length        |
//! |    | reconstructed sig                       |
//! +----+-----------------------------------------+
//! ```
//!
//! Bitmaps follow the committee's canonical order with the most significant
//! bit of each byte first: bit 7 of byte 0 is the first committee member.
//! Signer ids are never carried; the committee is derived from the block
//! being certified, which is why unpacking takes a [BlockId].

use crate::{
    committee::Committee,
    types::{BlockId, BlockSignatureData, SignerId},
};
use bytes::{Buf, BufMut, BytesMut};
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;

/// The only supported signature data layout version.
pub const SIG_DATA_VERSION: u8 = 0x01;

/// Resolves the committee authorized to certify a block.
///
/// Implemented by the consensus engine on top of its protocol state.
pub trait CommitteeProvider: Send + Sync {
    fn committee(&self, block: &BlockId) -> Option<Arc<Committee>>;
}

/// Errors returned when packing or unpacking signature data.
///
/// Any error on the unpack side is fatal for the peer's proposal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no committee for block {0:?}")]
    UnknownBlock(BlockId),
    #[error("signer is not a committee member: {0:?}")]
    UnknownSigner(SignerId),
    #[error("too many signers: {0}")]
    TooManySigners(usize),
    #[error("malformed signature data: {0}")]
    MalformedSigData(&'static str),
    #[error("unknown signature data version: {0:#04x}")]
    UnknownVersion(u8),
    #[error("signer count mismatch: {0}")]
    SignerCountMismatch(&'static str),
    #[error("{0} trailing bytes after signature data")]
    TrailingBytes(usize),
}

/// Serializes [BlockSignatureData] to and from the block header's signature
/// data field.
pub struct Packer<P: CommitteeProvider> {
    provider: P,
}

impl<P: CommitteeProvider> Packer<P> {
    /// Creates a packer over the provided committee source.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Packs the aggregated signature data for the provided block.
    pub fn pack(&self, block: &BlockId, data: &BlockSignatureData) -> Result<Vec<u8>, Error> {
        let committee = self
            .provider
            .committee(block)
            .ok_or(Error::UnknownBlock(*block))?;
        if data.staking_signers.len() > u16::MAX as usize {
            return Err(Error::TooManySigners(data.staking_signers.len()));
        }
        if data.random_beacon_signers.len() > u16::MAX as usize {
            return Err(Error::TooManySigners(data.random_beacon_signers.len()));
        }

        let bitmap_len = bitmap_len(committee.len());
        let staking_bitmap = encode_bitmap(&committee, &data.staking_signers, bitmap_len)?;
        let beacon_bitmap = encode_bitmap(&committee, &data.random_beacon_signers, bitmap_len)?;

        let mut out = BytesMut::with_capacity(
            1 + 2
                + 2
                + 2 * bitmap_len
                + 4
                + data.aggregated_staking_sig.len()
                + 4
                + data.aggregated_random_beacon_sig.len()
                + 4
                + data.reconstructed_random_beacon_sig.len(),
        );
        out.put_u8(SIG_DATA_VERSION);
        out.put_u16(data.staking_signers.len() as u16);
        out.put_u16(data.random_beacon_signers.len() as u16);
        out.put_slice(&staking_bitmap);
        out.put_slice(&beacon_bitmap);
        for blob in [
            &data.aggregated_staking_sig,
            &data.aggregated_random_beacon_sig,
            &data.reconstructed_random_beacon_sig,
        ] {
            let len =
                u32::try_from(blob.len()).map_err(|_| Error::MalformedSigData("oversized blob"))?;
            out.put_u32(len);
            out.put_slice(blob);
        }
        Ok(out.to_vec())
    }

    /// Unpacks the signature data of a received proposal.
    ///
    /// `signers` is the voter set carried by the block header; it must equal
    /// the union of the two bitmap sets.
    pub fn unpack(
        &self,
        block: &BlockId,
        signers: &[SignerId],
        sig_data: &[u8],
    ) -> Result<BlockSignatureData, Error> {
        let committee = self
            .provider
            .committee(block)
            .ok_or(Error::UnknownBlock(*block))?;

        let mut buf = sig_data;
        if buf.remaining() < 1 {
            return Err(Error::MalformedSigData("missing version"));
        }
        let version = buf.get_u8();
        if version != SIG_DATA_VERSION {
            return Err(Error::UnknownVersion(version));
        }
        if buf.remaining() < 4 {
            return Err(Error::MalformedSigData("truncated signer counts"));
        }
        let staking_count = buf.get_u16() as usize;
        let beacon_count = buf.get_u16() as usize;

        let bitmap_len = bitmap_len(committee.len());
        if buf.remaining() < 2 * bitmap_len {
            return Err(Error::MalformedSigData("truncated signer bitmaps"));
        }
        let mut staking_bitmap = vec![0u8; bitmap_len];
        buf.copy_to_slice(&mut staking_bitmap);
        let mut beacon_bitmap = vec![0u8; bitmap_len];
        buf.copy_to_slice(&mut beacon_bitmap);

        let staking_signers = decode_bitmap(&committee, &staking_bitmap)?;
        if staking_signers.len() != staking_count {
            return Err(Error::SignerCountMismatch(
                "staking bitmap does not match count",
            ));
        }
        let random_beacon_signers = decode_bitmap(&committee, &beacon_bitmap)?;
        if random_beacon_signers.len() != beacon_count {
            return Err(Error::SignerCountMismatch(
                "beacon bitmap does not match count",
            ));
        }

        // The header's voter set must be exactly the union of the bitmaps.
        let union: BTreeSet<SignerId> = staking_signers
            .iter()
            .chain(random_beacon_signers.iter())
            .copied()
            .collect();
        let provided: BTreeSet<SignerId> = signers.iter().copied().collect();
        if union != provided {
            return Err(Error::SignerCountMismatch(
                "voter set does not match bitmaps",
            ));
        }

        let aggregated_staking_sig = read_blob(&mut buf)?;
        let aggregated_random_beacon_sig = read_blob(&mut buf)?;
        let reconstructed_random_beacon_sig = read_blob(&mut buf)?;
        if buf.has_remaining() {
            return Err(Error::TrailingBytes(buf.remaining()));
        }

        Ok(BlockSignatureData {
            staking_signers,
            random_beacon_signers,
            aggregated_staking_sig,
            aggregated_random_beacon_sig,
            reconstructed_random_beacon_sig,
        })
    }
}

/// Bytes needed for one committee bitmap.
fn bitmap_len(members: usize) -> usize {
    (members + 7) / 8
}

/// Encodes a signer set as a committee-ordered bitmap.
fn encode_bitmap(
    committee: &Committee,
    signers: &[SignerId],
    bitmap_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut bitmap = vec![0u8; bitmap_len];
    for signer in signers {
        let position = committee
            .position(signer)
            .ok_or(Error::UnknownSigner(*signer))?;
        bitmap[position / 8] |= 0x80 >> (position % 8);
    }
    Ok(bitmap)
}

/// Decodes a committee-ordered bitmap into ascending signer ids.
fn decode_bitmap(committee: &Committee, bitmap: &[u8]) -> Result<Vec<SignerId>, Error> {
    let mut signers = Vec::new();
    for position in 0..bitmap.len() * 8 {
        if bitmap[position / 8] & (0x80 >> (position % 8)) == 0 {
            continue;
        }
        let signer = committee
            .signer(position)
            .ok_or(Error::MalformedSigData("signer bit out of range"))?;
        signers.push(*signer);
    }
    Ok(signers)
}

/// Reads one u32-BE-length-prefixed blob.
fn read_blob(buf: &mut &[u8]) -> Result<Vec<u8>, Error> {
    if buf.remaining() < 4 {
        return Err(Error::MalformedSigData("truncated blob length"));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(Error::MalformedSigData("truncated blob"));
    }
    let mut blob = vec![0u8; len];
    buf.copy_to_slice(&mut blob);
    Ok(blob)
}
