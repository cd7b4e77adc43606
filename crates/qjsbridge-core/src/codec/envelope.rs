// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode envelope
//!
//! Engine bytecode is only readable by the engine build that wrote it, and the
//! engine reader trusts its input. The envelope records the writer's identity
//! and a digest of the payload so a blob is checked before the engine sees it.

use super::UnitKind;
use bytes::{Buf, BufMut, BytesMut};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Leading bytes of every blob
pub const MAGIC: &[u8; 4] = b"QJSB";

/// Envelope layout version
pub const FORMAT_VERSION: u8 = 1;

/// Identity of the engine build that reads and writes payloads.
///
/// Written by hand and tracking the rquickjs minor release only: payloads
/// from another quickjs-ng patch release carry the same tag and get past the
/// envelope. Past that point only the engine reader's own bytecode format
/// version guards them. Bump the tag whenever the rquickjs dependency changes.
pub const ENGINE_TAG: &str = "quickjs-ng/rquickjs-0.9";

const DIGEST_LEN: usize = 32;

/// Reasons a blob is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Blob ends before a field is complete
    #[error("blob truncated at offset {offset}: {needed} more bytes needed")]
    Truncated {
        /// Offset of the incomplete field
        offset: usize,
        /// Missing byte count
        needed: usize,
    },

    /// Blob does not start with the envelope magic
    #[error("not a qjsbridge bytecode blob")]
    BadMagic,

    /// Envelope written by a newer or older layout
    #[error("unsupported envelope format {0}")]
    UnsupportedFormat(u8),

    /// Kind byte is neither script nor module
    #[error("unknown unit kind {0}")]
    UnknownKind(u8),

    /// Payload written by a different engine build
    #[error("compiled by '{found}', this build reads '{ENGINE_TAG}'")]
    EngineMismatch {
        /// Engine tag recorded in the blob
        found: String,
    },

    /// Unit name or engine tag is not UTF-8
    #[error("unit name is not valid UTF-8")]
    InvalidName,

    /// Declared payload length disagrees with the blob
    #[error("payload length {declared} does not match the {actual} bytes present")]
    LengthMismatch {
        /// Length recorded in the header
        declared: usize,
        /// Bytes actually following the header
        actual: usize,
    },

    /// Payload does not hash to the recorded digest
    #[error("payload digest mismatch")]
    DigestMismatch,
}

/// Decoded envelope header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    /// Unit name (source filename, module identity)
    pub name: String,
    /// Script or module
    pub kind: UnitKind,
    /// Engine build that wrote the payload
    pub engine_tag: String,
    /// Payload size in bytes
    pub payload_len: usize,
    /// SHA-256 of the payload
    pub digest: [u8; DIGEST_LEN],
}

pub(crate) fn encode(kind: UnitKind, name: &str, payload: &[u8]) -> Vec<u8> {
    let digest: [u8; DIGEST_LEN] = Sha256::digest(payload).into();
    let mut out = BytesMut::with_capacity(
        MAGIC.len() + 3 + ENGINE_TAG.len() + 2 + name.len() + 4 + DIGEST_LEN + payload.len(),
    );

    out.put_slice(MAGIC);
    out.put_u8(FORMAT_VERSION);
    out.put_u8(kind.as_byte());
    out.put_u8(ENGINE_TAG.len() as u8);
    out.put_slice(ENGINE_TAG.as_bytes());
    out.put_u16_le(name.len() as u16);
    out.put_slice(name.as_bytes());
    out.put_u32_le(payload.len() as u32);
    out.put_slice(&digest);
    out.put_slice(payload);

    out.to_vec()
}

/// Check that `needed` bytes remain, reporting where the blob ran out.
fn require(buf: &[u8], total: usize, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::Truncated {
            offset: total - buf.remaining(),
            needed: needed - buf.remaining(),
        });
    }
    Ok(())
}

fn take<'a>(buf: &mut &'a [u8], total: usize, len: usize) -> Result<&'a [u8], DecodeError> {
    require(buf, total, len)?;
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

/// Validate an envelope and split it into header and payload.
pub(crate) fn decode(blob: &[u8]) -> Result<(UnitHeader, &[u8]), DecodeError> {
    let total = blob.len();
    let mut buf = blob;

    if take(&mut buf, total, MAGIC.len()).map_err(|_| DecodeError::BadMagic)? != MAGIC {
        return Err(DecodeError::BadMagic);
    }

    require(buf, total, 3)?;
    let format = buf.get_u8();
    if format != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedFormat(format));
    }
    let kind_byte = buf.get_u8();
    let kind = UnitKind::from_byte(kind_byte).ok_or(DecodeError::UnknownKind(kind_byte))?;

    let tag_len = buf.get_u8() as usize;
    let engine_tag = std::str::from_utf8(take(&mut buf, total, tag_len)?)
        .map_err(|_| DecodeError::InvalidName)?
        .to_string();
    if engine_tag != ENGINE_TAG {
        return Err(DecodeError::EngineMismatch { found: engine_tag });
    }

    require(buf, total, 2)?;
    let name_len = buf.get_u16_le() as usize;
    let name = std::str::from_utf8(take(&mut buf, total, name_len)?)
        .map_err(|_| DecodeError::InvalidName)?
        .to_string();

    require(buf, total, 4)?;
    let payload_len = buf.get_u32_le() as usize;
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(take(&mut buf, total, DIGEST_LEN)?);

    if buf.len() != payload_len {
        return Err(DecodeError::LengthMismatch {
            declared: payload_len,
            actual: buf.len(),
        });
    }
    let actual: [u8; DIGEST_LEN] = Sha256::digest(buf).into();
    if actual != digest {
        return Err(DecodeError::DigestMismatch);
    }

    let header = UnitHeader {
        name,
        kind,
        engine_tag,
        payload_len,
        digest,
    };
    Ok((header, buf))
}
