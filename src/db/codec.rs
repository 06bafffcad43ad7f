// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Explicit encode/decode of the persisted blobs.
//!
//! Both the local store and the remote store carry the same JSON envelope,
//! so a blob written on one device decodes unchanged on another.

use crate::models::{AchievementLedger, VisitHistory};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Current envelope version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    records: T,
}

/// Errors from encoding or decoding a blob.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed blob: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported schema version {0}")]
    UnsupportedVersion(u32),
}

fn encode<T: Serialize>(records: &T) -> Result<String, CodecError> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        records,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Just the version, so a newer record layout is reported as such.
#[derive(Deserialize)]
struct Header {
    schema_version: u32,
}

fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CodecError> {
    let header: Header = serde_json::from_str(payload)?;
    if header.schema_version != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion(header.schema_version));
    }
    let envelope: Envelope<T> = serde_json::from_str(payload)?;
    Ok(envelope.records)
}

pub fn encode_visits(history: &VisitHistory) -> Result<String, CodecError> {
    encode(history)
}

pub fn decode_visits(payload: &str) -> Result<VisitHistory, CodecError> {
    decode(payload)
}

pub fn encode_ledger(ledger: &AchievementLedger) -> Result<String, CodecError> {
    encode(ledger)
}

pub fn decode_ledger(payload: &str) -> Result<AchievementLedger, CodecError> {
    decode(payload)
}
