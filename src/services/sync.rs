// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciliation of local state with the remote store.
//!
//! Every sync is read, merge, write. Merges are commutative and idempotent,
//! so a write rejected because another device got there first is simply
//! merged with the server's copy and retried. Transient network failures
//! are retried with exponential backoff. Both kinds of retry are bounded by
//! `max_attempts`.

use crate::config::SyncConfig;
use crate::db::codec::{self, CodecError};
use crate::db::keys;
use crate::db::remote::{RemoteError, RemoteRecord, RemoteStore, SaveOutcome};
use crate::models::{merge_histories, merge_ledgers, AchievementLedger, VisitHistory};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Write to {key} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { key: String, attempts: u32 },

    #[error("Remote {key} uses schema version {version}, which this build cannot read")]
    UnsupportedRemoteSchema { key: String, version: u32 },

    #[error("Failed to encode local state: {0}")]
    Encode(#[from] CodecError),
}

impl SyncError {
    /// Whether a later sync could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_transient(),
            SyncError::ConflictRetriesExhausted { .. } => true,
            SyncError::UnsupportedRemoteSchema { .. } | SyncError::Encode(_) => false,
        }
    }
}

/// How one blob type is decoded, encoded and merged.
struct BlobKind<T> {
    key: &'static str,
    decode: fn(&str) -> Result<T, CodecError>,
    encode: fn(&T) -> Result<String, CodecError>,
    merge: fn(&T, &T) -> T,
}

const VISITS: BlobKind<VisitHistory> = BlobKind {
    key: keys::VISIT_HISTORY,
    decode: codec::decode_visits,
    encode: codec::encode_visits,
    merge: merge_histories,
};

const ACHIEVEMENTS: BlobKind<AchievementLedger> = BlobKind {
    key: keys::ACHIEVEMENTS,
    decode: codec::decode_ledger,
    encode: codec::encode_ledger,
    merge: merge_ledgers,
};

/// Synchronizes visit history and achievements with a remote store.
pub struct SyncService<R> {
    remote: Arc<R>,
    config: SyncConfig,
}

impl<R> Clone for SyncService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: RemoteStore> SyncService<R> {
    pub fn new(remote: Arc<R>, config: SyncConfig) -> Self {
        Self { remote, config }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Merge `local` with the remote history and write the result back.
    /// Returns the merged history, which the caller applies locally.
    pub async fn sync_visits(&self, local: &VisitHistory) -> Result<VisitHistory, SyncError> {
        self.reconcile(&VISITS, local).await
    }

    pub async fn sync_achievements(
        &self,
        local: &AchievementLedger,
    ) -> Result<AchievementLedger, SyncError> {
        self.reconcile(&ACHIEVEMENTS, local).await
    }

    /// Sync both blobs concurrently.
    pub async fn sync_all(
        &self,
        visits: &VisitHistory,
        achievements: &AchievementLedger,
    ) -> Result<(VisitHistory, AchievementLedger), SyncError> {
        futures_util::future::try_join(
            self.sync_visits(visits),
            self.sync_achievements(achievements),
        )
        .await
    }

    async fn reconcile<T: Clone + Default>(
        &self,
        kind: &BlobKind<T>,
        local: &T,
    ) -> Result<T, SyncError> {
        let mut server = self.fetch(kind.key).await?;
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            let merged = match &server {
                Some(record) => (kind.merge)(local, &decode_or_empty(kind, record)?),
                None => local.clone(),
            };
            let payload = (kind.encode)(&merged)?;
            let expected_version = server.as_ref().map(|r| r.version);

            match self.save(kind.key, &payload, expected_version).await? {
                SaveOutcome::Saved { version } => {
                    tracing::info!(key = kind.key, version, attempt, "Sync complete");
                    return Ok(merged);
                }
                SaveOutcome::Conflict(current) => {
                    tracing::warn!(
                        key = kind.key,
                        attempt,
                        server_version = current.version,
                        "Remote copy changed during sync, merging again"
                    );
                    server = Some(current);
                }
            }
        }

        Err(SyncError::ConflictRetriesExhausted {
            key: kind.key.to_string(),
            attempts,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<RemoteRecord>, SyncError> {
        let mut attempt = 1;
        loop {
            match self.remote.fetch(key).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    self.back_off(key, attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn save(
        &self,
        key: &str,
        payload: &str,
        expected_version: Option<u64>,
    ) -> Result<SaveOutcome, SyncError> {
        let mut attempt = 1;
        loop {
            match self.remote.save(key, payload, expected_version).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    self.back_off(key, attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn back_off(&self, key: &str, attempt: u32, error: &RemoteError) {
        let delay = backoff_delay(self.config.base_backoff, attempt);
        tracing::warn!(
            key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Remote store call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// `base * 2^(attempt - 1)`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

/// A corrupt remote blob merges as empty rather than failing the sync.
///
/// A blob written under another schema version is left alone: overwriting
/// it would drop whatever the other device stored.
fn decode_or_empty<T: Default>(kind: &BlobKind<T>, record: &RemoteRecord) -> Result<T, SyncError> {
    match (kind.decode)(&record.payload) {
        Ok(decoded) => Ok(decoded),
        Err(CodecError::UnsupportedVersion(version)) => {
            tracing::error!(key = kind.key, version, "Remote blob has an unreadable schema version");
            Err(SyncError::UnsupportedRemoteSchema {
                key: kind.key.to_string(),
                version,
            })
        }
        Err(e) => {
            tracing::warn!(key = kind.key, error = %e, "Corrupt remote blob, treating as empty");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_transience() {
        let exhausted = SyncError::ConflictRetriesExhausted {
            key: "k".into(),
            attempts: 3,
        };
        assert!(exhausted.is_transient());
        assert!(!SyncError::UnsupportedRemoteSchema {
            key: "k".into(),
            version: 2,
        }
        .is_transient());
        assert!(!SyncError::Remote(RemoteError::InvalidResponse("bad".into())).is_transient());
    }
}
