// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote record store used as the synchronization peer.
//!
//! The store is a versioned key-value service: every save names the version
//! it was based on, and a save against a stale version is rejected with the
//! server's current copy so the caller can merge and retry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// A stored blob and its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub version: u64,
    pub payload: String,
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: u64 },
    /// The server copy changed since it was read.
    Conflict(RemoteRecord),
}

/// Errors talking to the remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Unavailable(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::InvalidResponse(_) => false,
        }
    }
}

/// Versioned key-value store reachable over the network.
pub trait RemoteStore: Send + Sync {
    fn fetch(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<RemoteRecord>, RemoteError>> + Send;

    /// Save `payload`, expecting the server copy to be at `expected_version`
    /// (`None` when the key did not exist when read).
    fn save(
        &self,
        key: &str,
        payload: &str,
        expected_version: Option<u64>,
    ) -> impl Future<Output = Result<SaveOutcome, RemoteError>> + Send;
}

// ─────────────────────────────────────────────────────────────────────────────
// HttpRemoteStore - production client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SaveRequest<'a> {
    payload: &'a str,
    expected_version: Option<u64>,
}

#[derive(Deserialize)]
struct SaveResponse {
    version: u64,
}

/// JSON-over-HTTP remote store.
///
/// `GET {base}/records/{key}` returns a [`RemoteRecord`] (404 when absent);
/// `PUT {base}/records/{key}` returns `{"version": n}` or 409 with the
/// server's current record.
#[derive(Clone)]
pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn record_url(&self, key: &str) -> String {
        format!("{}/records/{}", self.base_url, urlencoding::encode(key))
    }

    async fn error_for(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if status == 429 {
            tracing::warn!("Remote store rate limit hit (429)");
        }
        RemoteError::Status { status, body }
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, key: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        let response = self
            .http
            .get(self.record_url(key))
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        response
            .json::<RemoteRecord>()
            .await
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn save(
        &self,
        key: &str,
        payload: &str,
        expected_version: Option<u64>,
    ) -> Result<SaveOutcome, RemoteError> {
        let response = self
            .http
            .put(self.record_url(key))
            .json(&SaveRequest {
                payload,
                expected_version,
            })
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            let server_copy = response
                .json::<RemoteRecord>()
                .await
                .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
            return Ok(SaveOutcome::Conflict(server_copy));
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let saved = response
            .json::<SaveResponse>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(SaveOutcome::Saved {
            version: saved.version,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRemoteStore - in-process peer for tests and offline use
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory remote store with hooks for simulating other writers and
/// network failures.
#[derive(Default)]
pub struct MemoryRemoteStore {
    records: Mutex<HashMap<String, RemoteRecord>>,
    /// Writes from "another device" applied just before the next saves.
    interleaved_writes: Mutex<HashMap<String, Vec<String>>>,
    failing_fetches: AtomicU32,
    save_attempts: AtomicU32,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a record as another device would, bumping its version.
    pub fn put_direct(&self, key: &str, payload: &str) {
        if let Ok(mut records) = self.records.lock() {
            Self::write(&mut records, key, payload);
        }
    }

    /// Queue a foreign write that lands between our next read and save.
    pub fn interleave_write(&self, key: &str, payload: &str) {
        if let Ok(mut pending) = self.interleaved_writes.lock() {
            pending
                .entry(key.to_string())
                .or_default()
                .push(payload.to_string());
        }
    }

    /// Make the next `count` fetches fail as if the network were down.
    pub fn fail_next_fetches(&self, count: u32) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    pub fn record(&self, key: &str) -> Option<RemoteRecord> {
        self.records.lock().ok()?.get(key).cloned()
    }

    /// Number of save calls received.
    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::SeqCst)
    }

    fn write(records: &mut HashMap<String, RemoteRecord>, key: &str, payload: &str) -> u64 {
        let version = records.get(key).map_or(1, |r| r.version + 1);
        records.insert(
            key.to_string(),
            RemoteRecord {
                version,
                payload: payload.to_string(),
            },
        );
        version
    }

    fn poisoned() -> RemoteError {
        RemoteError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, key: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        let failing = self.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_fetches.store(failing - 1, Ordering::SeqCst);
            return Err(RemoteError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.record(key))
    }

    async fn save(
        &self,
        key: &str,
        payload: &str,
        expected_version: Option<u64>,
    ) -> Result<SaveOutcome, RemoteError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);

        let foreign = self
            .interleaved_writes
            .lock()
            .map_err(|_| Self::poisoned())?
            .get_mut(key)
            .and_then(|queue| (!queue.is_empty()).then(|| queue.remove(0)));

        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        if let Some(foreign) = foreign {
            Self::write(&mut records, key, &foreign);
        }

        let current = records.get(key).cloned();
        if current.as_ref().map(|r| r.version) != expected_version {
            return match current {
                Some(server_copy) => Ok(SaveOutcome::Conflict(server_copy)),
                None => Err(RemoteError::InvalidResponse(format!(
                    "record {key} vanished"
                ))),
            };
        }

        let version = Self::write(&mut records, key, payload);
        Ok(SaveOutcome::Saved { version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_fetch() {
        let store = MemoryRemoteStore::new();
        let outcome = store.save("k", "v1", None).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { version: 1 });

        let record = store.fetch("k").await.unwrap().expect("record exists");
        assert_eq!(record.payload, "v1");
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts_with_server_copy() {
        let store = MemoryRemoteStore::new();
        store.put_direct("k", "theirs");

        let outcome = store.save("k", "ours", None).await.unwrap();
        match outcome {
            SaveOutcome::Conflict(server) => {
                assert_eq!(server.payload, "theirs");
                assert_eq!(server.version, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interleaved_write_forces_conflict() {
        let store = MemoryRemoteStore::new();
        store.put_direct("k", "v1");
        store.interleave_write("k", "foreign");

        let outcome = store.save("k", "ours", Some(1)).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Conflict(ref r) if r.payload == "foreign"));

        // The queued write is consumed; a save on the new version succeeds.
        let outcome = store.save("k", "ours", Some(2)).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { version: 3 });
    }

    #[tokio::test]
    async fn test_simulated_outage() {
        let store = MemoryRemoteStore::new();
        store.fail_next_fetches(1);
        assert!(store.fetch("k").await.unwrap_err().is_transient());
        assert!(store.fetch("k").await.unwrap().is_none());
    }

    #[test]
    fn test_status_transience() {
        let server = RemoteError::Status {
            status: 503,
            body: String::new(),
        };
        let client = RemoteError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }
}
