// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Positioning collaborator interface and a file-backed replay source.

use crate::models::{AuthorizationStatus, Fix};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fixes buffered between the source and the tracker.
const FIX_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum PositioningError {
    #[error("Location access not authorized ({0:?})")]
    NotAuthorized(AuthorizationStatus),

    #[error("Positioning source already started")]
    AlreadyStarted,

    #[error("Failed to read fixes: {0}")]
    Source(String),
}

/// Supplies location fixes on an ongoing basis.
pub trait PositionSource: Send {
    fn authorization(&self) -> AuthorizationStatus;

    /// Begin producing fixes; the receiver closes when the source stops.
    fn start(&mut self) -> Result<mpsc::Receiver<Fix>, PositioningError>;

    fn stop(&mut self);
}

/// Replays a recorded list of fixes in order.
pub struct ReplaySource {
    fixes: Vec<Fix>,
    authorization: AuthorizationStatus,
    /// Pause between fixes (none by default).
    interval: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ReplaySource {
    pub fn new(fixes: Vec<Fix>) -> Self {
        Self {
            fixes,
            authorization: AuthorizationStatus::Always,
            interval: None,
            cancel: None,
        }
    }

    /// Load fixes from a JSON array file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PositioningError> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PositioningError::Source(e.to_string()))?;
        let fixes: Vec<Fix> =
            serde_json::from_str(&data).map_err(|e| PositioningError::Source(e.to_string()))?;
        tracing::info!(
            path = %path.as_ref().display(),
            count = fixes.len(),
            "Loaded recorded fixes"
        );
        Ok(Self::new(fixes))
    }

    pub fn with_authorization(mut self, authorization: AuthorizationStatus) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl PositionSource for ReplaySource {
    fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn start(&mut self) -> Result<mpsc::Receiver<Fix>, PositioningError> {
        if !self.authorization.allows_tracking() {
            return Err(PositioningError::NotAuthorized(self.authorization));
        }
        if self.cancel.is_some() {
            return Err(PositioningError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(FIX_BUFFER);
        let cancel = CancellationToken::new();
        let fixes = self.fixes.clone();
        let interval = self.interval;
        let token = cancel.clone();

        tokio::spawn(async move {
            for fix in fixes {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = tx.send(fix) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                if let Some(interval) = interval {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
            tracing::debug!("Replay source finished");
        });

        self.cancel = Some(cancel);
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixes(n: usize) -> Vec<Fix> {
        (0..n)
            .map(|i| Fix::new(40.0 + i as f64 * 0.01, -100.0, Utc::now()))
            .collect()
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let mut source = ReplaySource::new(fixes(5));
        let mut rx = source.start().unwrap();

        let mut received = Vec::new();
        while let Some(fix) = rx.recv().await {
            received.push(fix.latitude);
        }
        assert_eq!(received.len(), 5);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_denied_source_refuses_to_start() {
        let mut source = ReplaySource::new(fixes(1)).with_authorization(AuthorizationStatus::Denied);
        assert!(matches!(
            source.start(),
            Err(PositioningError::NotAuthorized(AuthorizationStatus::Denied))
        ));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut source = ReplaySource::new(fixes(1));
        let _rx = source.start().unwrap();
        assert!(matches!(source.start(), Err(PositioningError::AlreadyStarted)));
        source.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_stream() {
        let mut source = ReplaySource::new(fixes(10)).with_interval(Duration::from_secs(60));
        let mut rx = source.start().unwrap();
        assert!(rx.recv().await.is_some());
        source.stop();

        let mut remaining = 0;
        while rx.recv().await.is_some() {
            remaining += 1;
        }
        assert!(remaining < 9);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixes.json");
        std::fs::write(
            &path,
            r#"[{"latitude": 39.96, "longitude": -83.0, "speed_mps": 12.5,
                 "timestamp": "2026-06-01T12:00:00Z"}]"#,
        )
        .unwrap();

        let source = ReplaySource::from_file(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert!(ReplaySource::from_file(dir.path().join("missing.json")).is_err());
    }
}
