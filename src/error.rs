// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error type.
//!
//! Inside the pipeline every failure has a degraded fallback; this type is
//! what callers at the edge (the binary, lifecycle hooks) see when an
//! operation could not complete at all.

use crate::config::ConfigError;
use crate::db::local::StoreError;
use crate::services::positioning::PositioningError;
use crate::services::region_index::RegionIndexError;
use crate::services::sync::SyncError;
use crate::services::tracker::TrackerError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Region boundaries unavailable: {0}")]
    Boundaries(#[from] RegionIndexError),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Positioning unavailable: {0}")]
    Positioning(#[from] PositioningError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether retrying the operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Sync(err) => err.is_transient(),
            AppError::Store(StoreError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result type alias for fallible operations
pub type Result<T> = std::result::Result<T, AppError>;
