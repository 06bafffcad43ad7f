// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer: the local key-value store and the remote sync peer.

pub mod codec;
pub mod local;
pub mod remote;

pub use local::{FileStore, KeyValueStore, LocalStore, MemoryStore, StoreError};
pub use remote::{
    HttpRemoteStore, MemoryRemoteStore, RemoteError, RemoteRecord, RemoteStore, SaveOutcome,
};

/// Store keys as constants.
pub mod keys {
    /// Region name -> RegionVisit
    pub const VISIT_HISTORY: &str = "visit_history";
    /// Achievement id -> AchievementRecord
    pub const ACHIEVEMENTS: &str = "achievement_state";
    pub const LAST_NOTIFIED_REGION: &str = "last_notified_region";
    pub const NOTIFICATION_PREFERENCE: &str = "notification_preference";
}
