// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - detection pipeline and its collaborators.

pub mod achievements;
pub mod delivery;
pub mod detector;
pub mod facts;
pub mod location_filter;
pub mod notifications;
pub mod positioning;
pub mod quadtree;
pub mod region_index;
pub mod sync;
pub mod tracker;

pub use achievements::AchievementEvaluator;
pub use delivery::{ChannelSink, DeliveryError, NotificationSink, RecordingSink};
pub use detector::{DetectionMethod, DetectionOutcome, RegionEntry, RegionTransitionDetector};
pub use facts::{generic_fact, FactProvider, HttpFactProvider, StaticFactProvider};
pub use location_filter::{LocationFilter, Rejection};
pub use notifications::NotificationDecider;
pub use positioning::{PositionSource, PositioningError, ReplaySource};
pub use region_index::{RegionIndex, RegionIndexError};
pub use sync::{SyncError, SyncService};
pub use tracker::{
    start_tracking, synchronize, EntryOutcome, Tracker, TrackerError, TrackerHandle,
    TrackerSnapshot,
};
