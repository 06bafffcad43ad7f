// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Notification preferences, decision context and payloads.

use crate::time_utils::is_within;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which region entries the user wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPreference {
    /// Notify on every region entry.
    #[default]
    AllRegions,
    /// Notify only on regions never confirmed before.
    NewRegionsOnly,
}

impl FromStr for NotificationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" | "all_regions" => Ok(NotificationPreference::AllRegions),
            "new" | "new_regions_only" => Ok(NotificationPreference::NewRegionsOnly),
            other => Err(format!("unknown notification preference: {other}")),
        }
    }
}

/// Per-event inputs to the notification decision. Not persisted beyond
/// the decision, except `last_notified_region` which the store keeps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationContext {
    pub last_notified_region: Option<String>,
    pub is_foreground: bool,
    /// When the app last moved from background to foreground.
    pub foregrounded_at: Option<DateTime<Utc>>,
    pub preference: NotificationPreference,
}

impl NotificationContext {
    /// Whether the app came to the foreground within `grace` of `now`.
    pub fn just_foregrounded(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.is_foreground
            && self
                .foregrounded_at
                .is_some_and(|at| is_within(at, now, grace))
    }
}

/// Why a region entry did not produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Same region as the last one notified (boundary jitter).
    RepeatedRegion,
    /// Re-detection of the last notified region right after foregrounding.
    ForegroundDuplicate,
    /// Another notification fired too recently.
    Debounced,
}

/// Outcome of the notification decision for one region entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    Suppress(SuppressReason),
    /// Fire a welcome notification with a region fact.
    Welcome,
    /// Welcome suppressed by preference; fire only if achievements were
    /// earned by the same event.
    AchievementsOnly,
}

/// Notification category handed to the delivery collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    RegionEntry,
    Achievement,
}

/// Payload handed to the notification delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    /// Region whose entry triggered the notification.
    pub region: String,
}
