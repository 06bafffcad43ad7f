// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Achievement rules and their earned state.
//!
//! Rules are declarative and ship with the app ([`default_catalog`]); only
//! the earned state ([`AchievementRecord`]) is persisted and synced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Earned state keyed by achievement id.
pub type AchievementLedger = BTreeMap<String, AchievementRecord>;

/// Broad kind of an achievement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Milestone,
    FixedRegionSet,
    TimeWindowedCondition,
}

/// What has to be true for an achievement to be earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// At least `count` distinct confirmed regions.
    MinimumRegions { count: usize },
    /// Every listed region confirmed.
    RequiredRegions { regions: BTreeSet<String> },
    /// At least `count` distinct regions confirmed inside any rolling
    /// window of `window_days` days.
    RegionsWithinWindow { count: usize, window_days: i64 },
}

/// A declarative achievement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    /// Display title (e.g., "West Coast")
    pub title: String,
    pub description: String,
    pub requirement: Requirement,
}

impl Achievement {
    pub fn category(&self) -> AchievementCategory {
        match self.requirement {
            Requirement::MinimumRegions { .. } => AchievementCategory::Milestone,
            Requirement::RequiredRegions { .. } => AchievementCategory::FixedRegionSet,
            Requirement::RegionsWithinWindow { .. } => AchievementCategory::TimeWindowedCondition,
        }
    }
}

/// Persisted earned state of one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub id: String,
    /// Monotonic: never reverts once set
    #[serde(default)]
    pub is_earned: bool,
    #[serde(default)]
    pub earned_at: Option<DateTime<Utc>>,
    /// Regions that satisfied the rule when it was earned
    #[serde(default)]
    pub contributing_regions: Vec<String>,
}

impl AchievementRecord {
    pub fn unearned(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_earned: false,
            earned_at: None,
            contributing_regions: Vec::new(),
        }
    }

    /// Mark earned with a snapshot of the contributing regions.
    ///
    /// Returns `false` (and changes nothing) if already earned.
    pub fn earn(&mut self, at: DateTime<Utc>, contributing_regions: Vec<String>) -> bool {
        if self.is_earned {
            return false;
        }
        self.is_earned = true;
        self.earned_at = Some(at);
        self.contributing_regions = contributing_regions;
        true
    }

    /// Merge two copies of the same achievement's state.
    ///
    /// Earned wins over unearned; when both are earned the earlier
    /// `earned_at` (and its snapshot) wins. Ties fall back to comparing
    /// snapshots so the result does not depend on argument order.
    pub fn merge(&self, other: &AchievementRecord) -> AchievementRecord {
        match (self.is_earned, other.is_earned) {
            (true, false) => self.clone(),
            (false, true) => other.clone(),
            (false, false) => AchievementRecord::unearned(self.id.clone().min(other.id.clone())),
            (true, true) => {
                let key = |r: &AchievementRecord| {
                    (
                        r.earned_at.is_none(),
                        r.earned_at,
                        r.contributing_regions.clone(),
                        r.id.clone(),
                    )
                };
                if key(self) <= key(other) {
                    self.clone()
                } else {
                    other.clone()
                }
            }
        }
    }
}

/// Merge two achievement ledgers record by record.
pub fn merge_ledgers(local: &AchievementLedger, remote: &AchievementLedger) -> AchievementLedger {
    let mut merged = local.clone();
    for (id, remote_record) in remote {
        let record = match local.get(id) {
            Some(local_record) => local_record.merge(remote_record),
            None => remote_record.clone(),
        };
        merged.insert(id.clone(), record);
    }
    merged
}

fn milestone(id: &str, title: &str, count: usize) -> Achievement {
    let noun = if count == 1 { "state" } else { "states" };
    Achievement {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Visit {count} {noun}"),
        requirement: Requirement::MinimumRegions { count },
    }
}

fn region_set(id: &str, title: &str, regions: &[&str]) -> Achievement {
    Achievement {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Visit {}", regions.join(", ")),
        requirement: Requirement::RequiredRegions {
            regions: regions.iter().map(|r| r.to_string()).collect(),
        },
    }
}

fn within_window(id: &str, title: &str, count: usize, window_days: i64) -> Achievement {
    let span = if window_days == 1 {
        "a single day".to_string()
    } else {
        format!("{window_days} days")
    };
    Achievement {
        id: id.to_string(),
        title: title.to_string(),
        description: format!("Visit {count} states within {span}"),
        requirement: Requirement::RegionsWithinWindow { count, window_days },
    }
}

/// The achievement rules the app ships with.
pub fn default_catalog() -> Vec<Achievement> {
    vec![
        milestone("first_state", "First Steps", 1),
        milestone("states_10", "Explorer", 10),
        milestone("states_20", "Wanderer", 20),
        milestone("states_30", "Voyager", 30),
        milestone("states_40", "Trailblazer", 40),
        milestone("states_50", "Fifty Nifty", 50),
        region_set("west_coast", "West Coast", &["California", "Oregon", "Washington"]),
        region_set(
            "four_corners",
            "Four Corners",
            &["Arizona", "Colorado", "New Mexico", "Utah"],
        ),
        region_set(
            "new_england",
            "New England",
            &[
                "Connecticut",
                "Maine",
                "Massachusetts",
                "New Hampshire",
                "Rhode Island",
                "Vermont",
            ],
        ),
        region_set(
            "great_lakes",
            "Great Lakes",
            &[
                "Illinois",
                "Indiana",
                "Michigan",
                "Minnesota",
                "New York",
                "Ohio",
                "Pennsylvania",
                "Wisconsin",
            ],
        ),
        region_set(
            "mid_atlantic",
            "Mid-Atlantic",
            &["Delaware", "Maryland", "New Jersey", "New York", "Pennsylvania"],
        ),
        region_set(
            "original_thirteen",
            "Original Thirteen",
            &[
                "Connecticut",
                "Delaware",
                "Georgia",
                "Maryland",
                "Massachusetts",
                "New Hampshire",
                "New Jersey",
                "New York",
                "North Carolina",
                "Pennsylvania",
                "Rhode Island",
                "South Carolina",
                "Virginia",
            ],
        ),
        region_set("non_contiguous", "Off the Mainland", &["Alaska", "Hawaii"]),
        within_window("road_trip", "Road Trip", 5, 7),
        within_window("whirlwind", "Whirlwind", 3, 1),
    ]
}
