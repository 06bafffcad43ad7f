// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Durable per-region visit records.
//!
//! History is append-only with respect to GPS confirmation: flags are
//! promoted but never demoted, and "removing" a region only flips
//! `is_active`. That is what lets two copies be merged in any order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Visit records keyed by region name.
pub type VisitHistory = BTreeMap<String, RegionVisit>;

/// The user's relationship to one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionVisit {
    /// Region name (also the key in [`VisitHistory`])
    pub region_name: String,
    /// GPS-confirmed at least once
    #[serde(default)]
    pub confirmed_by_detection: bool,
    /// Added by the user outside detection
    #[serde(default)]
    pub manually_added: bool,
    #[serde(default)]
    pub first_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_confirmed_at: Option<DateTime<Utc>>,
    /// Currently shown as visited
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Monotonic: never reverts once set
    #[serde(default)]
    pub ever_confirmed: bool,
}

fn default_active() -> bool {
    true
}

impl RegionVisit {
    /// A record created by a GPS detection.
    pub fn detected(region_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        let mut visit = Self::empty(region_name);
        visit.record_detection(at);
        visit
    }

    /// A record created by the user adding the region by hand.
    pub fn manual(region_name: impl Into<String>) -> Self {
        let mut visit = Self::empty(region_name);
        visit.mark_manual();
        visit
    }

    fn empty(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            confirmed_by_detection: false,
            manually_added: false,
            first_confirmed_at: None,
            last_confirmed_at: None,
            is_active: false,
            ever_confirmed: false,
        }
    }

    /// Record a GPS confirmation at `at`.
    pub fn record_detection(&mut self, at: DateTime<Utc>) {
        self.confirmed_by_detection = true;
        self.ever_confirmed = true;
        self.is_active = true;
        self.first_confirmed_at = earliest(self.first_confirmed_at, Some(at));
        self.last_confirmed_at = latest(self.last_confirmed_at, Some(at));
    }

    /// Record that the user added this region by hand.
    pub fn mark_manual(&mut self) {
        self.manually_added = true;
        self.is_active = true;
    }

    /// Hide the region from the visited list, keeping its history.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Merge two copies of the same region's record.
    ///
    /// Flags are OR-ed, the earliest first confirmation and the latest last
    /// confirmation win. The result does not depend on argument order.
    pub fn merge(&self, other: &RegionVisit) -> RegionVisit {
        let region_name = if self.region_name <= other.region_name {
            self.region_name.clone()
        } else {
            other.region_name.clone()
        };

        RegionVisit {
            region_name,
            confirmed_by_detection: self.confirmed_by_detection || other.confirmed_by_detection,
            manually_added: self.manually_added || other.manually_added,
            first_confirmed_at: earliest(self.first_confirmed_at, other.first_confirmed_at),
            last_confirmed_at: latest(self.last_confirmed_at, other.last_confirmed_at),
            is_active: self.is_active || other.is_active,
            ever_confirmed: self.ever_confirmed || other.ever_confirmed,
        }
    }
}

/// Merge two visit histories record by record.
pub fn merge_histories(local: &VisitHistory, remote: &VisitHistory) -> VisitHistory {
    let mut merged = local.clone();
    for (name, remote_visit) in remote {
        let visit = match local.get(name) {
            Some(local_visit) => local_visit.merge(remote_visit),
            None => remote_visit.clone(),
        };
        merged.insert(name.clone(), visit);
    }
    merged
}

/// Earliest of two optional timestamps, ignoring missing ones.
fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Latest of two optional timestamps, ignoring missing ones.
fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    a.max(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 4, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_detection_promotes_flags_and_timestamps() {
        let mut visit = RegionVisit::detected("Ohio", t(10));
        visit.record_detection(t(12));
        visit.record_detection(t(8));

        assert!(visit.confirmed_by_detection);
        assert!(visit.ever_confirmed);
        assert!(visit.is_active);
        assert_eq!(visit.first_confirmed_at, Some(t(8)));
        assert_eq!(visit.last_confirmed_at, Some(t(12)));
    }

    #[test]
    fn test_deactivate_keeps_history() {
        let mut visit = RegionVisit::detected("Ohio", t(10));
        visit.deactivate();

        assert!(!visit.is_active);
        assert!(visit.ever_confirmed);
        assert_eq!(visit.first_confirmed_at, Some(t(10)));
    }

    #[test]
    fn test_manual_visit_is_not_confirmed() {
        let visit = RegionVisit::manual("Utah");
        assert!(visit.manually_added);
        assert!(visit.is_active);
        assert!(!visit.ever_confirmed);
        assert_eq!(visit.first_confirmed_at, None);
    }

    #[test]
    fn test_redetection_reactivates() {
        let mut visit = RegionVisit::detected("Ohio", t(10));
        visit.deactivate();
        visit.record_detection(t(11));
        assert!(visit.is_active);
    }

    #[test]
    fn test_merge_takes_earliest_first_and_latest_last() {
        let local = RegionVisit::detected("Ohio", t(10));
        let mut remote = RegionVisit::detected("Ohio", t(6));
        remote.record_detection(t(20));
        remote.deactivate();

        let merged = local.merge(&remote);
        assert_eq!(merged.first_confirmed_at, Some(t(6)));
        assert_eq!(merged.last_confirmed_at, Some(t(20)));
        assert!(merged.is_active);
        assert_eq!(merged, remote.merge(&local));
    }

    #[test]
    fn test_merge_null_timestamps_lose() {
        let manual = RegionVisit::manual("Ohio");
        let detected = RegionVisit::detected("Ohio", t(9));

        let merged = manual.merge(&detected);
        assert!(merged.manually_added);
        assert!(merged.ever_confirmed);
        assert_eq!(merged.first_confirmed_at, Some(t(9)));
        assert_eq!(merged.last_confirmed_at, Some(t(9)));
    }

    #[test]
    fn test_merge_histories_unions_keys() {
        let mut local = VisitHistory::new();
        local.insert("Ohio".into(), RegionVisit::detected("Ohio", t(1)));
        let mut remote = VisitHistory::new();
        remote.insert("Utah".into(), RegionVisit::manual("Utah"));
        remote.insert(
            "Ohio".into(),
            RegionVisit::detected("Ohio", t(1) + Duration::hours(3)),
        );

        let merged = merge_histories(&local, &remote);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["Ohio"].last_confirmed_at, Some(t(4)));
        assert_eq!(merged, merge_histories(&remote, &local));
    }

    #[test]
    fn test_missing_is_active_defaults_to_true() {
        let json = r#"{"region_name": "Ohio", "manually_added": true}"#;
        let visit: RegionVisit = serde_json::from_str(json).expect("visit should parse");
        assert!(visit.is_active);
        assert!(!visit.ever_confirmed);
    }
}
