// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement evaluation against the visit history.

use crate::config::NotificationConfig;
use crate::models::{
    Achievement, AchievementLedger, AchievementRecord, RegionVisit, Requirement, VisitHistory,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// Evaluates declarative achievement rules.
///
/// Earning is one-way: rules already marked earned in the ledger are never
/// looked at again, so their snapshot survives later deactivations.
#[derive(Debug, Clone)]
pub struct AchievementEvaluator {
    excluded_region: Option<String>,
    count_manual_visits: bool,
}

impl Default for AchievementEvaluator {
    fn default() -> Self {
        Self::from_config(&NotificationConfig::default())
    }
}

impl AchievementEvaluator {
    pub fn new(excluded_region: Option<String>, count_manual_visits: bool) -> Self {
        Self {
            excluded_region,
            count_manual_visits,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.excluded_region.clone(), config.count_manual_visits)
    }

    /// Regions that count toward achievements, sorted by name.
    pub fn confirmed_regions(&self, history: &VisitHistory) -> BTreeSet<String> {
        history
            .values()
            .filter(|visit| self.counts(visit))
            .map(|visit| visit.region_name.clone())
            .collect()
    }

    fn counts(&self, visit: &RegionVisit) -> bool {
        if !visit.is_active {
            return false;
        }
        if self.excluded_region.as_deref() == Some(visit.region_name.as_str()) {
            return false;
        }
        visit.ever_confirmed || (self.count_manual_visits && visit.manually_added)
    }

    pub fn is_satisfied(&self, achievement: &Achievement, history: &VisitHistory) -> bool {
        self.contributing_regions(achievement, history).is_some()
    }

    /// The regions satisfying `achievement`, or `None` if it is not met.
    pub fn contributing_regions(
        &self,
        achievement: &Achievement,
        history: &VisitHistory,
    ) -> Option<Vec<String>> {
        let confirmed = self.confirmed_regions(history);

        match &achievement.requirement {
            Requirement::MinimumRegions { count } => {
                (confirmed.len() >= *count).then(|| confirmed.into_iter().collect())
            }
            Requirement::RequiredRegions { regions } => {
                if regions.is_empty() || !regions.is_subset(&confirmed) {
                    return None;
                }
                Some(regions.intersection(&confirmed).cloned().collect())
            }
            Requirement::RegionsWithinWindow { count, window_days } => {
                let visits: Vec<(DateTime<Utc>, &str)> = confirmed
                    .iter()
                    .filter_map(|name| {
                        let visit = history.get(name)?;
                        let at = visit.last_confirmed_at.or(visit.first_confirmed_at)?;
                        Some((at, name.as_str()))
                    })
                    .collect();
                window_satisfied(visits, *count, Duration::days(*window_days))
            }
        }
    }

    /// Evaluate every rule not yet earned, marking newly satisfied ones in
    /// `ledger` with `now` as their earn time.
    ///
    /// Returns the ids of newly earned achievements in catalog order.
    pub fn evaluate(
        &self,
        catalog: &[Achievement],
        ledger: &mut AchievementLedger,
        history: &VisitHistory,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut newly_earned = Vec::new();

        for achievement in catalog {
            if ledger.get(&achievement.id).is_some_and(|r| r.is_earned) {
                continue;
            }
            let Some(regions) = self.contributing_regions(achievement, history) else {
                continue;
            };

            let record = ledger
                .entry(achievement.id.clone())
                .or_insert_with(|| AchievementRecord::unearned(achievement.id.clone()));
            if record.earn(now, regions) {
                tracing::info!(
                    achievement = %achievement.id,
                    regions = record.contributing_regions.len(),
                    "Achievement earned"
                );
                newly_earned.push(achievement.id.clone());
            }
        }

        newly_earned
    }
}

/// Slide a `window` forward from each visit and look for `count` distinct
/// regions inside `[start, start + window]`.
fn window_satisfied(
    mut visits: Vec<(DateTime<Utc>, &str)>,
    count: usize,
    window: Duration,
) -> Option<Vec<String>> {
    if count == 0 {
        return Some(Vec::new());
    }
    visits.sort();

    for (i, (start, _)) in visits.iter().enumerate() {
        let end = *start + window;
        let regions: BTreeSet<&str> = visits[i..]
            .iter()
            .take_while(|(at, _)| *at <= end)
            .map(|(_, name)| *name)
            .collect();

        if regions.len() >= count {
            return Some(regions.into_iter().map(str::to_string).collect());
        }
    }
    None
}
