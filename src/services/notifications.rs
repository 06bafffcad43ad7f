// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification suppression and composition for region entries.
//!
//! Rules are applied in order, first match wins:
//! 1. same region as the last one notified: suppress, reported as a
//!    foreground duplicate when the app came to the foreground within the
//!    grace window
//! 2. another notification fired less than `min_interval` ago: suppress
//! 3. notify-new-only and the region was already confirmed: achievements
//!    only
//! 4. otherwise: welcome

use crate::config::NotificationConfig;
use crate::models::{
    NotificationCategory, NotificationContent, NotificationContext, NotificationDecision,
    NotificationPreference, SuppressReason,
};
use crate::services::facts::generic_fact;
use crate::time_utils::is_within;
use chrono::{DateTime, Duration, Utc};

/// Decides whether a region entry produces a notification.
#[derive(Debug, Clone)]
pub struct NotificationDecider {
    foreground_grace: Duration,
    min_interval: Duration,
    max_listed_achievements: usize,
    last_fired_at: Option<DateTime<Utc>>,
}

impl Default for NotificationDecider {
    fn default() -> Self {
        Self::new(&NotificationConfig::default())
    }
}

impl NotificationDecider {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            foreground_grace: config.foreground_grace,
            min_interval: config.min_interval,
            max_listed_achievements: config.max_listed_achievements,
            last_fired_at: None,
        }
    }

    /// Decide what to do about entering `region`.
    ///
    /// `previously_confirmed` must reflect the visit history as it stood
    /// before this entry was recorded.
    pub fn decide(
        &self,
        region: &str,
        context: &NotificationContext,
        previously_confirmed: bool,
        now: DateTime<Utc>,
    ) -> NotificationDecision {
        let already_notified = context.last_notified_region.as_deref() == Some(region);

        let decision = if already_notified && context.just_foregrounded(now, self.foreground_grace)
        {
            NotificationDecision::Suppress(SuppressReason::ForegroundDuplicate)
        } else if already_notified {
            NotificationDecision::Suppress(SuppressReason::RepeatedRegion)
        } else if self
            .last_fired_at
            .is_some_and(|fired| is_within(fired, now, self.min_interval))
        {
            NotificationDecision::Suppress(SuppressReason::Debounced)
        } else if context.preference == NotificationPreference::NewRegionsOnly
            && previously_confirmed
        {
            NotificationDecision::AchievementsOnly
        } else {
            NotificationDecision::Welcome
        };

        tracing::debug!(region, decision = ?decision, "Notification decision");
        decision
    }

    /// Build the payload for a decision.
    ///
    /// `fact` is whatever the fact collaborator produced in time; a missing
    /// fact falls back to a generic welcome. Returns `None` when nothing
    /// should be delivered.
    pub fn compose(
        &self,
        decision: NotificationDecision,
        region: &str,
        fact: Option<String>,
        achievement_titles: &[String],
    ) -> Option<NotificationContent> {
        match decision {
            NotificationDecision::Suppress(_) => None,
            NotificationDecision::Welcome => {
                let mut body = fact.unwrap_or_else(|| generic_fact(region));
                if !achievement_titles.is_empty() {
                    body.push_str("\n\n");
                    body.push_str(&self.achievement_summary(achievement_titles));
                }
                Some(NotificationContent {
                    title: format!("Welcome to {region}!"),
                    body,
                    category: NotificationCategory::RegionEntry,
                    region: region.to_string(),
                })
            }
            NotificationDecision::AchievementsOnly => {
                if achievement_titles.is_empty() {
                    return None;
                }
                let title = if achievement_titles.len() == 1 {
                    "Achievement unlocked!"
                } else {
                    "Achievements unlocked!"
                };
                Some(NotificationContent {
                    title: title.to_string(),
                    body: self.achievement_summary(achievement_titles),
                    category: NotificationCategory::Achievement,
                    region: region.to_string(),
                })
            }
        }
    }

    /// "Unlocked: A, B, C +2 more"
    pub fn achievement_summary(&self, titles: &[String]) -> String {
        let shown = titles.len().min(self.max_listed_achievements);
        let mut summary = format!("Unlocked: {}", titles[..shown].join(", "));
        if titles.len() > shown {
            summary.push_str(&format!(" +{} more", titles.len() - shown));
        }
        summary
    }

    /// Start the debounce interval from a delivered notification.
    pub fn record_fired(&mut self, at: DateTime<Utc>) {
        self.last_fired_at = Some(at);
    }

    pub fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        self.last_fired_at
    }
}
