// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod achievement;
pub mod fix;
pub mod notification;
pub mod region;
pub mod visit;

pub use achievement::{
    default_catalog, merge_ledgers, Achievement, AchievementCategory, AchievementLedger,
    AchievementRecord, Requirement,
};
pub use fix::{AuthorizationStatus, Fix};
pub use notification::{
    NotificationCategory, NotificationContent, NotificationContext, NotificationDecision,
    NotificationPreference, SuppressReason,
};
pub use region::{Region, RegionGeometry};
pub use visit::{merge_histories, RegionVisit, VisitHistory};
