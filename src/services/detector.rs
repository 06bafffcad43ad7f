// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Region transition detection.
//!
//! Turns a stream of fixes into region-entry events. The detector only
//! tracks which region the device is in; it never persists anything and
//! never decides about notifications. Time comes from the fixes themselves,
//! so replaying a recorded track gives the same events as living it.
//!
//! Fallbacks, in the order they are tried:
//! - direct lookup of the fix in the region index
//! - after `miss_threshold` consecutive misses, a grid of offset points at
//!   each configured radius (tolerates slivers between boundary polygons)
//! - the nearest region seen recently and close by
//!
//! Direct matches far from where the previous region was last seen are only
//! provisional until a second fix confirms them (landing after a flight).

use crate::config::DetectorConfig;
use crate::models::Fix;
use crate::services::location_filter::LocationFilter;
use crate::services::region_index::RegionIndex;
use chrono::{DateTime, Utc};
use geo::{Destination, Distance, Haversine, Point};
use std::collections::HashMap;
use std::sync::Arc;

/// How a region entry was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Direct,
    GridFallback,
    ProximityFallback,
    /// Second fix of a long-distance jump.
    AirportConfirmed,
}

/// A confirmed transition into a new region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    pub region: String,
    pub previous_region: Option<String>,
    pub entered_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub method: DetectionMethod,
}

/// Result of feeding one fix to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// The location filter rejected the fix.
    Rejected,
    /// No region could be resolved, even with fallbacks.
    Unresolved,
    /// Still in the current region.
    Unchanged,
    /// Long jump into this region, awaiting a confirming fix.
    Provisional(String),
    Entered(RegionEntry),
}

/// Where and when a region was last observed.
#[derive(Debug, Clone, Copy)]
struct Sighting {
    point: Point<f64>,
    at: DateTime<Utc>,
}

impl Sighting {
    fn of(fix: &Fix) -> Self {
        Self {
            point: fix.point(),
            at: fix.timestamp,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingArrival {
    region: String,
    first_seen: DateTime<Utc>,
}

/// State machine over `{no region, in region(name)}`.
pub struct RegionTransitionDetector {
    index: Arc<RegionIndex>,
    filter: LocationFilter,
    config: DetectorConfig,
    current_region: Option<String>,
    entered_at: Option<DateTime<Utc>>,
    consecutive_misses: u32,
    /// Last point inside the most recently confirmed region.
    anchor: Option<Sighting>,
    last_seen: HashMap<String, Sighting>,
    pending: Option<PendingArrival>,
}

impl RegionTransitionDetector {
    pub fn new(index: Arc<RegionIndex>, filter: LocationFilter, config: DetectorConfig) -> Self {
        Self {
            index,
            filter,
            config,
            current_region: None,
            entered_at: None,
            consecutive_misses: 0,
            anchor: None,
            last_seen: HashMap::new(),
            pending: None,
        }
    }

    pub fn current_region(&self) -> Option<&str> {
        self.current_region.as_deref()
    }

    /// When the current region was entered.
    pub fn entered_at(&self) -> Option<DateTime<Utc>> {
        self.entered_at
    }

    /// Region awaiting a confirming fix, if any.
    pub fn pending_region(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.region.as_str())
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Forget the current region so the next fix is evaluated as a fresh
    /// entry. Used when the app returns to the foreground; the distance
    /// anchor and recent sightings are kept.
    pub fn reset_current_region(&mut self) {
        if let Some(region) = self.current_region.take() {
            tracing::debug!(region = %region, "Current region reset");
        }
        self.entered_at = None;
        self.consecutive_misses = 0;
        self.pending = None;
    }

    /// Process one fix.
    pub fn observe(&mut self, fix: &Fix) -> DetectionOutcome {
        if !self.filter.is_acceptable(fix) {
            return DetectionOutcome::Rejected;
        }

        match self.index.region_containing(fix) {
            Some(region) => {
                self.consecutive_misses = 0;
                self.observe_direct(region, fix)
            }
            None => self.observe_miss(fix),
        }
    }

    fn observe_direct(&mut self, region: String, fix: &Fix) -> DetectionOutcome {
        self.last_seen.insert(region.clone(), Sighting::of(fix));

        if self.current_region.as_deref() == Some(region.as_str()) {
            if let Some(pending) = self.pending.take() {
                tracing::debug!(
                    region = %pending.region,
                    "Provisional arrival discarded, back in current region"
                );
            }
            self.anchor = Some(Sighting::of(fix));
            return DetectionOutcome::Unchanged;
        }

        if let Some(pending) = self.pending.take() {
            let elapsed = fix.timestamp - pending.first_seen;
            if pending.region == region
                && elapsed >= chrono::Duration::zero()
                && elapsed <= self.config.airport_confirm_window
            {
                return self.enter(region, fix, DetectionMethod::AirportConfirmed);
            }
            tracing::debug!(
                region = %pending.region,
                elapsed_secs = elapsed.num_seconds(),
                "Provisional arrival expired or superseded"
            );
        }

        if let Some(jump_m) = self.jump_distance(fix) {
            if jump_m > self.config.airport_distance_m {
                tracing::debug!(
                    region = %region,
                    jump_km = jump_m / 1000.0,
                    "Long jump, holding detection as provisional"
                );
                self.pending = Some(PendingArrival {
                    region: region.clone(),
                    first_seen: fix.timestamp,
                });
                return DetectionOutcome::Provisional(region);
            }
        }

        self.enter(region, fix, DetectionMethod::Direct)
    }

    fn observe_miss(&mut self, fix: &Fix) -> DetectionOutcome {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        if self.consecutive_misses < self.config.miss_threshold {
            return DetectionOutcome::Unresolved;
        }

        let fallback = self
            .grid_fallback(fix)
            .map(|region| (region, DetectionMethod::GridFallback))
            .or_else(|| {
                self.proximity_fallback(fix)
                    .map(|region| (region, DetectionMethod::ProximityFallback))
            });

        let Some((region, method)) = fallback else {
            tracing::debug!(
                lat = fix.latitude,
                lon = fix.longitude,
                misses = self.consecutive_misses,
                "No region resolved after fallbacks"
            );
            return DetectionOutcome::Unresolved;
        };

        if self.current_region.as_deref() == Some(region.as_str()) {
            return DetectionOutcome::Unchanged;
        }

        if method == DetectionMethod::GridFallback {
            self.last_seen.insert(region.clone(), Sighting::of(fix));
        }
        self.enter(region, fix, method)
    }

    /// Probe offset points on a 3x3 grid around the fix at each radius.
    fn grid_fallback(&self, fix: &Fix) -> Option<String> {
        let origin = fix.point();

        for &radius in &self.config.grid_radii_m {
            for north in -1i32..=1 {
                for east in -1i32..=1 {
                    if north == 0 && east == 0 {
                        continue;
                    }
                    let (dx, dy) = (east as f64, north as f64);
                    let bearing = dx.atan2(dy).to_degrees();
                    let distance = radius * dx.hypot(dy);
                    let probe = Haversine.destination(origin, bearing, distance);

                    if let Some(region) = self.index.region_at(probe.y(), probe.x()) {
                        tracing::debug!(region = %region, radius_m = radius, "Grid fallback matched");
                        return Some(region);
                    }
                }
            }
        }
        None
    }

    /// Nearest region seen within the proximity radius and recency window.
    fn proximity_fallback(&self, fix: &Fix) -> Option<String> {
        let here = fix.point();

        self.last_seen
            .iter()
            .filter(|(_, sighting)| {
                let age = fix.timestamp - sighting.at;
                age >= chrono::Duration::zero() && age <= self.config.proximity_max_age
            })
            .map(|(region, sighting)| (region, Haversine.distance(here, sighting.point)))
            .filter(|(_, distance)| *distance <= self.config.proximity_radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(region, distance)| {
                tracing::debug!(region = %region, distance_m = distance, "Proximity fallback matched");
                region.clone()
            })
    }

    fn jump_distance(&self, fix: &Fix) -> Option<f64> {
        self.anchor
            .map(|anchor| Haversine.distance(anchor.point, fix.point()))
    }

    fn enter(&mut self, region: String, fix: &Fix, method: DetectionMethod) -> DetectionOutcome {
        let previous_region = self.current_region.replace(region.clone());
        self.entered_at = Some(fix.timestamp);
        self.anchor = Some(Sighting::of(fix));
        self.pending = None;
        self.consecutive_misses = 0;

        tracing::info!(
            region = %region,
            previous = ?previous_region,
            method = ?method,
            "Region entered"
        );

        DetectionOutcome::Entered(RegionEntry {
            region,
            previous_region,
            entered_at: fix.timestamp,
            latitude: fix.latitude,
            longitude: fix.longitude,
            method,
        })
    }
}
