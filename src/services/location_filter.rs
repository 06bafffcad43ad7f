// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rejects fixes that would cause spurious region flips.

use crate::config::FilterConfig;
use crate::models::Fix;

/// Why a fix was rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    InvalidCoordinates,
    InvalidAccuracy,
    /// Accuracy radius (meters) above the configured bound.
    PoorAccuracy(f64),
    /// Speed (m/s) above the configured travel threshold.
    TooFast(f64),
    /// Altitude (meters) above the configured ceiling.
    TooHigh(f64),
}

/// Validates raw fixes against the configured policy.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    config: FilterConfig,
}

impl LocationFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn is_acceptable(&self, fix: &Fix) -> bool {
        match self.check(fix) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(
                    lat = fix.latitude,
                    lon = fix.longitude,
                    reason = ?reason,
                    "Rejected fix"
                );
                false
            }
        }
    }

    /// Check a fix, returning the first reason it fails.
    pub fn check(&self, fix: &Fix) -> Result<(), Rejection> {
        if !fix.latitude.is_finite()
            || !fix.longitude.is_finite()
            || fix.latitude.abs() > 90.0
            || fix.longitude.abs() > 180.0
        {
            return Err(Rejection::InvalidCoordinates);
        }

        if let Some(accuracy) = fix.horizontal_accuracy_m {
            if accuracy < 0.0 || accuracy.is_nan() {
                return Err(Rejection::InvalidAccuracy);
            }
            if accuracy > self.config.max_horizontal_accuracy_m {
                return Err(Rejection::PoorAccuracy(accuracy));
            }
        }

        // Zero or negative speed means "not measured" and never rejects.
        if let Some(speed) = fix.speed_mps {
            if speed > 0.0 && speed > self.config.max_speed_mps {
                return Err(Rejection::TooFast(speed));
            }
        }

        if let Some(altitude) = fix.altitude_m {
            if altitude > self.config.max_altitude_m {
                return Err(Rejection::TooHigh(altitude));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fix() -> Fix {
        Fix::new(39.96, -83.0, Utc::now())
    }

    fn filter() -> LocationFilter {
        LocationFilter::default()
    }

    #[test]
    fn test_plain_fix_accepted() {
        assert!(filter().is_acceptable(&fix()));
    }

    #[test]
    fn test_accuracy_bounds() {
        let filter = filter();
        assert_eq!(
            filter.check(&fix().with_accuracy(-1.0)),
            Err(Rejection::InvalidAccuracy)
        );
        assert_eq!(
            filter.check(&fix().with_accuracy(1500.0)),
            Err(Rejection::PoorAccuracy(1500.0))
        );
        assert!(filter.is_acceptable(&fix().with_accuracy(1000.0)));
        assert!(filter.is_acceptable(&fix().with_accuracy(0.0)));
    }

    #[test]
    fn test_highway_speed_accepted_flight_speed_rejected() {
        let filter = filter();
        assert!(filter.is_acceptable(&fix().with_speed(30.0)));
        assert_eq!(
            filter.check(&fix().with_speed(220.0)),
            Err(Rejection::TooFast(220.0))
        );
    }

    #[test]
    fn test_invalid_speed_never_rejects() {
        let filter = filter();
        assert!(filter.is_acceptable(&fix().with_speed(-1.0)));
        assert!(filter.is_acceptable(&fix().with_speed(0.0)));
    }

    #[test]
    fn test_altitude_ceiling() {
        let filter = filter();
        assert!(filter.is_acceptable(&fix().with_altitude(1609.0)));
        assert_eq!(
            filter.check(&fix().with_altitude(10_000.0)),
            Err(Rejection::TooHigh(10_000.0))
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let filter = LocationFilter::new(FilterConfig {
            max_speed_mps: 10.0,
            ..FilterConfig::default()
        });
        assert!(!filter.is_acceptable(&fix().with_speed(20.0)));
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let bad = Fix::new(91.0, -83.0, Utc::now());
        assert_eq!(filter().check(&bad), Err(Rejection::InvalidCoordinates));
    }
}
