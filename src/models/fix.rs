// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Positioning fixes and authorization state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single location fix from the positioning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in meters per second; negative means invalid.
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Altitude above sea level in meters.
    #[serde(default)]
    pub altitude_m: Option<f64>,
    /// Radius of uncertainty in meters; negative means invalid.
    #[serde(default)]
    pub horizontal_accuracy_m: Option<f64>,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// A fix with only a position and a timestamp.
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            speed_mps: None,
            altitude_m: None,
            horizontal_accuracy_m: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn with_accuracy(mut self, horizontal_accuracy_m: f64) -> Self {
        self.horizontal_accuracy_m = Some(horizontal_accuracy_m);
        self
    }

    /// The fix as a geo point (x = longitude, y = latitude).
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// Location permission state reported by the positioning collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    WhenInUse,
    Always,
    Denied,
    Restricted,
}

impl AuthorizationStatus {
    /// Whether fixes can be requested at all under this status.
    pub fn allows_tracking(self) -> bool {
        matches!(self, AuthorizationStatus::WhenInUse | AuthorizationStatus::Always)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_is_lon_lat() {
        let fix = Fix::new(39.74, -104.99, Utc::now());
        let point = fix.point();
        assert_eq!(point.x(), -104.99);
        assert_eq!(point.y(), 39.74);
    }

    #[test]
    fn test_fix_deserializes_without_metadata() {
        let json = r#"{"latitude": 40.0, "longitude": -83.0, "timestamp": "2026-07-04T12:00:00Z"}"#;
        let fix: Fix = serde_json::from_str(json).expect("fix should parse");
        assert_eq!(fix.speed_mps, None);
        assert_eq!(fix.altitude_m, None);
        assert_eq!(fix.horizontal_accuracy_m, None);
    }

    #[test]
    fn test_authorization_allows_tracking() {
        assert!(AuthorizationStatus::Always.allows_tracking());
        assert!(AuthorizationStatus::WhenInUse.allows_tracking());
        assert!(!AuthorizationStatus::NotDetermined.allows_tracking());
        assert!(!AuthorizationStatus::Denied.allows_tracking());
        assert!(!AuthorizationStatus::Restricted.allows_tracking());
    }
}
