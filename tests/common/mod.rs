// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, TimeZone, Utc};
use state_passport::config::{Config, IndexConfig};
use state_passport::db::LocalStore;
use state_passport::models::{Fix, RegionVisit, VisitHistory};
use state_passport::services::{RecordingSink, RegionIndex, StaticFactProvider, Tracker};
use std::sync::Arc;

/// Boundary fixture shipped with the repository.
pub const FIXTURE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/us_states_sample.geojson");

/// Well-known points inside the fixture regions as (name, lat, lon, region).
#[allow(dead_code)]
pub const CITIES: &[(&str, f64, f64, &str)] = &[
    ("Sacramento", 38.58, -121.49, "California"),
    ("Los Angeles", 34.05, -118.24, "California"),
    ("San Francisco", 37.77, -122.42, "California"),
    ("Reno", 39.53, -119.81, "Nevada"),
    ("Las Vegas", 36.17, -115.14, "Nevada"),
    ("Portland", 45.52, -122.68, "Oregon"),
    ("Seattle", 47.61, -122.33, "Washington"),
    ("Columbus", 39.96, -83.0, "Ohio"),
    ("Indianapolis", 39.77, -86.16, "Indiana"),
    ("Harrisburg", 40.27, -76.88, "Pennsylvania"),
    ("Pittsburgh", 40.44, -79.99, "Pennsylvania"),
    ("Albany", 42.65, -73.76, "New York"),
    ("Syracuse", 43.05, -76.15, "New York"),
    ("Denver", 39.74, -104.99, "Colorado"),
    ("Cheyenne", 41.14, -104.82, "Wyoming"),
    ("Salt Lake City", 40.76, -111.89, "Utah"),
    ("Phoenix", 33.45, -112.07, "Arizona"),
    ("Santa Fe", 35.69, -105.94, "New Mexico"),
    ("Washington", 38.90, -77.03, "District of Columbia"),
    ("Honolulu", 21.31, -157.86, "Hawaii"),
];

/// Point of a named entry in [`CITIES`].
#[allow(dead_code)]
pub fn city(name: &str) -> (f64, f64) {
    CITIES
        .iter()
        .find(|(city, ..)| *city == name)
        .map(|(_, lat, lon, _)| (*lat, *lon))
        .unwrap_or_else(|| panic!("unknown test city {name}"))
}

/// The fixture loaded into a fresh index.
#[allow(dead_code)]
pub fn fixture_index() -> Arc<RegionIndex> {
    let index = RegionIndex::new(IndexConfig::default());
    index.load_from_file(FIXTURE_PATH);
    Arc::new(index)
}

/// Fixed reference time for deterministic tests.
#[allow(dead_code)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn at_secs(secs: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(secs)
}

/// Fix at a named city, `secs` after [`base_time`].
#[allow(dead_code)]
pub fn fix_at(name: &str, secs: i64) -> Fix {
    let (lat, lon) = city(name);
    Fix::new(lat, lon, at_secs(secs))
}

/// A tracker over the fixture with in-memory persistence.
#[allow(dead_code)]
pub fn test_tracker(
    store: LocalStore,
    facts: StaticFactProvider,
) -> (
    Tracker<StaticFactProvider, RecordingSink>,
    Arc<RecordingSink>,
) {
    test_tracker_with_config(store, facts, &Config::default())
}

#[allow(dead_code)]
pub fn test_tracker_with_config(
    store: LocalStore,
    facts: StaticFactProvider,
    config: &Config,
) -> (
    Tracker<StaticFactProvider, RecordingSink>,
    Arc<RecordingSink>,
) {
    let sink = Arc::new(RecordingSink::new());
    let tracker = Tracker::new(
        fixture_index(),
        config,
        store,
        Arc::new(facts),
        Arc::clone(&sink),
    );
    (tracker, sink)
}

/// History with each region GPS-confirmed at the given time.
#[allow(dead_code)]
pub fn history_of(visits: &[(&str, DateTime<Utc>)]) -> VisitHistory {
    visits
        .iter()
        .map(|(name, at)| (name.to_string(), RegionVisit::detected(*name, *at)))
        .collect()
}
