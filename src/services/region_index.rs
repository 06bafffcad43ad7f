// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Region boundary loading and point-to-region resolution.

use crate::config::IndexConfig;
use crate::models::{Fix, Region, RegionGeometry};
use crate::services::quadtree::Quadtree;
use geo::{Coord, MultiPolygon, Point, Polygon, Rect};
use geojson::GeoJson;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Web Mercator half-extent in meters.
const MERCATOR_MAX: f64 = 20_037_508.342_789_244;
/// Latitude limit of the Web Mercator projection.
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Project WGS84 degrees to Web Mercator meters.
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Coord<f64> {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Coord { x, y }
}

/// One polygon of one region, as stored in the tree.
#[derive(Debug, Clone)]
struct IndexedPolygon {
    region: usize,
    polygon: Polygon<f64>,
}

/// Immutable state built by [`RegionIndex::load`].
struct LoadedRegions {
    regions: Vec<Region>,
    polygons: Vec<IndexedPolygon>,
    tree: Quadtree<usize>,
}

impl LoadedRegions {
    fn empty(config: &IndexConfig) -> Self {
        Self::build(Vec::new(), config)
    }

    fn build(regions: Vec<Region>, config: &IndexConfig) -> Self {
        let world = Rect::new(
            Coord {
                x: -MERCATOR_MAX,
                y: -MERCATOR_MAX,
            },
            Coord {
                x: MERCATOR_MAX,
                y: MERCATOR_MAX,
            },
        );
        let mut tree = Quadtree::new(world, config.node_capacity, config.max_depth);
        let mut polygons = Vec::new();

        for (region_idx, region) in regions.iter().enumerate() {
            for polygon in region.geometry.polygons() {
                let Some(bounds) = geo::BoundingRect::bounding_rect(polygon) else {
                    continue;
                };
                let projected = Rect::new(
                    wgs84_to_mercator(bounds.min().y, bounds.min().x),
                    wgs84_to_mercator(bounds.max().y, bounds.max().x),
                );
                tree.insert(projected, polygons.len());
                polygons.push(IndexedPolygon {
                    region: region_idx,
                    polygon: polygon.clone(),
                });
            }
        }

        Self {
            regions,
            polygons,
            tree,
        }
    }

    fn resolve(&self, lat: f64, lon: f64) -> Option<&str> {
        let projected = wgs84_to_mercator(lat, lon);
        let point = Point::new(lon, lat);

        let mut candidates: Vec<usize> = self
            .tree
            .query_point(projected)
            .into_iter()
            .copied()
            .collect();
        // Load order decides ties on shared borders.
        candidates.sort_unstable();

        candidates
            .into_iter()
            .map(|idx| &self.polygons[idx])
            .find(|p| geo::Intersects::intersects(&point, &p.polygon))
            .map(|p| self.regions[p.region].name.as_str())
    }
}

/// Bounded cache of recent lookups keyed on rounded coordinates.
struct CoordinateCache {
    capacity: usize,
    scale: f64,
    entries: HashMap<(i64, i64), Option<String>>,
    order: VecDeque<(i64, i64)>,
}

impl CoordinateCache {
    fn new(capacity: usize, precision_decimals: u32) -> Self {
        Self {
            capacity,
            scale: 10f64.powi(precision_decimals as i32),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn key(&self, lat: f64, lon: f64) -> (i64, i64) {
        ((lat * self.scale).round() as i64, (lon * self.scale).round() as i64)
    }

    fn get(&self, key: &(i64, i64)) -> Option<Option<String>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: (i64, i64), value: Option<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, value).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Resolves points to the region containing them.
///
/// Loaded once, then read-only: lookups take `&self` and are safe to share
/// across threads. Lookups go through a small coordinate cache first; the
/// cache is purely an optimization and a miss just recomputes.
pub struct RegionIndex {
    config: IndexConfig,
    loaded: OnceLock<LoadedRegions>,
    cache: Mutex<CoordinateCache>,
}

impl Default for RegionIndex {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl RegionIndex {
    /// Create an empty index; call [`RegionIndex::load`] to populate it.
    pub fn new(config: IndexConfig) -> Self {
        let cache = CoordinateCache::new(config.cache_capacity, config.cache_precision_decimals);
        Self {
            config,
            loaded: OnceLock::new(),
            cache: Mutex::new(cache),
        }
    }

    /// Build an index directly from already parsed regions.
    pub fn from_regions(regions: Vec<Region>, config: IndexConfig) -> Self {
        let index = Self::new(config);
        index.install(LoadedRegions::build(regions, &index.config));
        index
    }

    /// Load region boundaries from a GeoJSON string.
    ///
    /// Only the first call has any effect. If the data cannot be parsed the
    /// index stays empty and every lookup returns `None`; detection is then
    /// effectively disabled, which is logged but not fatal.
    pub fn load(&self, json_data: &str) {
        self.load_parsed(parse_regions(json_data));
    }

    /// Load region boundaries from a GeoJSON file (see [`RegionIndex::load`]).
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) {
        let parsed = read_regions(path.as_ref());
        if parsed.is_err() {
            tracing::warn!(path = %path.as_ref().display(), "Unusable region boundary file");
        }
        self.load_parsed(parsed);
    }

    fn load_parsed(&self, parsed: Result<Vec<Region>, RegionIndexError>) {
        if self.loaded.get().is_some() {
            tracing::debug!("Region index already loaded, ignoring reload");
            return;
        }

        let loaded = match parsed {
            Ok(regions) => LoadedRegions::build(regions, &self.config),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load region boundaries, detection disabled");
                LoadedRegions::empty(&self.config)
            }
        };
        self.install(loaded);
    }

    fn install(&self, loaded: LoadedRegions) {
        let count = loaded.regions.len();
        let polygons = loaded.polygons.len();
        if self.loaded.set(loaded).is_ok() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.clear();
            }
            tracing::info!(
                regions = count,
                polygons,
                depth = self.loaded.get().map_or(0, |l| l.tree.depth()),
                "Region index built"
            );
        }
    }

    /// The loaded regions (empty until loaded, or if loading failed).
    pub fn regions(&self) -> &[Region] {
        self.loaded
            .get()
            .map(|l| l.regions.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.regions().is_empty()
    }

    /// Name of the region containing the fix, if any.
    pub fn region_containing(&self, fix: &Fix) -> Option<String> {
        self.region_at(fix.latitude, fix.longitude)
    }

    /// Name of the region containing the coordinate, if any.
    pub fn region_at(&self, lat: f64, lon: f64) -> Option<String> {
        let loaded = self.loaded.get()?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        let key = match self.cache.lock() {
            Ok(cache) => {
                let key = cache.key(lat, lon);
                if let Some(hit) = cache.get(&key) {
                    return hit;
                }
                Some(key)
            }
            Err(_) => None,
        };

        let result = loaded.resolve(lat, lon).map(str::to_string);

        if let (Some(key), Ok(mut cache)) = (key, self.cache.lock()) {
            cache.insert(key, result.clone());
        }
        result
    }

    /// Number of cached lookups.
    pub fn cached_lookups(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }
}

/// Parse regions from a GeoJSON FeatureCollection.
///
/// Each feature needs a `name` (or `NAME`) property and a Polygon or
/// MultiPolygon geometry. Unnamed features and repeated names are skipped.
pub fn parse_regions(json_data: &str) -> Result<Vec<Region>, RegionIndexError> {
    let geojson: GeoJson = json_data
        .parse()
        .map_err(|e: geojson::Error| RegionIndexError::ParseError(e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(RegionIndexError::NotAFeatureCollection);
    };

    let mut regions = Vec::new();
    let mut seen = HashSet::new();

    for feature in collection.features {
        let name = feature
            .property("name")
            .or_else(|| feature.property("NAME"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let Some(name) = name else {
            tracing::warn!("Skipping boundary feature without a name");
            continue;
        };

        if !seen.insert(name.clone()) {
            tracing::warn!(region = %name, "Skipping duplicate boundary feature");
            continue;
        }

        if let Some(geom) = feature.geometry {
            let geometry = convert_geometry(geom.value)?;
            regions.push(Region { name, geometry });
        }
    }

    if regions.is_empty() {
        return Err(RegionIndexError::NoRegions);
    }

    tracing::info!(count = regions.len(), "Parsed region boundaries");
    Ok(regions)
}

/// Convert GeoJSON geometry to our internal format.
fn convert_geometry(value: geojson::Value) -> Result<RegionGeometry, RegionIndexError> {
    use std::convert::TryInto;

    // Try as Polygon first
    let poly_result: Result<Polygon<f64>, _> = value.clone().try_into();
    if let Ok(poly) = poly_result {
        return Ok(RegionGeometry::Polygon(poly));
    }

    // Try as MultiPolygon
    let multi_result: Result<MultiPolygon<f64>, _> = value.try_into();
    if let Ok(multi) = multi_result {
        return Ok(RegionGeometry::MultiPolygon(multi));
    }

    Err(RegionIndexError::UnsupportedGeometry)
}

/// Errors from region boundary loading.
#[derive(Debug, thiserror::Error)]
pub enum RegionIndexError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("GeoJSON root must be a FeatureCollection")]
    NotAFeatureCollection,

    #[error("Unsupported geometry type (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry,

    #[error("No named regions found")]
    NoRegions,
}

/// Read and parse a boundary file without building an index.
pub fn read_regions<P: AsRef<Path>>(path: P) -> Result<Vec<Region>, RegionIndexError> {
    let json_data =
        fs::read_to_string(path.as_ref()).map_err(|e| RegionIndexError::IoError(e.to_string()))?;
    parse_regions(&json_data)
}
