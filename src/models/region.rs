// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Region model and geometry handling.

use geo::{MultiPolygon, Polygon};

/// A named region (a US state) with its boundary geometry.
#[derive(Debug, Clone)]
pub struct Region {
    /// Region name (e.g., "Colorado")
    pub name: String,
    /// Boundary geometry (can be Polygon or MultiPolygon)
    pub geometry: RegionGeometry,
}

/// Region geometry - either a simple polygon or multi-polygon.
#[derive(Debug, Clone)]
pub enum RegionGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl RegionGeometry {
    /// The individual polygons making up this geometry.
    pub fn polygons(&self) -> Vec<&Polygon<f64>> {
        match self {
            RegionGeometry::Polygon(p) => vec![p],
            RegionGeometry::MultiPolygon(mp) => mp.0.iter().collect(),
        }
    }
}
