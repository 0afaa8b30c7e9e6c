//! In-memory feature collection model.
//!
//! A [`FeatureSet`] is the unit every intake parser produces and every
//! operation consumes: an ordered sequence of geometry/attribute pairs
//! sharing a single CRS tag. The tag is private and can only change through
//! whole-collection reprojection, so a set can never hold mixed systems.

use geo::BoundingRect;
use geo_types::{Coord, Geometry, Rect};
use serde_json::{Map, Value};

use crate::error::CrsError;

use super::crs::{self, Crs};

// =============================================================================
// Feature Record
// =============================================================================

/// One geometry paired with its attribute row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// The geometry, in the coordinate system of the owning set
    pub geometry: Geometry<f64>,

    /// Attribute values keyed by field name
    pub properties: Map<String, Value>,
}

impl FeatureRecord {
    /// Create a record with an empty attribute row.
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            properties: Map::new(),
        }
    }

    /// Create a record with the given attribute row.
    pub fn with_properties(geometry: Geometry<f64>, properties: Map<String, Value>) -> Self {
        Self {
            geometry,
            properties,
        }
    }
}

// =============================================================================
// Feature Set
// =============================================================================

/// An ordered collection of feature records sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    features: Vec<FeatureRecord>,
    crs: Crs,
}

impl FeatureSet {
    /// Create a feature set from records already expressed in `crs`.
    pub fn new(features: Vec<FeatureRecord>, crs: Crs) -> Self {
        Self { features, crs }
    }

    /// Create an empty feature set tagged with `crs`.
    pub fn empty(crs: Crs) -> Self {
        Self {
            features: Vec::new(),
            crs,
        }
    }

    /// The CRS shared by every geometry in the set.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// The records of the set, in upload order.
    pub fn features(&self) -> &[FeatureRecord] {
        &self.features
    }

    /// Consume the set, yielding its records.
    pub fn into_features(self) -> Vec<FeatureRecord> {
        self.features
    }

    /// Number of records in the set.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set holds no records.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Reproject the whole set into another CRS.
    ///
    /// Consumes the set and returns a new one tagged with `to`. A no-op when
    /// the set is already in the target system.
    pub fn reproject(self, to: Crs) -> Result<FeatureSet, CrsError> {
        if self.crs == to {
            return Ok(self);
        }

        let from = self.crs;
        let features = self
            .features
            .into_iter()
            .map(|record| {
                Ok(FeatureRecord {
                    geometry: crs::reproject_geometry(&record.geometry, from, to)?,
                    properties: record.properties,
                })
            })
            .collect::<Result<Vec<_>, CrsError>>()?;

        Ok(FeatureSet { features, crs: to })
    }

    /// The combined bounding rectangle of every geometry in the set.
    ///
    /// `None` when the set is empty or no geometry has an extent.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        let mut combined: Option<Rect<f64>> = None;
        for record in &self.features {
            if let Some(rect) = record.geometry.bounding_rect() {
                combined = Some(match combined {
                    None => rect,
                    Some(acc) => merge_rects(acc, rect),
                });
            }
        }
        combined
    }

    /// Estimate the UTM zone covering the set's extent.
    ///
    /// The set must be in geographic coordinates; the zone is derived from
    /// the center of the combined bounding rectangle.
    pub fn estimate_utm(&self) -> Result<Crs, CrsError> {
        if !self.crs.is_geographic() {
            return Err(CrsError::Unsupported(format!(
                "UTM estimation requires geographic coordinates, set is {}",
                self.crs
            )));
        }
        let rect = self.bounding_rect().ok_or(CrsError::EmptyExtent)?;
        let center = rect.center();
        Ok(Crs::utm_for(center.x, center.y))
    }
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

// =============================================================================
// Tests
// =============================================================================
