//! Operation dispatch over feature sets.
//!
//! The [`OpService`] is the entry point for geometry requests. It owns no
//! per-request state; every call takes an [`OpRequest`], normalizes the
//! collections into a common planar CRS, applies one operation from the
//! fixed set, and reprojects the result to EPSG:4326 for display.
//!
//! # Pipeline
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        OpService                           │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                      apply()                         │  │
//! │  │  1. Validate inputs      3. Apply operation          │  │
//! │  │  2. Reproject to planar  4. Reproject to EPSG:4326   │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The geometric primitives themselves (overlay, buffering) are the geometry
//! library's `BooleanOps` and `Buffer` algorithms; this module only routes
//! feature records through them and keeps attribute rows attached.

use std::collections::BTreeMap;

use geo::algorithm::buffer::Buffer;
use geo::{BooleanOps, Contains};
use geo_types::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CrsError, OpError};
use crate::feature::{Crs, FeatureRecord, FeatureSet};

use super::operation::Operation;

// =============================================================================
// Operation Request
// =============================================================================

/// A request for one geometric operation.
#[derive(Debug, Clone)]
pub struct OpRequest {
    /// The operation to apply
    pub operation: Operation,

    /// The first (or only) collection
    pub primary: FeatureSet,

    /// The second collection, for two-input operations
    pub secondary: Option<FeatureSet>,

    /// Buffer distance in meters
    pub distance: Option<f64>,

    /// Attribute field to group by when dissolving
    pub group_by: Option<String>,
}

impl OpRequest {
    /// Create a request with only a primary collection.
    pub fn new(operation: Operation, primary: FeatureSet) -> Self {
        Self {
            operation,
            primary,
            secondary: None,
            distance: None,
            group_by: None,
        }
    }

    /// Create a buffer request.
    pub fn buffer(primary: FeatureSet, distance: f64) -> Self {
        Self {
            operation: Operation::Buffer,
            primary,
            secondary: None,
            distance: Some(distance),
            group_by: None,
        }
    }

    /// Attach the second collection.
    pub fn with_secondary(mut self, secondary: FeatureSet) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Attach a dissolve group-by field.
    pub fn with_group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }
}

// =============================================================================
// Operation Service
// =============================================================================

/// Dispatches requests onto the fixed operation set.
///
/// Overlay operations run in a planar CRS (World Mercator by default) so
/// distances and areas are meter-valued; buffering instead estimates a local
/// UTM zone per request for better metric accuracy. Every result comes back
/// in EPSG:4326.
pub struct OpService {
    /// Planar CRS used for two-collection overlay operations
    planar: Crs,
}

impl OpService {
    /// Create a service using World Mercator (EPSG:3395) for overlays.
    pub fn new() -> Self {
        Self {
            planar: Crs::WorldMercator,
        }
    }

    /// Create a service using a specific planar CRS for overlays.
    pub fn with_planar_crs(planar: Crs) -> Self {
        Self { planar }
    }

    /// Apply one operation and return the result in EPSG:4326.
    ///
    /// # Errors
    ///
    /// - [`OpError::MissingSecondInput`] when a two-input operation lacks
    ///   its second collection
    /// - [`OpError::MissingDistance`] when buffering without a distance
    /// - [`OpError::EmptyResult`] when the operation leaves no geometry
    /// - [`OpError::Crs`] when reprojection fails
    pub fn apply(&self, request: OpRequest) -> Result<FeatureSet, OpError> {
        let OpRequest {
            operation,
            primary,
            secondary,
            distance,
            group_by,
        } = request;

        debug!(
            operation = %operation,
            features = primary.len(),
            "dispatching operation"
        );

        match operation {
            Operation::Buffer => {
                let distance = distance.ok_or(OpError::MissingDistance)?;
                self.buffer(primary, distance)
            }
            Operation::Dissolve => self.dissolve(primary, group_by.as_deref()),
            Operation::Clip => {
                let (a, b) = self.planar_pair(primary, secondary, operation)?;
                let mask = dissolve_to_mask(b.features());
                let features = clip_features(a.features(), &mask);
                self.finish(FeatureSet::new(features, self.planar))
            }
            Operation::Difference => {
                let (a, b) = self.planar_pair(primary, secondary, operation)?;
                let mask = dissolve_to_mask(b.features());
                let features = difference_features(a.features(), &mask);
                self.finish(FeatureSet::new(features, self.planar))
            }
            Operation::Union => {
                let (a, b) = self.planar_pair(primary, secondary, operation)?;
                let features = union_features(a.features(), b.features());
                self.finish(FeatureSet::new(features, self.planar))
            }
            Operation::Intersect => {
                let (a, b) = self.planar_pair(primary, secondary, operation)?;
                let features = intersect_features(a.features(), b.features());
                self.finish(FeatureSet::new(features, self.planar))
            }
            Operation::Merge => {
                let (a, b) = self.planar_pair(primary, secondary, operation)?;
                let mut rows = a.into_features();
                rows.extend(b.into_features());
                self.finish(FeatureSet::new(rows, self.planar))
            }
        }
    }

    /// Buffer each geometry by a metric distance in a locally-estimated UTM
    /// zone, returning the expanded collection in EPSG:4326.
    fn buffer(&self, collection: FeatureSet, distance: f64) -> Result<FeatureSet, OpError> {
        let collection = collection.reproject(Crs::Wgs84)?;

        let utm = match collection.estimate_utm() {
            Ok(utm) => utm,
            Err(CrsError::EmptyExtent) => return Err(OpError::EmptyResult),
            Err(e) => return Err(e.into()),
        };
        debug!(utm = %utm, "estimated UTM zone for buffering");

        let projected = collection.reproject(utm)?;
        let features = projected
            .into_features()
            .into_iter()
            .filter_map(|record| {
                buffer_geometry(&record.geometry, distance).map(|geometry| FeatureRecord {
                    geometry,
                    properties: record.properties,
                })
            })
            .collect();

        self.finish(FeatureSet::new(features, utm))
    }

    /// Merge all geometries into one feature, or one feature per group.
    fn dissolve(
        &self,
        collection: FeatureSet,
        group_by: Option<&str>,
    ) -> Result<FeatureSet, OpError> {
        let collection = collection.reproject(self.planar)?;

        let features = match group_by {
            None => dissolve_group(collection.features()).into_iter().collect(),
            Some(field) => {
                let mut groups: BTreeMap<String, Vec<FeatureRecord>> = BTreeMap::new();
                for record in collection.into_features() {
                    let key = record
                        .properties
                        .get(field)
                        .map(group_key)
                        .unwrap_or_default();
                    groups.entry(key).or_default().push(record);
                }
                groups
                    .into_values()
                    .filter_map(|records| dissolve_group(&records))
                    .collect()
            }
        };

        self.finish(FeatureSet::new(features, self.planar))
    }

    /// Resolve and reproject both collections of a two-input operation.
    fn planar_pair(
        &self,
        primary: FeatureSet,
        secondary: Option<FeatureSet>,
        operation: Operation,
    ) -> Result<(FeatureSet, FeatureSet), OpError> {
        let secondary = secondary.ok_or(OpError::MissingSecondInput(operation.name()))?;
        Ok((
            primary.reproject(self.planar)?,
            secondary.reproject(self.planar)?,
        ))
    }

    /// Reject empty results and reproject the rest for display.
    fn finish(&self, result: FeatureSet) -> Result<FeatureSet, OpError> {
        if result.is_empty() {
            return Err(OpError::EmptyResult);
        }
        Ok(result.reproject(Crs::Wgs84)?)
    }
}

impl Default for OpService {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Per-Operation Helpers
// =============================================================================

/// Restrict every feature of `features` to the mask.
fn clip_features(features: &[FeatureRecord], mask: &MultiPolygon<f64>) -> Vec<FeatureRecord> {
    features
        .iter()
        .filter_map(|record| {
            clip_geometry(&record.geometry, mask)
                .map(|g| FeatureRecord::with_properties(g, record.properties.clone()))
        })
        .collect()
}

fn clip_geometry(geometry: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Polygon(p) => {
            nonempty_polygons(mask.intersection(&MultiPolygon::new(vec![p.clone()])))
        }
        Geometry::MultiPolygon(mp) => nonempty_polygons(mask.intersection(mp)),
        Geometry::Rect(r) => {
            nonempty_polygons(mask.intersection(&MultiPolygon::new(vec![r.to_polygon()])))
        }
        Geometry::Triangle(t) => {
            nonempty_polygons(mask.intersection(&MultiPolygon::new(vec![t.to_polygon()])))
        }
        Geometry::LineString(ls) => {
            nonempty_lines(mask.clip(&MultiLineString::new(vec![ls.clone()]), false))
        }
        Geometry::MultiLineString(mls) => nonempty_lines(mask.clip(mls, false)),
        Geometry::Line(l) => nonempty_lines(mask.clip(
            &MultiLineString::new(vec![LineString::from(vec![l.start, l.end])]),
            false,
        )),
        Geometry::Point(p) => mask.contains(p).then(|| Geometry::Point(*p)),
        Geometry::MultiPoint(mp) => {
            let kept: Vec<Point<f64>> =
                mp.0.iter().filter(|p| mask.contains(*p)).copied().collect();
            (!kept.is_empty()).then(|| MultiPoint::new(kept).into())
        }
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry<f64>> =
                gc.0.iter().filter_map(|g| clip_geometry(g, mask)).collect();
            (!parts.is_empty()).then(|| GeometryCollection::from(parts).into())
        }
    }
}

/// Subtract the mask from every feature of `features`.
fn difference_features(features: &[FeatureRecord], mask: &MultiPolygon<f64>) -> Vec<FeatureRecord> {
    features
        .iter()
        .filter_map(|record| {
            difference_geometry(&record.geometry, mask)
                .map(|g| FeatureRecord::with_properties(g, record.properties.clone()))
        })
        .collect()
}

fn difference_geometry(
    geometry: &Geometry<f64>,
    mask: &MultiPolygon<f64>,
) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Polygon(p) => {
            nonempty_polygons(MultiPolygon::new(vec![p.clone()]).difference(mask))
        }
        Geometry::MultiPolygon(mp) => nonempty_polygons(mp.difference(mask)),
        Geometry::Rect(r) => {
            nonempty_polygons(MultiPolygon::new(vec![r.to_polygon()]).difference(mask))
        }
        Geometry::Triangle(t) => {
            nonempty_polygons(MultiPolygon::new(vec![t.to_polygon()]).difference(mask))
        }
        Geometry::LineString(ls) => {
            nonempty_lines(mask.clip(&MultiLineString::new(vec![ls.clone()]), true))
        }
        Geometry::MultiLineString(mls) => nonempty_lines(mask.clip(mls, true)),
        Geometry::Line(l) => nonempty_lines(mask.clip(
            &MultiLineString::new(vec![LineString::from(vec![l.start, l.end])]),
            true,
        )),
        Geometry::Point(p) => (!mask.contains(p)).then(|| Geometry::Point(*p)),
        Geometry::MultiPoint(mp) => {
            let kept: Vec<Point<f64>> = mp
                .0
                .iter()
                .filter(|p| !mask.contains(*p))
                .copied()
                .collect();
            (!kept.is_empty()).then(|| MultiPoint::new(kept).into())
        }
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry<f64>> = gc
                .0
                .iter()
                .filter_map(|g| difference_geometry(g, mask))
                .collect();
            (!parts.is_empty()).then(|| GeometryCollection::from(parts).into())
        }
    }
}

/// Union both collections' dissolved geometries into a single feature.
///
/// The result carries no attribute row; it no longer corresponds to any
/// input feature.
fn union_features(a: &[FeatureRecord], b: &[FeatureRecord]) -> Vec<FeatureRecord> {
    dissolve_geometries(a.iter().chain(b.iter()).map(|record| &record.geometry))
        .map(|geometry| vec![FeatureRecord::new(geometry)])
        .unwrap_or_default()
}

/// Pairwise overlay of the polygonal features of both collections.
fn intersect_features(a: &[FeatureRecord], b: &[FeatureRecord]) -> Vec<FeatureRecord> {
    let mut out = Vec::new();
    for record_a in a {
        let Some(poly_a) = to_multipolygon(&record_a.geometry) else {
            debug!("skipping non-polygonal feature in overlay");
            continue;
        };
        for record_b in b {
            let Some(poly_b) = to_multipolygon(&record_b.geometry) else {
                continue;
            };
            let clipped = poly_a.intersection(&poly_b);
            if clipped.0.is_empty() {
                continue;
            }
            out.push(FeatureRecord::with_properties(
                clipped.into(),
                merge_properties(&record_a.properties, &record_b.properties),
            ));
        }
    }
    out
}

/// Merge both attribute rows, suffixing the second side's keys on collision.
fn merge_properties(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = a.clone();
    for (key, value) in b {
        if merged.contains_key(key) {
            merged.insert(format!("{}_2", key), value.clone());
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Dissolve a group of records into a single feature, keeping the first
/// row's attributes.
fn dissolve_group(records: &[FeatureRecord]) -> Option<FeatureRecord> {
    let geometry = dissolve_geometries(records.iter().map(|record| &record.geometry))?;
    let properties = records
        .first()
        .map(|record| record.properties.clone())
        .unwrap_or_default();
    Some(FeatureRecord::with_properties(geometry, properties))
}

fn group_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// Geometry Helpers
// =============================================================================

/// Union an arbitrary mix of geometries into one.
///
/// Polygonal parts are unioned with the overlay engine; lines and points are
/// gathered into their multi-part forms. A mixed result becomes a geometry
/// collection.
fn dissolve_geometries<'a, I>(geometries: I) -> Option<Geometry<f64>>
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    let mut polygons = Vec::new();
    let mut lines = Vec::new();
    let mut points = Vec::new();
    for geometry in geometries {
        collect_parts(geometry, &mut polygons, &mut lines, &mut points);
    }

    let mut parts: Vec<Geometry<f64>> = Vec::new();
    if let Some(unioned) = union_all(&polygons) {
        if !unioned.0.is_empty() {
            parts.push(unioned.into());
        }
    }
    if !lines.is_empty() {
        parts.push(MultiLineString::new(lines).into());
    }
    if !points.is_empty() {
        parts.push(MultiPoint::new(points).into());
    }

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(GeometryCollection::from(parts).into()),
    }
}

/// Split a geometry into its polygonal, linear, and point parts.
fn collect_parts(
    geometry: &Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    lines: &mut Vec<LineString<f64>>,
    points: &mut Vec<Point<f64>>,
) {
    match geometry {
        Geometry::Polygon(p) => polygons.push(p.clone()),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::LineString(ls) => lines.push(ls.clone()),
        Geometry::MultiLineString(mls) => lines.extend(mls.0.iter().cloned()),
        Geometry::Line(l) => lines.push(LineString::from(vec![l.start, l.end])),
        Geometry::Point(p) => points.push(*p),
        Geometry::MultiPoint(mp) => points.extend(mp.0.iter().copied()),
        Geometry::GeometryCollection(gc) => {
            for part in &gc.0 {
                collect_parts(part, polygons, lines, points);
            }
        }
    }
}

/// Fold a list of polygons into their union.
fn union_all(polygons: &[Polygon<f64>]) -> Option<MultiPolygon<f64>> {
    let mut acc: Option<MultiPolygon<f64>> = None;
    for polygon in polygons {
        let mp = MultiPolygon::new(vec![polygon.clone()]);
        acc = Some(match acc {
            None => mp,
            Some(existing) => existing.union(&mp),
        });
    }
    acc
}

/// Union the polygonal parts of a collection into an overlay mask.
fn dissolve_to_mask(features: &[FeatureRecord]) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut lines = Vec::new();
    let mut points = Vec::new();
    for record in features {
        collect_parts(&record.geometry, &mut polygons, &mut lines, &mut points);
    }
    union_all(&polygons).unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// The polygonal parts of a geometry, if it has any.
fn to_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    let mut lines = Vec::new();
    let mut points = Vec::new();
    collect_parts(geometry, &mut polygons, &mut lines, &mut points);
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

/// Buffer a geometry, yielding its expanded polygonal form.
fn buffer_geometry(geometry: &Geometry<f64>, distance: f64) -> Option<Geometry<f64>> {
    let buffered = match geometry {
        Geometry::Polygon(p) => p.buffer(distance),
        Geometry::MultiPolygon(mp) => mp.buffer(distance),
        Geometry::LineString(ls) => ls.buffer(distance),
        Geometry::MultiLineString(mls) => mls.buffer(distance),
        Geometry::Point(p) => p.buffer(distance),
        Geometry::MultiPoint(mp) => mp.buffer(distance),
        Geometry::Line(l) => LineString::from(vec![l.start, l.end]).buffer(distance),
        Geometry::Rect(r) => r.to_polygon().buffer(distance),
        Geometry::Triangle(t) => t.to_polygon().buffer(distance),
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Polygon<f64>> = gc
                .0
                .iter()
                .filter_map(|g| buffer_geometry(g, distance))
                .flat_map(|g| match g {
                    Geometry::MultiPolygon(mp) => mp.0,
                    _ => Vec::new(),
                })
                .collect();
            union_all(&parts).unwrap_or_else(|| MultiPolygon::new(Vec::new()))
        }
    };

    (!buffered.0.is_empty()).then(|| Geometry::MultiPolygon(buffered))
}

fn nonempty_polygons(mp: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    (!mp.0.is_empty()).then(|| mp.into())
}

fn nonempty_lines(mls: MultiLineString<f64>) -> Option<Geometry<f64>> {
    (!mls.0.is_empty()).then(|| mls.into())
}

// =============================================================================
// Tests
// =============================================================================
