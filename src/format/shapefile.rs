//! Zipped shapefile intake.
//!
//! A shapefile bundle arrives as a zip archive holding at least the `.shp`
//! geometry file and its `.dbf` attribute sidecar. The archive is extracted
//! into a per-request temporary directory, the first `.shp` entry is located
//! by a directory walk, and the shapes plus attribute rows are read into a
//! [`FeatureSet`].
//!
//! The temporary directory is owned by a [`tempfile::TempDir`] guard, so it
//! is removed on every exit path, including extraction and parse failures.
//!
//! # CRS handling
//!
//! Shapefiles carry their CRS in an optional `.prj` sidecar as WKT. The WKT
//! is sniffed for the systems this service supports (UTM zones, World
//! Mercator, Web Mercator); anything else, or a missing sidecar, is taken as
//! geographic WGS 84. The collection is then normalized to EPSG:4326 like
//! every other intake path.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use tracing::debug;
use walkdir::WalkDir;

use geo::Contains;
use geo_types::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

use crate::error::IntakeError;
use crate::feature::{Crs, FeatureRecord, FeatureSet};

// =============================================================================
// Intake
// =============================================================================

/// Parse an uploaded zip archive containing a shapefile bundle.
///
/// Returns the collection normalized to EPSG:4326. Fails with
/// [`IntakeError::MissingShapefile`] when the archive holds no `.shp` entry.
pub fn read_zip_feature_set(bytes: &[u8]) -> Result<FeatureSet, IntakeError> {
    let temp_dir = tempfile::tempdir()?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IntakeError::InvalidArchive(e.to_string()))?;
    archive
        .extract(temp_dir.path())
        .map_err(|e| IntakeError::InvalidArchive(e.to_string()))?;

    let shp_path = find_shapefile(temp_dir.path()).ok_or(IntakeError::MissingShapefile)?;
    debug!(path = %shp_path.display(), "found shapefile entry");

    let crs = sniff_prj(&shp_path);
    let set = read_shapefile(&shp_path, crs)?;

    Ok(set.reproject(Crs::Wgs84)?)
}

/// Walk the extraction directory for the first `.shp` entry.
fn find_shapefile(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("shp"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
}

/// Read the `.prj` sidecar next to the shapefile, if one exists.
fn sniff_prj(shp_path: &Path) -> Crs {
    let prj_path = shp_path.with_extension("prj");
    match std::fs::read_to_string(&prj_path) {
        Ok(wkt) => {
            let crs = crs_from_prj(&wkt);
            debug!(crs = %crs, "sniffed CRS from .prj sidecar");
            crs
        }
        Err(_) => Crs::Wgs84,
    }
}

/// Sniff a supported CRS out of ESRI or OGC WKT.
///
/// Only names this service can reproject are recognized; everything else
/// falls back to geographic WGS 84.
fn crs_from_prj(wkt: &str) -> Crs {
    let lower = wkt.to_lowercase();

    if let Some(utm) = parse_utm_zone(&lower) {
        return utm;
    }
    if lower.contains("3395") || lower.contains("world_mercator") || lower.contains("world mercator")
    {
        return Crs::WorldMercator;
    }
    if lower.contains("3857")
        || lower.contains("pseudo-mercator")
        || lower.contains("web_mercator")
        || lower.contains("web mercator")
    {
        return Crs::WebMercator;
    }

    Crs::Wgs84
}

/// Parse a UTM zone designation like `UTM_Zone_48S` or `UTM zone 31N`.
fn parse_utm_zone(wkt_lower: &str) -> Option<Crs> {
    let utm_idx = wkt_lower.find("utm")?;
    let rest = &wkt_lower[utm_idx..];
    let zone_idx = rest.find("zone")?;
    let rest = rest[zone_idx + 4..].trim_start_matches(|c: char| c == '_' || c.is_whitespace());

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: u8 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }

    let south = rest[digits.len()..].trim_start().starts_with('s');
    Some(Crs::Utm { zone, south })
}

/// Read the shapes and attribute rows of a `.shp`/`.dbf` pair.
fn read_shapefile(path: &Path, crs: Crs) -> Result<FeatureSet, IntakeError> {
    let mut reader = shapefile::Reader::from_path(path)
        .map_err(|e| IntakeError::InvalidShapefile(e.to_string()))?;

    let mut features = Vec::new();
    for entry in reader.iter_shapes_and_records() {
        let (shape, record) = entry.map_err(|e| IntakeError::InvalidShapefile(e.to_string()))?;

        let Some(geometry) = shape_to_geometry(shape)? else {
            continue;
        };

        let mut properties = Map::new();
        for (name, value) in record {
            properties.insert(name, field_to_json(value));
        }

        features.push(FeatureRecord::with_properties(geometry, properties));
    }

    Ok(FeatureSet::new(features, crs))
}

// =============================================================================
// Shape Conversion
// =============================================================================

/// Access to the planar coordinates of any shapefile point type.
///
/// Z and M values are dropped; the operation set is strictly 2D.
trait PlanarXy {
    fn xy(&self) -> (f64, f64);
}

impl PlanarXy for shapefile::Point {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl PlanarXy for shapefile::PointM {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl PlanarXy for shapefile::PointZ {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Convert one shape into a geometry, or `None` for null shapes.
fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry<f64>>, IntakeError> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),

        Shape::Point(p) => point(&p).into(),
        Shape::PointM(p) => point(&p).into(),
        Shape::PointZ(p) => point(&p).into(),

        Shape::Multipoint(mp) => multipoint(mp.points()).into(),
        Shape::MultipointM(mp) => multipoint(mp.points()).into(),
        Shape::MultipointZ(mp) => multipoint(mp.points()).into(),

        Shape::Polyline(pl) => multilinestring(pl.parts()).into(),
        Shape::PolylineM(pl) => multilinestring(pl.parts()).into(),
        Shape::PolylineZ(pl) => multilinestring(pl.parts()).into(),

        Shape::Polygon(pg) => rings_to_multipolygon(classify_rings(pg.rings())).into(),
        Shape::PolygonM(pg) => rings_to_multipolygon(classify_rings(pg.rings())).into(),
        Shape::PolygonZ(pg) => rings_to_multipolygon(classify_rings(pg.rings())).into(),

        Shape::Multipatch(_) => {
            return Err(IntakeError::UnsupportedShape("multipatch".to_string()));
        }
    };

    Ok(Some(geometry))
}

fn point<P: PlanarXy>(p: &P) -> Point<f64> {
    let (x, y) = p.xy();
    Point::new(x, y)
}

fn multipoint<P: PlanarXy>(points: &[P]) -> MultiPoint<f64> {
    MultiPoint::new(points.iter().map(point).collect())
}

fn linestring<P: PlanarXy>(points: &[P]) -> LineString<f64> {
    LineString::new(
        points
            .iter()
            .map(|p| {
                let (x, y) = p.xy();
                Coord { x, y }
            })
            .collect(),
    )
}

fn multilinestring<P: PlanarXy>(parts: &[Vec<P>]) -> MultiLineString<f64> {
    MultiLineString::new(parts.iter().map(|part| linestring(part)).collect())
}

fn classify_rings<P: PlanarXy>(rings: &[PolygonRing<P>]) -> Vec<(bool, LineString<f64>)> {
    rings
        .iter()
        .map(|ring| match ring {
            PolygonRing::Outer(points) => (true, linestring(points)),
            PolygonRing::Inner(points) => (false, linestring(points)),
        })
        .collect()
}

/// Assemble classified rings into a multipolygon.
///
/// Each inner ring is attached to the first outer ring containing its lead
/// vertex; inner rings that land in no outer ring are dropped.
fn rings_to_multipolygon(rings: Vec<(bool, LineString<f64>)>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut inners: Vec<LineString<f64>> = Vec::new();

    for (is_outer, ring) in rings {
        if is_outer {
            polygons.push(Polygon::new(ring, Vec::new()));
        } else {
            inners.push(ring);
        }
    }

    for inner in inners {
        let Some(lead) = inner.coords().next().copied() else {
            continue;
        };
        let lead = Point::from(lead);
        if let Some(polygon) = polygons.iter_mut().find(|p| p.contains(&lead)) {
            polygon.interiors_push(inner);
        }
    }

    MultiPolygon::new(polygons)
}

// =============================================================================
// Attribute Conversion
// =============================================================================

/// Convert one DBF field value into its JSON representation.
fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(v) => v.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Memo(v) => Value::String(v),
        FieldValue::Numeric(v) => v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Float(v) => v
            .and_then(|n| serde_json::Number::from_f64(n as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Double(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Currency(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Integer(v) => Value::Number(v.into()),
        FieldValue::Logical(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(v) => v
            .map(|d| Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

// =============================================================================
// Tests
// =============================================================================
