//! GeoJSON intake and response encoding.
//!
//! Uploaded GeoJSON payloads are parsed into a [`FeatureSet`] and normalized
//! to EPSG:4326. RFC 7946 GeoJSON is always geographic, so a payload without
//! CRS information is taken as EPSG:4326 as-is; payloads carrying the legacy
//! `crs` foreign member are reprojected from the declared system.
//!
//! The encoder is the inverse: a finished [`FeatureSet`] becomes the
//! `FeatureCollection` structure serialized as the HTTP response body.

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CrsError, IntakeError};
use crate::feature::{Crs, FeatureRecord, FeatureSet};

// =============================================================================
// Intake
// =============================================================================

/// Parse uploaded GeoJSON bytes into a feature set in EPSG:4326.
///
/// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry,
/// mirroring what desktop GIS tools export. Features with a `null` geometry
/// are dropped.
pub fn read_feature_set(bytes: &[u8]) -> Result<FeatureSet, IntakeError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| IntakeError::InvalidGeoJson("payload is not valid UTF-8".to_string()))?;

    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| IntakeError::InvalidGeoJson(e.to_string()))?;

    let (features, declared_crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = parse_legacy_crs(fc.foreign_members.as_ref())?;
            let mut records = Vec::with_capacity(fc.features.len());
            for feature in fc.features {
                if let Some(record) = convert_feature(feature)? {
                    records.push(record);
                }
            }
            (records, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = parse_legacy_crs(feature.foreign_members.as_ref())?;
            (convert_feature(feature)?.into_iter().collect(), crs)
        }
        GeoJson::Geometry(geometry) => {
            let geom = geo_types::Geometry::<f64>::try_from(geometry)
                .map_err(|e| IntakeError::InvalidGeoJson(e.to_string()))?;
            (vec![FeatureRecord::new(geom)], None)
        }
    };

    let crs = declared_crs.unwrap_or(Crs::Wgs84);
    let set = FeatureSet::new(features, crs);

    // Normalize everything to geographic coordinates at intake
    Ok(set.reproject(Crs::Wgs84)?)
}

fn convert_feature(feature: Feature) -> Result<Option<FeatureRecord>, IntakeError> {
    let Some(geometry) = feature.geometry else {
        debug!("skipping feature with null geometry");
        return Ok(None);
    };

    let geom = geo_types::Geometry::<f64>::try_from(geometry)
        .map_err(|e| IntakeError::InvalidGeoJson(e.to_string()))?;

    Ok(Some(FeatureRecord::with_properties(
        geom,
        feature.properties.unwrap_or_default(),
    )))
}

/// Read the pre-RFC 7946 `crs` member, if the payload carries one.
///
/// Recognizes the named-CRS form with `EPSG:<code>`,
/// `urn:ogc:def:crs:EPSG::<code>`, and the `CRS84` alias for EPSG:4326.
fn parse_legacy_crs(foreign_members: Option<&Map<String, Value>>) -> Result<Option<Crs>, IntakeError> {
    let Some(crs_value) = foreign_members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };

    let name = crs_value
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            IntakeError::Crs(CrsError::Unsupported(format!(
                "unrecognized crs member: {}",
                crs_value
            )))
        })?;

    if name.ends_with("CRS84") {
        return Ok(Some(Crs::Wgs84));
    }

    let code = name
        .rsplit(':')
        .next()
        .and_then(|tail| tail.parse::<u32>().ok())
        .ok_or_else(|| IntakeError::Crs(CrsError::Unsupported(name.to_string())))?;

    Ok(Some(Crs::from_epsg(code)?))
}

// =============================================================================
// Response Encoding
// =============================================================================

/// Encode a finished feature set as a GeoJSON `FeatureCollection`.
///
/// The dispatcher reprojects every result to EPSG:4326 before encoding, so
/// no CRS member is written; the output is plain RFC 7946 GeoJSON.
pub fn to_feature_collection(set: &FeatureSet) -> FeatureCollection {
    let features = set
        .features()
        .iter()
        .map(|record| Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &record.geometry,
            ))),
            id: None,
            properties: Some(record.properties.clone()),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

// =============================================================================
// Tests
// =============================================================================
