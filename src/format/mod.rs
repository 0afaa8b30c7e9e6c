//! Upload intake parsers and response encoding.
//!
//! Two upload shapes are accepted:
//!
//! - raw GeoJSON payloads ([`geojson`])
//! - zipped shapefile bundles ([`shapefile`])
//!
//! Both produce a [`crate::feature::FeatureSet`] normalized to EPSG:4326.
//! The [`geojson`] module also encodes finished sets back into the GeoJSON
//! `FeatureCollection` returned as the response body.

pub mod geojson;
pub mod shapefile;

pub use geojson::{read_feature_set, to_feature_collection};
pub use shapefile::read_zip_feature_set;
