//! Coordinate reference system handling.
//!
//! Every feature set carries exactly one [`Crs`] tag. This module defines the
//! systems the service understands, their proj-string definitions, and the
//! reprojection helper used for whole-collection transforms.
//!
//! # Supported systems
//!
//! - `EPSG:4326` - WGS 84 geographic coordinates (degrees), the intake and
//!   display system
//! - `EPSG:3395` - World Mercator (meters), the planar system used for
//!   two-collection overlay operations
//! - `EPSG:3857` - Web Mercator (meters), accepted on legacy GeoJSON uploads
//! - `EPSG:326xx`/`EPSG:327xx` - WGS 84 UTM zones (meters), estimated locally
//!   for metric buffering

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj4rs::proj::Proj;

use crate::error::CrsError;

// =============================================================================
// CRS Model
// =============================================================================

/// A coordinate reference system known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS 84 geographic coordinates (EPSG:4326), degree-valued
    Wgs84,

    /// World Mercator (EPSG:3395), meter-valued
    WorldMercator,

    /// Web Mercator (EPSG:3857), meter-valued
    WebMercator,

    /// A WGS 84 UTM zone (EPSG:326xx north / EPSG:327xx south), meter-valued
    Utm { zone: u8, south: bool },
}

impl Crs {
    /// Resolve an EPSG code to a supported CRS.
    pub fn from_epsg(code: u32) -> Result<Self, CrsError> {
        match code {
            4326 => Ok(Crs::Wgs84),
            3395 => Ok(Crs::WorldMercator),
            3857 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            other => Err(CrsError::Unsupported(format!("EPSG:{}", other))),
        }
    }

    /// The EPSG code of this CRS.
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WorldMercator => 3395,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, south: false } => 32600 + *zone as u32,
            Crs::Utm { zone, south: true } => 32700 + *zone as u32,
        }
    }

    /// Whether coordinates in this system are degree-valued.
    ///
    /// Geographic coordinates must be converted to radians before being fed
    /// to the projection engine, and back to degrees afterwards.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    /// The proj-string definition used to build the projection.
    pub fn proj_string(&self) -> String {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            Crs::WorldMercator => {
                "+proj=merc +lon_0=0 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs".to_string()
            }
            Crs::WebMercator => {
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                    .to_string()
            }
            Crs::Utm { zone, south } => {
                let mut def = format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", zone);
                if *south {
                    def.push_str(" +south");
                }
                def
            }
        }
    }

    /// The UTM zone covering a geographic point, as used for metric buffering.
    ///
    /// `lon` and `lat` are degree-valued WGS 84 coordinates.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Crs::Utm {
            zone,
            south: lat < 0.0,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

// =============================================================================
// Reprojection
// =============================================================================

/// Reproject a single geometry between two reference systems.
///
/// Builds both projections once and transforms every coordinate of the
/// geometry. Returns the input unchanged when `from == to`.
pub fn reproject_geometry(
    geometry: &Geometry<f64>,
    from: Crs,
    to: Crs,
) -> Result<Geometry<f64>, CrsError> {
    if from == to {
        return Ok(geometry.clone());
    }

    let src = compile(from)?;
    let dst = compile(to)?;

    geometry.try_map_coords(|coord| transform_coord(coord, &src, &dst, from, to))
}

/// Compile a CRS into a projection, surfacing definition errors.
fn compile(crs: Crs) -> Result<Proj, CrsError> {
    Proj::from_proj_string(&crs.proj_string())
        .map_err(|e| CrsError::InvalidDefinition(format!("{}: {}", crs, e)))
}

/// Transform one coordinate, handling the degree/radian convention of the
/// projection engine on both sides.
fn transform_coord(
    coord: Coord<f64>,
    src: &Proj,
    dst: &Proj,
    from: Crs,
    to: Crs,
) -> Result<Coord<f64>, CrsError> {
    let mut point = if from.is_geographic() {
        (coord.x.to_radians(), coord.y.to_radians(), 0.0)
    } else {
        (coord.x, coord.y, 0.0)
    };

    proj4rs::transform::transform(src, dst, &mut point)
        .map_err(|e| CrsError::Transform(e.to_string()))?;

    let (x, y) = if to.is_geographic() {
        (point.0.to_degrees(), point.1.to_degrees())
    } else {
        (point.0, point.1)
    };

    Ok(Coord { x, y })
}

// =============================================================================
// Tests
// =============================================================================
