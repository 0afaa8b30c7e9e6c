use thiserror::Error;

/// Errors related to coordinate reference systems and reprojection
#[derive(Debug, Clone, Error)]
pub enum CrsError {
    /// The upload declared a CRS this service does not know how to handle
    #[error("unsupported coordinate reference system: {0}")]
    Unsupported(String),

    /// A projection definition could not be compiled (should map to HTTP 500)
    #[error("projection setup failed: {0}")]
    InvalidDefinition(String),

    /// A coordinate could not be transformed between two systems
    #[error("coordinate transformation failed: {0}")]
    Transform(String),

    /// The collection has no coordinates to derive an extent from
    #[error("collection has no spatial extent")]
    EmptyExtent,
}

/// Errors that can occur while turning uploaded bytes into a feature set
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The payload is not parseable GeoJSON
    #[error("invalid GeoJSON payload: {0}")]
    InvalidGeoJson(String),

    /// The upload is not a readable zip archive
    #[error("invalid zip archive: {0}")]
    InvalidArchive(String),

    /// The archive contains no `.shp` entry
    #[error("no .shp file found in the zip archive")]
    MissingShapefile,

    /// The `.shp`/`.dbf` pair could not be read
    #[error("failed to read shapefile: {0}")]
    InvalidShapefile(String),

    /// The shapefile uses a shape type this service does not handle
    #[error("unsupported shape type: {0}")]
    UnsupportedShape(String),

    /// CRS error while normalizing the collection
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// Filesystem error while extracting the archive
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the operation dispatcher
#[derive(Debug, Error)]
pub enum OpError {
    /// The requested operation name is not in the fixed operation set
    #[error("operation '{0}' is not supported")]
    UnsupportedOperation(String),

    /// A two-input operation was requested with a single collection
    #[error("operation '{0}' requires two files")]
    MissingSecondInput(&'static str),

    /// Buffer was requested without a distance
    #[error("operation 'buffer' requires a buffer distance")]
    MissingDistance,

    /// The operation produced no geometry (should map to HTTP 404)
    #[error("the operation resulted in an empty geometry")]
    EmptyResult,

    /// Reprojection failed while preparing inputs or finalizing the result
    #[error(transparent)]
    Crs(#[from] CrsError),
}
