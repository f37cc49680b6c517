//! Error types used by the crate.

use thiserror::Error;

use crate::drawing::{DrawTool, FeatureId};

/// Mapboard error type.
///
/// Errors produced by invalid user input are reported by [`MapboardError::is_validation`], their
/// `Display` text is meant to be shown to the user as is.
#[derive(Debug, Error)]
pub enum MapboardError {
    /// Buffer distance is not a finite number.
    #[error("Please enter a valid buffer distance.")]
    InvalidBufferDistance,
    /// Buffer was requested before any feature was drawn.
    #[error("Please draw a feature first.")]
    NoDrawnFeature,
    /// The drawing tool is disabled in the configuration.
    #[error("{0} drawing is disabled")]
    ToolDisabled(DrawTool),
    /// A sketch was finished before it had enough vertices.
    #[error("{tool} needs at least {required} points, got {actual}")]
    IncompleteSketch {
        /// Tool of the sketch.
        tool: DrawTool,
        /// Number of vertices needed.
        required: usize,
        /// Number of vertices collected.
        actual: usize,
    },
    /// Sketch vertices describe a shape without extent (zero size rectangle or circle).
    #[error("{0} has zero size")]
    DegenerateSketch(DrawTool),
    /// Geometry type does not match the drawing tool.
    #[error("{tool} cannot hold a {geometry} geometry")]
    GeometryMismatch {
        /// Tool the feature was created with.
        tool: DrawTool,
        /// Name of the supplied geometry type.
        geometry: &'static str,
    },
    /// Drawn feature not found.
    #[error("feature {0} not found")]
    FeatureNotFound(FeatureId),
    /// Layer with the given name is not in the catalog.
    #[error("layer '{0}' not found")]
    UnknownLayer(String),
    /// Catalog configuration is invalid.
    #[error("invalid layer catalog: {0}")]
    InvalidCatalog(String),
    /// Tile URL template cannot be expanded.
    #[error("invalid url template '{template}': {reason}")]
    UrlTemplate {
        /// The template.
        template: String,
        /// Error reported by the formatter.
        reason: String,
    },
    /// Buffering routine failed.
    #[error("failed to buffer the feature: {0}")]
    Buffer(String),
    /// Buffering routine produced an empty geometry.
    #[error("buffer of the feature is empty")]
    EmptyBuffer,
    /// Uploaded file is not a zip archive.
    #[error("'{0}' is not a .zip archive")]
    NotZipArchive(String),
    /// Zip archive does not contain any `.shp` member.
    #[error("no shapefile found in '{0}'")]
    NoShapefile(String),
    /// Shapefile uses a coordinate system that cannot be converted to longitude and latitude.
    #[error("unsupported coordinate system: {0}")]
    UnsupportedProjection(String),
    /// Error reading the zip archive.
    #[error("failed to read archive")]
    Archive(#[from] zip::result::ZipError),
    /// Error decoding a shapefile.
    #[error("failed to decode shapefile")]
    Shapefile(#[from] shapefile::Error),
    /// Error converting to or from GeoJSON.
    #[error("geojson error")]
    GeoJson(#[from] geojson::Error),
    /// Error parsing the configuration.
    #[error("failed to parse configuration")]
    Config(#[from] serde_json::Error),
    /// Error reading data from the FS.
    #[error("failed to read file")]
    FsIo(#[from] std::io::Error),
}

impl MapboardError {
    /// Returns true if the error is caused by invalid user input rather than by a failure of
    /// an underlying library.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidBufferDistance
                | Self::NoDrawnFeature
                | Self::ToolDisabled(_)
                | Self::IncompleteSketch { .. }
                | Self::DegenerateSketch(_)
                | Self::NotZipArchive(_)
        )
    }
}
