//! Error types for the tilegrid library.

use std::fmt;

use thiserror::Error;

/// Axis of a raster or tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Vertical axis (y, rows).
    Rows,
    /// Horizontal axis (x, columns).
    Columns,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Rows => f.write_str("rows"),
            Axis::Columns => f.write_str("columns"),
        }
    }
}

/// Broad category of a [`TileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Contradictory or missing tiling parameters, or a malformed input definition.
    Configuration,
    /// A filename template referenced a key that has no value.
    Lookup,
    /// Reading or writing files failed.
    Io,
}

/// Errors that can occur while planning or emitting tiles.
#[derive(Error, Debug)]
pub enum TileError {
    /// IO error when reading rasters or writing tiles.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw raster file size doesn't match the declared shape.
    #[error("Invalid file size: {size} bytes (expected {expected} for the declared shape)")]
    InvalidFileSize { size: usize, expected: usize },

    /// Both a tile count and a tile size were given for one axis.
    #[error("Both tile count and tile size given for {axis}; specify exactly one")]
    ConflictingTileParams { axis: Axis },

    /// Neither a tile count nor a tile size was given for one axis.
    #[error("Neither tile count nor tile size given for {axis}")]
    MissingTileParams { axis: Axis },

    /// A tile count or tile size is unusable (e.g. zero).
    #[error("Invalid tiling parameter for {axis}: {reason}")]
    InvalidTileParam { axis: Axis, reason: String },

    /// A configuration setting couldn't be parsed.
    #[error("Invalid setting {name}={value:?}: {reason}")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    /// An area definition is malformed.
    #[error("Invalid area definition: {reason}")]
    InvalidArea { reason: String },

    /// Raster array shape disagrees with its area definition.
    #[error("Raster shape {actual:?} does not match area shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Band names don't match the raster's band count.
    #[error("Raster has {expected} bands but {actual} band names were given")]
    BandCount { expected: usize, actual: usize },

    /// Lettered grid boundaries don't land on whole source pixels.
    #[error("Lettered grid is not aligned with source pixels along {axis}: {what} is {pixels} pixels")]
    Misaligned {
        axis: Axis,
        what: &'static str,
        pixels: f64,
    },

    /// The requested sector isn't in the catalog.
    #[error("Unknown sector: {sector_id}")]
    UnknownSector { sector_id: String },

    /// Sector catalog could not be parsed.
    #[error("Invalid sector catalog: {0}")]
    SectorCatalog(#[from] serde_json::Error),

    /// Filename template couldn't be parsed.
    #[error("Invalid filename template {template:?} at byte {position}: {reason}")]
    TemplateSyntax {
        template: String,
        position: usize,
        reason: String,
    },

    /// Filename template references a key with no value.
    #[error("Unknown filename template key: {key}")]
    UnknownTemplateKey { key: String },
}

impl TileError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TileError::Io(_) | TileError::InvalidFileSize { .. } => ErrorKind::Io,
            TileError::UnknownTemplateKey { .. } => ErrorKind::Lookup,
            _ => ErrorKind::Configuration,
        }
    }
}

/// Result type alias using [`TileError`].
pub type Result<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TileError::InvalidFileSize {
            size: 1000,
            expected: 4000,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("4000"));

        let err = TileError::ConflictingTileParams { axis: Axis::Rows };
        assert!(err.to_string().contains("rows"));

        let err = TileError::UnknownTemplateKey {
            key: "Bad Key".to_string(),
        };
        assert!(err.to_string().contains("Bad Key"));

        let err = TileError::Misaligned {
            axis: Axis::Columns,
            what: "cell width",
            pixels: 2.5,
        };
        assert!(err.to_string().contains("columns"));
        assert!(err.to_string().contains("2.5"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            TileError::MissingTileParams { axis: Axis::Rows }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            TileError::UnknownTemplateKey {
                key: "x".to_string()
            }
            .kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            TileError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            TileError::UnknownSector {
                sector_id: "LCC".to_string()
            }
            .kind(),
            ErrorKind::Configuration
        );
    }
}
