//! Source rasters.
//!
//! The tiler only ever reads a raster: it asks for the area definition,
//! the missing-value sentinel and views of pixel windows. [`RasterSource`]
//! is that read-only surface; [`Raster`] is the in-memory implementation.

use chrono::{DateTime, Utc};
use ndarray::{s, Array2, Array3, ArrayView2, Axis as ArrayAxis};
use serde::{Deserialize, Serialize};

use crate::area::AreaDefinition;
use crate::error::{Result, TileError};
use crate::mapper::TileWindow;

/// The value marking a sample as invalid or absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValue {
    /// Missing samples are NaN.
    #[default]
    Nan,
    /// Missing samples carry this fill value. NaN is still treated as missing.
    Fill(f32),
}

impl MissingValue {
    /// Check if a sample is missing.
    #[inline]
    pub fn is_missing(&self, value: f32) -> bool {
        match *self {
            MissingValue::Nan => value.is_nan(),
            MissingValue::Fill(fill) => value.is_nan() || value == fill,
        }
    }
}

/// Descriptive metadata passed through to every emitted tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Dataset name, e.g. `"C13"` or `"true_color"`.
    pub name: String,
    /// Satellite or platform name.
    pub platform_name: String,
    /// Instrument name.
    pub sensor: String,
    /// Units of the samples.
    pub units: String,
    /// Observation start.
    pub start_time: DateTime<Utc>,
    /// Observation end.
    pub end_time: DateTime<Utc>,
}

/// Read-only access to a georeferenced, possibly multi-band raster.
///
/// Implementations must be safe to read from several threads at once;
/// windows are only ever viewed, never written.
pub trait RasterSource: Sync {
    /// Area definition of the full raster.
    fn area(&self) -> &AreaDefinition;

    /// Number of bands (at least 1).
    fn band_count(&self) -> usize;

    /// Name of a band, if the raster has named bands.
    fn band_name(&self, band: usize) -> Option<&str>;

    /// Sentinel marking invalid samples.
    fn missing_value(&self) -> MissingValue;

    /// Descriptive metadata.
    fn metadata(&self) -> &SourceMetadata;

    /// View the samples of one band inside a pixel window.
    ///
    /// The window must lie inside the raster.
    fn window(&self, band: usize, window: &TileWindow) -> ArrayView2<'_, f32>;
}

/// An in-memory raster with a `(bands, rows, cols)` sample array.
#[derive(Debug, Clone)]
pub struct Raster {
    data: Array3<f32>,
    area: AreaDefinition,
    missing: MissingValue,
    metadata: SourceMetadata,
    band_names: Vec<String>,
}

impl Raster {
    /// Create a raster from a `(bands, rows, cols)` array.
    ///
    /// # Errors
    ///
    /// Returns an error if the area is invalid, the array's pixel shape
    /// differs from the area's, or the array has no bands.
    pub fn new(data: Array3<f32>, area: AreaDefinition, metadata: SourceMetadata) -> Result<Self> {
        area.validate()?;

        let (bands, rows, cols) = data.dim();
        if (rows, cols) != area.shape() {
            return Err(TileError::ShapeMismatch {
                expected: area.shape(),
                actual: (rows, cols),
            });
        }
        if bands == 0 {
            return Err(TileError::BandCount {
                expected: 1,
                actual: 0,
            });
        }

        Ok(Self {
            data,
            area,
            missing: MissingValue::default(),
            metadata,
            band_names: Vec::new(),
        })
    }

    /// Create a single-band raster from a `(rows, cols)` array.
    pub fn single_band(
        data: Array2<f32>,
        area: AreaDefinition,
        metadata: SourceMetadata,
    ) -> Result<Self> {
        Self::new(data.insert_axis(ArrayAxis(0)), area, metadata)
    }

    /// Set the missing-value sentinel. Defaults to NaN.
    pub fn with_missing_value(mut self, missing: MissingValue) -> Self {
        self.missing = missing;
        self
    }

    /// Name the bands, e.g. `["R", "G", "B"]`.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::BandCount`] if the number of names differs from
    /// the number of bands.
    pub fn with_band_names<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let bands = self.data.dim().0;
        if names.len() != bands {
            return Err(TileError::BandCount {
                expected: bands,
                actual: names.len(),
            });
        }
        self.band_names = names;
        Ok(self)
    }

    /// The full sample array.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }
}

impl RasterSource for Raster {
    fn area(&self) -> &AreaDefinition {
        &self.area
    }

    fn band_count(&self) -> usize {
        self.data.dim().0
    }

    fn band_name(&self, band: usize) -> Option<&str> {
        self.band_names.get(band).map(String::as_str)
    }

    fn missing_value(&self) -> MissingValue {
        self.missing
    }

    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn window(&self, band: usize, window: &TileWindow) -> ArrayView2<'_, f32> {
        let r0 = window.row_offset;
        let c0 = window.col_offset;
        self.data
            .slice(s![band, r0..r0 + window.height, c0..c0 + window.width])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::area::Extent;
    use chrono::TimeZone;

    pub(crate) fn test_metadata() -> SourceMetadata {
        let start = Utc.with_ymd_and_hms(2018, 1, 1, 12, 0, 0).unwrap();
        SourceMetadata {
            name: "test_ds".to_string(),
            platform_name: "PLAT".to_string(),
            sensor: "SENSOR".to_string(),
            units: "1".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(20),
        }
    }

    fn small_area() -> AreaDefinition {
        AreaDefinition::new("a", "p", 4, 3, Extent::new(0.0, 0.0, 3.0, 4.0)).unwrap()
    }

    #[test]
    fn test_missing_value() {
        assert!(MissingValue::Nan.is_missing(f32::NAN));
        assert!(!MissingValue::Nan.is_missing(0.0));
        assert!(MissingValue::Fill(-1.0).is_missing(-1.0));
        assert!(MissingValue::Fill(-1.0).is_missing(f32::NAN));
        assert!(!MissingValue::Fill(-1.0).is_missing(0.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let data = Array2::<f32>::zeros((3, 4));
        let result = Raster::single_band(data, small_area(), test_metadata());
        assert!(matches!(
            result,
            Err(TileError::ShapeMismatch {
                expected: (4, 3),
                actual: (3, 4)
            })
        ));
    }

    #[test]
    fn test_band_names() {
        let data = Array3::<f32>::zeros((3, 4, 3));
        let raster = Raster::new(data, small_area(), test_metadata()).unwrap();
        assert_eq!(raster.band_name(0), None);

        let raster = raster.with_band_names(["R", "G", "B"]).unwrap();
        assert_eq!(raster.band_count(), 3);
        assert_eq!(raster.band_name(1), Some("G"));

        let data = Array3::<f32>::zeros((3, 4, 3));
        let raster = Raster::new(data, small_area(), test_metadata()).unwrap();
        assert!(matches!(
            raster.with_band_names(["R"]),
            Err(TileError::BandCount {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_window_view() {
        let data = Array2::from_shape_fn((4, 3), |(r, c)| (r * 3 + c) as f32);
        let raster = Raster::single_band(data, small_area(), test_metadata()).unwrap();
        let window = TileWindow::new(1, 1, 2, 2);
        let view = raster.window(0, &window);
        assert_eq!(view.dim(), (2, 2));
        assert_eq!(view[[0, 0]], 4.0);
        assert_eq!(view[[1, 1]], 8.0);
    }
}
