//! Raw raster files.
//!
//! A raw raster file holds `bands × rows × cols` little-endian `f32`
//! samples, band after band, each band row-major with row 0 at the north
//! edge. There is no header: the shape comes from the caller, and the file
//! size must match it exactly.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;
use ndarray::Array3;

use crate::area::AreaDefinition;
use crate::error::{Result, TileError};
use crate::raster::{Raster, SourceMetadata};

/// Bytes per sample.
const SAMPLE_SIZE: usize = std::mem::size_of::<f32>();

/// A memory-mapped raw raster file.
///
/// # Example
///
/// ```ignore
/// use tilegrid::RawRasterFile;
///
/// let file = RawRasterFile::open("C13.bin", 1, 2000, 1000)?;
/// let raster = file.into_raster(area, metadata)?;
/// ```
pub struct RawRasterFile {
    data: Mmap,
    bands: usize,
    rows: usize,
    cols: usize,
}

impl RawRasterFile {
    /// Memory-map a raw raster file of the given shape.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or memory-mapped
    /// - The file size doesn't match `bands × rows × cols × 4` bytes
    /// - The shape is too large to address ([`TileError::InvalidArea`])
    pub fn open<P: AsRef<Path>>(path: P, bands: usize, rows: usize, cols: usize) -> Result<Self> {
        let expected = bands
            .checked_mul(rows)
            .and_then(|n| n.checked_mul(cols))
            .and_then(|n| n.checked_mul(SAMPLE_SIZE))
            .ok_or_else(|| TileError::InvalidArea {
                reason: format!("raster shape {}x{}x{} overflows", bands, rows, cols),
            })?;
        let file = File::open(&path)?;
        let size = file.metadata()?.len() as usize;
        if size != expected || expected == 0 {
            return Err(TileError::InvalidFileSize { size, expected });
        }

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let data = unsafe { Mmap::map(&file)? };

        Ok(Self {
            data,
            bands,
            rows,
            cols,
        })
    }

    /// Returns `(bands, rows, cols)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bands, self.rows, self.cols)
    }

    /// Read one sample. Indices are clamped to the raster.
    pub fn sample(&self, band: usize, row: usize, col: usize) -> f32 {
        let band = band.min(self.bands - 1);
        let row = row.min(self.rows - 1);
        let col = col.min(self.cols - 1);

        let offset = ((band * self.rows + row) * self.cols + col) * SAMPLE_SIZE;
        f32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Decode all samples into a `(bands, rows, cols)` array.
    pub fn to_array(&self) -> Array3<f32> {
        Array3::from_shape_fn(self.shape(), |(b, r, c)| self.sample(b, r, c))
    }

    /// Decode the file into an in-memory [`Raster`].
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if `area` has a different pixel
    /// shape than the file.
    pub fn into_raster(self, area: AreaDefinition, metadata: SourceMetadata) -> Result<Raster> {
        Raster::new(self.to_array(), area, metadata)
    }
}

/// Write samples as little-endian `f32`, in iteration order.
pub fn write_samples<'a, W, I>(writer: &mut W, samples: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a f32>,
{
    for sample in samples {
        writer.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Extent;
    use crate::raster::tests::test_metadata;
    use crate::raster::RasterSource;
    use crate::mapper::TileWindow;
    use std::io::BufWriter;
    use tempfile::NamedTempFile;

    /// Create a 2-band, 3×4 raw raster whose samples encode their position
    fn create_test_file() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let data = Array3::from_shape_fn((2, 3, 4), |(b, r, c)| (b * 100 + r * 10 + c) as f32);
        let mut writer = BufWriter::new(file.reopen().unwrap());
        write_samples(&mut writer, data.iter()).unwrap();
        writer.flush().unwrap();
        file
    }

    #[test]
    fn test_open_and_read() {
        let file = create_test_file();
        let raster = RawRasterFile::open(file.path(), 2, 3, 4).unwrap();
        assert_eq!(raster.shape(), (2, 3, 4));
        assert_eq!(raster.sample(0, 0, 0), 0.0);
        assert_eq!(raster.sample(0, 2, 3), 23.0);
        assert_eq!(raster.sample(1, 1, 2), 112.0);
    }

    #[test]
    fn test_invalid_file_size() {
        let file = create_test_file();
        let result = RawRasterFile::open(file.path(), 1, 3, 4);

        if let Err(TileError::InvalidFileSize { size, expected }) = result {
            assert_eq!(size, 96);
            assert_eq!(expected, 48);
        } else {
            panic!("Expected InvalidFileSize error");
        }
    }

    #[test]
    fn test_overflowing_shape() {
        let file = create_test_file();
        let result = RawRasterFile::open(file.path(), 1, 1usize << 62, 1);
        assert!(matches!(result, Err(TileError::InvalidArea { .. })));

        let result = RawRasterFile::open(file.path(), usize::MAX, 2, 1);
        assert!(matches!(result, Err(TileError::InvalidArea { .. })));
    }

    #[test]
    fn test_into_raster() {
        let file = create_test_file();
        let area = AreaDefinition::new("a", "p", 3, 4, Extent::new(0.0, 0.0, 4.0, 3.0)).unwrap();
        let raster = RawRasterFile::open(file.path(), 2, 3, 4)
            .unwrap()
            .into_raster(area, test_metadata())
            .unwrap();

        assert_eq!(raster.band_count(), 2);
        let view = raster.window(1, &TileWindow::new(1, 1, 2, 2));
        assert_eq!(view[[0, 0]], 111.0);
        assert_eq!(view[[1, 1]], 122.0);
    }

    #[test]
    fn test_into_raster_shape_mismatch() {
        let file = create_test_file();
        let area = AreaDefinition::new("a", "p", 4, 3, Extent::new(0.0, 0.0, 3.0, 4.0)).unwrap();
        let result = RawRasterFile::open(file.path(), 2, 3, 4)
            .unwrap()
            .into_raster(area, test_metadata());
        assert!(matches!(result, Err(TileError::ShapeMismatch { .. })));
    }
}
