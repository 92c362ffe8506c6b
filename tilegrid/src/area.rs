//! Georeferenced area definitions.
//!
//! An [`AreaDefinition`] ties a pixel grid (`rows × cols`) to a rectangle in
//! projection coordinates. Extents describe the outer pixel edges, so the
//! pixel size along each axis is `extent / shape`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TileError};

/// An axis-aligned rectangle in projection coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Western edge.
    pub xmin: f64,
    /// Southern edge.
    pub ymin: f64,
    /// Eastern edge.
    pub xmax: f64,
    /// Northern edge.
    pub ymax: f64,
}

impl Extent {
    /// Create a new extent from `(xmin, ymin, xmax, ymax)`.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Width in projection units.
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Height in projection units.
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Returns the overlapping rectangle, or `None` when the two extents
    /// share no area. Extents that only touch along an edge don't overlap.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let xmin = self.xmin.max(other.xmin);
        let ymin = self.ymin.max(other.ymin);
        let xmax = self.xmax.min(other.xmax);
        let ymax = self.ymax.min(other.ymax);

        if xmax > xmin && ymax > ymin {
            Some(Extent::new(xmin, ymin, xmax, ymax))
        } else {
            None
        }
    }

    /// Check if this extent overlaps another by a non-zero area.
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.intersection(other).is_some()
    }
}

/// A projected pixel grid: projection, pixel shape and outer extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDefinition {
    /// Area name, informational only.
    pub name: String,
    /// Projection identifier (e.g. a PROJ string). Carried, never interpreted.
    pub projection: String,
    /// Number of pixel rows.
    pub rows: usize,
    /// Number of pixel columns.
    pub cols: usize,
    /// Outer edges of the pixel grid.
    pub extent: Extent,
}

impl AreaDefinition {
    /// Create and validate an area definition.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidArea`] if the shape is empty or the extent
    /// is degenerate or not finite.
    pub fn new(
        name: impl Into<String>,
        projection: impl Into<String>,
        rows: usize,
        cols: usize,
        extent: Extent,
    ) -> Result<Self> {
        let area = Self {
            name: name.into(),
            projection: projection.into(),
            rows,
            cols,
            extent,
        };
        area.validate()?;
        Ok(area)
    }

    /// Create an area from its upper-left corner and pixel size.
    ///
    /// `pixel_size` is `(x, y)`, both positive.
    pub fn from_upper_left(
        name: impl Into<String>,
        projection: impl Into<String>,
        upper_left: (f64, f64),
        pixel_size: (f64, f64),
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        let (x, y) = upper_left;
        let extent = Extent::new(
            x,
            y - pixel_size.1 * rows as f64,
            x + pixel_size.0 * cols as f64,
            y,
        );
        Self::new(name, projection, rows, cols, extent)
    }

    /// Validate the area, e.g. after deserializing it.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(TileError::InvalidArea {
                reason: format!("empty shape {}x{}", self.rows, self.cols),
            });
        }
        let e = &self.extent;
        let finite = [e.xmin, e.ymin, e.xmax, e.ymax]
            .iter()
            .all(|v| v.is_finite());
        if !finite || e.width() <= 0.0 || e.height() <= 0.0 {
            return Err(TileError::InvalidArea {
                reason: format!(
                    "degenerate extent ({}, {}, {}, {})",
                    e.xmin, e.ymin, e.xmax, e.ymax
                ),
            });
        }
        Ok(())
    }

    /// Returns `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Pixel width in projection units.
    pub fn pixel_size_x(&self) -> f64 {
        self.extent.width() / self.cols as f64
    }

    /// Pixel height in projection units.
    pub fn pixel_size_y(&self) -> f64 {
        self.extent.height() / self.rows as f64
    }

    /// Upper-left corner `(x, y)` of the first pixel.
    pub fn upper_left(&self) -> (f64, f64) {
        (self.extent.xmin, self.extent.ymax)
    }
}
