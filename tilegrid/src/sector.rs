//! Lettered reference grids and named sectors.
//!
//! [`resolve_letter_grid`] anchors a [`LetteredGridSpec`] on its reference
//! area and lines it up with the source raster's pixel grid. The result,
//! [`LetterGrid`], is a pure function of the grid spec and the source area: it is
//! recomputed on every call and never cached.
//!
//! [`SectorCatalog`] holds named sector definitions loaded from JSON:
//!
//! ```json
//! {
//!   "LCC": {
//!     "area": {
//!       "name": "LCC",
//!       "projection": "+proj=lcc +lon_0=-95 +lat_0=25 +lat_1=25 +units=m",
//!       "rows": 2000,
//!       "cols": 1000,
//!       "extent": {"xmin": -1e6, "ymin": -1.5e6, "xmax": 1e6, "ymax": 1.5e6}
//!     },
//!     "letter_rows": 4,
//!     "letter_cols": 4
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::area::{AreaDefinition, Extent};
use crate::error::{Axis, Result, TileError};
use crate::geometry::{split_by_count, Span};
use crate::grid::{GridAlignment, LetteredGridSpec, ReferenceArea, DEFAULT_SUBTILES};
use crate::identity::letter_code;

/// Largest distance from a whole pixel, in pixels, still treated as aligned.
const ALIGN_TOLERANCE: f64 = 1e-6;

/// A lettered grid resolved against a source raster.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterGrid {
    /// Upper-left corner `(x, y)` of the mosaic in projection coordinates.
    pub origin: (f64, f64),
    /// Source pixel size `(x, y)`.
    pub pixel_size: (f64, f64),
    /// Letter cell size `(width, height)` in projection units.
    pub cell_size: (f64, f64),
    /// Letter cell size `(rows, cols)` in source pixels.
    pub cell_shape: (usize, usize),
    /// Letter cells along y.
    pub letter_rows: usize,
    /// Letter cells along x.
    pub letter_cols: usize,
    /// Sub-tile row spans within a letter cell, in pixels.
    pub subtile_rows: Vec<Span>,
    /// Sub-tile column spans within a letter cell, in pixels.
    pub subtile_cols: Vec<Span>,
    /// Position `(row, col)` of the mosaic origin in source pixels. Negative
    /// when the mosaic starts above or left of the source raster.
    pub source_offset: (i64, i64),
}

/// One lettered cell of a resolved grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LetterCell {
    /// Zero-based row-major cell index.
    pub index: usize,
    /// Cell row.
    pub letter_row: usize,
    /// Cell column.
    pub letter_col: usize,
    /// Letter code.
    pub code: String,
    /// Absolute cell bounds.
    pub bounds: Extent,
}

/// One sub-tile of a letter cell, in mosaic pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subtile {
    /// Row of this sub-tile in the full tile grid.
    pub grid_row: usize,
    /// Column of this sub-tile in the full tile grid.
    pub grid_col: usize,
    /// Mosaic pixel rows covered.
    pub rows: Span,
    /// Mosaic pixel columns covered.
    pub cols: Span,
    /// Absolute bounds.
    pub bounds: Extent,
}

impl LetterGrid {
    /// Full tile grid shape `(rows, cols)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        (
            self.letter_rows * self.subtile_rows.len(),
            self.letter_cols * self.subtile_cols.len(),
        )
    }

    /// Mosaic shape `(rows, cols)` in pixels.
    pub fn mosaic_shape(&self) -> (usize, usize) {
        (
            self.letter_rows * self.cell_shape.0,
            self.letter_cols * self.cell_shape.1,
        )
    }

    /// Nominal sub-tile size `(height, width)` in pixels.
    pub fn tile_shape(&self) -> (usize, usize) {
        let max = |spans: &[Span]| spans.iter().map(|s| s.length).max().unwrap_or(0);
        (max(&self.subtile_rows), max(&self.subtile_cols))
    }

    /// Absolute bounds of the whole mosaic.
    pub fn bounds(&self) -> Extent {
        let (rows, cols) = self.mosaic_shape();
        self.pixel_bounds(Span::new(0, rows), Span::new(0, cols))
    }

    /// Absolute bounds of a mosaic pixel rectangle.
    pub fn pixel_bounds(&self, rows: Span, cols: Span) -> Extent {
        let (x0, y0) = self.origin;
        let (px, py) = self.pixel_size;
        Extent::new(
            x0 + cols.offset as f64 * px,
            y0 - rows.end() as f64 * py,
            x0 + cols.end() as f64 * px,
            y0 - rows.offset as f64 * py,
        )
    }

    /// Letter cells in row-major order.
    pub fn cells(&self) -> Vec<LetterCell> {
        let (cell_rows, cell_cols) = self.cell_shape;
        (0..self.letter_rows)
            .flat_map(|r| (0..self.letter_cols).map(move |c| (r, c)))
            .map(|(r, c)| {
                let index = r * self.letter_cols + c;
                LetterCell {
                    index,
                    letter_row: r,
                    letter_col: c,
                    code: letter_code(index),
                    bounds: self.pixel_bounds(
                        Span::new(r * cell_rows, cell_rows),
                        Span::new(c * cell_cols, cell_cols),
                    ),
                }
            })
            .collect()
    }

    /// Sub-tiles of one letter cell in row-major order.
    pub fn subtiles(&self, cell: &LetterCell) -> Vec<Subtile> {
        let (cell_rows, cell_cols) = self.cell_shape;
        let row_base = cell.letter_row * cell_rows;
        let col_base = cell.letter_col * cell_cols;
        let mut out = Vec::with_capacity(self.subtile_rows.len() * self.subtile_cols.len());

        for (sr, row) in self.subtile_rows.iter().enumerate() {
            for (sc, col) in self.subtile_cols.iter().enumerate() {
                let rows = Span::new(row_base + row.offset, row.length);
                let cols = Span::new(col_base + col.offset, col.length);
                out.push(Subtile {
                    grid_row: cell.letter_row * self.subtile_rows.len() + sr,
                    grid_col: cell.letter_col * self.subtile_cols.len() + sc,
                    rows,
                    cols,
                    bounds: self.pixel_bounds(rows, cols),
                });
            }
        }
        out
    }
}

/// Resolve a lettered grid against a source area.
///
/// # Errors
///
/// Returns [`TileError::Misaligned`] if a letter cell isn't a whole number
/// of source pixels, or, with [`GridAlignment::Strict`], if the grid origin
/// doesn't fall on a source pixel boundary.
pub fn resolve_letter_grid(spec: &LetteredGridSpec, source: &AreaDefinition) -> Result<LetterGrid> {
    spec.validate()?;
    source.validate()?;

    let reference = match &spec.reference {
        ReferenceArea::Dataset => source,
        ReferenceArea::Sector(area) => {
            if area.projection != source.projection {
                warn!(
                    sector = %area.name,
                    sector_projection = %area.projection,
                    source_projection = %source.projection,
                    "Sector and source projections differ; no reprojection is done"
                );
            }
            area
        }
    };

    let ref_extent = reference.extent;
    let cell_size = spec.cell_size.unwrap_or((
        ref_extent.width() / spec.letter_cols as f64,
        ref_extent.height() / spec.letter_rows as f64,
    ));
    let pixel_size = (source.pixel_size_x(), source.pixel_size_y());

    let cell_cols = whole_pixels(cell_size.0 / pixel_size.0, Axis::Columns, "cell width")?;
    let cell_rows = whole_pixels(cell_size.1 / pixel_size.1, Axis::Rows, "cell height")?;

    // Position of the reference upper-left corner in source pixels
    let src = source.extent;
    let col_pos = (ref_extent.xmin - src.xmin) / pixel_size.0;
    let row_pos = (src.ymax - ref_extent.ymax) / pixel_size.1;

    let (col0, row0) = match spec.alignment {
        GridAlignment::Strict => (
            aligned_offset(col_pos, Axis::Columns)?,
            aligned_offset(row_pos, Axis::Rows)?,
        ),
        GridAlignment::SnapToSource => {
            // Move the origin left and down onto the nearest pixel boundary
            let col0 = snapped(col_pos, f64::floor);
            let row0 = snapped(row_pos, f64::ceil);
            debug!(
                shift_x = (col_pos - col0 as f64) * pixel_size.0,
                shift_y = (row0 as f64 - row_pos) * pixel_size.1,
                "Adjusting lettered grid origin to match source pixels"
            );
            (col0, row0)
        }
    };

    let origin = (
        src.xmin + col0 as f64 * pixel_size.0,
        src.ymax - row0 as f64 * pixel_size.1,
    );

    let grid = LetterGrid {
        origin,
        pixel_size,
        cell_size,
        cell_shape: (cell_rows, cell_cols),
        letter_rows: spec.letter_rows,
        letter_cols: spec.letter_cols,
        subtile_rows: split_by_count(cell_rows, spec.subtile_rows),
        subtile_cols: split_by_count(cell_cols, spec.subtile_cols),
        source_offset: (row0, col0),
    };

    debug!(
        origin_x = origin.0,
        origin_y = origin.1,
        cell_rows,
        cell_cols,
        source_row_offset = row0,
        source_col_offset = col0,
        "Resolved lettered grid"
    );

    Ok(grid)
}

/// Round a pixel count that must be a positive whole number.
fn whole_pixels(pixels: f64, axis: Axis, what: &'static str) -> Result<usize> {
    let rounded = pixels.round();
    if !pixels.is_finite() || rounded < 1.0 || (pixels - rounded).abs() > ALIGN_TOLERANCE {
        return Err(TileError::Misaligned { axis, what, pixels });
    }
    Ok(rounded as usize)
}

fn aligned_offset(pixels: f64, axis: Axis) -> Result<i64> {
    let rounded = pixels.round();
    if !pixels.is_finite() || (pixels - rounded).abs() > ALIGN_TOLERANCE {
        return Err(TileError::Misaligned {
            axis,
            what: "grid origin offset",
            pixels,
        });
    }
    Ok(rounded as i64)
}

fn snapped(pixels: f64, snap: fn(f64) -> f64) -> i64 {
    let rounded = pixels.round();
    if (pixels - rounded).abs() <= ALIGN_TOLERANCE {
        rounded as i64
    } else {
        snap(pixels) as i64
    }
}

/// A named sector: a reference area and its letter grid layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    /// Reference area anchoring the grid.
    pub area: AreaDefinition,
    /// Letter cells along y.
    pub letter_rows: usize,
    /// Letter cells along x.
    pub letter_cols: usize,
    /// Sub-tiles per letter cell along y.
    #[serde(default = "default_subtiles")]
    pub subtile_rows: usize,
    /// Sub-tiles per letter cell along x.
    #[serde(default = "default_subtiles")]
    pub subtile_cols: usize,
    /// Letter cell size `(width, height)` in projection units.
    #[serde(default)]
    pub cell_size: Option<(f64, f64)>,
}

fn default_subtiles() -> usize {
    DEFAULT_SUBTILES
}

impl Sector {
    /// Lettered grid spec anchored on this sector.
    pub fn grid_spec(&self) -> LetteredGridSpec {
        LetteredGridSpec {
            cell_size: self.cell_size,
            letter_rows: self.letter_rows,
            letter_cols: self.letter_cols,
            subtile_rows: self.subtile_rows,
            subtile_cols: self.subtile_cols,
            reference: ReferenceArea::Sector(self.area.clone()),
            alignment: GridAlignment::default(),
        }
    }
}

/// Immutable collection of named sectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorCatalog {
    sectors: BTreeMap<String, Sector>,
}

impl SectorCatalog {
    /// Create a catalog from `(id, sector)` pairs.
    pub fn new<I, S>(sectors: I) -> Self
    where
        I: IntoIterator<Item = (S, Sector)>,
        S: Into<String>,
    {
        Self {
            sectors: sectors.into_iter().map(|(id, s)| (id.into(), s)).collect(),
        }
    }

    /// Parse a catalog from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: SectorCatalog = serde_json::from_str(json)?;
        for sector in catalog.sectors.values() {
            sector.grid_spec().validate()?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Look up a sector by id.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownSector`] if the id isn't in the catalog.
    pub fn get(&self, sector_id: &str) -> Result<&Sector> {
        self.sectors
            .get(sector_id)
            .ok_or_else(|| TileError::UnknownSector {
                sector_id: sector_id.to_string(),
            })
    }

    /// Lettered grid spec for a sector id.
    pub fn grid_spec(&self, sector_id: &str) -> Result<LetteredGridSpec> {
        Ok(self.get(sector_id)?.grid_spec())
    }

    /// Iterate over `(id, sector)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sector)> {
        self.sectors.iter().map(|(id, s)| (id.as_str(), s))
    }

    /// Number of sectors.
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}
