//! Mapping source pixels onto a tile grid.
//!
//! [`plan_tiles`] turns a [`TileGridSpec`] and the source area into a
//! [`TilePlan`]: the mosaic description plus one [`CandidateTile`] per cell of
//! the full nominal grid, in row-major order. Each candidate carries the
//! source pixel window that covers it, which is empty when the cell doesn't
//! overlap the source at all.
//!
//! Only offsets and shapes are computed here; no samples are read.

use serde::{Deserialize, Serialize};

use crate::area::{AreaDefinition, Extent};
use crate::error::Result;
use crate::geometry::{GridSplit, Span};
use crate::grid::{LetteredGridSpec, TileGridSpec};
use crate::sector::{resolve_letter_grid, LetterGrid};
use crate::tile::CoordinateEncoding;

/// Integer pixel rectangle within the source raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileWindow {
    /// First source row.
    pub row_offset: usize,
    /// First source column.
    pub col_offset: usize,
    /// Rows covered.
    pub height: usize,
    /// Columns covered.
    pub width: usize,
    /// Absolute bounds of the rectangle; `None` when it is empty.
    pub bounds: Option<Extent>,
}

impl TileWindow {
    /// Create a window without absolute bounds.
    pub fn new(row_offset: usize, col_offset: usize, height: usize, width: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            height,
            width,
            bounds: None,
        }
    }

    /// An empty window: no overlap.
    pub fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Create a window and compute its bounds within `area`.
    pub fn in_area(
        row_offset: usize,
        col_offset: usize,
        height: usize,
        width: usize,
        area: &AreaDefinition,
    ) -> Self {
        let mut window = Self::new(row_offset, col_offset, height, width);
        if !window.is_empty() {
            window.bounds = Some(span_bounds(
                area,
                Span::new(row_offset, height),
                Span::new(col_offset, width),
            ));
        }
        window
    }

    /// Check if the window covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Returns `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// The full conceptual tile grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicInfo {
    /// Tile grid shape `(rows, cols)`.
    pub grid_shape: (usize, usize),
    /// Mosaic shape in pixels `(rows, cols)`.
    pub pixel_shape: (usize, usize),
    /// Nominal tile shape `(height, width)` in pixels.
    pub tile_shape: (usize, usize),
    /// Upper-left corner `(x, y)` of the mosaic.
    pub origin: (f64, f64),
    /// Pixel size `(x, y)`.
    pub pixel_size: (f64, f64),
    /// Position `(row, col)` of the mosaic origin in source pixels.
    pub source_offset: (i64, i64),
    /// Letter cell counts `(rows, cols)` for lettered mosaics.
    pub letter_shape: Option<(usize, usize)>,
}

impl MosaicInfo {
    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        self.grid_shape.0 * self.grid_shape.1
    }

    /// Scale/offset encoding of mosaic pixel indices to pixel-center coordinates.
    pub fn coordinate_encoding(&self) -> CoordinateEncoding {
        let (px, py) = self.pixel_size;
        CoordinateEncoding {
            x_scale: px,
            x_offset: self.origin.0 + px / 2.0,
            y_scale: -py,
            y_offset: self.origin.1 - py / 2.0,
        }
    }

    /// Convert a source pixel position to a mosaic pixel position.
    pub fn source_to_mosaic(&self, row: usize, col: usize) -> (usize, usize) {
        (
            (row as i64 - self.source_offset.0) as usize,
            (col as i64 - self.source_offset.1) as usize,
        )
    }
}

/// The letter cell a candidate belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterSlot {
    /// Zero-based row-major cell index.
    pub index: usize,
    /// Letter code.
    pub code: String,
    /// Cell row.
    pub row: usize,
    /// Cell column.
    pub col: usize,
}

/// One cell of the full nominal grid, before validity checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTile {
    /// Row-major index in the full grid.
    pub index: usize,
    /// Row in the tile grid.
    pub grid_row: usize,
    /// Column in the tile grid.
    pub grid_col: usize,
    /// Letter cell, for lettered grids.
    pub letter: Option<LetterSlot>,
    /// Mosaic pixel rows of the nominal tile.
    pub rows: Span,
    /// Mosaic pixel columns of the nominal tile.
    pub cols: Span,
    /// Absolute bounds of the nominal tile.
    pub bounds: Extent,
    /// Covering source window; empty when the tile doesn't overlap the source.
    pub window: TileWindow,
}

impl CandidateTile {
    /// Check if any source pixel falls in this tile.
    pub fn overlaps(&self) -> bool {
        !self.window.is_empty()
    }
}

/// Mosaic plus candidate tiles in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilePlan {
    /// The full mosaic.
    pub mosaic: MosaicInfo,
    /// Every cell of the grid, in row-major order.
    pub candidates: Vec<CandidateTile>,
}

impl TilePlan {
    /// Candidates whose window overlaps the source.
    pub fn overlapping(&self) -> impl Iterator<Item = &CandidateTile> {
        self.candidates.iter().filter(|c| c.overlaps())
    }

    /// Mosaic pixel position of a window's top-left corner.
    pub fn mosaic_offset(&self, window: &TileWindow) -> (usize, usize) {
        self.mosaic
            .source_to_mosaic(window.row_offset, window.col_offset)
    }
}

/// Plan the tiles of `grid` over a source raster with area `source`.
///
/// # Errors
///
/// Returns configuration errors from the grid spec or the lettered grid
/// resolution.
pub fn plan_tiles(grid: &TileGridSpec, source: &AreaDefinition) -> Result<TilePlan> {
    source.validate()?;
    match grid {
        TileGridSpec::Numbered { rows, cols } => {
            let split = GridSplit::new(source.shape(), *rows, *cols)?;
            Ok(plan_numbered(&split, source))
        }
        TileGridSpec::Lettered(spec) => plan_lettered(spec, source),
    }
}

fn plan_numbered(split: &GridSplit, source: &AreaDefinition) -> TilePlan {
    let mosaic = MosaicInfo {
        grid_shape: split.shape(),
        pixel_shape: source.shape(),
        tile_shape: split.max_tile_shape(),
        origin: source.upper_left(),
        pixel_size: (source.pixel_size_x(), source.pixel_size_y()),
        source_offset: (0, 0),
        letter_shape: None,
    };

    let candidates = split
        .cells()
        .enumerate()
        .map(|(index, (grid_row, grid_col, rows, cols))| {
            let window = TileWindow::in_area(rows.offset, cols.offset, rows.length, cols.length, source);
            CandidateTile {
                index,
                grid_row,
                grid_col,
                letter: None,
                rows,
                cols,
                bounds: span_bounds(source, rows, cols),
                window,
            }
        })
        .collect();

    TilePlan { mosaic, candidates }
}

fn plan_lettered(spec: &LetteredGridSpec, source: &AreaDefinition) -> Result<TilePlan> {
    let grid = resolve_letter_grid(spec, source)?;
    let (grid_rows, grid_cols) = grid.grid_shape();

    let mosaic = MosaicInfo {
        grid_shape: (grid_rows, grid_cols),
        pixel_shape: grid.mosaic_shape(),
        tile_shape: grid.tile_shape(),
        origin: grid.origin,
        pixel_size: grid.pixel_size,
        source_offset: grid.source_offset,
        letter_shape: Some((grid.letter_rows, grid.letter_cols)),
    };

    let mut candidates = Vec::with_capacity(grid_rows * grid_cols);
    for cell in grid.cells() {
        let slot = LetterSlot {
            index: cell.index,
            code: cell.code.clone(),
            row: cell.letter_row,
            col: cell.letter_col,
        };
        for subtile in grid.subtiles(&cell) {
            candidates.push(CandidateTile {
                index: subtile.grid_row * grid_cols + subtile.grid_col,
                grid_row: subtile.grid_row,
                grid_col: subtile.grid_col,
                letter: Some(slot.clone()),
                rows: subtile.rows,
                cols: subtile.cols,
                bounds: subtile.bounds,
                window: source_window(&grid, &subtile.bounds, source),
            });
        }
    }

    // Cells were visited letter by letter; order them row-major over the full grid
    candidates.sort_by_key(|c| c.index);

    Ok(TilePlan { mosaic, candidates })
}

/// Absolute bounds of a pixel rectangle of `area`. Zero-length spans give
/// a degenerate extent at their grid position.
fn span_bounds(area: &AreaDefinition, rows: Span, cols: Span) -> Extent {
    let (x0, y0) = area.upper_left();
    let (px, py) = (area.pixel_size_x(), area.pixel_size_y());
    Extent::new(
        x0 + cols.offset as f64 * px,
        y0 - rows.end() as f64 * py,
        x0 + cols.end() as f64 * px,
        y0 - rows.offset as f64 * py,
    )
}

/// Source pixel window covering `bounds`, rounded to whole pixels.
fn source_window(grid: &LetterGrid, bounds: &Extent, source: &AreaDefinition) -> TileWindow {
    let Some(inter) = bounds.intersection(&source.extent) else {
        return TileWindow::empty();
    };

    let src = source.extent;
    let (px, py) = grid.pixel_size;
    let (rows, cols) = source.shape();
    let to_col = |x: f64| (((x - src.xmin) / px).round().max(0.0) as usize).min(cols);
    let to_row = |y: f64| (((src.ymax - y) / py).round().max(0.0) as usize).min(rows);

    let col_start = to_col(inter.xmin);
    let col_end = to_col(inter.xmax);
    let row_start = to_row(inter.ymax);
    let row_end = to_row(inter.ymin);

    TileWindow::in_area(
        row_start,
        col_start,
        row_end.saturating_sub(row_start),
        col_end.saturating_sub(col_start),
        source,
    )
}
