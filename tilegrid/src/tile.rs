//! Emitted tiles and their position within the full mosaic.
//!
//! A [`Tile`] borrows its samples from the source raster: the sub-array is a
//! view of the source window, never a copy. Everything a writer needs to
//! place the tile in the mosaic lives in [`TilePosition`] and
//! [`CoordinateEncoding`].

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::identity::TileIdentity;
use crate::mapper::{CandidateTile, MosaicInfo, TileWindow};

/// Linear encoding of mosaic pixel indices as pixel-center coordinates.
///
/// `x = x_offset + x_scale * i` and `y = y_offset + y_scale * j`, where `i`
/// and `j` are column and row indices in the full mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateEncoding {
    /// Pixel width.
    pub x_scale: f64,
    /// x of the mosaic's first pixel center.
    pub x_offset: f64,
    /// Negated pixel height; rows run north to south.
    pub y_scale: f64,
    /// y of the mosaic's first pixel center.
    pub y_offset: f64,
}

impl CoordinateEncoding {
    /// x coordinate of mosaic column `i`.
    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        self.x_offset + self.x_scale * i as f64
    }

    /// y coordinate of mosaic row `j`.
    #[inline]
    pub fn y(&self, j: usize) -> f64 {
        self.y_offset + self.y_scale * j as f64
    }
}

/// Where a tile sits in the full mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePosition {
    /// Tile grid shape `(rows, cols)` of the mosaic.
    pub grid_shape: (usize, usize),
    /// Row of this tile in the tile grid.
    pub grid_row: usize,
    /// Column of this tile in the tile grid.
    pub grid_col: usize,
    /// Mosaic row of the tile data's top-left pixel.
    pub tile_row_offset: usize,
    /// Mosaic column of the tile data's top-left pixel.
    pub tile_column_offset: usize,
    /// Nominal tile height in pixels.
    pub product_tile_height: usize,
    /// Nominal tile width in pixels.
    pub product_tile_width: usize,
    /// Mosaic height in pixels.
    pub product_rows: usize,
    /// Mosaic width in pixels.
    pub product_columns: usize,
}

impl TilePosition {
    /// Position of a candidate's source window within `mosaic`.
    pub fn new(mosaic: &MosaicInfo, candidate: &CandidateTile) -> Self {
        let (tile_row_offset, tile_column_offset) = mosaic.source_to_mosaic(
            candidate.window.row_offset,
            candidate.window.col_offset,
        );
        Self {
            grid_shape: mosaic.grid_shape,
            grid_row: candidate.grid_row,
            grid_col: candidate.grid_col,
            tile_row_offset,
            tile_column_offset,
            product_tile_height: mosaic.tile_shape.0,
            product_tile_width: mosaic.tile_shape.1,
            product_rows: mosaic.pixel_shape.0,
            product_columns: mosaic.pixel_shape.1,
        }
    }

    /// Total number of tiles in the mosaic grid.
    pub fn number_product_tiles(&self) -> usize {
        self.grid_shape.0 * self.grid_shape.1
    }
}

/// One emitted tile of one band.
#[derive(Debug, Clone)]
pub struct Tile<'a> {
    /// Stable identifier.
    pub identity: TileIdentity,
    /// Source band index.
    pub band: usize,
    /// Source band name, when bands are named.
    pub band_name: Option<String>,
    /// Source pixel window.
    pub window: TileWindow,
    /// Position in the mosaic.
    pub position: TilePosition,
    /// Mosaic coordinate encoding.
    pub coords: CoordinateEncoding,
    data: ArrayView2<'a, f32>,
}

impl<'a> Tile<'a> {
    pub(crate) fn new(
        identity: TileIdentity,
        band: usize,
        band_name: Option<String>,
        window: TileWindow,
        position: TilePosition,
        coords: CoordinateEncoding,
        data: ArrayView2<'a, f32>,
    ) -> Self {
        Self {
            identity,
            band,
            band_name,
            window,
            position,
            coords,
            data,
        }
    }

    /// The tile's samples, a view into the source raster.
    pub fn data(&self) -> ArrayView2<'a, f32> {
        self.data
    }

    /// Copy the samples out of the source raster.
    pub fn to_owned_data(&self) -> Array2<f32> {
        self.data.to_owned()
    }

    /// Returns `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Identifier string, e.g. `T001` or `TA01`.
    pub fn id(&self) -> String {
        self.identity.to_string()
    }

    /// Mosaic column indices covered by this tile.
    pub fn x_indices(&self) -> std::ops::Range<usize> {
        let start = self.position.tile_column_offset;
        start..start + self.window.width
    }

    /// Mosaic row indices covered by this tile.
    pub fn y_indices(&self) -> std::ops::Range<usize> {
        let start = self.position.tile_row_offset;
        start..start + self.window.height
    }

    /// Pixel-center x coordinates of the tile's columns.
    pub fn x_coords(&self) -> Array1<f64> {
        self.x_indices().map(|i| self.coords.x(i)).collect()
    }

    /// Pixel-center y coordinates of the tile's rows.
    pub fn y_coords(&self) -> Array1<f64> {
        self.y_indices().map(|j| self.coords.y(j)).collect()
    }
}
