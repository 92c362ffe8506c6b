//! Tile grid specifications.
//!
//! A [`TileGridSpec`] says which kind of mosaic to cut:
//!
//! - **Numbered**: the source raster's own extent, split into a fixed number
//!   of tiles or into tiles of a fixed pixel size.
//! - **Lettered**: a fixed reference grid of lettered cells, each split into
//!   numbered sub-tiles, anchored independently of the source raster.

use serde::{Deserialize, Serialize};

use crate::area::AreaDefinition;
use crate::error::{Axis, Result, TileError};
use crate::geometry::AxisSplit;

/// Default sub-tiles per letter cell along each axis.
pub const DEFAULT_SUBTILES: usize = 2;

/// Area anchoring a lettered grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferenceArea {
    /// Anchor the grid on the source raster's own area.
    #[default]
    Dataset,
    /// Anchor the grid on an explicitly supplied sector area.
    Sector(AreaDefinition),
}

/// How a lettered grid must line up with the source pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAlignment {
    /// Grid origin and cell size must fall on whole source pixels.
    #[default]
    Strict,
    /// Shift the grid origin onto the source pixel grid. Cell sizes must
    /// still be whole pixels.
    SnapToSource,
}

/// Lettered grid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetteredGridSpec {
    /// Letter cell size `(width, height)` in projection units. Derived from
    /// the reference extent and letter counts when absent.
    #[serde(default)]
    pub cell_size: Option<(f64, f64)>,
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
    /// Area the grid is anchored on.
    #[serde(default)]
    pub reference: ReferenceArea,
    #[serde(default)]
    pub alignment: GridAlignment,
}

fn default_subtiles() -> usize {
    DEFAULT_SUBTILES
}

impl LetteredGridSpec {
    /// Create a lettered grid with `letter_rows × letter_cols` cells and the
    /// default 2×2 sub-tiles per cell.
    pub fn new(letter_rows: usize, letter_cols: usize, reference: ReferenceArea) -> Self {
        Self {
            cell_size: None,
            letter_rows,
            letter_cols,
            subtile_rows: DEFAULT_SUBTILES,
            subtile_cols: DEFAULT_SUBTILES,
            reference,
            alignment: GridAlignment::default(),
        }
    }

    /// Set the number of sub-tiles per letter cell.
    pub fn subtiles(mut self, rows: usize, cols: usize) -> Self {
        self.subtile_rows = rows;
        self.subtile_cols = cols;
        self
    }

    /// Set an explicit cell size `(width, height)` in projection units.
    pub fn cell_size(mut self, width: f64, height: f64) -> Self {
        self.cell_size = Some((width, height));
        self
    }

    /// Set the alignment mode.
    pub fn alignment(mut self, alignment: GridAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Total tile grid shape `(rows, cols)` over all letter cells.
    pub fn grid_shape(&self) -> (usize, usize) {
        (
            self.letter_rows * self.subtile_rows,
            self.letter_cols * self.subtile_cols,
        )
    }

    /// Validate counts and cell size.
    pub fn validate(&self) -> Result<()> {
        let counts = [
            (Axis::Rows, self.letter_rows, "letter rows"),
            (Axis::Columns, self.letter_cols, "letter columns"),
            (Axis::Rows, self.subtile_rows, "sub-tile rows"),
            (Axis::Columns, self.subtile_cols, "sub-tile columns"),
        ];
        for (axis, count, what) in counts {
            if count == 0 {
                return Err(TileError::InvalidTileParam {
                    axis,
                    reason: format!("{} must be at least 1", what),
                });
            }
        }

        if let Some((width, height)) = self.cell_size {
            for (axis, size) in [(Axis::Columns, width), (Axis::Rows, height)] {
                if !size.is_finite() || size <= 0.0 {
                    return Err(TileError::InvalidTileParam {
                        axis,
                        reason: format!("cell size must be positive, got {}", size),
                    });
                }
            }
        }

        if let ReferenceArea::Sector(area) = &self.reference {
            area.validate()?;
        }

        Ok(())
    }
}

/// Which mosaic to cut a raster into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TileGridSpec {
    /// Tiles covering exactly the source raster's extent.
    Numbered {
        /// Split along rows.
        rows: AxisSplit,
        /// Split along columns.
        cols: AxisSplit,
    },
    /// Tiles of a fixed lettered reference grid.
    Lettered(LetteredGridSpec),
}

impl TileGridSpec {
    /// Numbered grid with a fixed tile count `(rows, cols)`.
    pub fn numbered(tile_rows: usize, tile_cols: usize) -> Self {
        TileGridSpec::Numbered {
            rows: AxisSplit::Count(tile_rows),
            cols: AxisSplit::Count(tile_cols),
        }
    }

    /// Numbered grid with a fixed tile size `(height, width)` in pixels.
    pub fn numbered_by_size(tile_height: usize, tile_width: usize) -> Self {
        TileGridSpec::Numbered {
            rows: AxisSplit::Size(tile_height),
            cols: AxisSplit::Size(tile_width),
        }
    }

    /// Numbered grid from optional count and size parameters.
    ///
    /// # Errors
    ///
    /// Exactly one of `count` and `size` must be given.
    pub fn numbered_from_params(
        count: Option<(usize, usize)>,
        size: Option<(usize, usize)>,
    ) -> Result<Self> {
        let rows = AxisSplit::from_params(Axis::Rows, count.map(|c| c.0), size.map(|s| s.0))?;
        let cols = AxisSplit::from_params(Axis::Columns, count.map(|c| c.1), size.map(|s| s.1))?;
        Ok(TileGridSpec::Numbered { rows, cols })
    }

    /// Lettered grid.
    pub fn lettered(spec: LetteredGridSpec) -> Self {
        TileGridSpec::Lettered(spec)
    }

    /// Check if this is a lettered grid.
    pub fn is_lettered(&self) -> bool {
        matches!(self, TileGridSpec::Lettered(_))
    }

    /// Validate the grid parameters without a source raster.
    pub fn validate(&self) -> Result<()> {
        match self {
            TileGridSpec::Numbered { rows, cols } => {
                rows.split(Axis::Rows, 0)?;
                cols.split(Axis::Columns, 0)?;
                Ok(())
            }
            TileGridSpec::Lettered(spec) => spec.validate(),
        }
    }
}

impl Default for TileGridSpec {
    fn default() -> Self {
        TileGridSpec::numbered(1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Extent;

    #[test]
    fn test_numbered_from_params() {
        let spec = TileGridSpec::numbered_from_params(Some((3, 3)), None).unwrap();
        assert_eq!(spec, TileGridSpec::numbered(3, 3));

        let spec = TileGridSpec::numbered_from_params(None, Some((100, 50))).unwrap();
        assert_eq!(spec, TileGridSpec::numbered_by_size(100, 50));

        assert!(matches!(
            TileGridSpec::numbered_from_params(Some((3, 3)), Some((10, 10))),
            Err(TileError::ConflictingTileParams { .. })
        ));
        assert!(matches!(
            TileGridSpec::numbered_from_params(None, None),
            Err(TileError::MissingTileParams { .. })
        ));
    }

    #[test]
    fn test_validate() {
        assert!(TileGridSpec::numbered(0, 3).validate().is_err());
        assert!(TileGridSpec::default().validate().is_ok());

        let spec = LetteredGridSpec::new(4, 4, ReferenceArea::Dataset).subtiles(0, 1);
        assert!(TileGridSpec::lettered(spec).validate().is_err());

        let spec = LetteredGridSpec::new(4, 4, ReferenceArea::Dataset).cell_size(-1.0, 10.0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_grid_shape() {
        let spec = LetteredGridSpec::new(4, 5, ReferenceArea::Dataset).subtiles(2, 3);
        assert_eq!(spec.grid_shape(), (8, 15));
        assert_eq!(spec.alignment, GridAlignment::Strict);
    }

    #[test]
    fn test_serde_roundtrip_config() {
        let json = r#"{
            "mode": "lettered",
            "letter_rows": 4,
            "letter_cols": 4,
            "reference": {
                "type": "sector",
                "name": "LCC",
                "projection": "+proj=lcc",
                "rows": 4,
                "cols": 4,
                "extent": {"xmin": -1e6, "ymin": -1.5e6, "xmax": 1e6, "ymax": 1.5e6}
            }
        }"#;
        let spec: TileGridSpec = serde_json::from_str(json).unwrap();
        match spec {
            TileGridSpec::Lettered(ref lettered) => {
                assert_eq!(lettered.subtile_rows, DEFAULT_SUBTILES);
                assert_eq!(lettered.cell_size, None);
                match &lettered.reference {
                    ReferenceArea::Sector(area) => {
                        assert_eq!(area.extent, Extent::new(-1e6, -1.5e6, 1e6, 1.5e6))
                    }
                    ReferenceArea::Dataset => panic!("Expected sector reference"),
                }
            }
            TileGridSpec::Numbered { .. } => panic!("Expected lettered grid"),
        }

        let json = r#"{"mode": "numbered", "rows": {"count": 3}, "cols": {"size": 50}}"#;
        let spec: TileGridSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            spec,
            TileGridSpec::Numbered {
                rows: AxisSplit::Count(3),
                cols: AxisSplit::Size(50)
            }
        );
    }
}
