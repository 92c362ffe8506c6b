//! Tile grid boundary arithmetic.
//!
//! Splits a pixel extent into contiguous `(offset, length)` spans, either into
//! a fixed number of tiles or into tiles of a fixed size. Rows and columns are
//! split independently; [`GridSplit`] pairs the two into a row-major grid.
//!
//! # Remainder Policy
//!
//! When splitting by count, every span gets `extent / count` pixels and the
//! first `extent % count` spans get one extra pixel:
//!
//! ```
//! use tilegrid::geometry::split_by_count;
//!
//! let lengths: Vec<usize> = split_by_count(10, 3).iter().map(|s| s.length).collect();
//! assert_eq!(lengths, vec![4, 3, 3]);
//! ```
//!
//! When splitting by size, every span is `size` pixels except the last, which
//! holds whatever is left.

use serde::{Deserialize, Serialize};

use crate::error::{Axis, Result, TileError};

/// A contiguous run of pixels along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// First pixel of the span.
    pub offset: usize,
    /// Number of pixels in the span.
    pub length: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// One past the last pixel of the span.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// How to split one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSplit {
    /// Split into this many tiles.
    Count(usize),
    /// Split into tiles of this many pixels.
    Size(usize),
}

impl AxisSplit {
    /// Build a split from optional count/size parameters.
    ///
    /// # Errors
    ///
    /// Exactly one of `count` and `size` must be given, and it must be
    /// non-zero.
    pub fn from_params(axis: Axis, count: Option<usize>, size: Option<usize>) -> Result<Self> {
        let split = match (count, size) {
            (Some(_), Some(_)) => return Err(TileError::ConflictingTileParams { axis }),
            (None, None) => return Err(TileError::MissingTileParams { axis }),
            (Some(count), None) => AxisSplit::Count(count),
            (None, Some(size)) => AxisSplit::Size(size),
        };
        split.validate(axis)?;
        Ok(split)
    }

    fn validate(&self, axis: Axis) -> Result<()> {
        match *self {
            AxisSplit::Count(0) => Err(TileError::InvalidTileParam {
                axis,
                reason: "tile count must be at least 1".to_string(),
            }),
            AxisSplit::Size(0) => Err(TileError::InvalidTileParam {
                axis,
                reason: "tile size must be at least 1 pixel".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Split `extent_px` pixels along `axis`.
    pub fn split(&self, axis: Axis, extent_px: usize) -> Result<Vec<Span>> {
        self.validate(axis)?;
        Ok(match *self {
            AxisSplit::Count(count) => split_by_count(extent_px, count),
            AxisSplit::Size(size) => split_by_size(extent_px, size),
        })
    }
}

/// Split an axis given optional count/size parameters.
///
/// Convenience wrapper over [`AxisSplit::from_params`] and [`AxisSplit::split`].
pub fn split_axis(
    axis: Axis,
    extent_px: usize,
    count: Option<usize>,
    size: Option<usize>,
) -> Result<Vec<Span>> {
    AxisSplit::from_params(axis, count, size)?.split(axis, extent_px)
}

/// Split `extent_px` pixels into `count` spans, distributing the remainder
/// one pixel at a time over the leading spans.
///
/// `count` must be non-zero. If `count > extent_px`, the trailing spans
/// have zero length.
pub fn split_by_count(extent_px: usize, count: usize) -> Vec<Span> {
    debug_assert!(count > 0);
    let base = extent_px / count;
    let remainder = extent_px % count;

    let mut spans = Vec::with_capacity(count);
    let mut offset = 0;
    for i in 0..count {
        let length = base + usize::from(i < remainder);
        spans.push(Span::new(offset, length));
        offset += length;
    }
    spans
}

/// Split `extent_px` pixels into spans of `size` pixels; the last span is
/// shorter when `size` doesn't divide the extent.
pub fn split_by_size(extent_px: usize, size: usize) -> Vec<Span> {
    debug_assert!(size > 0);
    (0..extent_px)
        .step_by(size)
        .map(|offset| Span::new(offset, size.min(extent_px - offset)))
        .collect()
}

/// Row and column spans of a tile grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSplit {
    /// Row spans, top to bottom.
    pub rows: Vec<Span>,
    /// Column spans, left to right.
    pub cols: Vec<Span>,
}

impl GridSplit {
    /// Split a `(rows, cols)` pixel shape along both axes.
    pub fn new(shape: (usize, usize), rows: AxisSplit, cols: AxisSplit) -> Result<Self> {
        Ok(Self {
            rows: rows.split(Axis::Rows, shape.0)?,
            cols: cols.split(Axis::Columns, shape.1)?,
        })
    }

    /// Returns the grid shape `(tile_rows, tile_cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Number of cells in the grid.
    pub fn len(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    /// Check if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over `(tile_row, tile_col, row_span, col_span)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Span, Span)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, &row)| {
            self.cols
                .iter()
                .enumerate()
                .map(move |(c, &col)| (r, c, row, col))
        })
    }

    /// Largest span along each axis: the nominal tile size.
    pub fn max_tile_shape(&self) -> (usize, usize) {
        let max = |spans: &[Span]| spans.iter().map(|s| s.length).max().unwrap_or(0);
        (max(&self.rows), max(&self.cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lengths(spans: &[Span]) -> Vec<usize> {
        spans.iter().map(|s| s.length).collect()
    }

    #[test]
    fn test_split_by_count_even() {
        let spans = split_by_count(200, 4);
        assert_eq!(lengths(&spans), vec![50, 50, 50, 50]);
        assert_eq!(spans[3].offset, 150);
    }

    #[test]
    fn test_split_by_count_remainder() {
        // 200 rows into 3 tiles: 67, 67, 66
        let spans = split_by_count(200, 3);
        assert_eq!(lengths(&spans), vec![67, 67, 66]);
        assert_eq!(spans[1].offset, 67);
        assert_eq!(spans[2].offset, 134);

        let spans = split_by_count(100, 3);
        assert_eq!(lengths(&spans), vec![34, 33, 33]);
    }

    #[test]
    fn test_split_by_count_more_tiles_than_pixels() {
        let spans = split_by_count(2, 4);
        assert_eq!(lengths(&spans), vec![1, 1, 0, 0]);
        assert_eq!(spans[3].end(), 2);
    }

    #[test]
    fn test_split_by_size() {
        let spans = split_by_size(10, 4);
        assert_eq!(
            spans,
            vec![Span::new(0, 4), Span::new(4, 4), Span::new(8, 2)]
        );
        assert_eq!(lengths(&split_by_size(8, 4)), vec![4, 4]);
        assert!(split_by_size(0, 4).is_empty());
    }

    #[test]
    fn test_split_axis_params() {
        assert!(matches!(
            split_axis(Axis::Rows, 10, Some(2), Some(5)),
            Err(TileError::ConflictingTileParams { axis: Axis::Rows })
        ));
        assert!(matches!(
            split_axis(Axis::Columns, 10, None, None),
            Err(TileError::MissingTileParams {
                axis: Axis::Columns
            })
        ));
        assert!(matches!(
            split_axis(Axis::Rows, 10, Some(0), None),
            Err(TileError::InvalidTileParam { .. })
        ));
        assert!(matches!(
            split_axis(Axis::Rows, 10, None, Some(0)),
            Err(TileError::InvalidTileParam { .. })
        ));
        assert_eq!(split_axis(Axis::Rows, 10, None, Some(5)).unwrap().len(), 2);
    }

    #[test]
    fn test_grid_split_row_major() {
        let grid = GridSplit::new((200, 100), AxisSplit::Count(3), AxisSplit::Count(3)).unwrap();
        assert_eq!(grid.shape(), (3, 3));
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.max_tile_shape(), (67, 34));

        let order: Vec<(usize, usize)> = grid.cells().map(|(r, c, _, _)| (r, c)).collect();
        assert_eq!(order[0], (0, 0));
        assert_eq!(order[1], (0, 1));
        assert_eq!(order[3], (1, 0));
        assert_eq!(order[8], (2, 2));
    }

    proptest! {
        #[test]
        fn prop_count_lengths_sum_and_balance(extent in 0usize..10_000, count in 1usize..200) {
            let spans = split_by_count(extent, count);
            prop_assert_eq!(spans.len(), count);
            prop_assert_eq!(spans.iter().map(|s| s.length).sum::<usize>(), extent);

            let min = spans.iter().map(|s| s.length).min().unwrap();
            let max = spans.iter().map(|s| s.length).max().unwrap();
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn prop_count_spans_contiguous(extent in 1usize..10_000, count in 1usize..200) {
            prop_assume!(count <= extent);
            let spans = split_by_count(extent, count);
            prop_assert_eq!(spans[0].offset, 0);
            for pair in spans.windows(2) {
                prop_assert_eq!(pair[0].offset + pair[0].length, pair[1].offset);
                prop_assert!(pair[1].offset > pair[0].offset);
            }
        }

        #[test]
        fn prop_size_spans_cover_extent(extent in 0usize..10_000, size in 1usize..500) {
            let spans = split_by_size(extent, size);
            prop_assert_eq!(spans.iter().map(|s| s.length).sum::<usize>(), extent);
            prop_assert!(spans.iter().all(|s| s.length > 0 && s.length <= size));
            for pair in spans.windows(2) {
                prop_assert_eq!(pair[0].end(), pair[1].offset);
            }
        }

        #[test]
        fn prop_split_is_reproducible(extent in 0usize..5_000, count in 1usize..100) {
            prop_assert_eq!(split_by_count(extent, count), split_by_count(extent, count));
        }
    }
}
