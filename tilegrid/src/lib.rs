//! # tilegrid - Tile Grids for Satellite Imagery
//!
//! Cuts georeferenced rasters into the numbered or lettered tiles used by
//! tiled satellite imagery products, and works out every tile's place in the
//! full mosaic.
//!
//! ## Features
//!
//! - **Exact**: tile boundaries are pixel-aligned, with a fixed remainder
//!   policy; nothing is resampled
//! - **Two grid kinds**: numbered grids over the raster's own extent, and
//!   lettered grids anchored on a fixed reference sector
//! - **Sparse output**: tiles without overlap or valid data are dropped,
//!   and identities stay dense
//! - **Deterministic**: identities come from grid position, so parallel
//!   validity checks give the same names as sequential ones
//! - **Zero-copy**: tiles are views into the source raster
//!
//! ## Quick Start
//!
//! ```ignore
//! use tilegrid::{DispatchOptions, MemorySink, Raster, Tiler};
//!
//! let raster = Raster::single_band(data, area, metadata)?;
//! let tiler = Tiler::builder().numbered(3, 3).build()?;
//!
//! let mut sink = MemorySink::new();
//! let summary = tiler.save(&raster, &DispatchOptions::new("TEST", "SSEC"), &mut sink)?;
//! println!("Wrote {} tiles", summary.tiles_written);
//! ```
//!
//! ## Tile Identifiers
//!
//! - Numbered tiles: `T001`, `T002`, ... dense over the emitted tiles.
//! - Lettered tiles: `TA01`, `TA02`, `TB01`, ... dense within each letter cell.
//!
//! ## Pipeline
//!
//! 1. [`geometry`] splits pixel extents into tile spans.
//! 2. [`sector`] resolves lettered reference grids.
//! 3. [`mapper`] maps every grid cell to a source pixel window.
//! 4. [`validity`] drops cells without overlap or valid data.
//! 5. [`identity`] names the survivors.
//! 6. [`dispatch`] renders filenames and attributes and hands tiles to a sink.

pub mod area;
pub mod dispatch;
pub mod error;
pub mod filename;
#[cfg(feature = "geojson")]
pub mod footprint;
pub mod geometry;
pub mod grid;
pub mod identity;
pub mod mapper;
pub mod raster;
pub mod sector;
pub mod source;
pub mod tile;
pub mod tiler;
pub mod validity;

// Re-export main types at crate root for convenience
pub use area::{AreaDefinition, Extent};
pub use dispatch::{
    dispatch_tiles, DispatchOptions, DispatchSummary, GridMapping, MemorySink, TileAttributes,
    TileRecord, TileSink,
};
pub use error::{Axis, ErrorKind, Result, TileError};
pub use filename::{FilenameTemplate, NamingContext, DEFAULT_TEMPLATE};
pub use geometry::{split_axis, AxisSplit, GridSplit, Span};
pub use grid::{GridAlignment, LetteredGridSpec, ReferenceArea, TileGridSpec};
pub use identity::TileIdentity;
pub use mapper::{plan_tiles, CandidateTile, MosaicInfo, TilePlan, TileWindow};
pub use raster::{MissingValue, Raster, RasterSource, SourceMetadata};
pub use sector::{Sector, SectorCatalog};
pub use source::RawRasterFile;
pub use tile::{CoordinateEncoding, Tile, TilePosition};
pub use tiler::{TileSet, Tiler, TilerBuilder, TilingStats};
pub use validity::ValidityMode;
