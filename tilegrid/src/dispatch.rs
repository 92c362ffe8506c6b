//! Handing emitted tiles to a writer.
//!
//! The tiler doesn't serialize anything itself. For every emitted tile,
//! [`dispatch_tiles`] renders the output filename, gathers the metadata a
//! writer needs ([`TileAttributes`]) and passes both to a [`TileSink`].

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::filename::{FilenameTemplate, NamingContext};
use crate::raster::SourceMetadata;
use crate::tile::Tile;
use crate::tiler::TileSet;

/// Format of the `start_date_time` attribute.
pub const START_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Naming and timing options for a save.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOptions {
    /// Filename template.
    pub template: FilenameTemplate,
    /// Sector identifier, e.g. `"LCC"`.
    pub sector_id: String,
    /// Producing organization or system, e.g. `"SSEC"`.
    pub source_name: String,
    /// Use the source end time as the scheduled time.
    pub use_end_time: bool,
}

impl DispatchOptions {
    /// Options with the default filename template.
    pub fn new(sector_id: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            template: FilenameTemplate::default(),
            sector_id: sector_id.into(),
            source_name: source_name.into(),
            use_end_time: false,
        }
    }

    /// Set the filename template.
    pub fn template(mut self, template: FilenameTemplate) -> Self {
        self.template = template;
        self
    }

    /// Use the end time instead of the start time as the scheduled time.
    pub fn use_end_time(mut self, use_end_time: bool) -> Self {
        self.use_end_time = use_end_time;
        self
    }

    fn scheduled_time(&self, metadata: &SourceMetadata) -> DateTime<Utc> {
        if self.use_end_time {
            metadata.end_time
        } else {
            metadata.start_time
        }
    }
}

/// Scale/offset encoding of one projection axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisCoordinate {
    /// CF standard name.
    pub standard_name: String,
    /// Coordinate units.
    pub units: String,
    /// Coordinate step per pixel.
    pub scale_factor: f64,
    /// Coordinate of mosaic pixel 0.
    pub add_offset: f64,
    /// First mosaic pixel index covered by the tile.
    pub start: usize,
    /// Pixels covered by the tile.
    pub count: usize,
}

/// CF grid mapping of the tile's projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMapping {
    /// Name of the grid mapping variable, e.g. `"lambert_projection"`.
    pub name: String,
    /// CF `grid_mapping_name`, e.g. `"lambert_conformal_conic"`.
    pub grid_mapping_name: String,
    /// Projection definition of the source area.
    pub projection: String,
}

impl GridMapping {
    /// Grid mapping for a PROJ string, keyed on its `+proj=` value.
    ///
    /// Unrecognized projections keep their `+proj` value as the CF name.
    pub fn from_projection(projection: &str) -> Self {
        let proj = projection
            .split_whitespace()
            .find_map(|param| param.strip_prefix("+proj="))
            .unwrap_or("unknown");
        let (name, grid_mapping_name) = match proj {
            "lcc" => ("lambert_projection", "lambert_conformal_conic"),
            "stere" => ("polar_projection", "polar_stereographic"),
            "merc" => ("mercator_projection", "mercator"),
            "geos" => ("fixedgrid_projection", "geostationary"),
            other => ("projection", other),
        };
        Self {
            name: name.to_string(),
            grid_mapping_name: grid_mapping_name.to_string(),
            projection: projection.to_string(),
        }
    }
}

/// Metadata a writer attaches to one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileAttributes {
    /// Rendered tile identity, e.g. `"T001"` or `"TA01"`.
    pub tile_id: String,
    /// Tile grid row.
    pub tile_row: usize,
    /// Tile grid column.
    pub tile_column: usize,
    /// First mosaic row of the tile data.
    pub tile_row_offset: usize,
    /// First mosaic column of the tile data.
    pub tile_column_offset: usize,
    /// Nominal tile height in the mosaic.
    pub product_tile_height: usize,
    /// Nominal tile width in the mosaic.
    pub product_tile_width: usize,
    /// Tiles in the full mosaic grid.
    pub number_product_tiles: usize,
    /// Mosaic height in pixels.
    pub product_rows: usize,
    /// Mosaic width in pixels.
    pub product_columns: usize,
    /// Scheduled time as `%Y-%m-%dT%H:%M:%S`.
    pub start_date_time: String,
    pub source_name: String,
    pub sector_id: String,
    /// Dataset name, suffixed with the band for multi-band rasters.
    pub name: String,
    pub platform_name: String,
    pub sensor: String,
    pub units: String,
    /// Band name, if the raster names its bands.
    pub band: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Name of the grid mapping variable the data refers to.
    pub grid_mapping: String,
    /// Projection parameters of the tile grid.
    pub projection: GridMapping,
    /// x axis encoding.
    pub x: AxisCoordinate,
    /// y axis encoding.
    pub y: AxisCoordinate,
}

/// A tile ready to be written.
#[derive(Debug)]
pub struct TileRecord<'t, 'a> {
    /// Rendered output filename.
    pub filename: String,
    /// The tile data and identity.
    pub tile: &'t Tile<'a>,
    /// Metadata to store with the tile.
    pub attributes: TileAttributes,
}

/// Destination of emitted tiles.
pub trait TileSink {
    /// Write one tile.
    fn write_tile(&mut self, record: &TileRecord<'_, '_>) -> Result<()>;
}

/// A tile copied out by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTile {
    /// Rendered output filename.
    pub filename: String,
    /// Tile metadata.
    pub attributes: TileAttributes,
    /// Owned copy of the samples.
    pub data: Array2<f32>,
}

/// Sink that keeps copies of every tile in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Tiles in write order.
    pub tiles: Vec<WrittenTile>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filenames in write order.
    pub fn filenames(&self) -> Vec<&str> {
        self.tiles.iter().map(|t| t.filename.as_str()).collect()
    }
}

impl TileSink for MemorySink {
    fn write_tile(&mut self, record: &TileRecord<'_, '_>) -> Result<()> {
        self.tiles.push(WrittenTile {
            filename: record.filename.clone(),
            attributes: record.attributes.clone(),
            data: record.tile.to_owned_data(),
        });
        Ok(())
    }
}

/// Outcome of a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Tiles written, over all bands.
    pub tiles_written: usize,
    /// Filenames in write order.
    pub filenames: Vec<String>,
}

/// Render names and attributes for every tile in `tiles` and write them.
///
/// Zero tiles is a successful, empty save.
///
/// # Errors
///
/// Returns [`crate::TileError::UnknownTemplateKey`] if the template names
/// an unknown key, before any tile is written. Sink errors are passed on.
pub fn dispatch_tiles<K>(
    tiles: &TileSet<'_>,
    metadata: &SourceMetadata,
    options: &DispatchOptions,
    sink: &mut K,
) -> Result<DispatchSummary>
where
    K: TileSink + ?Sized,
{
    options.template.check_keys()?;

    let multi_band = tiles.bands.len() > 1;
    let scheduled = options.scheduled_time(metadata);
    let grid_mapping = GridMapping::from_projection(&tiles.projection);
    let mut summary = DispatchSummary::default();

    for band in &tiles.bands {
        let band_label = band
            .band_name
            .clone()
            .unwrap_or_else(|| band.band.to_string());
        let name = if multi_band {
            format!("{}_{}", metadata.name, band_label)
        } else {
            metadata.name.clone()
        };

        for tile in &band.tiles {
            let ctx = naming_context(tile, metadata, options, &name, &band_label, scheduled);
            let filename = options.template.render(&ctx)?;
            let attributes =
                tile_attributes(tile, metadata, options, &name, &grid_mapping, scheduled);

            sink.write_tile(&TileRecord {
                filename: filename.clone(),
                tile,
                attributes,
            })?;
            summary.tiles_written += 1;
            summary.filenames.push(filename);
        }
    }

    info!(
        sector_id = %options.sector_id,
        name = %metadata.name,
        tiles = summary.tiles_written,
        "Dispatched tiles"
    );
    Ok(summary)
}

fn naming_context(
    tile: &Tile<'_>,
    metadata: &SourceMetadata,
    options: &DispatchOptions,
    name: &str,
    band_label: &str,
    scheduled: DateTime<Utc>,
) -> NamingContext {
    NamingContext::new()
        .with("source_name", options.source_name.as_str())
        .with("sector_id", options.sector_id.as_str())
        .with("platform_name", metadata.platform_name.as_str())
        .with("sensor", metadata.sensor.as_str())
        .with("name", name)
        .with("units", metadata.units.as_str())
        .with("band", band_label)
        .with("tile_id", tile.id())
        .with("tile_number", tile.identity.number())
        .with("tile_row", tile.position.grid_row)
        .with("tile_column", tile.position.grid_col)
        .with("start_time", metadata.start_time)
        .with("end_time", metadata.end_time)
        .with("scheduled_time", scheduled)
}

fn tile_attributes(
    tile: &Tile<'_>,
    metadata: &SourceMetadata,
    options: &DispatchOptions,
    name: &str,
    grid_mapping: &GridMapping,
    scheduled: DateTime<Utc>,
) -> TileAttributes {
    let position = &tile.position;
    TileAttributes {
        tile_id: tile.id(),
        tile_row: position.grid_row,
        tile_column: position.grid_col,
        tile_row_offset: position.tile_row_offset,
        tile_column_offset: position.tile_column_offset,
        product_tile_height: position.product_tile_height,
        product_tile_width: position.product_tile_width,
        number_product_tiles: position.number_product_tiles(),
        product_rows: position.product_rows,
        product_columns: position.product_columns,
        start_date_time: scheduled.format(START_DATE_TIME_FORMAT).to_string(),
        source_name: options.source_name.clone(),
        sector_id: options.sector_id.clone(),
        name: name.to_string(),
        platform_name: metadata.platform_name.clone(),
        sensor: metadata.sensor.clone(),
        units: metadata.units.clone(),
        band: tile.band_name.clone(),
        start_time: metadata.start_time,
        end_time: metadata.end_time,
        grid_mapping: grid_mapping.name.clone(),
        projection: grid_mapping.clone(),
        x: AxisCoordinate {
            standard_name: "projection_x_coordinate".to_string(),
            units: "meters".to_string(),
            scale_factor: tile.coords.x_scale,
            add_offset: tile.coords.x_offset,
            start: position.tile_column_offset,
            count: tile.window.width,
        },
        y: AxisCoordinate {
            standard_name: "projection_y_coordinate".to_string(),
            units: "meters".to_string(),
            scale_factor: tile.coords.y_scale,
            add_offset: tile.coords.y_offset,
            start: position.tile_row_offset,
            count: tile.window.height,
        },
    }
}
