pub mod plan;
pub mod sectors;
pub mod tile;

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tilegrid::tiler::parse_shape;
use tilegrid::{
    AreaDefinition, GridAlignment, LetteredGridSpec, ReferenceArea, SectorCatalog, TileGridSpec,
    TilerBuilder, ValidityMode,
};

/// Grid selection shared by `tile` and `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct GridArgs {
    /// Numbered grid with ROWSxCOLS tiles
    #[arg(long, value_parser = parse_pair, conflicts_with = "tile_size")]
    pub tile_count: Option<(usize, usize)>,

    /// Numbered grid with tiles of ROWSxCOLS pixels
    #[arg(long, value_parser = parse_pair)]
    pub tile_size: Option<(usize, usize)>,

    /// Use a lettered grid (ignores --tile-count and --tile-size)
    #[arg(long)]
    pub lettered: bool,

    /// Sector id of the lettered grid
    #[arg(long, requires = "lettered")]
    pub sector: Option<String>,

    /// Sector catalog JSON file
    #[arg(long, env = "TILEGRID_SECTORS")]
    pub sectors: Option<PathBuf>,

    /// Anchor the lettered grid on the raster's own area
    #[arg(long, requires = "lettered", conflicts_with = "sector")]
    pub own_area: bool,

    /// Letter cells ROWSxCOLS (with --own-area)
    #[arg(long, value_parser = parse_pair)]
    pub letters: Option<(usize, usize)>,

    /// Sub-tiles per letter cell, ROWSxCOLS
    #[arg(long, value_parser = parse_pair)]
    pub subtiles: Option<(usize, usize)>,

    /// Letter cell size WIDTHxHEIGHT in projection units
    #[arg(long, value_parser = parse_size)]
    pub cell_size: Option<(f64, f64)>,

    /// Snap the lettered grid onto the source pixel grid
    #[arg(long)]
    pub snap: bool,

    /// Validity mode: per-band or combined
    #[arg(long)]
    pub validity: Option<ValidityMode>,

    /// Check tiles on a single thread
    #[arg(long)]
    pub sequential: bool,
}

impl GridArgs {
    /// Tiler builder from `TILEGRID_*` variables, overridden by the arguments.
    pub fn builder(&self) -> Result<TilerBuilder> {
        let mut builder = TilerBuilder::from_env().context("Invalid TILEGRID_* environment variable")?;

        if self.lettered {
            builder = builder.lettered(self.lettered_spec()?);
        } else if let Some((rows, cols)) = self.tile_count {
            builder = builder.grid(TileGridSpec::numbered(rows, cols));
        } else if let Some((height, width)) = self.tile_size {
            builder = builder.grid(TileGridSpec::numbered_by_size(height, width));
        }

        if let Some(mode) = self.validity {
            builder = builder.validity(mode);
        }
        if self.sequential {
            builder = builder.parallel(false);
        }
        Ok(builder)
    }

    fn lettered_spec(&self) -> Result<LetteredGridSpec> {
        let mut spec = if let Some(sector_id) = &self.sector {
            let catalog = load_catalog(self.sectors.as_deref())?;
            catalog
                .grid_spec(sector_id)
                .with_context(|| format!("Sector '{}' not available", sector_id))?
        } else if self.own_area {
            let (rows, cols) = self
                .letters
                .context("--own-area needs --letters ROWSxCOLS")?;
            LetteredGridSpec::new(rows, cols, ReferenceArea::Dataset)
        } else {
            bail!("--lettered needs --sector ID or --own-area");
        };

        if let Some((rows, cols)) = self.subtiles {
            spec = spec.subtiles(rows, cols);
        }
        if let Some((width, height)) = self.cell_size {
            spec = spec.cell_size(width, height);
        }
        if self.snap {
            spec = spec.alignment(GridAlignment::SnapToSource);
        }
        Ok(spec)
    }
}

/// Load a sector catalog from `path` (or `TILEGRID_SECTORS`).
pub fn load_catalog(path: Option<&Path>) -> Result<SectorCatalog> {
    let path = path.context("No sector catalog given. Use --sectors or set TILEGRID_SECTORS")?;
    SectorCatalog::from_file(path)
        .with_context(|| format!("Failed to load sector catalog: {}", path.display()))
}

/// Read an area definition from a JSON file.
pub fn load_area(path: &Path) -> Result<AreaDefinition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read area file: {}", path.display()))?;
    let area: AreaDefinition = serde_json::from_str(&json)
        .with_context(|| format!("Invalid area definition: {}", path.display()))?;
    area.validate()
        .with_context(|| format!("Invalid area definition: {}", path.display()))?;
    Ok(area)
}

fn parse_pair(s: &str) -> std::result::Result<(usize, usize), String> {
    parse_shape(s).ok_or_else(|| format!("expected ROWSxCOLS, got '{}'", s))
}

fn parse_size(s: &str) -> std::result::Result<(f64, f64), String> {
    let parsed = s
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
    parsed.ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))
}
