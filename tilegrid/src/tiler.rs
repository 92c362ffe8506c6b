//! Tiling a raster end to end.
//!
//! [`Tiler`] runs the whole pipeline for one raster: plan the grid, check
//! every candidate for valid data, assign identities and slice the tiles.
//! The result is a [`TileSet`] of views into the source raster; nothing is
//! copied until a sink asks for it.
//!
//! # Example
//!
//! ```ignore
//! use tilegrid::{Tiler, ValidityMode};
//!
//! let tiler = Tiler::builder()
//!     .numbered(3, 3)
//!     .validity(ValidityMode::PerBand)
//!     .build()?;
//!
//! let tiles = tiler.tile(&raster)?;
//! for tile in tiles.iter() {
//!     println!("{} {:?}", tile.id(), tile.shape());
//! }
//! ```

use std::time::Instant;

use tracing::{debug, info, trace};

use crate::area::AreaDefinition;
use crate::dispatch::{dispatch_tiles, DispatchOptions, DispatchSummary, TileSink};
use crate::error::{Result, TileError};
use crate::grid::{LetteredGridSpec, TileGridSpec};
use crate::identity::assign_identities;
use crate::mapper::{plan_tiles, MosaicInfo, TilePlan};
use crate::raster::RasterSource;
use crate::tile::{Tile, TilePosition};
use crate::validity::{check_candidates, ValidityMode, Verdict};

/// Counts from one tiling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilingStats {
    /// Bands tiled.
    pub bands: usize,
    /// Candidate tiles per band (the full nominal grid).
    pub candidates: usize,
    /// Tiles emitted, over all bands.
    pub emitted: usize,
    /// Candidates dropped for not overlapping the source, over all bands.
    pub dropped_no_overlap: usize,
    /// Candidates dropped for having no valid data, over all bands.
    pub dropped_no_data: usize,
    /// Time taken in milliseconds.
    pub elapsed_ms: u64,
}

/// Tiles emitted for one band.
#[derive(Debug, Clone)]
pub struct BandTiles<'a> {
    /// Source band index.
    pub band: usize,
    /// Source band name, when bands are named.
    pub band_name: Option<String>,
    /// Emitted tiles in row-major order.
    pub tiles: Vec<Tile<'a>>,
}

/// Result of tiling one raster. May be empty.
#[derive(Debug, Clone)]
pub struct TileSet<'a> {
    /// The full mosaic.
    pub mosaic: MosaicInfo,
    /// Projection of the source area, carried into tile metadata.
    pub projection: String,
    /// Emitted tiles, per band.
    pub bands: Vec<BandTiles<'a>>,
    /// Counts from this run.
    pub stats: TilingStats,
}

impl<'a> TileSet<'a> {
    /// Total number of tiles over all bands.
    pub fn len(&self) -> usize {
        self.bands.iter().map(|b| b.tiles.len()).sum()
    }

    /// Check if no tile was emitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all tiles, band by band.
    pub fn iter(&self) -> impl Iterator<Item = &Tile<'a>> {
        self.bands.iter().flat_map(|b| b.tiles.iter())
    }

    /// Tiles of one band.
    pub fn band(&self, band: usize) -> Option<&BandTiles<'a>> {
        self.bands.get(band)
    }
}

/// Cuts rasters into tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Tiler {
    grid: TileGridSpec,
    validity: ValidityMode,
    parallel: bool,
}

impl Tiler {
    /// Create a tiler for `grid` with per-band validity and parallel checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid parameters are invalid.
    pub fn new(grid: TileGridSpec) -> Result<Self> {
        Self::builder().grid(grid).build()
    }

    /// Create a builder.
    pub fn builder() -> TilerBuilder {
        TilerBuilder::new()
    }

    /// The tile grid.
    pub fn grid(&self) -> &TileGridSpec {
        &self.grid
    }

    /// The validity mode.
    pub fn validity(&self) -> ValidityMode {
        self.validity
    }

    /// Check if candidates are checked on the rayon pool.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Plan the candidate tiles over `area` without reading samples.
    pub fn plan(&self, area: &AreaDefinition) -> Result<TilePlan> {
        plan_tiles(&self.grid, area)
    }

    /// Cut `source` into tiles.
    ///
    /// Candidates without overlap or without valid data are dropped
    /// silently. A result with no tiles is not an error.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from planning the grid.
    pub fn tile<'a, S>(&self, source: &'a S) -> Result<TileSet<'a>>
    where
        S: RasterSource + ?Sized,
    {
        let start = Instant::now();
        let plan = self.plan(source.area())?;
        let verdicts = check_candidates(source, &plan.candidates, self.validity, self.parallel);
        let coords = plan.mosaic.coordinate_encoding();

        let mut stats = TilingStats {
            bands: source.band_count(),
            candidates: plan.candidates.len(),
            ..Default::default()
        };

        let mut bands = Vec::with_capacity(source.band_count());
        for (band, band_verdicts) in verdicts.iter().enumerate() {
            let keep: Vec<bool> = band_verdicts.iter().map(Verdict::is_kept).collect();
            let identities = assign_identities(&plan.candidates, &keep);
            let band_name = source.band_name(band).map(str::to_string);

            let mut tiles = Vec::new();
            for ((candidate, identity), verdict) in
                plan.candidates.iter().zip(identities).zip(band_verdicts)
            {
                match (identity, verdict) {
                    (Some(identity), _) => tiles.push(Tile::new(
                        identity,
                        band,
                        band_name.clone(),
                        candidate.window,
                        TilePosition::new(&plan.mosaic, candidate),
                        coords,
                        source.window(band, &candidate.window),
                    )),
                    (None, Verdict::NoOverlap) => {
                        stats.dropped_no_overlap += 1;
                        trace!(band, index = candidate.index, "Dropped tile: no overlap");
                    }
                    (None, _) => {
                        stats.dropped_no_data += 1;
                        trace!(band, index = candidate.index, "Dropped tile: no valid data");
                    }
                }
            }

            stats.emitted += tiles.len();
            bands.push(BandTiles {
                band,
                band_name,
                tiles,
            });
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            area = %source.area().name,
            bands = stats.bands,
            candidates = stats.candidates,
            emitted = stats.emitted,
            dropped_no_overlap = stats.dropped_no_overlap,
            dropped_no_data = stats.dropped_no_data,
            elapsed_ms = stats.elapsed_ms,
            "Tiled raster"
        );

        Ok(TileSet {
            mosaic: plan.mosaic,
            projection: source.area().projection.clone(),
            bands,
            stats,
        })
    }

    /// Tile `source` and hand every tile to `sink`.
    ///
    /// The filename template is checked before any tile is computed, so an
    /// unknown key fails the save without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::UnknownTemplateKey`] for unknown template keys,
    /// configuration errors from planning, and any error from the sink.
    pub fn save<S, K>(&self, source: &S, options: &DispatchOptions, sink: &mut K) -> Result<DispatchSummary>
    where
        S: RasterSource + ?Sized,
        K: TileSink + ?Sized,
    {
        options.template.check_keys()?;
        let tiles = self.tile(source)?;
        dispatch_tiles(&tiles, source.metadata(), options, sink)
    }
}

/// Builder for [`Tiler`].
///
/// # Example
///
/// ```ignore
/// use tilegrid::{LetteredGridSpec, ReferenceArea, TilerBuilder, ValidityMode};
///
/// let tiler = TilerBuilder::new()
///     .lettered(LetteredGridSpec::new(4, 4, ReferenceArea::Dataset))
///     .validity(ValidityMode::Combined)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TilerBuilder {
    grid: Option<TileGridSpec>,
    tile_count: Option<(usize, usize)>,
    tile_size: Option<(usize, usize)>,
    lettered: Option<LetteredGridSpec>,
    validity: ValidityMode,
    parallel: bool,
}

impl Default for TilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TilerBuilder {
    /// Create a builder with per-band validity and parallel checks.
    pub fn new() -> Self {
        Self {
            grid: None,
            tile_count: None,
            tile_size: None,
            lettered: None,
            validity: ValidityMode::default(),
            parallel: true,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `TILEGRID_TILE_COUNT` | Numbered tile count, `ROWSxCOLS` | None |
    /// | `TILEGRID_TILE_SIZE` | Numbered tile size in pixels, `ROWSxCOLS` | None |
    /// | `TILEGRID_VALIDITY` | `per-band` or `combined` | `per-band` |
    /// | `TILEGRID_PARALLEL` | Check tiles on the rayon pool | `true` |
    ///
    /// # Example
    ///
    /// ```bash
    /// export TILEGRID_TILE_COUNT=3x3
    /// export TILEGRID_VALIDITY=combined
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidSetting`] if a variable is set but can't
    /// be parsed.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::new();

        if let Some(value) = env_var("TILEGRID_TILE_COUNT") {
            builder.tile_count = Some(parse_setting("TILEGRID_TILE_COUNT", &value, parse_shape)?);
        }
        if let Some(value) = env_var("TILEGRID_TILE_SIZE") {
            builder.tile_size = Some(parse_setting("TILEGRID_TILE_SIZE", &value, parse_shape)?);
        }
        if let Some(value) = env_var("TILEGRID_VALIDITY") {
            builder.validity = parse_setting("TILEGRID_VALIDITY", &value, |v| v.parse().ok())?;
        }
        if let Some(value) = env_var("TILEGRID_PARALLEL") {
            builder.parallel = parse_setting("TILEGRID_PARALLEL", &value, parse_flag)?;
        }

        Ok(builder)
    }

    /// Use an explicit grid spec. Overrides every other grid setting.
    pub fn grid(mut self, grid: TileGridSpec) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Numbered grid with `rows × cols` tiles.
    pub fn numbered(mut self, rows: usize, cols: usize) -> Self {
        self.tile_count = Some((rows, cols));
        self
    }

    /// Numbered grid with tiles of `height × width` pixels.
    pub fn tile_size(mut self, height: usize, width: usize) -> Self {
        self.tile_size = Some((height, width));
        self
    }

    /// Lettered grid. Any tile count or size is ignored.
    pub fn lettered(mut self, spec: LetteredGridSpec) -> Self {
        self.lettered = Some(spec);
        self
    }

    /// Set the validity mode.
    ///
    /// Default is [`ValidityMode::PerBand`].
    pub fn validity(mut self, mode: ValidityMode) -> Self {
        self.validity = mode;
        self
    }

    /// Check candidates on the rayon thread pool.
    ///
    /// Default is `true`. Identities don't depend on this setting.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build the [`Tiler`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a numbered grid has both or neither
    /// of tile count and tile size, or if the grid parameters are invalid.
    pub fn build(self) -> Result<Tiler> {
        let grid = match (self.grid, self.lettered) {
            (Some(grid), _) => grid,
            (None, Some(lettered)) => {
                if self.tile_count.is_some() || self.tile_size.is_some() {
                    debug!("Lettered grid requested; ignoring tile count and tile size");
                }
                TileGridSpec::Lettered(lettered)
            }
            (None, None) => TileGridSpec::numbered_from_params(self.tile_count, self.tile_size)?,
        };
        grid.validate()?;

        Ok(Tiler {
            grid,
            validity: self.validity,
            parallel: self.parallel,
        })
    }
}

/// Parse a `ROWSxCOLS` pair such as `3x3`.
///
/// # Examples
///
/// ```
/// use tilegrid::tiler::parse_shape;
///
/// assert_eq!(parse_shape("3x4"), Some((3, 4)));
/// assert_eq!(parse_shape("512X512"), Some((512, 512)));
/// assert_eq!(parse_shape("3"), None);
/// ```
pub fn parse_shape(s: &str) -> Option<(usize, usize)> {
    let (rows, cols) = s.trim().split_once(['x', 'X'])?;
    Some((rows.trim().parse().ok()?, cols.trim().parse().ok()?))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_setting<T>(name: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| TileError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
        reason: "unrecognized value".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Extent;
    use crate::error::Axis;
    use crate::grid::ReferenceArea;
    use crate::raster::tests::test_metadata;
    use crate::raster::Raster;
    use ndarray::{Array2, Array3};

    fn area() -> AreaDefinition {
        AreaDefinition::new("test", "p", 6, 6, Extent::new(0.0, 0.0, 6.0, 6.0)).unwrap()
    }

    #[test]
    fn test_builder_numbered() {
        let tiler = Tiler::builder().numbered(3, 2).build().unwrap();
        assert_eq!(tiler.grid(), &TileGridSpec::numbered(3, 2));
        assert_eq!(tiler.validity(), ValidityMode::PerBand);
        assert!(tiler.is_parallel());
    }

    #[test]
    fn test_builder_conflicting_params() {
        let result = Tiler::builder().numbered(3, 3).tile_size(10, 10).build();
        assert!(matches!(
            result,
            Err(TileError::ConflictingTileParams { axis: Axis::Rows })
        ));

        let result = Tiler::builder().build();
        assert!(matches!(result, Err(TileError::MissingTileParams { .. })));
    }

    #[test]
    fn test_builder_lettered_ignores_count() {
        let spec = LetteredGridSpec::new(2, 2, ReferenceArea::Dataset);
        let tiler = Tiler::builder()
            .numbered(3, 3)
            .lettered(spec.clone())
            .build()
            .unwrap();
        assert_eq!(tiler.grid(), &TileGridSpec::Lettered(spec));
    }

    #[test]
    fn test_tile_drops_missing() {
        let data = Array2::from_shape_fn((6, 6), |(r, c)| if r < 2 && c < 2 { 1.0 } else { f32::NAN });
        let raster = Raster::single_band(data, area(), test_metadata()).unwrap();
        let tiler = Tiler::builder().numbered(3, 3).build().unwrap();
        let tiles = tiler.tile(&raster).unwrap();

        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles.stats.candidates, 9);
        assert_eq!(tiles.stats.emitted, 1);
        assert_eq!(tiles.stats.dropped_no_data, 8);
        assert_eq!(tiles.stats.dropped_no_overlap, 0);

        let tile = tiles.iter().next().unwrap();
        assert_eq!(tile.id(), "T001");
        assert_eq!(tile.shape(), (2, 2));
    }

    #[test]
    fn test_tile_empty_result() {
        let data = Array2::from_elem((6, 6), f32::NAN);
        let raster = Raster::single_band(data, area(), test_metadata()).unwrap();
        let tiles = Tiler::new(TileGridSpec::numbered(2, 2))
            .unwrap()
            .tile(&raster)
            .unwrap();
        assert!(tiles.is_empty());
        assert_eq!(tiles.bands.len(), 1);
    }

    #[test]
    fn test_tile_identities_per_band() {
        let data = Array3::from_shape_fn((2, 6, 6), |(b, r, _)| {
            if b == 1 && r < 2 {
                f32::NAN
            } else {
                0.5
            }
        });
        let raster = Raster::new(data, area(), test_metadata())
            .unwrap()
            .with_band_names(["R", "G"])
            .unwrap();
        let tiles = Tiler::builder().numbered(3, 1).build().unwrap().tile(&raster).unwrap();

        let ids = |band: usize| -> Vec<String> {
            tiles.band(band).unwrap().tiles.iter().map(|t| t.id()).collect()
        };
        assert_eq!(ids(0), vec!["T001", "T002", "T003"]);
        assert_eq!(ids(1), vec!["T001", "T002"]);
        // Band 1's T001 is the second row of tiles
        assert_eq!(tiles.band(1).unwrap().tiles[0].position.grid_row, 1);
        assert_eq!(tiles.band(1).unwrap().band_name.as_deref(), Some("G"));
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape(" 2 x 5 "), Some((2, 5)));
        assert_eq!(parse_shape("2x"), None);
        assert_eq!(parse_shape("axb"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    // All environment tests share one function: the variables are process-wide
    #[test]
    fn test_from_env() {
        const VARS: [&str; 4] = [
            "TILEGRID_TILE_COUNT",
            "TILEGRID_TILE_SIZE",
            "TILEGRID_VALIDITY",
            "TILEGRID_PARALLEL",
        ];
        let originals: Vec<Option<String>> = VARS.iter().map(|v| std::env::var(v).ok()).collect();
        for var in VARS {
            std::env::remove_var(var);
        }

        // Defaults
        let builder = TilerBuilder::from_env().unwrap();
        assert_eq!(builder.tile_count, None);
        assert_eq!(builder.validity, ValidityMode::PerBand);
        assert!(builder.parallel);

        // Values
        std::env::set_var("TILEGRID_TILE_COUNT", "3x3");
        std::env::set_var("TILEGRID_VALIDITY", "combined");
        std::env::set_var("TILEGRID_PARALLEL", "false");
        let tiler = TilerBuilder::from_env().unwrap().build().unwrap();
        assert_eq!(tiler.grid(), &TileGridSpec::numbered(3, 3));
        assert_eq!(tiler.validity(), ValidityMode::Combined);
        assert!(!tiler.is_parallel());

        // Both count and size
        std::env::set_var("TILEGRID_TILE_SIZE", "100x100");
        assert!(matches!(
            TilerBuilder::from_env().unwrap().build(),
            Err(TileError::ConflictingTileParams { .. })
        ));

        // Malformed
        std::env::set_var("TILEGRID_TILE_SIZE", "big");
        assert!(matches!(
            TilerBuilder::from_env(),
            Err(TileError::InvalidSetting { ref name, .. }) if name == "TILEGRID_TILE_SIZE"
        ));

        for (var, original) in VARS.iter().zip(originals) {
            match original {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
    }
}
