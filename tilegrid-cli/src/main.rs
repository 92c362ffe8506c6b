use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::plan::PlanFormat;
use commands::tile::TileArgs;
use commands::GridArgs;

/// Cut rasters into numbered or lettered satellite product tiles
#[derive(Parser)]
#[command(name = "tilegrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut a raw f32 raster into tiles and write them to a directory
    Tile {
        /// Raw little-endian f32 raster, band-major
        raster: PathBuf,

        /// Area definition JSON of the raster
        #[arg(long)]
        area: PathBuf,

        /// Source metadata JSON (name, platform_name, sensor, units, times)
        #[arg(long)]
        meta: PathBuf,

        /// Number of bands in the raster
        #[arg(long, default_value = "1")]
        bands: usize,

        /// Comma-separated band names
        #[arg(long, value_delimiter = ',')]
        band_names: Vec<String>,

        /// Sample value marking missing data (NaN is always missing)
        #[arg(long)]
        fill_value: Option<f32>,

        #[command(flatten)]
        grid: GridArgs,

        /// Filename template
        #[arg(long)]
        template: Option<String>,

        /// Sector id written into filenames (defaults to --sector)
        #[arg(long)]
        sector_id: Option<String>,

        /// Source name written into filenames
        #[arg(long, default_value = "SSEC")]
        source_name: String,

        /// Use the observation end time for filenames
        #[arg(long)]
        use_end_time: bool,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Show the tile grid over an area without reading any data
    Plan {
        /// Area definition JSON
        #[arg(long)]
        area: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        /// Output the plan as JSON
        #[arg(long, conflicts_with = "csv")]
        json: bool,

        /// Output one CSV row per candidate tile
        #[arg(long)]
        csv: bool,

        /// Write tile footprints to a GeoJSON file
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// List the sectors of a sector catalog
    Sectors {
        /// Sector catalog JSON file
        #[arg(long, env = "TILEGRID_SECTORS")]
        sectors: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "tilegrid=info",
        1 => "tilegrid=debug",
        _ => "tilegrid=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tile {
            raster,
            area,
            meta,
            bands,
            band_names,
            fill_value,
            grid,
            template,
            sector_id,
            source_name,
            use_end_time,
            output_dir,
        } => commands::tile::run(TileArgs {
            raster,
            area,
            meta,
            bands,
            band_names,
            fill_value,
            grid,
            template,
            sector_id,
            source_name,
            use_end_time,
            output_dir,
        }),
        Commands::Plan {
            area,
            grid,
            json,
            csv,
            geojson,
        } => {
            let format = if json {
                PlanFormat::Json
            } else if csv {
                PlanFormat::Csv
            } else {
                PlanFormat::Table
            };
            commands::plan::run(area, grid, format, geojson)
        }
        Commands::Sectors { sectors } => commands::sectors::run(sectors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lettered_plan() {
        let cli = Cli::try_parse_from([
            "tilegrid", "plan", "--area", "a.json", "--lettered", "--own-area", "--letters",
            "4x4", "--subtiles", "2x2", "--csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan { grid, csv, json, .. } => {
                assert!(grid.lettered && grid.own_area);
                assert_eq!(grid.letters, Some((4, 4)));
                assert_eq!(grid.subtiles, Some((2, 2)));
                assert!(csv && !json);
            }
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn test_tile_count_conflicts_with_size() {
        let result = Cli::try_parse_from([
            "tilegrid", "plan", "--area", "a.json", "--tile-count", "3x3", "--tile-size", "10x10",
        ]);
        assert!(result.is_err());
    }
}
