use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tilegrid::source::write_samples;
use tilegrid::{
    dispatch_tiles, DispatchOptions, FilenameTemplate, MissingValue, RasterSource, RawRasterFile,
    SourceMetadata, TileRecord, TileSink,
};
use tracing::info;

use super::{load_area, GridArgs};

/// Writes each tile as `<stem>.bin` (LE f32 samples) plus `<stem>.json` attributes.
struct DirectorySink {
    dir: PathBuf,
    progress: ProgressBar,
}

impl DirectorySink {
    fn paths(&self, filename: &str) -> (PathBuf, PathBuf) {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        (
            self.dir.join(format!("{}.bin", stem)),
            self.dir.join(format!("{}.json", stem)),
        )
    }
}

impl TileSink for DirectorySink {
    fn write_tile(&mut self, record: &TileRecord<'_, '_>) -> tilegrid::Result<()> {
        let (data_path, meta_path) = self.paths(&record.filename);

        let mut writer = BufWriter::new(File::create(&data_path)?);
        write_samples(&mut writer, record.tile.data().iter())?;
        writer.flush()?;

        let mut writer = BufWriter::new(File::create(&meta_path)?);
        serde_json::to_writer_pretty(&mut writer, &record.attributes)
            .map_err(std::io::Error::from)?;
        writer.flush()?;

        self.progress.inc(1);
        Ok(())
    }
}

pub struct TileArgs {
    pub raster: PathBuf,
    pub area: PathBuf,
    pub meta: PathBuf,
    pub bands: usize,
    pub band_names: Vec<String>,
    pub fill_value: Option<f32>,
    pub grid: GridArgs,
    pub template: Option<String>,
    pub sector_id: Option<String>,
    pub source_name: String,
    pub use_end_time: bool,
    pub output_dir: PathBuf,
}

pub fn run(args: TileArgs) -> Result<()> {
    let template = match &args.template {
        Some(t) => FilenameTemplate::parse(t).context("Invalid filename template")?,
        None => FilenameTemplate::default(),
    };
    template
        .check_keys()
        .context("Filename template references an unknown key")?;

    let tiler = args.grid.builder()?.build().context("Invalid grid configuration")?;

    let sector_id = match (&args.sector_id, &args.grid.sector) {
        (Some(id), _) | (None, Some(id)) => id.clone(),
        (None, None) => bail!("No sector id given. Use --sector-id or --sector"),
    };
    let options = DispatchOptions::new(sector_id, args.source_name.clone())
        .template(template)
        .use_end_time(args.use_end_time);

    let area = load_area(&args.area)?;
    let metadata = load_metadata(&args.meta)?;
    let (rows, cols) = area.shape();

    let mut raster = RawRasterFile::open(&args.raster, args.bands, rows, cols)
        .with_context(|| format!("Failed to open raster: {}", args.raster.display()))?
        .into_raster(area, metadata)
        .context("Raster doesn't match its area definition")?;
    if let Some(fill) = args.fill_value {
        raster = raster.with_missing_value(MissingValue::Fill(fill));
    }
    if !args.band_names.is_empty() {
        raster = raster
            .with_band_names(args.band_names.iter().cloned())
            .context("Band names don't match --bands")?;
    }

    let tiles = tiler.tile(&raster).context("Failed to tile raster")?;

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            args.output_dir.display()
        )
    })?;

    let pb = ProgressBar::new(tiles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut sink = DirectorySink {
        dir: args.output_dir.clone(),
        progress: pb,
    };
    let summary = dispatch_tiles(&tiles, raster.metadata(), &options, &mut sink)
        .context("Failed to write tiles")?;
    sink.progress.finish_with_message("done");

    let scheduled = if args.use_end_time {
        raster.metadata().end_time
    } else {
        raster.metadata().start_time
    };
    info!(
        tiles = summary.tiles_written,
        dropped_no_overlap = tiles.stats.dropped_no_overlap,
        dropped_no_data = tiles.stats.dropped_no_data,
        "Tiling complete"
    );
    println!(
        "{} tiles for {} ({}) written to: {}",
        summary.tiles_written,
        raster.metadata().name,
        scheduled.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        args.output_dir.display()
    );
    Ok(())
}

fn load_metadata(path: &Path) -> Result<SourceMetadata> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata file: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid source metadata: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        let area = dir.join("area.json");
        std::fs::write(
            &area,
            r#"{"name": "test", "projection": "+proj=lcc", "rows": 20, "cols": 10,
                "extent": {"xmin": -1000, "ymin": -1500, "xmax": 1000, "ymax": 1500}}"#,
        )
        .unwrap();

        let meta = dir.join("meta.json");
        std::fs::write(
            &meta,
            r#"{"name": "test_ds", "platform_name": "PLAT", "sensor": "SENSOR", "units": "1",
                "start_time": "2018-01-01T12:00:00Z", "end_time": "2018-01-01T12:20:00Z"}"#,
        )
        .unwrap();

        let raster = dir.join("raster.bin");
        let samples: Vec<f32> = (0..200).map(|i| i as f32).collect();
        let mut writer = BufWriter::new(File::create(&raster).unwrap());
        write_samples(&mut writer, samples.iter()).unwrap();
        writer.flush().unwrap();

        (raster, area, meta)
    }

    #[test]
    fn test_tile_numbered() {
        let tmp = TempDir::new().unwrap();
        let (raster, area, meta) = write_inputs(tmp.path());
        let output_dir = tmp.path().join("out");

        run(TileArgs {
            raster,
            area,
            meta,
            bands: 1,
            band_names: Vec::new(),
            fill_value: None,
            grid: GridArgs {
                tile_count: Some((2, 2)),
                ..Default::default()
            },
            template: None,
            sector_id: Some("TEST".to_string()),
            source_name: "TESTS".to_string(),
            use_end_time: false,
            output_dir: output_dir.clone(),
        })
        .unwrap();

        let first = output_dir.join("TESTS_AII_PLAT_SENSOR_test_ds_TEST_T001_20180101_1200.bin");
        assert_eq!(std::fs::metadata(&first).unwrap().len(), 10 * 5 * 4);

        let sidecar = std::fs::read_to_string(first.with_extension("json")).unwrap();
        let attrs: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(attrs["tile_id"], "T001");
        assert_eq!(attrs["number_product_tiles"], 4);

        let count = std::fs::read_dir(&output_dir).unwrap().count();
        assert_eq!(count, 8);
    }

    #[test]
    fn test_tile_requires_sector_id() {
        let tmp = TempDir::new().unwrap();
        let (raster, area, meta) = write_inputs(tmp.path());

        let result = run(TileArgs {
            raster,
            area,
            meta,
            bands: 1,
            band_names: Vec::new(),
            fill_value: None,
            grid: GridArgs {
                tile_count: Some((2, 2)),
                ..Default::default()
            },
            template: None,
            sector_id: None,
            source_name: "TESTS".to_string(),
            use_end_time: false,
            output_dir: tmp.path().join("out"),
        });
        assert!(result.is_err());
    }
}
