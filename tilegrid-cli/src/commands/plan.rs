use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tilegrid::identity::assign_identities;
use tilegrid::TilePlan;

use super::{load_area, GridArgs};

/// How `plan` prints the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Table,
    Json,
    Csv,
}

/// One CSV row per candidate tile.
#[derive(Debug, Serialize)]
struct PlanRow {
    index: usize,
    grid_row: usize,
    grid_col: usize,
    tile_id: Option<String>,
    letter: Option<String>,
    row_offset: usize,
    col_offset: usize,
    height: usize,
    width: usize,
    source_row: usize,
    source_col: usize,
    source_height: usize,
    source_width: usize,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

pub fn run(area: PathBuf, grid: GridArgs, format: PlanFormat, geojson: Option<PathBuf>) -> Result<()> {
    let area = load_area(&area)?;
    let tiler = grid.builder()?.build().context("Invalid grid configuration")?;
    let plan = tiler.plan(&area).context("Failed to plan tile grid")?;

    match format {
        PlanFormat::Table => print_table(&plan),
        PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        PlanFormat::Csv => {
            let stdout = std::io::stdout();
            write_csv(&plan, stdout.lock())?;
        }
    }

    if let Some(path) = geojson {
        write_geojson(&plan, &path)?;
        eprintln!("Footprints written to: {}", path.display());
    }
    Ok(())
}

/// Candidate rows, with the ids they'd get if every overlapping tile had data.
fn rows(plan: &TilePlan) -> Vec<PlanRow> {
    let keep: Vec<bool> = plan.candidates.iter().map(|c| c.overlaps()).collect();
    let ids = assign_identities(&plan.candidates, &keep);

    plan.candidates
        .iter()
        .zip(ids)
        .map(|(c, id)| PlanRow {
            index: c.index,
            grid_row: c.grid_row,
            grid_col: c.grid_col,
            tile_id: id.map(|id| id.to_string()),
            letter: c.letter.as_ref().map(|l| l.code.clone()),
            row_offset: c.rows.offset,
            col_offset: c.cols.offset,
            height: c.rows.length,
            width: c.cols.length,
            source_row: c.window.row_offset,
            source_col: c.window.col_offset,
            source_height: c.window.height,
            source_width: c.window.width,
            xmin: c.bounds.xmin,
            ymin: c.bounds.ymin,
            xmax: c.bounds.xmax,
            ymax: c.bounds.ymax,
        })
        .collect()
}

fn print_table(plan: &TilePlan) {
    let mosaic = &plan.mosaic;
    println!(
        "Grid: {}x{} tiles of {}x{} px, mosaic {}x{} px",
        mosaic.grid_shape.0,
        mosaic.grid_shape.1,
        mosaic.tile_shape.0,
        mosaic.tile_shape.1,
        mosaic.pixel_shape.0,
        mosaic.pixel_shape.1
    );
    println!();
    println!(
        "{:>6} {:>8} {:>8} {:>12} {:>12} {:>24}",
        "INDEX", "TILE", "LETTER", "MOSAIC", "SIZE", "SOURCE WINDOW"
    );
    println!("{}", "-".repeat(75));

    let rows = rows(plan);
    for row in &rows {
        let window = if row.source_height == 0 {
            "-".to_string()
        } else {
            format!(
                "{},{} {}x{}",
                row.source_row, row.source_col, row.source_height, row.source_width
            )
        };
        println!(
            "{:>6} {:>8} {:>8} {:>12} {:>12} {:>24}",
            row.index,
            row.tile_id.as_deref().unwrap_or("-"),
            row.letter.as_deref().unwrap_or("-"),
            format!("{},{}", row.row_offset, row.col_offset),
            format!("{}x{}", row.height, row.width),
            window
        );
    }

    let overlapping = rows.iter().filter(|r| r.tile_id.is_some()).count();
    println!("{}", "-".repeat(75));
    println!("Total: {} candidates, {} overlapping", rows.len(), overlapping);
}

fn write_csv<W: Write>(plan: &TilePlan, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows(plan) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_geojson(plan: &TilePlan, path: &Path) -> Result<()> {
    let collection: geojson::FeatureCollection = tilegrid::footprint::footprints(plan);
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilegrid::{AreaDefinition, Extent, Tiler};

    fn plan() -> TilePlan {
        let area = AreaDefinition::new(
            "test",
            "+proj=lcc",
            200,
            100,
            Extent::new(-1000.0, -1500.0, 1000.0, 1500.0),
        )
        .unwrap();
        let tiler = Tiler::builder().numbered(3, 3).build().unwrap();
        tiler.plan(&area).unwrap()
    }

    #[test]
    fn test_rows_numbered() {
        let rows = rows(&plan());
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0].tile_id.as_deref(), Some("T001"));
        assert_eq!(rows[8].tile_id.as_deref(), Some("T009"));
        assert_eq!((rows[0].height, rows[0].width), (67, 34));
        assert_eq!((rows[8].height, rows[8].width), (66, 33));
        assert!(rows.iter().all(|r| r.letter.is_none()));
    }

    #[test]
    fn test_csv_output() {
        let mut out = Vec::new();
        write_csv(&plan(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("index,grid_row,grid_col,tile_id,letter"));
        assert_eq!(lines.count(), 9);
    }

    #[test]
    fn test_geojson_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plan.geojson");
        write_geojson(&plan(), &path).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let collection: geojson::FeatureCollection =
            json.parse::<geojson::GeoJson>().unwrap().try_into().unwrap();
        assert_eq!(collection.features.len(), 9);
    }
}
