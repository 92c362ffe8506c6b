use anyhow::Result;
use std::path::PathBuf;

use super::load_catalog;

pub fn run(sectors: Option<PathBuf>) -> Result<()> {
    let catalog = load_catalog(sectors.as_deref())?;

    if catalog.is_empty() {
        println!("No sectors defined");
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:>10} {:>10} {:>14}",
        "SECTOR", "PIXELS", "LETTERS", "SUBTILES", "CELL SIZE"
    );
    println!("{}", "-".repeat(62));

    for (id, sector) in catalog.iter() {
        let cell_size = sector
            .cell_size
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:>12} {:>10} {:>10} {:>14}",
            id,
            format!("{}x{}", sector.area.rows, sector.area.cols),
            format!("{}x{}", sector.letter_rows, sector.letter_cols),
            format!("{}x{}", sector.subtile_rows, sector.subtile_cols),
            cell_size
        );
    }

    println!("{}", "-".repeat(62));
    println!("Total: {} sectors", catalog.len());
    Ok(())
}
