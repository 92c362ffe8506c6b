//! Deciding which candidate tiles are emitted.
//!
//! A candidate is dropped, silently, when its source window is empty or
//! when every sample it covers is missing. With [`ValidityMode::PerBand`]
//! each band is judged on its own samples; with [`ValidityMode::Combined`]
//! a tile survives in every band as soon as one band has valid data.

use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::mapper::CandidateTile;
use crate::raster::{MissingValue, RasterSource};

/// How multi-band rasters are checked for valid data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidityMode {
    /// Each band keeps or drops tiles independently.
    #[default]
    PerBand,
    /// A tile is kept in all bands if any band has valid data.
    Combined,
}

impl std::str::FromStr for ValidityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-band" | "per_band" | "perband" => Ok(ValidityMode::PerBand),
            "combined" => Ok(ValidityMode::Combined),
            other => Err(format!(
                "unknown validity mode '{}' (expected per-band or combined)",
                other
            )),
        }
    }
}

/// Outcome of checking one candidate in one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Emit the tile.
    Keep,
    /// The tile doesn't overlap the source.
    NoOverlap,
    /// Every covered sample is missing.
    NoValidData,
}

impl Verdict {
    /// Check if the tile is emitted.
    pub fn is_kept(&self) -> bool {
        matches!(self, Verdict::Keep)
    }
}

/// Check if any sample in `data` is valid.
pub fn has_valid_data(data: ArrayView2<'_, f32>, missing: MissingValue) -> bool {
    data.iter().any(|&v| !missing.is_missing(v))
}

/// Check one candidate in every band of `source`.
pub fn check_candidate<S>(source: &S, candidate: &CandidateTile, mode: ValidityMode) -> Vec<Verdict>
where
    S: RasterSource + ?Sized,
{
    let bands = source.band_count();
    if !candidate.overlaps() {
        return vec![Verdict::NoOverlap; bands];
    }

    let missing = source.missing_value();
    let mut verdicts: Vec<Verdict> = (0..bands)
        .map(|band| {
            if has_valid_data(source.window(band, &candidate.window), missing) {
                Verdict::Keep
            } else {
                Verdict::NoValidData
            }
        })
        .collect();

    if mode == ValidityMode::Combined && verdicts.iter().any(Verdict::is_kept) {
        verdicts.fill(Verdict::Keep);
    }
    verdicts
}

/// Check every candidate, returning verdicts indexed `[band][candidate]`.
///
/// With `parallel` set, candidates are checked on the rayon thread pool.
/// Results are always collected in candidate order.
pub fn check_candidates<S>(
    source: &S,
    candidates: &[CandidateTile],
    mode: ValidityMode,
    parallel: bool,
) -> Vec<Vec<Verdict>>
where
    S: RasterSource + ?Sized,
{
    let per_candidate: Vec<Vec<Verdict>> = if parallel {
        candidates
            .par_iter()
            .map(|c| check_candidate(source, c, mode))
            .collect()
    } else {
        candidates
            .iter()
            .map(|c| check_candidate(source, c, mode))
            .collect()
    };

    (0..source.band_count())
        .map(|band| per_candidate.iter().map(|v| v[band]).collect())
        .collect()
}
