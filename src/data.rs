use crate::models::{SimulationResult, TradeCandidate};
use crate::valuation::{PricePoint, PriceTable};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Load a candidate list produced by the recommendation/outcome extraction
/// pipeline: a JSON array of camelCase candidate objects, pre-filtered to
/// one expert.
pub fn load_candidates(path: &Path) -> Result<Vec<TradeCandidate>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open candidate file {}", path.display()))?;
    let candidates: Vec<TradeCandidate> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse candidate file {}", path.display()))?;
    Ok(candidates)
}

/// Load a price table: a JSON object mapping symbol to an array of
/// `{date, close}` points. Order in the file does not matter; the table
/// sorts each series.
pub fn load_price_table(path: &Path) -> Result<PriceTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open price file {}", path.display()))?;
    let raw: HashMap<String, Vec<PricePoint>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse price file {}", path.display()))?;
    Ok(PriceTable::from_series(raw))
}

pub fn write_result(path: &Path, result: &SimulationResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create result file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("Failed to write result file {}", path.display()))?;
    Ok(())
}
