use std::path::Path;

use tracing::warn;

use crate::engine::ChurnModel;
use crate::error::{Error, Result};
use crate::models::{round1, BatchSummary, RiskTier, ScoredRecord};
use crate::resolver::{self, RawRecord};

/// Everything one batch run produces before persistence.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<ScoredRecord>,
    pub summary: BatchSummary,
}

/// Read a tabular file into (row number, raw record) pairs.
///
/// Rows are numbered from 1 in file order. Short rows are allowed (missing
/// cells resolve to defaults); a row the CSV reader cannot decode at all is
/// logged and dropped. A missing file, missing header, or zero data rows
/// rejects the submission before any scoring starts.
pub fn read_csv(path: &Path) -> Result<Vec<(usize, RawRecord)>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| Error::Input(format!("cannot read {}: {err}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| Error::Input(format!("unparseable header row: {err}")))?
        .iter()
        .map(resolver::normalize_key)
        .collect();
    if headers.is_empty() {
        return Err(Error::Input("file has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping row {row}: {err}");
                continue;
            }
        };
        let raw: RawRecord = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push((row, raw));
    }

    if rows.is_empty() {
        return Err(Error::Input(format!(
            "{} contains no data rows",
            path.display()
        )));
    }
    Ok(rows)
}

/// Run every row through the resolver and the scoring engine.
///
/// A row that fails to resolve is logged and skipped entirely; it shows up in
/// neither the results nor the counts, so `summary.total` reflects processed
/// rows only. A batch where every row fails is rejected as an input error.
pub fn score_rows<I>(rows: I, model: &dyn ChurnModel) -> Result<BatchOutcome>
where
    I: IntoIterator<Item = (usize, RawRecord)>,
{
    let mut results = Vec::new();
    let (mut high, mut medium, mut low) = (0usize, 0usize, 0usize);

    for (row, raw) in rows {
        let profile = match resolver::resolve(row, &raw) {
            Ok(profile) => profile,
            Err(err) => {
                warn!("skipping record: {err}");
                continue;
            }
        };

        let score = model.score(&profile);
        let probability_pct = round1(score.probability * 100.0);
        let risk_tier = RiskTier::from_percent(probability_pct);
        match risk_tier {
            RiskTier::High => high += 1,
            RiskTier::Medium => medium += 1,
            RiskTier::Low => low += 1,
        }

        results.push(ScoredRecord {
            profile,
            will_churn: score.will_churn,
            probability_pct,
            risk_tier,
        });
    }

    if results.is_empty() {
        return Err(Error::Input("no rows could be processed".to_string()));
    }

    let summary = BatchSummary::from_counts(results.len(), high, medium, low);
    Ok(BatchOutcome { results, summary })
}

pub fn score_file(path: &Path, model: &dyn ChurnModel) -> Result<BatchOutcome> {
    score_rows(read_csv(path)?, model)
}
