//! Loading and cleaning complaint records from CSV.

use std::path::Path;

use tracing::{debug, error, info};

use crate::document::ComplaintRecord;
use crate::error::{RagError, Result};

/// Options for [`clean_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningOptions {
    /// Lower-case narratives.
    pub lowercase: bool,
    /// Keep only these products (case-insensitive). Empty keeps everything.
    pub products: Vec<String>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self { lowercase: true, products: Vec::new() }
    }
}

/// Load complaint records from a CSV file.
///
/// The file must have `Complaint ID`, `Product` and `Consumer complaint
/// narrative` columns; any other columns are ignored. Missing narratives load
/// as empty strings and are removed by [`clean_records`].
///
/// # Errors
///
/// Returns [`RagError::Load`] if the file cannot be opened, a required column
/// is missing, or a row cannot be parsed.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<ComplaintRecord>> {
    let path = path.as_ref();
    let load_error = |message: String| RagError::Load { path: path.to_path_buf(), message };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to open dataset");
        load_error(e.to_string())
    })?;

    let mut records = Vec::new();
    for (row, result) in reader.deserialize::<ComplaintRecord>().enumerate() {
        let record = result.map_err(|e| {
            error!(path = %path.display(), row = row + 1, error = %e, "failed to parse row");
            load_error(format!("row {}: {e}", row + 1))
        })?;
        records.push(record);
    }

    info!(path = %path.display(), records = records.len(), "records loaded");
    Ok(records)
}

/// Drop unusable narratives and normalise the rest.
///
/// Narratives that are empty after trimming, or the literal `nan` written
/// for missing values, are removed. Surviving narratives are lower-cased when
/// [`CleaningOptions::lowercase`] is set, and records are filtered to the
/// configured products.
pub fn clean_records(
    records: Vec<ComplaintRecord>,
    options: &CleaningOptions,
) -> Vec<ComplaintRecord> {
    let before = records.len();
    let allowed: Vec<String> = options.products.iter().map(|p| p.trim().to_lowercase()).collect();

    let cleaned: Vec<ComplaintRecord> = records
        .into_iter()
        .filter(|r| {
            let narrative = r.narrative.trim();
            !narrative.is_empty() && !narrative.eq_ignore_ascii_case("nan")
        })
        .filter(|r| allowed.is_empty() || allowed.contains(&r.product.trim().to_lowercase()))
        .map(|mut r| {
            if options.lowercase {
                r.narrative = r.narrative.to_lowercase();
            }
            r
        })
        .collect();

    debug!(before, after = cleaned.len(), "records cleaned");
    cleaned
}
