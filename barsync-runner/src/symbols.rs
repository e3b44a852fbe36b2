//! Symbol list loader.
//!
//! The list is a CSV with a header row. Only two columns are read: the
//! ticker and the company name used for the archive directory. Header names
//! and cells are trimmed; the exchange's published list pads both.

use crate::config::ConfigError;
use barsync_core::domain::Instrument;
use std::path::Path;
use tracing::{debug, warn};

/// Load instruments from `path`, in file order.
///
/// Rows with an empty symbol, or a symbol that is not a single plain path
/// component, are skipped. A missing file or missing column is a
/// configuration error.
pub fn load_symbol_list(
    path: &Path,
    symbol_column: &str,
    name_column: &str,
) -> Result<Vec<Instrument>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingSymbolList(path.to_path_buf()));
    }
    let list_error = |reason: String| ConfigError::SymbolList {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| list_error(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| list_error(e.to_string()))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name.trim())
            .ok_or_else(|| ConfigError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let symbol_idx = column(symbol_column)?;
    let name_idx = column(name_column)?;

    let mut instruments = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| list_error(format!("row {}: {e}", row + 1)))?;
        let symbol = record.get(symbol_idx).unwrap_or("");
        if symbol.is_empty() {
            warn!(row = row + 1, "skipping symbol list row without a symbol");
            continue;
        }
        if !is_plain_symbol(symbol) {
            warn!(row = row + 1, symbol, "skipping symbol that is not a plain file name");
            continue;
        }
        let name = record.get(name_idx).unwrap_or("");
        instruments.push(Instrument::new(symbol, name));
    }

    debug!(path = %path.display(), count = instruments.len(), "symbol list loaded");
    Ok(instruments)
}

/// Symbols name archive files, so they must not contain path separators or
/// parent-directory references.
fn is_plain_symbol(symbol: &str) -> bool {
    !symbol.contains(['/', '\\'])
        && !symbol.contains("..")
        && symbol != "."
        && !symbol.chars().any(char::is_control)
}
