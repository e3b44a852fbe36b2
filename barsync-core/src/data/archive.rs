//! CSV archive store, one table per (instrument, interval).
//!
//! Layout: `{root}/{sanitized company name}/{SYMBOL}_{interval}.csv`
//!
//! Features:
//! - Atomic writes (write to .tmp, fsync, rename into place)
//! - Unreadable archives are reported and treated as absent
//! - Reconciliation of stored and fetched bars (dedup, zone normalization, ordering)
//! - Pandas-compatible text layout: timestamp first, then Open/High/Low/Close/Volume

use crate::domain::{Bar, BarTimestamp, Instrument, Interval};
use chrono::{FixedOffset, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const HEADER: [&str; 6] = ["Datetime", "Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt archive {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        ArchiveError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Bar history for one (instrument, interval): ascending, unique timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolArchive {
    bars: Vec<Bar>,
}

impl SymbolArchive {
    /// Build an archive from arbitrary bars, applying the reconciliation rules.
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        reconcile(None, bars)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<BarTimestamp> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<BarTimestamp> {
        self.bars.last().map(|b| b.timestamp)
    }
}

/// Merge freshly fetched bars into an existing archive.
///
/// - Naive timestamps are localized to the aware side's zone: the offset of
///   the latest aware incoming bar, else of the latest aware existing bar.
///   Aware timestamps are never converted.
/// - On equal timestamps the incoming bar wins; within one side the later row wins.
/// - The result is sorted ascending with no duplicate timestamps.
pub fn reconcile(existing: Option<SymbolArchive>, incoming: Vec<Bar>) -> SymbolArchive {
    let existing = existing.map(SymbolArchive::into_bars).unwrap_or_default();
    let zone = latest_offset(&incoming).or_else(|| latest_offset(&existing));

    let mut merged: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
    for mut bar in existing.into_iter().chain(incoming) {
        if let Some(offset) = zone {
            bar.timestamp = bar.timestamp.localize(offset);
        }
        merged.insert(bar.timestamp.sort_key(), bar);
    }

    SymbolArchive {
        bars: merged.into_values().collect(),
    }
}

fn latest_offset(bars: &[Bar]) -> Option<FixedOffset> {
    bars.iter()
        .filter(|b| b.timestamp.is_aware())
        .max_by_key(|b| b.timestamp.sort_key())
        .and_then(|b| b.timestamp.offset())
}

/// Strip characters that are illegal in file names on common platforms.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Directory name holding an instrument's archives: the sanitized company
/// name, or the sanitized symbol when the name sanitizes to nothing or to a
/// dot-only component such as `..`.
pub fn archive_dir_name(instrument: &Instrument) -> String {
    let clean = sanitize_component(&instrument.company_name);
    if clean.chars().all(|c| c == '.') {
        sanitize_component(&instrument.symbol)
    } else {
        clean
    }
}

/// Health of one stored archive, for status reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveHealth {
    Ok {
        rows: usize,
        first: BarTimestamp,
        last: BarTimestamp,
    },
    Empty,
    Corrupt(String),
}

/// One archive file found under the store root.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub company_dir: String,
    pub symbol: String,
    pub interval: Interval,
    pub path: PathBuf,
    pub health: ArchiveHealth,
}

/// The archive store. Sole owner of the on-disk representation.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for an instrument: `{root}/{archive_dir_name}/`.
    pub fn company_dir(&self, instrument: &Instrument) -> PathBuf {
        self.root.join(archive_dir_name(instrument))
    }

    /// Path to the archive file: `{company dir}/{SYMBOL}_{interval}.csv`.
    pub fn archive_path(&self, instrument: &Instrument, interval: Interval) -> PathBuf {
        self.company_dir(instrument)
            .join(format!("{}_{}.csv", instrument.symbol, interval.code()))
    }

    /// Load an archive, distinguishing "absent" from "unreadable".
    ///
    /// `Ok(None)` for a missing file or a file with a header and no rows.
    pub fn load_checked(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<Option<SymbolArchive>, ArchiveError> {
        let path = self.archive_path(instrument, interval);
        if !path.exists() {
            return Ok(None);
        }
        let archive = read_archive(&path)?;
        if archive.is_none() {
            debug!(path = %path.display(), "archive has no rows");
        }
        Ok(archive)
    }

    /// Load an archive. Unreadable files are reported and treated as absent.
    ///
    /// This is a silent full reset: the next save replaces the damaged file.
    pub fn load(&self, instrument: &Instrument, interval: Interval) -> Option<SymbolArchive> {
        match self.load_checked(instrument, interval) {
            Ok(archive) => archive,
            Err(e) => {
                warn!(error = %e, "discarding unreadable archive");
                None
            }
        }
    }

    /// Overwrite the archive for an instrument and interval.
    ///
    /// Writes are atomic: write to .tmp, fsync, then rename over the target.
    /// A failed write leaves the previous file untouched.
    pub fn save(
        &self,
        instrument: &Instrument,
        interval: Interval,
        archive: &SymbolArchive,
    ) -> Result<(), ArchiveError> {
        let dir = self.company_dir(instrument);
        fs::create_dir_all(&dir).map_err(|e| ArchiveError::io(&dir, e))?;

        let path = self.archive_path(instrument, interval);
        let tmp_path = path.with_extension("csv.tmp");

        if let Err(e) = write_archive(&tmp_path, archive) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            ArchiveError::io(&path, e)
        })?;

        debug!(path = %path.display(), rows = archive.len(), "archive saved");
        Ok(())
    }

    /// Enumerate every archive under the root, sorted by directory, symbol, interval.
    pub fn list(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut entries = Vec::new();
        if !self.root.exists() {
            return Ok(entries);
        }

        let dirs = fs::read_dir(&self.root).map_err(|e| ArchiveError::io(&self.root, e))?;
        for dir in dirs {
            let dir = dir.map_err(|e| ArchiveError::io(&self.root, e))?;
            if !dir.path().is_dir() {
                continue;
            }
            let company_dir = dir.file_name().to_string_lossy().to_string();

            let files = fs::read_dir(dir.path()).map_err(|e| ArchiveError::io(&dir.path(), e))?;
            for file in files {
                let path = file.map_err(|e| ArchiveError::io(&dir.path(), e))?.path();
                let Some((symbol, interval)) = parse_archive_name(&path) else {
                    continue;
                };
                let health = match read_archive(&path) {
                    Ok(Some(a)) => match (a.first_timestamp(), a.last_timestamp()) {
                        (Some(first), Some(last)) => ArchiveHealth::Ok {
                            rows: a.len(),
                            first,
                            last,
                        },
                        _ => ArchiveHealth::Empty,
                    },
                    Ok(None) => ArchiveHealth::Empty,
                    Err(e) => ArchiveHealth::Corrupt(e.to_string()),
                };
                entries.push(ArchiveEntry {
                    company_dir: company_dir.clone(),
                    symbol,
                    interval,
                    path,
                    health,
                });
            }
        }

        entries.sort_by(|a, b| {
            (&a.company_dir, &a.symbol, a.interval).cmp(&(&b.company_dir, &b.symbol, b.interval))
        });
        Ok(entries)
    }
}

/// Split `{SYMBOL}_{interval}.csv` into its parts. Symbols may contain underscores.
fn parse_archive_name(path: &Path) -> Option<(String, Interval)> {
    if path.extension().and_then(|e| e.to_str()) != Some("csv") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (symbol, code) = stem.rsplit_once('_')?;
    let interval = code.parse().ok()?;
    Some((symbol.to_string(), interval))
}

// ── CSV I/O helpers ─────────────────────────────────────────────────

/// Column positions of the bar fields. When a header repeats, the last one wins.
#[derive(Debug, Default)]
struct ColumnMap {
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = ColumnMap::default();
        // Column 0 is the timestamp whatever its header says.
        for (idx, name) in headers.iter().enumerate().skip(1) {
            match name.trim().to_ascii_lowercase().as_str() {
                "open" => map.open = Some(idx),
                "high" => map.high = Some(idx),
                "low" => map.low = Some(idx),
                "close" => map.close = Some(idx),
                "volume" => map.volume = Some(idx),
                _ => {}
            }
        }
        map
    }
}

/// Read and validate an archive file. `Ok(None)` when it holds no rows.
fn read_archive(path: &Path) -> Result<Option<SymbolArchive>, ArchiveError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ArchiveError::corrupt(path, format!("open: {e}")))?;

    let headers = reader
        .headers()
        .map_err(|e| ArchiveError::corrupt(path, format!("header: {e}")))?
        .clone();
    if headers.is_empty() {
        return Err(ArchiveError::corrupt(path, "missing header"));
    }

    let columns = ColumnMap::from_headers(&headers);
    let require = |idx: Option<usize>, name: &str| {
        idx.ok_or_else(|| ArchiveError::corrupt(path, format!("missing column '{name}'")))
    };
    let open = require(columns.open, "Open")?;
    let high = require(columns.high, "High")?;
    let low = require(columns.low, "Low")?;
    let close = require(columns.close, "Close")?;
    let volume = require(columns.volume, "Volume")?;

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| ArchiveError::corrupt(path, format!("row {}: {e}", row + 1)))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let timestamp = BarTimestamp::parse(cell(0)).ok_or_else(|| {
            ArchiveError::corrupt(path, format!("row {}: bad timestamp '{}'", row + 1, cell(0)))
        })?;
        let price = |idx: usize, name: &str| {
            parse_price(cell(idx)).ok_or_else(|| {
                ArchiveError::corrupt(path, format!("row {}: bad {name} '{}'", row + 1, cell(idx)))
            })
        };

        bars.push(Bar {
            timestamp,
            open: price(open, "Open")?,
            high: price(high, "High")?,
            low: price(low, "Low")?,
            close: price(close, "Close")?,
            volume: parse_volume(cell(volume)).ok_or_else(|| {
                ArchiveError::corrupt(path, format!("row {}: bad Volume '{}'", row + 1, cell(volume)))
            })?,
        });
    }

    if bars.is_empty() {
        return Ok(None);
    }
    Ok(Some(SymbolArchive::from_bars(bars)))
}

/// Empty cells are missing prices.
fn parse_price(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

/// Accepts integer volumes and float-formatted ones (`1200.0`).
fn parse_volume(s: &str) -> Option<u64> {
    if s.is_empty() {
        return Some(0);
    }
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => Some(0),
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v.round() as u64),
        _ => None,
    }
}

fn format_price(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn write_archive(path: &Path, archive: &SymbolArchive) -> Result<(), ArchiveError> {
    let file = fs::File::create(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let csv_err = |e: csv::Error| ArchiveError::io(path, io::Error::other(e));

    writer.write_record(HEADER).map_err(csv_err)?;
    for bar in archive.bars() {
        writer
            .write_record([
                bar.timestamp.to_string(),
                format_price(bar.open),
                format_price(bar.high),
                format_price(bar.low),
                format_price(bar.close),
                bar.volume.to_string(),
            ])
            .map_err(csv_err)?;
    }

    let mut buffered = writer
        .into_inner()
        .map_err(|e| ArchiveError::io(path, e.into_error()))?;
    buffered.flush().map_err(|e| ArchiveError::io(path, e))?;
    let file = buffered
        .into_inner()
        .map_err(|e| ArchiveError::io(path, e.into_error()))?;
    file.sync_all().map_err(|e| ArchiveError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> BarTimestamp {
        BarTimestamp::parse(s).unwrap()
    }

    fn bar(at: &str, close: f64) -> Bar {
        Bar {
            timestamp: ts(at),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000,
        }
    }

    fn instrument() -> Instrument {
        Instrument::new("TCS", "Tata Consultancy Services Limited")
    }

    fn write_raw(store: &ArchiveStore, interval: Interval, content: &str) -> PathBuf {
        let path = store.archive_path(&instrument(), interval);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize_component("A/B: \"C\" <D>|E?*"), "AB C DE");
        assert_eq!(sanitize_component("  Infosys Limited  "), "Infosys Limited");
        assert_eq!(sanitize_component("???"), "");
    }

    #[test]
    fn path_layout_groups_by_company() {
        let store = ArchiveStore::new("/data");
        let inst = Instrument::new("M&M", "Mahindra & Mahindra Ltd.");
        assert_eq!(
            store.archive_path(&inst, Interval::Week1),
            PathBuf::from("/data/Mahindra & Mahindra Ltd./M&M_1wk.csv")
        );

        let nameless = Instrument::new("XYZ", "<>");
        assert_eq!(
            store.archive_path(&nameless, Interval::Day1),
            PathBuf::from("/data/XYZ/XYZ_1d.csv")
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let archive = SymbolArchive::from_bars(vec![
            bar("2024-01-02 09:15:00+05:30", 101.25),
            bar("2024-01-02 09:20:00+05:30", 102.5),
        ]);

        store.save(&instrument(), Interval::Minute5, &archive).unwrap();
        let loaded = store.load(&instrument(), Interval::Minute5).unwrap();

        assert_eq!(loaded, archive);
        assert!(!store
            .archive_path(&instrument(), Interval::Minute5)
            .with_extension("csv.tmp")
            .exists());
    }

    #[test]
    fn missing_prices_survive_roundtrip_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let mut b = bar("2024-01-02", 100.0);
        b.high = f64::NAN;
        store
            .save(&instrument(), Interval::Day1, &SymbolArchive::from_bars(vec![b]))
            .unwrap();

        let loaded = store.load(&instrument(), Interval::Day1).unwrap();
        assert!(loaded.bars()[0].high.is_nan());
        assert_eq!(loaded.bars()[0].close, 100.0);
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        assert!(store.load(&instrument(), Interval::Day1).is_none());
        assert!(matches!(store.load_checked(&instrument(), Interval::Day1), Ok(None)));
    }

    #[test]
    fn header_only_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        write_raw(&store, Interval::Day1, "Date,Open,High,Low,Close,Volume\n");
        assert!(matches!(store.load_checked(&instrument(), Interval::Day1), Ok(None)));
    }

    #[test]
    fn corrupt_file_is_reported_then_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        write_raw(
            &store,
            Interval::Day1,
            "Date,Open,High,Low,Close,Volume\n2024-01-02,1,2,0.5,1.5,10\ngarbage,x,y\n",
        );

        assert!(matches!(
            store.load_checked(&instrument(), Interval::Day1),
            Err(ArchiveError::Corrupt { .. })
        ));
        assert!(store.load(&instrument(), Interval::Day1).is_none());
    }

    #[test]
    fn missing_column_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        write_raw(&store, Interval::Day1, "Date,Open,High,Low\n2024-01-02,1,2,0.5\n");
        let err = store.load_checked(&instrument(), Interval::Day1).unwrap_err();
        assert!(err.to_string().contains("Close"));
    }

    #[test]
    fn pandas_layout_with_extra_and_duplicate_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        // Close appears twice; the last occurrence wins. Adj Close is ignored.
        write_raw(
            &store,
            Interval::Day1,
            "Date,Close,High,Low,Open,Volume,Adj Close,Close\n\
             2024-01-03,11,12,9,10,200.0,11,99\n\
             2024-01-02,10,11,8,9,100,10,98\n",
        );

        let archive = store.load(&instrument(), Interval::Day1).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.bars()[0].timestamp, ts("2024-01-02"));
        assert_eq!(archive.bars()[0].close, 98.0);
        assert_eq!(archive.bars()[1].close, 99.0);
        assert_eq!(archive.bars()[1].volume, 200);
        assert_eq!(archive.bars()[1].open, 10.0);
    }

    #[test]
    fn duplicate_rows_in_file_keep_last() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        write_raw(
            &store,
            Interval::Day1,
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-02,1,2,0.5,1.5,10\n\
             2024-01-02,1,2,0.5,1.7,10\n",
        );

        let archive = store.load(&instrument(), Interval::Day1).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.bars()[0].close, 1.7);
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let first = SymbolArchive::from_bars(vec![bar("2024-01-02", 100.0)]);
        let second = SymbolArchive::from_bars(vec![bar("2024-01-02", 100.0), bar("2024-01-03", 101.0)]);

        store.save(&instrument(), Interval::Day1, &first).unwrap();
        store.save(&instrument(), Interval::Day1, &second).unwrap();

        assert_eq!(store.load(&instrument(), Interval::Day1).unwrap().len(), 2);
    }

    #[test]
    fn failed_rename_removes_tmp_and_reports_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        // A non-empty directory at the target path cannot be replaced by a file.
        let path = store.archive_path(&instrument(), Interval::Day1);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = store
            .save(
                &instrument(),
                Interval::Day1,
                &SymbolArchive::from_bars(vec![bar("2024-01-02", 100.0)]),
            )
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Io { .. }), "got {err:?}");
        assert!(!path.with_extension("csv.tmp").exists());
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "x");
    }

    #[test]
    fn failed_tmp_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let first = SymbolArchive::from_bars(vec![bar("2024-01-02", 100.0)]);
        store.save(&instrument(), Interval::Day1, &first).unwrap();
        let path = store.archive_path(&instrument(), Interval::Day1);
        let before = fs::read(&path).unwrap();

        // Block the temp file with a directory so the write itself fails.
        fs::create_dir_all(path.with_extension("csv.tmp")).unwrap();
        let second = SymbolArchive::from_bars(vec![bar("2024-01-03", 101.0)]);
        let err = store.save(&instrument(), Interval::Day1, &second).unwrap_err();

        assert!(matches!(err, ArchiveError::Io { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn dir_name_falls_back_to_symbol() {
        assert_eq!(archive_dir_name(&Instrument::new("XYZ", "<>")), "XYZ");
        assert_eq!(archive_dir_name(&Instrument::new("XYZ", " XYZ Corp ")), "XYZ Corp");
        assert_eq!(archive_dir_name(&Instrument::new("XYZ", "..")), "XYZ");
        assert_eq!(archive_dir_name(&Instrument::new("XYZ", "/.")), "XYZ");
    }

    #[test]
    fn reconcile_incoming_wins_and_sorts() {
        let existing = SymbolArchive::from_bars(vec![bar("2024-01-03", 10.0), bar("2024-01-02", 9.0)]);
        let incoming = vec![bar("2024-01-04", 12.0), bar("2024-01-03", 11.0)];

        let merged = reconcile(Some(existing), incoming);
        let closes: Vec<f64> = merged.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![9.0, 11.0, 12.0]);
    }

    #[test]
    fn reconcile_duplicate_incoming_keeps_last() {
        let merged = reconcile(None, vec![bar("2024-01-02", 1.0), bar("2024-01-02", 2.0)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.bars()[0].close, 2.0);
    }

    #[test]
    fn reconcile_localizes_naive_existing_to_incoming_zone() {
        let existing = SymbolArchive::from_bars(vec![bar("2024-01-01 00:00:00", 5.0)]);
        let incoming = vec![bar("2024-01-02 00:00:00+05:30", 6.0)];

        let merged = reconcile(Some(existing), incoming);
        assert!(merged.bars().iter().all(|b| b.timestamp.is_aware()));
        assert_eq!(merged.bars()[0].timestamp, ts("2024-01-01 00:00:00+05:30"));
    }

    #[test]
    fn reconcile_localizes_naive_incoming_to_existing_zone() {
        let existing = SymbolArchive::from_bars(vec![bar("2024-01-02 00:00:00+05:30", 5.0)]);
        let incoming = vec![bar("2024-01-02 00:00:00", 7.0), bar("2024-01-03 00:00:00", 8.0)];

        let merged = reconcile(Some(existing), incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.bars()[0].close, 7.0);
        assert_eq!(merged.bars()[1].timestamp, ts("2024-01-03 00:00:00+05:30"));
    }

    #[test]
    fn reconcile_never_shifts_aware_instants() {
        let existing = SymbolArchive::from_bars(vec![bar("2024-01-02 09:15:00+05:30", 1.0)]);
        let incoming = vec![bar("2024-01-02 03:50:00+00:00", 2.0)];

        let merged = reconcile(Some(existing), incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.bars()[0].timestamp.to_string(), "2024-01-02 09:15:00+05:30");
        assert_eq!(merged.bars()[1].timestamp.to_string(), "2024-01-02 03:50:00+00:00");
    }

    #[test]
    fn list_reports_health_per_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        store
            .save(
                &instrument(),
                Interval::Day1,
                &SymbolArchive::from_bars(vec![bar("2024-01-02", 1.0), bar("2024-01-03", 2.0)]),
            )
            .unwrap();
        write_raw(&store, Interval::Minute1, "not,a,valid\n1,2\n");
        write_raw(&store, Interval::Week1, "Date,Open,High,Low,Close,Volume\n");

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].interval, Interval::Minute1);
        assert!(matches!(entries[0].health, ArchiveHealth::Corrupt(_)));
        assert_eq!(entries[1].symbol, "TCS");
        assert!(matches!(entries[1].health, ArchiveHealth::Ok { rows: 2, .. }));
        assert_eq!(entries[2].health, ArchiveHealth::Empty);
    }

    #[test]
    fn archive_name_parsing() {
        assert_eq!(
            parse_archive_name(Path::new("x/BAJAJ_AUTO_1wk.csv")),
            Some(("BAJAJ_AUTO".to_string(), Interval::Week1))
        );
        assert_eq!(parse_archive_name(Path::new("x/TCS_1d.csv.tmp")), None);
        assert_eq!(parse_archive_name(Path::new("x/TCS_4h.csv")), None);
    }
}
