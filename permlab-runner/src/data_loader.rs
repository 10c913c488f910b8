//! Bar loading — CSV files and synthetic series.
//!
//! CSV input has the header `timestamp,open,high,low,close,volume`. The
//! timestamp column accepts RFC 3339 strings or integer epoch milliseconds
//! (the usual exchange kline export). Rows must already be in time order;
//! the loader validates, it does not sort.
//!
//! Synthetic series are for demos and tests only.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use permlab_core::{Bar, Series, SeriesError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("no bars in input")]
    Empty,

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

fn parse_timestamp(row: usize, value: &str) -> Result<DateTime<Utc>, LoadError> {
    let bad = || LoadError::Timestamp {
        row,
        value: value.to_string(),
    };
    let trimmed = value.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single().ok_or_else(bad);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| bad())
}

/// Parse a series from CSV text.
pub fn parse_series_csv(text: &str) -> Result<Series, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut bars = Vec::new();
    for (row, record) in reader.deserialize::<CsvBar>().enumerate() {
        let r = record?;
        let timestamp = parse_timestamp(row, &r.timestamp)?;
        bars.push(Bar::new(timestamp, r.open, r.high, r.low, r.close, r.volume));
    }
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(Series::new(bars)?)
}

/// Load a series from a CSV file.
pub fn load_series_csv(path: &Path) -> Result<Series, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let series = parse_series_csv(&text)?;
    info!(path = %path.display(), bars = series.len(), "series loaded");
    Ok(series)
}

/// Render a series as CSV with RFC 3339 timestamps.
pub fn series_to_csv(series: &Series) -> Result<String, LoadError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for b in series.bars() {
        wtr.write_record([
            b.timestamp.to_rfc3339(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ])?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| LoadError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Write a series to a CSV file, creating parent directories.
pub fn write_series_csv(series: &Series, path: &Path) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, series_to_csv(series)?).map_err(io_err)
}

/// Deterministic hourly random walk starting at 100.
///
/// Same `(n, seed)` always yields the same series.
pub fn synthetic_series(n: usize, seed: u64) -> Result<Series, LoadError> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    if n == 0 {
        return Err(LoadError::Empty);
    }
    let seed_bytes = blake3::hash(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().ok_or(LoadError::Empty)?;
    let mut price = 100.0_f64;
    let bars = (0..n)
        .map(|i| {
            let open = price * (1.0 + rng.gen_range(-0.002..0.002));
            let close = open * (1.0 + rng.gen_range(-0.01..0.01));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            let volume = rng.gen_range(100.0..10_000.0);
            price = close;
            Bar::new(t0 + Duration::hours(i as i64), open, high, low, close, volume)
        })
        .collect();
    Ok(Series::new(bars)?)
}
