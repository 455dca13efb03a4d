//! Market data from exported exchange CSV files.
//!
//! One file per pair and timeframe, `{BASE}_{QUOTE}_{timeframe}.csv`, with a
//! header row and columns `timestamp,open,high,low,close,volume`. The
//! timestamp is epoch milliseconds or RFC 3339.

use crate::domain::error::SignaltraderError;
use crate::domain::ohlcv::RawBar;
use crate::domain::series::{Pair, Timeframe};
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, pair: &Pair, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}_{}.csv", pair.base, pair.quote, timeframe))
    }

    /// Pairs that have a file for `timeframe`, sorted by symbol.
    pub fn list_pairs(&self, timeframe: Timeframe) -> Result<Vec<Pair>, SignaltraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SignaltraderError::MarketData {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{timeframe}.csv");
        let mut pairs = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(&suffix) {
                if let Some(pair) = stem.split_once('_').and_then(|(b, q)| Pair::parse(&format!("{b}/{q}"))) {
                    pairs.push(pair);
                }
            }
        }

        pairs.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(pairs)
    }
}

fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    value.parse::<i64>().ok().or_else(|| {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|ts| ts.timestamp_millis())
    })
}

fn field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, SignaltraderError> {
    let raw = record.get(index).ok_or_else(|| SignaltraderError::MarketData {
        reason: format!("missing {name} column"),
    })?;
    raw.trim().parse().map_err(|e| SignaltraderError::MarketData {
        reason: format!("invalid {name} value {raw:?}: {e}"),
    })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<RawBar>, SignaltraderError> {
        let path = self.csv_path(pair, timeframe);
        if !path.exists() {
            return Err(SignaltraderError::UnknownPair {
                pair: pair.symbol.clone(),
            });
        }
        let content = fs::read_to_string(&path)?;

        let since_ms = since.map(|s| s.timestamp_millis());
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| SignaltraderError::MarketData {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| SignaltraderError::MarketData {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp_ms = parse_timestamp(ts_str).ok_or_else(|| SignaltraderError::MarketData {
                reason: format!("invalid timestamp {ts_str:?}"),
            })?;

            if since_ms.is_some_and(|s| timestamp_ms < s) {
                continue;
            }

            rows.push(RawBar {
                timestamp_ms,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: field(&record, 5, "volume")?,
            });
        }

        rows.sort_by_key(|r| r.timestamp_ms);
        rows.truncate(limit);
        Ok(rows)
    }
}
