//! Series Store: ordered, time-indexed bars for one (pair, timeframe).

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::SignaltraderError;
use super::ohlcv::{Bar, RawBar};

/// A tradable market, e.g. `ETH/USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub exchange: Option<String>,
}

impl Pair {
    /// Parse `BASE/QUOTE`. Returns `None` for anything else.
    pub fn parse(symbol: &str) -> Option<Pair> {
        let (base, quote) = symbol.trim().split_once('/')?;
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return None;
        }
        Some(Pair {
            symbol: format!("{base}/{quote}"),
            base,
            quote,
            exchange: None,
        })
    }

    pub fn with_exchange(mut self, exchange: &str) -> Self {
        self.exchange = Some(exchange.to_string());
        self
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = SignaltraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(SignaltraderError::InvalidTimeframe {
                value: other.to_string(),
            }),
        }
    }
}

/// Chronologically ordered bars with unique timestamps.
///
/// Bars are immutable once appended; [`Series::push`] enforces strictly
/// increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub pair: String,
    pub timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl Series {
    pub fn new(pair: &str, timeframe: Timeframe) -> Self {
        Series {
            pair: pair.to_string(),
            timeframe,
            bars: Vec::new(),
        }
    }

    /// Build from already ordered bars, failing on the first out-of-order or
    /// duplicate timestamp.
    pub fn from_bars(
        pair: &str,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, SignaltraderError> {
        let mut series = Series::new(pair, timeframe);
        series.bars.reserve(bars.len());
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    /// Normalise exchange rows: invalid rows are skipped, the rest sorted by
    /// time with the first occurrence of a duplicate timestamp kept.
    pub fn from_unsorted(pair: &str, timeframe: Timeframe, rows: &[RawBar]) -> Self {
        let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());
        for raw in rows {
            match Bar::from_raw(*raw) {
                Ok(bar) => bars.push(bar),
                Err(e) => tracing::debug!(pair, error = %e, "skipping invalid row"),
            }
        }
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        Series {
            pair: pair.to_string(),
            timeframe,
            bars,
        }
    }

    pub fn push(&mut self, bar: Bar) -> Result<(), SignaltraderError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(SignaltraderError::InvalidBar {
                    timestamp_ms: bar.timestamp.timestamp_millis(),
                    reason: format!(
                        "timestamp not after previous bar at {}",
                        last.timestamp.timestamp_millis()
                    ),
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(|b| b.timestamp)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Consecutive bars spaced further apart than one timeframe.
    pub fn gap_count(&self) -> usize {
        let step = self.timeframe.duration();
        self.bars
            .windows(2)
            .filter(|w| w[1].timestamp - w[0].timestamp > step)
            .count()
    }

    /// Copy of the bars inside `[start, end]`.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Series {
        Series {
            pair: self.pair.clone(),
            timeframe: self.timeframe,
            bars: self
                .bars
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .cloned()
                .collect(),
        }
    }
}
