//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::SignaltraderError;

/// A raw exchange row: `(timestamp_ms, open, high, low, close, volume)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Validated constructor. Open and close must be strictly positive; high,
    /// low and volume must be non-negative.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, SignaltraderError> {
        let invalid = |reason: &str| SignaltraderError::InvalidBar {
            timestamp_ms: timestamp.timestamp_millis(),
            reason: reason.to_string(),
        };

        if !(open > 0.0) || !(close > 0.0) {
            return Err(invalid("open and close must be positive"));
        }
        if !(high >= 0.0) || !(low >= 0.0) {
            return Err(invalid("high and low must be non-negative"));
        }
        if !(volume >= 0.0) {
            return Err(invalid("volume must be non-negative"));
        }

        Ok(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn from_raw(raw: RawBar) -> Result<Self, SignaltraderError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.timestamp_ms).ok_or_else(|| {
            SignaltraderError::InvalidBar {
                timestamp_ms: raw.timestamp_ms,
                reason: "timestamp out of range".into(),
            }
        })?;
        Bar::new(timestamp, raw.open, raw.high, raw.low, raw.close, raw.volume)
    }

    /// (high + low) / 2
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
