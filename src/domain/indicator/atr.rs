//! True Range and Average True Range.
//!
//! TR[i] = max(high-low, |high-prevClose|, |low-prevClose|); bar 0 has no
//! previous close so TR[0] = high-low.
//! ATR[i] = simple mean of TR over the last `period` bars. Warmup: first
//! (period-1) bars undefined.

use crate::domain::indicator::Column;
use crate::domain::indicator_helpers::{defined, rolling_mean};
use crate::domain::ohlcv::Bar;

pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> Column {
    rolling_mean(&defined(&true_range(bars)), period)
}
