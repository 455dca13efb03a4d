//! Donchian channel: highest high and lowest low over the last `window` bars.

use crate::domain::indicator::Column;
use crate::domain::indicator_helpers::{rolling_max, rolling_min};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct DonchianSeries {
    pub upper: Column,
    pub lower: Column,
    pub mid: Column,
}

pub fn calculate_donchian(bars: &[Bar], window: usize) -> DonchianSeries {
    let highs: Column = bars.iter().map(|b| Some(b.high)).collect();
    let lows: Column = bars.iter().map(|b| Some(b.low)).collect();
    let upper = rolling_max(&highs, window);
    let lower = rolling_min(&lows, window);
    let mid = upper
        .iter()
        .zip(&lower)
        .map(|(u, l)| Some(((*u)? + (*l)?) / 2.0))
        .collect();

    DonchianSeries { upper, lower, mid }
}
