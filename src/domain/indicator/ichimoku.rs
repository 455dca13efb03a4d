//! Ichimoku Kinko Hyo.
//!
//! tenkan  = (highest high + lowest low) / 2 over `tenkan` bars
//! kijun   = same over `kijun` bars
//! senkou A = (tenkan + kijun) / 2, value of bar i plotted at i + kijun
//! senkou B = midpoint over `senkou` bars, plotted at i + kijun
//! chikou  = close of bar i + kijun plotted at i
//!
//! The cloud floor is the lower of the two spans.

use crate::domain::indicator::Column;
use crate::domain::indicator_helpers::{rolling_max, rolling_min, shift};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuSeries {
    pub tenkan: Column,
    pub kijun: Column,
    pub senkou_a: Column,
    pub senkou_b: Column,
    pub chikou: Column,
    pub cloud_floor: Column,
}

fn midpoint(highs: &[Option<f64>], lows: &[Option<f64>], window: usize) -> Column {
    rolling_max(highs, window)
        .into_iter()
        .zip(rolling_min(lows, window))
        .map(|(h, l)| Some((h? + l?) / 2.0))
        .collect()
}

pub fn calculate_ichimoku(bars: &[Bar], tenkan: usize, kijun: usize, senkou: usize) -> IchimokuSeries {
    let highs: Column = bars.iter().map(|b| Some(b.high)).collect();
    let lows: Column = bars.iter().map(|b| Some(b.low)).collect();
    let closes: Column = bars.iter().map(|b| Some(b.close)).collect();
    let offset = kijun as isize;

    let tenkan_line = midpoint(&highs, &lows, tenkan);
    let kijun_line = midpoint(&highs, &lows, kijun);

    let base_a: Column = tenkan_line
        .iter()
        .zip(&kijun_line)
        .map(|(t, k)| Some(((*t)? + (*k)?) / 2.0))
        .collect();
    let senkou_a = shift(&base_a, offset);
    let senkou_b = shift(&midpoint(&highs, &lows, senkou), offset);
    let chikou = shift(&closes, -offset);

    let cloud_floor = senkou_a
        .iter()
        .zip(&senkou_b)
        .map(|(a, b)| Some((*a)?.min((*b)?)))
        .collect();

    IchimokuSeries {
        tenkan: tenkan_line,
        kijun: kijun_line,
        senkou_a,
        senkou_b,
        chikou,
        cloud_floor,
    }
}
