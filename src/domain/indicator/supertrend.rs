//! Supertrend.
//!
//! Basic bands are `hl2 ± multiplier·ATR`. The trend flag starts in an
//! uptrend and is updated strictly front to back:
//! - close above the previous upper band: uptrend
//! - close below the previous lower band: downtrend
//! - otherwise the trend carries over and the band on the trend side is
//!   clamped so it never moves against the trend (the "stepped" bands).
//!
//! Comparisons against an undefined band are false, so during ATR warmup the
//! flag carries over and no clamping happens.

use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::Column;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendSeries {
    pub atr: Column,
    pub upper: Column,
    pub lower: Column,
    pub in_uptrend: Vec<bool>,
}

fn gt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

fn lt(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

pub fn calculate_supertrend(bars: &[Bar], period: usize, multiplier: f64) -> SupertrendSeries {
    let atr = calculate_atr(bars, period);

    let mut upper: Column = Vec::with_capacity(bars.len());
    let mut lower: Column = Vec::with_capacity(bars.len());
    for (bar, atr) in bars.iter().zip(&atr) {
        let mid = bar.hl2();
        upper.push(atr.map(|a| mid + multiplier * a));
        lower.push(atr.map(|a| mid - multiplier * a));
    }

    let mut in_uptrend = vec![true; bars.len()];
    for i in 1..bars.len() {
        let close = Some(bars[i].close);
        if gt(close, upper[i - 1]) {
            in_uptrend[i] = true;
        } else if lt(close, lower[i - 1]) {
            in_uptrend[i] = false;
        } else {
            in_uptrend[i] = in_uptrend[i - 1];
            if in_uptrend[i] && lt(lower[i], lower[i - 1]) {
                lower[i] = lower[i - 1];
            }
            if !in_uptrend[i] && gt(upper[i], upper[i - 1]) {
                upper[i] = upper[i - 1];
            }
        }
    }

    SupertrendSeries {
        atr,
        upper,
        lower,
        in_uptrend,
    }
}
