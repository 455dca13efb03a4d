//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(short) - EMA(long)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: short=12, long=26, signal=9.
//! All EMAs are seeded with their first input, so every column is defined
//! from bar 0.

use crate::domain::indicator::calculate_ema;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub ema_short: Vec<f64>,
    pub ema_long: Vec<f64>,
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn calculate_macd(closes: &[f64], short: usize, long: usize, signal_period: usize) -> MacdSeries {
    let ema_short = calculate_ema(closes, short);
    let ema_long = calculate_ema(closes, long);

    let line: Vec<f64> = ema_short
        .iter()
        .zip(&ema_long)
        .map(|(s, l)| s - l)
        .collect();
    let signal = calculate_ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdSeries {
        ema_short,
        ema_long,
        line,
        signal,
        histogram,
    }
}
