//! RSI (Relative Strength Index) indicator.
//!
//! Average gain and average loss are simple rolling means over `period`
//! one-bar price changes (positive changes and the magnitude of negative
//! changes respectively).
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: bar 0 has no change, so the first `period` bars are undefined.

use crate::domain::indicator::Column;
use crate::domain::indicator_helpers::rolling_mean;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Column {
    let mut gains: Column = Vec::with_capacity(closes.len());
    let mut losses: Column = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i == 0 {
            gains.push(None);
            losses.push(None);
            continue;
        }
        let change = closes[i] - closes[i - 1];
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(gain, loss)| {
            let (gain, loss) = (gain?, loss?);
            if loss == 0.0 {
                Some(100.0)
            } else {
                Some(100.0 - 100.0 / (1.0 + gain / loss))
            }
        })
        .collect()
}
