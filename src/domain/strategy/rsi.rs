//! RSI rule passes.
//!
//! Divergence (strength 2): the bar's low is the lowest of the last five
//! bars while RSI is not (bearish: highest high, RSI not at its high). Needs
//! at least twice the RSI period of history and a period of at least five.
//!
//! Threshold (strength 1): two of three must hold
//! - RSI crosses up out of the oversold zone (down out of overbought)
//! - RSI rising (falling)
//! - close rising (falling)

use super::{above, at_least, at_most, below, count};
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{SignalColumn, SignalSource, SignalType};

const DIVERGENCE_WINDOW: usize = 5;

fn window_extreme(values: impl Iterator<Item = f64>, lowest: bool) -> Option<f64> {
    values.reduce(|a, b| if lowest { a.min(b) } else { a.max(b) })
}

fn divergence_at(frame: &IndicatorFrame<'_>, i: usize) -> Option<SignalType> {
    let period = frame.params.rsi_period;
    if period < DIVERGENCE_WINDOW || i < period * 2 {
        return None;
    }
    let rsi = frame.rsi[i]?;
    let start = i + 1 - DIVERGENCE_WINDOW;
    let bars = &frame.bars[start..=i];
    let rsi_window = || frame.rsi[start..=i].iter().flatten().copied();

    let lowest_low = window_extreme(bars.iter().map(|b| b.low), true)?;
    let lowest_rsi = window_extreme(rsi_window(), true)?;
    if frame.bars[i].low == lowest_low && rsi > lowest_rsi {
        return Some(SignalType::Buy);
    }

    let highest_high = window_extreme(bars.iter().map(|b| b.high), false)?;
    let highest_rsi = window_extreme(rsi_window(), false)?;
    if frame.bars[i].high == highest_high && rsi < highest_rsi {
        return Some(SignalType::Sell);
    }
    None
}

pub fn divergence_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    for i in 1..frame.len() {
        if let Some(direction) = divergence_at(frame, i) {
            column.claim(i, direction, SignalSource::RsiDivergence, 2.0);
        }
    }
}

pub fn threshold_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let oversold = Some(frame.params.rsi_oversold);
    let overbought = Some(frame.params.rsi_overbought);

    for i in 1..frame.len() {
        let rsi = frame.rsi[i];
        let prev_rsi = frame.rsi[i - 1];
        let close = frame.close(i);
        let prev_close = frame.close(i - 1);

        let buy = count(&[
            at_most(prev_rsi, oversold) && above(rsi, oversold),
            above(rsi, prev_rsi),
            close > prev_close,
        ]);
        let sell = count(&[
            at_least(prev_rsi, overbought) && below(rsi, overbought),
            below(rsi, prev_rsi),
            close < prev_close,
        ]);

        if buy >= 2 {
            column.claim(i, SignalType::Buy, SignalSource::RsiOversold, 1.0);
        } else if sell >= 2 {
            column.claim(i, SignalType::Sell, SignalSource::RsiOverbought, 1.0);
        }
    }
}
