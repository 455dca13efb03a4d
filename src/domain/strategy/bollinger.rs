//! Bollinger Band rule passes: bounce, squeeze, breakout and trend. Each scans
//! from the end of the band warmup and claims with strength 1.

use super::{above, at_least, at_most, below, count};
use crate::domain::indicator::IndicatorFrame;
use crate::domain::indicator_helpers::quantile;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{SignalColumn, SignalSource, SignalType};

const CONFIRM_BARS: usize = 3;
const SQUEEZE_QUANTILE: f64 = 0.1;
const EXPANSION_SCAN: usize = 10;
const OVERSOLD_B: f64 = 0.2;
const OVERBOUGHT_B: f64 = 0.8;

/// Bars `[i-3, i)` excluding the current one.
fn recent<'a>(frame: &IndicatorFrame<'a>, i: usize) -> &'a [Bar] {
    &frame.bars[i.saturating_sub(CONFIRM_BARS)..i]
}

/// Reversal off a band: touch or cross, turn, confirmation against the
/// recent extreme, rising volume. Three of four.
pub fn bounce_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let bb = &frame.bollinger;
    for i in frame.params.bb_window.max(1)..frame.len() {
        let bar = &frame.bars[i];
        let close = Some(bar.close);
        let prev_close = Some(frame.close(i - 1));
        let rising_volume = bar.volume > frame.bars[i - 1].volume;

        let recent_low = recent(frame, i).iter().map(|b| b.low).reduce(f64::min);
        let recent_high = recent(frame, i).iter().map(|b| b.high).reduce(f64::max);

        let buy = count(&[
            at_most(close, bb.lower[i]) || at_most(prev_close, bb.lower[i]),
            above(close, prev_close),
            above(close, recent_low),
            rising_volume,
        ]);
        let sell = count(&[
            at_least(close, bb.upper[i]) || at_least(prev_close, bb.upper[i]),
            below(close, prev_close),
            below(close, recent_high),
            rising_volume,
        ]);

        if buy >= 3 {
            column.claim(i, SignalType::Buy, SignalSource::BbBounce, 1.0);
        } else if sell >= 3 {
            column.claim(i, SignalType::Sell, SignalSource::BbBounce, 1.0);
        }
    }
}

/// Bandwidth below its 10th percentile over the whole series, followed within
/// the next nine bars by bandwidth above twice that level. The expansion bar
/// is claimed, in the direction of close relative to the middle band.
pub fn squeeze_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let bb = &frame.bollinger;
    let Some(threshold) = quantile(&bb.bandwidth, SQUEEZE_QUANTILE) else {
        return;
    };
    let n = frame.len();

    for i in frame.params.bb_window..n {
        if !below(bb.bandwidth[i], Some(threshold)) {
            continue;
        }
        let end = (i + EXPANSION_SCAN).min(n);
        for j in i + 1..end {
            if above(bb.bandwidth[j], Some(threshold * 2.0)) {
                let direction = if above(Some(frame.close(j)), bb.mid[j]) {
                    SignalType::Buy
                } else {
                    SignalType::Sell
                };
                column.claim(j, direction, SignalSource::BbSqueeze, 1.0);
                break;
            }
        }
    }
}

/// Band break with follow-through: break, continuation, new extreme, candle
/// body in the same direction, widening bands. Four of five.
pub fn breakout_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let bb = &frame.bollinger;
    for i in frame.params.bb_window.max(1)..frame.len() {
        let bar = &frame.bars[i];
        let prev = &frame.bars[i - 1];
        let close = Some(bar.close);
        let widening = above(bb.bandwidth[i], bb.bandwidth[i - 1]);

        let bullish = count(&[
            above(close, bb.upper[i]),
            bar.close > prev.close,
            bar.high > prev.high,
            bar.close > bar.open,
            widening,
        ]);
        let bearish = count(&[
            below(close, bb.lower[i]),
            bar.close < prev.close,
            bar.low < prev.low,
            bar.close < bar.open,
            widening,
        ]);

        if bullish >= 4 {
            column.claim(i, SignalType::Buy, SignalSource::BbBreakout, 1.0);
        } else if bearish >= 4 {
            column.claim(i, SignalType::Sell, SignalSource::BbBreakout, 1.0);
        }
    }
}

/// Pullback inside a trend: close on the trend side of the middle band, %B
/// in the opposite extreme zone, and a one-bar turn back with the trend.
pub fn trend_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let bb = &frame.bollinger;
    for i in frame.params.bb_window.max(1)..frame.len() {
        let close = frame.close(i);
        let prev_close = frame.close(i - 1);

        if above(Some(close), bb.mid[i]) && below(bb.percent_b[i], Some(OVERSOLD_B)) {
            if close > prev_close {
                column.claim(i, SignalType::Buy, SignalSource::BbTrend, 1.0);
            }
        } else if below(Some(close), bb.mid[i])
            && above(bb.percent_b[i], Some(OVERBOUGHT_B))
            && close < prev_close
        {
            column.claim(i, SignalType::Sell, SignalSource::BbTrend, 1.0);
        }
    }
}
