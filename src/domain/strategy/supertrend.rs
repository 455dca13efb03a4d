//! Supertrend flip: downtrend to uptrend is a buy, uptrend to downtrend a
//! sell. Adds 1 to the strength of a same-direction claim.

use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{SignalColumn, SignalSource, SignalType};

pub fn flip_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    for (i, pair) in frame.supertrend.in_uptrend.windows(2).enumerate() {
        let direction = match (pair[0], pair[1]) {
            (false, true) => SignalType::Buy,
            (true, false) => SignalType::Sell,
            _ => continue,
        };
        column.accumulate(i + 1, direction, SignalSource::Supertrend, 1.0);
    }
}
