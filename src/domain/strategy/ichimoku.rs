//! Ichimoku rule pass. Two of four conditions emit a signal whose strength is
//! the number of conditions met:
//! - tenkan crosses kijun
//! - close beyond both cloud spans
//! - cloud colour (span A vs span B)
//! - chikou beyond the close it is plotted against, once twice the kijun
//!   period of history exists

use super::{above, at_least, at_most, below, count};
use crate::domain::indicator::IndicatorFrame;
use crate::domain::signal::{SignalColumn, SignalSource, SignalType};

pub fn ichimoku_pass(frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
    let ich = &frame.ichimoku;
    let kijun = frame.params.kijun;

    for i in kijun.max(1)..frame.len() {
        let close = Some(frame.close(i));
        let (tenkan, base) = (ich.tenkan[i], ich.kijun[i]);
        let (prev_tenkan, prev_base) = (ich.tenkan[i - 1], ich.kijun[i - 1]);
        let (span_a, span_b) = (ich.senkou_a[i], ich.senkou_b[i]);
        let chikou_ready = i >= kijun * 2;
        let lagged = i - kijun;
        let lagged_close = Some(frame.close(lagged));

        let buy = count(&[
            above(tenkan, base) && at_most(prev_tenkan, prev_base),
            above(close, span_a) && above(close, span_b),
            above(span_a, span_b),
            chikou_ready && above(ich.chikou[lagged], lagged_close),
        ]);
        let sell = count(&[
            below(tenkan, base) && at_least(prev_tenkan, prev_base),
            below(close, span_a) && below(close, span_b),
            below(span_a, span_b),
            chikou_ready && below(ich.chikou[lagged], lagged_close),
        ]);

        if buy >= 2 {
            column.accumulate(i, SignalType::Buy, SignalSource::Ichimoku, buy as f64);
        } else if sell >= 2 {
            column.accumulate(i, SignalType::Sell, SignalSource::Ichimoku, sell as f64);
        }
    }
}
