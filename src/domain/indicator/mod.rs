//! Technical indicator implementations.
//!
//! Every indicator is a pure function of the bars and its parameters that
//! returns columns aligned 1:1 with the input by bar index. Window-based
//! columns are `None` until their window fills; they never error.
//!
//! [`IndicatorFrame::compute`] runs every indicator once over a series and
//! is the only input the signal rules read.

pub mod atr;
pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod ichimoku;
pub mod macd;
pub mod rsi;
pub mod supertrend;

use serde::Serialize;

use crate::domain::ohlcv::Bar;
use crate::domain::series::Series;

pub use bollinger::{calculate_bollinger, BollingerSeries};
pub use donchian::{calculate_donchian, DonchianSeries};
pub use ema::calculate_ema;
pub use ichimoku::{calculate_ichimoku, IchimokuSeries};
pub use macd::{calculate_macd, MacdSeries};
pub use rsi::calculate_rsi;
pub use supertrend::{calculate_supertrend, SupertrendSeries};

/// One value per bar; `None` marks an undefined (warmup) value.
pub type Column = Vec<Option<f64>>;

/// Periods and multipliers for every indicator in the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorParams {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub bb_window: usize,
    pub bb_std: f64,
    pub tenkan: usize,
    pub kijun: usize,
    pub senkou: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub donchian_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            atr_period: 7,
            atr_multiplier: 3.0,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            bb_window: 20,
            bb_std: 2.0,
            tenkan: 9,
            kijun: 26,
            senkou: 52,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            donchian_window: 20,
        }
    }
}

/// All indicator columns for one series, computed front to back in one pass
/// per stateful column.
#[derive(Debug, Clone)]
pub struct IndicatorFrame<'a> {
    pub bars: &'a [Bar],
    pub params: IndicatorParams,
    pub supertrend: SupertrendSeries,
    pub macd: MacdSeries,
    pub bollinger: BollingerSeries,
    pub ichimoku: IchimokuSeries,
    pub rsi: Column,
    pub donchian: DonchianSeries,
}

impl<'a> IndicatorFrame<'a> {
    pub fn compute(series: &'a Series, params: &IndicatorParams) -> Self {
        Self::from_bars(series.bars(), params)
    }

    pub fn from_bars(bars: &'a [Bar], params: &IndicatorParams) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        IndicatorFrame {
            bars,
            params: params.clone(),
            supertrend: calculate_supertrend(bars, params.atr_period, params.atr_multiplier),
            macd: calculate_macd(&closes, params.macd_short, params.macd_long, params.macd_signal),
            bollinger: calculate_bollinger(&closes, params.bb_window, params.bb_std),
            ichimoku: calculate_ichimoku(bars, params.tenkan, params.kijun, params.senkou),
            rsi: calculate_rsi(&closes, params.rsi_period),
            donchian: calculate_donchian(bars, params.donchian_window),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn close(&self, i: usize) -> f64 {
        self.bars[i].close
    }
}


#[cfg(test)]
mod tests {
    use super::test_bars::make_bars;
    use super::*;

    #[test]
    fn default_params() {
        let p = IndicatorParams::default();
        assert_eq!(p.atr_period, 7);
        assert!((p.atr_multiplier - 3.0).abs() < f64::EPSILON);
        assert_eq!((p.macd_short, p.macd_long, p.macd_signal), (12, 26, 9));
        assert_eq!((p.tenkan, p.kijun, p.senkou), (9, 26, 52));
    }

    #[test]
    fn frame_columns_align_with_bars() {
        let bars = make_bars(&(0..80).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let frame = IndicatorFrame::from_bars(&bars, &IndicatorParams::default());
        assert_eq!(frame.len(), 80);
        assert_eq!(frame.supertrend.in_uptrend.len(), 80);
        assert_eq!(frame.macd.line.len(), 80);
        assert_eq!(frame.bollinger.mid.len(), 80);
        assert_eq!(frame.ichimoku.senkou_b.len(), 80);
        assert_eq!(frame.rsi.len(), 80);
        assert_eq!(frame.donchian.upper.len(), 80);
    }

    #[test]
    fn single_bar_frame() {
        let bars = make_bars(&[100.0]);
        let frame = IndicatorFrame::from_bars(&bars, &IndicatorParams::default());
        assert!(frame.supertrend.in_uptrend[0]);
        assert!(frame.supertrend.atr[0].is_none());
        assert!(frame.bollinger.mid[0].is_none());
        assert!(frame.ichimoku.tenkan[0].is_none());
        assert!(frame.rsi[0].is_none());
        assert!((frame.macd.line[0]).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_frame() {
        let frame = IndicatorFrame::from_bars(&[], &IndicatorParams::default());
        assert!(frame.is_empty());
        assert!(frame.supertrend.in_uptrend.is_empty());
    }
}
