//! Signal generation: rule passes, priority arbitration, and the strategy
//! variants a backtest can select.
//!
//! Every rule pass scans the frame bar by bar and writes into a shared
//! [`SignalColumn`]. Passes run in the order given to [`arbitrate`]; a pass
//! can only claim a bar nobody claimed before it, so the order of the slice
//! is the priority order.

pub mod bollinger;
pub mod ichimoku;
pub mod rsi;
pub mod signal_based;
pub mod supertrend;

use chrono::Duration;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::SignaltraderError;
use crate::domain::indicator::{IndicatorFrame, IndicatorParams};
use crate::domain::signal::{Signal, SignalColumn};

/// One independent rule pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalRule {
    RsiDivergence,
    RsiThreshold,
    BollingerBounce,
    BollingerSqueeze,
    BollingerBreakout,
    BollingerTrend,
    Ichimoku,
    SupertrendFlip,
}

impl SignalRule {
    /// Every rule, highest priority first.
    pub const ALL: [SignalRule; 8] = [
        SignalRule::RsiDivergence,
        SignalRule::RsiThreshold,
        SignalRule::BollingerBounce,
        SignalRule::BollingerSqueeze,
        SignalRule::BollingerBreakout,
        SignalRule::BollingerTrend,
        SignalRule::Ichimoku,
        SignalRule::SupertrendFlip,
    ];

    pub fn apply(&self, frame: &IndicatorFrame<'_>, column: &mut SignalColumn) {
        match self {
            SignalRule::RsiDivergence => rsi::divergence_pass(frame, column),
            SignalRule::RsiThreshold => rsi::threshold_pass(frame, column),
            SignalRule::BollingerBounce => bollinger::bounce_pass(frame, column),
            SignalRule::BollingerSqueeze => bollinger::squeeze_pass(frame, column),
            SignalRule::BollingerBreakout => bollinger::breakout_pass(frame, column),
            SignalRule::BollingerTrend => bollinger::trend_pass(frame, column),
            SignalRule::Ichimoku => ichimoku::ichimoku_pass(frame, column),
            SignalRule::SupertrendFlip => supertrend::flip_pass(frame, column),
        }
    }

    /// Bars of history the rule needs before it can fire.
    pub fn lookback(&self, params: &IndicatorParams) -> usize {
        match self {
            SignalRule::RsiDivergence | SignalRule::RsiThreshold => params.rsi_period,
            SignalRule::BollingerBounce
            | SignalRule::BollingerSqueeze
            | SignalRule::BollingerBreakout
            | SignalRule::BollingerTrend => params.bb_window,
            SignalRule::Ichimoku => params.tenkan.max(params.kijun).max(params.senkou),
            SignalRule::SupertrendFlip => params.atr_period,
        }
    }
}

/// Run `rules` in order over a fresh column. No duplicate suppression.
pub fn arbitrate(frame: &IndicatorFrame<'_>, rules: &[SignalRule]) -> SignalColumn {
    let mut column = SignalColumn::new(frame.len());
    for rule in rules {
        rule.apply(frame, &mut column);
        tracing::trace!(?rule, claimed = column.count(), "rule pass done");
    }
    column
}

/// The strategies a backtest can run.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyKind {
    /// Replay signals generated earlier, aligned to bars by nearest timestamp.
    SignalBased {
        signals: Vec<Signal>,
        tolerance: Duration,
    },
    /// The full chain: every rule in priority order.
    Supertrend,
    BollingerComposite,
    RsiComposite,
    IchimokuComposite,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SignalBased { .. } => "signal-based",
            StrategyKind::Supertrend => "supertrend",
            StrategyKind::BollingerComposite => "bollinger",
            StrategyKind::RsiComposite => "rsi",
            StrategyKind::IchimokuComposite => "ichimoku",
        }
    }

    pub fn rules(&self) -> &'static [SignalRule] {
        match self {
            StrategyKind::SignalBased { .. } => &[],
            StrategyKind::Supertrend => &SignalRule::ALL,
            StrategyKind::BollingerComposite => &[
                SignalRule::BollingerBounce,
                SignalRule::BollingerSqueeze,
                SignalRule::BollingerBreakout,
                SignalRule::BollingerTrend,
            ],
            StrategyKind::RsiComposite => &[SignalRule::RsiDivergence, SignalRule::RsiThreshold],
            StrategyKind::IchimokuComposite => &[SignalRule::Ichimoku],
        }
    }

    pub fn required_bars(&self, params: &IndicatorParams) -> usize {
        self.rules()
            .iter()
            .map(|r| r.lookback(params))
            .max()
            .unwrap_or(1)
    }

    /// Parameters that identify a run of this strategy.
    pub fn parameters(&self, params: &IndicatorParams) -> Value {
        match self {
            StrategyKind::SignalBased { signals, tolerance } => json!({
                "signals": signals.len(),
                "tolerance_secs": tolerance.num_seconds(),
            }),
            StrategyKind::Supertrend => json!(params),
            StrategyKind::BollingerComposite => json!({
                "bb_window": params.bb_window,
                "bb_std": params.bb_std,
            }),
            StrategyKind::RsiComposite => json!({
                "rsi_period": params.rsi_period,
                "rsi_overbought": params.rsi_overbought,
                "rsi_oversold": params.rsi_oversold,
            }),
            StrategyKind::IchimokuComposite => json!({
                "tenkan": params.tenkan,
                "kijun": params.kijun,
                "senkou": params.senkou,
            }),
        }
    }

    pub fn generate(&self, frame: &IndicatorFrame<'_>) -> SignalColumn {
        match self {
            StrategyKind::SignalBased { signals, tolerance } => {
                signal_based::align(frame.bars, signals, *tolerance)
            }
            _ => {
                let mut column = arbitrate(frame, self.rules());
                column.suppress_duplicates();
                column
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses the rule-based variants. `signal-based` needs stored signals and
/// is built with [`StrategyKind::SignalBased`] directly.
impl FromStr for StrategyKind {
    type Err = SignaltraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "supertrend" => Ok(StrategyKind::Supertrend),
            "bollinger" => Ok(StrategyKind::BollingerComposite),
            "rsi" => Ok(StrategyKind::RsiComposite),
            "ichimoku" => Ok(StrategyKind::IchimokuComposite),
            other => Err(SignaltraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "name".into(),
                reason: format!("unknown strategy '{other}'"),
            }),
        }
    }
}

pub(crate) fn above(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

pub(crate) fn below(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a < b)
}

pub(crate) fn at_most(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a <= b)
}

pub(crate) fn at_least(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a >= b)
}

pub(crate) fn count(conditions: &[bool]) -> usize {
    conditions.iter().filter(|&&c| c).count()
}
