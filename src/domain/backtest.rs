//! Backtest engine: walks bars and their decisions forward, one FLAT/LONG
//! state machine per run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::error::SignaltraderError;
use super::indicator::{IndicatorFrame, IndicatorParams};
use super::metrics::Metrics;
use super::ohlcv::Bar;
use super::portfolio::{EquityPoint, Portfolio, Trade, TradeAction};
use super::series::{Series, Timeframe};
use super::signal::{Signal, SignalColumn, SignalType};
use super::strategy::StrategyKind;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    /// Fraction per side, e.g. 0.001 for 0.1%.
    pub commission: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            commission: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Percent.
    pub total_return: f64,
    /// Entries only.
    pub total_trades: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub signals: Vec<Signal>,
}

impl BacktestResult {
    pub fn position_open(&self) -> bool {
        self.equity_curve.last().is_some_and(|p| p.in_position)
    }
}

/// What identifies a run when its result is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRun {
    pub name: String,
    pub pair: String,
    pub timeframe: Timeframe,
    pub strategy: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub parameters: Value,
}

impl BacktestRun {
    pub fn new(
        pair: &str,
        timeframe: Timeframe,
        strategy: &StrategyKind,
        params: &IndicatorParams,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        BacktestRun {
            name: format!(
                "{}_{}_{}",
                strategy.name(),
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            pair: pair.to_string(),
            timeframe,
            strategy: strategy.name().to_string(),
            start,
            end,
            parameters: strategy.parameters(params),
        }
    }
}

/// Run the state machine over `bars`. BUY while long and SELL while flat are
/// ignored. An equity point is recorded for every bar, after any fill on it.
/// A position still open at the end is only marked to market.
pub fn simulate(bars: &[Bar], signals: &SignalColumn, config: &BacktestConfig) -> Portfolio {
    let mut portfolio = Portfolio::new(config.initial_balance);

    for (i, bar) in bars.iter().enumerate() {
        match signals.signal_type(i) {
            Some(SignalType::Buy) => {
                if !portfolio.enter_long(bar, config.commission) {
                    tracing::trace!(bar = i, "buy ignored while long");
                }
            }
            Some(SignalType::Sell) => {
                if !portfolio.exit_long(bar, config.commission) {
                    tracing::trace!(bar = i, "sell ignored while flat");
                }
            }
            None => {}
        }
        portfolio.record_equity(bar);
    }
    portfolio
}

/// Indicators then strategy decisions for the whole series.
pub fn generate_signals(
    series: &Series,
    strategy: &StrategyKind,
    params: &IndicatorParams,
) -> SignalColumn {
    let frame = IndicatorFrame::compute(series, params);
    strategy.generate(&frame)
}

pub fn run_backtest(
    series: &Series,
    strategy: &StrategyKind,
    params: &IndicatorParams,
    config: &BacktestConfig,
) -> Result<BacktestResult, SignaltraderError> {
    let minimum = strategy.required_bars(params);
    if series.is_empty() || series.len() < minimum {
        return Err(SignaltraderError::InsufficientData {
            pair: series.pair.clone(),
            bars: series.len(),
            minimum,
        });
    }

    let column = generate_signals(series, strategy, params);
    let portfolio = simulate(series.bars(), &column, config);

    let final_balance = portfolio
        .equity_curve
        .last()
        .map_or(portfolio.cash, |p| p.equity);
    let total_return = if config.initial_balance > 0.0 {
        (final_balance - config.initial_balance) / config.initial_balance * 100.0
    } else {
        0.0
    };
    let total_trades = portfolio
        .trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .count();
    let metrics = Metrics::compute(&portfolio.trades, &portfolio.equity_curve, config.commission);

    tracing::info!(
        pair = %series.pair,
        strategy = strategy.name(),
        bars = series.len(),
        signals = column.count(),
        trades = total_trades,
        total_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        initial_balance: config.initial_balance,
        final_balance,
        total_return,
        total_trades,
        signals: column.to_signals(series.bars()),
        trades: portfolio.trades,
        equity_curve: portfolio.equity_curve,
        metrics,
    })
}
