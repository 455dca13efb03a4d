//! Performance metrics over a finished backtest.
//!
//! Trade statistics are per round trip: the k-th BUY is paired with the k-th
//! SELL, and an open position left at the end has no pair. Returns are in
//! percent. Nothing is rounded here.

use serde::{Serialize, Serializer};

use super::portfolio::{EquityPoint, Trade, TradeAction};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Infinite with winners and no losers; serialized as `"inf"`.
    #[serde(serialize_with = "serialize_unbounded")]
    pub profit_factor: f64,
    pub avg_trade: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub total_fees: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_wins: usize,
    pub total_losses: usize,
}

impl Metrics {
    /// All zero when no trade was made.
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], commission: f64) -> Self {
        if trades.is_empty() {
            return Metrics::default();
        }

        let buys = trades.iter().filter(|t| t.action == TradeAction::Buy);
        let sells = trades.iter().filter(|t| t.action == TradeAction::Sell);

        let mut returns: Vec<f64> = Vec::new();
        let mut total_fees = 0.0_f64;
        for (buy, sell) in buys.zip(sells) {
            let entry = buy.execution_price;
            returns.push((sell.execution_price - entry) / entry * 100.0);
            total_fees += buy.price * buy.size * commission + sell.price * sell.size * commission;
        }

        let wins: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|&r| r <= 0.0).collect();
        let gross_win: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Metrics {
            sharpe_ratio: sharpe_ratio(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: ratio(wins.len() as f64, returns.len()) * 100.0,
            profit_factor,
            avg_trade: mean(&returns),
            best_trade: returns.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_trade: returns.iter().copied().reduce(f64::min).unwrap_or(0.0),
            total_fees,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            total_wins: wins.len(),
            total_losses: losses.len(),
        }
    }
}

/// JSON has no infinity, and serde_json would write it as `null`.
fn serialize_unbounded<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match *value {
        v if v.is_finite() => serializer.serialize_f64(v),
        v if v.is_nan() => serializer.serialize_str("NaN"),
        v if v > 0.0 => serializer.serialize_str("inf"),
        _ => serializer.serialize_str("-inf"),
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len())
}

/// Bar-to-bar percent change of equity; the first bar has none.
pub fn equity_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// mean / sample std of the bar returns, scaled by sqrt(252). Zero when the
/// deviation is zero or undefined.
pub fn sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
    let returns = equity_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Deepest fall from the running peak, in percent (zero or negative).
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut deepest = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            deepest = deepest.min((point.equity - peak) / peak);
        }
    }
    deepest * 100.0
}
