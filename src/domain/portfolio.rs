//! Portfolio state for a single-asset, long-only backtest.
//!
//! The portfolio is either FLAT (all cash) or LONG (all cash converted into
//! base-asset units). It is built fresh for every run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("BUY"),
            TradeAction::Sell => f.write_str("SELL"),
        }
    }
}

/// One fill. `price` is the bar close, `execution_price` the close adjusted
/// by commission. For a BUY `balance` is the cash committed; for a SELL it is
/// the cash received, with `pnl` measured against the matching BUY's balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub price: f64,
    pub execution_price: f64,
    pub size: f64,
    pub balance: f64,
    pub pnl: Option<f64>,
    pub pnl_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub in_position: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Long { size: f64, balance_before: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_balance: f64,
    pub state: PositionState,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_balance: f64) -> Self {
        Portfolio {
            cash: initial_balance,
            initial_balance,
            state: PositionState::Flat,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self.state, PositionState::Long { .. })
    }

    pub fn position_size(&self) -> f64 {
        match self.state {
            PositionState::Flat => 0.0,
            PositionState::Long { size, .. } => size,
        }
    }

    /// Cash plus the open position marked at `close`.
    pub fn equity(&self, close: f64) -> f64 {
        self.cash + self.position_size() * close
    }

    /// FLAT -> LONG with all cash. Returns false (and does nothing) when
    /// already long.
    pub fn enter_long(&mut self, bar: &Bar, commission: f64) -> bool {
        if self.is_long() {
            return false;
        }
        let execution_price = bar.close * (1.0 + commission);
        let balance_before = self.cash;
        let size = balance_before / execution_price;

        self.cash = 0.0;
        self.state = PositionState::Long {
            size,
            balance_before,
        };
        self.trades.push(Trade {
            timestamp: bar.timestamp,
            action: TradeAction::Buy,
            price: bar.close,
            execution_price,
            size,
            balance: balance_before,
            pnl: None,
            pnl_pct: None,
        });
        true
    }

    /// LONG -> FLAT, selling the whole position. Returns false (and does
    /// nothing) when flat.
    pub fn exit_long(&mut self, bar: &Bar, commission: f64) -> bool {
        let PositionState::Long {
            size,
            balance_before,
        } = self.state
        else {
            return false;
        };
        let execution_price = bar.close * (1.0 - commission);
        self.cash = size * execution_price;
        self.state = PositionState::Flat;

        let pnl = self.cash - balance_before;
        let pnl_pct = if balance_before > 0.0 {
            pnl / balance_before * 100.0
        } else {
            0.0
        };
        self.trades.push(Trade {
            timestamp: bar.timestamp,
            action: TradeAction::Sell,
            price: bar.close,
            execution_price,
            size,
            balance: self.cash,
            pnl: Some(pnl),
            pnl_pct: Some(pnl_pct),
        });
        true
    }

    pub fn record_equity(&mut self, bar: &Bar) {
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.equity(bar.close),
            in_position: self.is_long(),
        });
    }
}
