//! Backtest result sink port.

use crate::domain::backtest::{BacktestResult, BacktestRun};
use crate::domain::error::SignaltraderError;

pub trait ResultPort {
    /// Every call stores a new record and returns its id.
    fn save_result(
        &self,
        run: &BacktestRun,
        result: &BacktestResult,
    ) -> Result<i64, SignaltraderError>;
}
