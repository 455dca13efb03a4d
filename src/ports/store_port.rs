//! Bar, signal and pair store port.

use chrono::{DateTime, Utc};

use crate::domain::error::SignaltraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::series::{Pair, Series, Timeframe};
use crate::domain::signal::Signal;

/// Writes are idempotent on (pair, timeframe, timestamp): saving the same
/// batch twice leaves one row per key. Windows are inclusive on both ends.
pub trait StorePort {
    /// `None` when the pair was never registered.
    fn find_pair(&self, symbol: &str) -> Result<Option<Pair>, SignaltraderError>;

    fn register_pair(&self, pair: &Pair) -> Result<(), SignaltraderError>;

    fn load_series(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SignaltraderError>;

    /// Returns the number of rows actually inserted.
    fn save_bars(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<usize, SignaltraderError>;

    fn save_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        signals: &[Signal],
    ) -> Result<usize, SignaltraderError>;

    /// Ordered by timestamp.
    fn load_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Signal>, SignaltraderError>;
}
