//! Exchange data source port.

use chrono::{DateTime, Utc};

use crate::domain::error::SignaltraderError;
use crate::domain::ohlcv::RawBar;
use crate::domain::series::{Pair, Timeframe};

pub trait MarketDataPort {
    /// Up to `limit` rows starting at `since` (inclusive), oldest first.
    /// Fewer rows than `limit` means the end of available history. Errors
    /// are not retried by callers.
    fn fetch_bars(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<RawBar>, SignaltraderError>;
}
