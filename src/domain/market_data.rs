//! Market data access: paginated history fetch and the store-first lookup.

use chrono::{DateTime, Utc};

use super::error::SignaltraderError;
use super::ohlcv::RawBar;
use super::series::{Pair, Series, Timeframe};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::store_port::StorePort;

/// Fetch history from `since` onward, one page at a time. Each follow-up
/// request starts at the last timestamp already received, so the boundary
/// bar comes back twice and is dropped when the series is built.
///
/// Paging stops on a short page, or once a page reaches `until`. Rows past
/// `until` in that last page are kept; callers clip with [`Series::window`].
pub fn fetch_history(
    source: &dyn MarketDataPort,
    pair: &Pair,
    timeframe: Timeframe,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    page_limit: usize,
) -> Result<Series, SignaltraderError> {
    let page_limit = page_limit.max(1);
    let mut rows: Vec<RawBar> = Vec::new();
    let mut cursor = since;
    let mut pages = 0usize;

    loop {
        let page = source.fetch_bars(pair, timeframe, cursor, page_limit)?;
        pages += 1;
        let full = page.len() >= page_limit;
        let last = page
            .last()
            .and_then(|r| DateTime::<Utc>::from_timestamp_millis(r.timestamp_ms));
        rows.extend(page);

        let reached_end = matches!((last, until), (Some(l), Some(u)) if l >= u);
        match last {
            Some(next) if full && !reached_end && Some(next) != cursor => cursor = Some(next),
            _ => break,
        }
    }

    let series = Series::from_unsorted(&pair.symbol, timeframe, &rows);
    tracing::debug!(
        pair = %pair,
        %timeframe,
        pages,
        bars = series.len(),
        gaps = series.gap_count(),
        "history fetched"
    );
    Ok(series)
}

/// Serve from the store when it has the window, otherwise from the source.
///
/// - pair unknown to the store: fetched, returned, not persisted
/// - known with stored bars in the window: the stored bars
/// - known with nothing stored: fetched, persisted, returned
pub fn get_or_fetch(
    store: &dyn StorePort,
    source: &dyn MarketDataPort,
    pair: &Pair,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page_limit: usize,
) -> Result<Series, SignaltraderError> {
    let Some(known) = store.find_pair(&pair.symbol)? else {
        tracing::warn!(pair = %pair, "pair not registered; fetched bars will not be stored");
        let fetched = fetch_history(source, pair, timeframe, Some(start), Some(end), page_limit)?;
        return Ok(fetched.window(start, end));
    };

    let stored = store.load_series(&known, timeframe, start, end)?;
    if !stored.is_empty() {
        tracing::debug!(pair = %known, bars = stored.len(), "serving stored bars");
        return Ok(stored);
    }

    let fetched = fetch_history(source, &known, timeframe, Some(start), Some(end), page_limit)?
        .window(start, end);
    if !fetched.is_empty() {
        let inserted = store.save_bars(&known, timeframe, fetched.bars())?;
        tracing::info!(pair = %known, %timeframe, inserted, "stored fetched bars");
    }
    Ok(fetched)
}
