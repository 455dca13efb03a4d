//! Replay of stored signals. Each signal lands on the bar with the nearest
//! timestamp, provided the gap is within the tolerance. When two signals map
//! to the same bar the earlier one wins.

use chrono::{DateTime, Duration, Utc};

use crate::domain::ohlcv::Bar;
use crate::domain::signal::{Signal, SignalColumn};

fn nearest_bar(bars: &[Bar], timestamp: DateTime<Utc>) -> Option<(usize, Duration)> {
    let idx = bars.partition_point(|b| b.timestamp < timestamp);
    let before = idx.checked_sub(1).map(|i| (i, timestamp - bars[i].timestamp));
    let after = bars.get(idx).map(|b| (idx, b.timestamp - timestamp));
    match (before, after) {
        (Some(b), Some(a)) => Some(if a.1 < b.1 { a } else { b }),
        (b, a) => b.or(a),
    }
}

pub fn align(bars: &[Bar], signals: &[Signal], tolerance: Duration) -> SignalColumn {
    let mut column = SignalColumn::new(bars.len());
    let mut ordered: Vec<&Signal> = signals.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);

    let mut unmatched = 0usize;
    for signal in ordered {
        match nearest_bar(bars, signal.timestamp) {
            Some((i, gap)) if gap <= tolerance => {
                column.claim(i, signal.signal_type, signal.source, signal.strength);
            }
            _ => unmatched += 1,
        }
    }
    if unmatched > 0 {
        tracing::warn!(
            unmatched,
            total = signals.len(),
            "stored signals with no bar inside tolerance were dropped"
        );
    }
    column
}
