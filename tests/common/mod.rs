#![allow(dead_code)]

use chrono::{DateTime, Utc};
use signaltrader::domain::backtest::{BacktestResult, BacktestRun};
use signaltrader::domain::error::SignaltraderError;
pub use signaltrader::domain::ohlcv::{Bar, RawBar};
pub use signaltrader::domain::series::{Pair, Series, Timeframe};
pub use signaltrader::domain::signal::{Signal, SignalSource, SignalType};
use signaltrader::ports::market_data_port::MarketDataPort;
use signaltrader::ports::result_port::ResultPort;
use signaltrader::ports::store_port::StorePort;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub const BASE_MS: i64 = 1_700_000_000_000;

/// Minute `i` after 2023-11-14T22:13:20Z.
pub fn ts(i: usize) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(BASE_MS + i as i64 * 60_000).unwrap()
}

pub fn raw_bars(closes: &[f64]) -> Vec<RawBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| RawBar {
            timestamp_ms: BASE_MS + i as i64 * 60_000,
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1.0,
        })
        .collect()
}

pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(ts(i), c, c, c, c, 1.0).unwrap())
        .collect()
}

pub fn series_of(closes: &[f64]) -> Series {
    Series::from_bars("ETH/USDT", Timeframe::M1, make_bars(closes)).unwrap()
}

pub fn rising(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

pub fn stored_signal(i: usize, signal_type: SignalType) -> Signal {
    Signal {
        timestamp: ts(i),
        signal_type,
        source: SignalSource::Stored,
        strength: 1.0,
        price: 0.0,
    }
}

pub fn eth() -> Pair {
    Pair::parse("ETH/USDT").unwrap()
}

/// Market data keyed by pair symbol.
pub struct MockMarketData {
    pub data: HashMap<String, Vec<RawBar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, rows: Vec<RawBar>) -> Self {
        self.data.insert(symbol.to_string(), rows);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_bars(
        &self,
        pair: &Pair,
        _timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<RawBar>, SignaltraderError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(&pair.symbol) {
            return Err(SignaltraderError::MarketData {
                reason: reason.clone(),
            });
        }
        let rows = self
            .data
            .get(&pair.symbol)
            .ok_or_else(|| SignaltraderError::UnknownPair {
                pair: pair.symbol.clone(),
            })?;
        let since_ms = since.map(|s| s.timestamp_millis());
        Ok(rows
            .iter()
            .filter(|r| since_ms.is_none_or(|s| r.timestamp_ms >= s))
            .take(limit)
            .copied()
            .collect())
    }
}

/// In-memory store with the same idempotence rules as the SQLite one.
#[derive(Default)]
pub struct MockStore {
    pub pairs: RefCell<Vec<Pair>>,
    pub bars: RefCell<HashMap<(String, Timeframe), Vec<Bar>>>,
    pub signals: RefCell<HashMap<(String, Timeframe), Vec<Signal>>>,
    pub results: RefCell<Vec<(BacktestRun, f64)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(self, symbol: &str) -> Self {
        self.pairs.borrow_mut().push(Pair::parse(symbol).unwrap());
        self
    }

    pub fn with_signals(self, symbol: &str, timeframe: Timeframe, signals: Vec<Signal>) -> Self {
        self.signals
            .borrow_mut()
            .insert((symbol.to_string(), timeframe), signals);
        self
    }

    pub fn bar_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.bars
            .borrow()
            .get(&(symbol.to_string(), timeframe))
            .map_or(0, Vec::len)
    }
}

impl StorePort for MockStore {
    fn find_pair(&self, symbol: &str) -> Result<Option<Pair>, SignaltraderError> {
        Ok(self
            .pairs
            .borrow()
            .iter()
            .find(|p| p.symbol == symbol)
            .cloned())
    }

    fn register_pair(&self, pair: &Pair) -> Result<(), SignaltraderError> {
        let mut pairs = self.pairs.borrow_mut();
        if !pairs.iter().any(|p| p.symbol == pair.symbol) {
            pairs.push(pair.clone());
        }
        Ok(())
    }

    fn load_series(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SignaltraderError> {
        let bars = self
            .bars
            .borrow()
            .get(&(pair.symbol.clone(), timeframe))
            .cloned()
            .unwrap_or_default();
        Ok(Series::from_bars(&pair.symbol, timeframe, bars)?.window(start, end))
    }

    fn save_bars(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<usize, SignaltraderError> {
        let mut all = self.bars.borrow_mut();
        let stored = all.entry((pair.symbol.clone(), timeframe)).or_default();
        let mut inserted = 0;
        for bar in bars {
            if !stored.iter().any(|b| b.timestamp == bar.timestamp) {
                stored.push(bar.clone());
                inserted += 1;
            }
        }
        stored.sort_by_key(|b| b.timestamp);
        Ok(inserted)
    }

    fn save_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        signals: &[Signal],
    ) -> Result<usize, SignaltraderError> {
        let mut all = self.signals.borrow_mut();
        let stored = all.entry((pair.symbol.clone(), timeframe)).or_default();
        let mut inserted = 0;
        for signal in signals {
            if !stored.iter().any(|s| s.timestamp == signal.timestamp) {
                stored.push(signal.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn load_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Signal>, SignaltraderError> {
        let mut signals: Vec<Signal> = self
            .signals
            .borrow()
            .get(&(pair.symbol.clone(), timeframe))
            .map(|s| {
                s.iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        signals.sort_by_key(|s| s.timestamp);
        Ok(signals)
    }
}

impl ResultPort for MockStore {
    fn save_result(
        &self,
        run: &BacktestRun,
        result: &BacktestResult,
    ) -> Result<i64, SignaltraderError> {
        let mut results = self.results.borrow_mut();
        results.push((run.clone(), result.final_balance));
        Ok(results.len() as i64)
    }
}
