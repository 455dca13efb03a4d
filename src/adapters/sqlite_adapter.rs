//! SQLite store and result sink.

use crate::domain::backtest::{BacktestResult, BacktestRun};
use crate::domain::config_validation::integer;
use crate::domain::error::SignaltraderError;
use crate::domain::ohlcv::{Bar, RawBar};
use crate::domain::series::{Pair, Series, Timeframe};
use crate::domain::signal::{Signal, SignalSource, SignalType};
use crate::ports::config_port::ConfigPort;
use crate::ports::result_port::ResultPort;
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> SignaltraderError {
    SignaltraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> SignaltraderError {
    SignaltraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// A stored row that no longer parses is a database problem, not bad input.
fn stored_value_err(e: SignaltraderError) -> SignaltraderError {
    SignaltraderError::DatabaseQuery {
        reason: format!("stored {e}"),
    }
}

fn json_err(e: serde_json::Error) -> SignaltraderError {
    SignaltraderError::DatabaseQuery {
        reason: format!("encoding result: {e}"),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SignaltraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SignaltraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = u32::try_from(integer(config, "sqlite", "pool_size", 4)?.max(1))
            .unwrap_or(u32::MAX);

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        tracing::debug!(path = %db_path, pool_size, "sqlite pool ready");
        Ok(Self { pool })
    }

    /// One connection, so every caller sees the same in-memory database.
    pub fn in_memory() -> Result<Self, SignaltraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SignaltraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SignaltraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pairs (
                symbol TEXT PRIMARY KEY,
                base TEXT NOT NULL,
                quote TEXT NOT NULL,
                exchange TEXT
            );
            CREATE TABLE IF NOT EXISTS ohlcv (
                pair TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (pair, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS signals (
                pair TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                signal_type TEXT NOT NULL,
                source TEXT NOT NULL,
                strength REAL NOT NULL,
                price REAL NOT NULL,
                PRIMARY KEY (pair, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS backtest_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                pair TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                strategy TEXT NOT NULL,
                start_ts INTEGER NOT NULL,
                end_ts INTEGER NOT NULL,
                parameters TEXT NOT NULL,
                initial_balance REAL NOT NULL,
                final_balance REAL NOT NULL,
                total_return REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                metrics TEXT NOT NULL,
                trades TEXT NOT NULL,
                equity_curve TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_results_pair ON backtest_results(pair, strategy);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn count_results(&self) -> Result<usize, SignaltraderError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM backtest_results", [], |row| row.get(0))
            .map_err(query_err)?;
        Ok(count as usize)
    }
}

impl StorePort for SqliteAdapter {
    fn find_pair(&self, symbol: &str) -> Result<Option<Pair>, SignaltraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT symbol, base, quote, exchange FROM pairs WHERE symbol = ?1",
            params![symbol],
            |row| {
                Ok(Pair {
                    symbol: row.get(0)?,
                    base: row.get(1)?,
                    quote: row.get(2)?,
                    exchange: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn register_pair(&self, pair: &Pair) -> Result<(), SignaltraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO pairs (symbol, base, quote, exchange) VALUES (?1, ?2, ?3, ?4)",
            params![pair.symbol, pair.base, pair.quote, pair.exchange],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn load_series(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Series, SignaltraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume
                 FROM ohlcv
                 WHERE pair = ?1 AND timeframe = ?2 AND timestamp >= ?3 AND timestamp <= ?4
                 ORDER BY timestamp ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    pair.symbol,
                    timeframe.as_str(),
                    start.timestamp_millis(),
                    end.timestamp_millis()
                ],
                |row| {
                    Ok(RawBar {
                        timestamp_ms: row.get(0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_err)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row.map_err(query_err)?);
        }

        Ok(Series::from_unsorted(&pair.symbol, timeframe, &raw))
    }

    fn save_bars(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<usize, SignaltraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        for bar in bars {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO ohlcv (pair, timeframe, timestamp, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        pair.symbol,
                        timeframe.as_str(),
                        bar.timestamp.timestamp_millis(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    fn save_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        signals: &[Signal],
    ) -> Result<usize, SignaltraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut inserted = 0;
        for signal in signals {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO signals (pair, timeframe, timestamp, signal_type, source, strength, price)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        pair.symbol,
                        timeframe.as_str(),
                        signal.timestamp.timestamp_millis(),
                        signal.signal_type.as_str(),
                        signal.source.as_str(),
                        signal.strength,
                        signal.price
                    ],
                )
                .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(inserted)
    }

    fn load_signals(
        &self,
        pair: &Pair,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Signal>, SignaltraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, signal_type, source, strength, price
                 FROM signals
                 WHERE pair = ?1 AND timeframe = ?2 AND timestamp >= ?3 AND timestamp <= ?4
                 ORDER BY timestamp ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    pair.symbol,
                    timeframe.as_str(),
                    start.timestamp_millis(),
                    end.timestamp_millis()
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )
            .map_err(query_err)?;

        let mut signals = Vec::new();
        for row in rows {
            let (timestamp_ms, signal_type, source, strength, price) = row.map_err(query_err)?;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
                SignaltraderError::DatabaseQuery {
                    reason: format!("stored signal timestamp {timestamp_ms} out of range"),
                }
            })?;
            signals.push(Signal {
                timestamp,
                signal_type: signal_type.parse::<SignalType>().map_err(stored_value_err)?,
                source: source.parse::<SignalSource>().map_err(stored_value_err)?,
                strength,
                price,
            });
        }

        Ok(signals)
    }
}

impl ResultPort for SqliteAdapter {
    fn save_result(
        &self,
        run: &BacktestRun,
        result: &BacktestResult,
    ) -> Result<i64, SignaltraderError> {
        let parameters = serde_json::to_string(&run.parameters).map_err(json_err)?;
        let metrics = serde_json::to_string(&result.metrics).map_err(json_err)?;
        let trades = serde_json::to_string(&result.trades).map_err(json_err)?;
        let equity_curve = serde_json::to_string(&result.equity_curve).map_err(json_err)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO backtest_results (
                name, pair, timeframe, strategy, start_ts, end_ts, parameters,
                initial_balance, final_balance, total_return, total_trades,
                metrics, trades, equity_curve, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                run.name,
                run.pair,
                run.timeframe.as_str(),
                run.strategy,
                run.start.timestamp_millis(),
                run.end.timestamp_millis(),
                parameters,
                result.initial_balance,
                result.final_balance,
                result.total_return,
                result.total_trades as i64,
                metrics,
                trades,
                equity_curve,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(query_err)?;

        let id = conn.last_insert_rowid();
        tracing::info!(id, name = %run.name, "backtest result stored");
        Ok(id)
    }
}
