//! CLI definition and dispatch.

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    generate_signals, run_backtest, BacktestConfig, BacktestResult, BacktestRun,
};
use crate::domain::config_validation::{
    backtest_pair, backtest_timeframe, backtest_window, integer, number, strategy_kind,
    validate_all,
};
use crate::domain::error::SignaltraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::market_data::{fetch_history, get_or_fetch};
use crate::domain::series::{Pair, Series, Timeframe};
use crate::domain::signal::{Signal, SignalSummary};
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::result_port::ResultPort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "signaltrader", about = "Indicator signals and long-only backtests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and store its result
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [strategy] name
        #[arg(short, long)]
        strategy: Option<String>,
        /// Overrides [backtest] pair
        #[arg(long)]
        pair: Option<String>,
        /// Also write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate signals for the configured window
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(long)]
        pair: Option<String>,
        /// Persist the signals to the store
        #[arg(long)]
        save: bool,
    },
    /// Load CSV exports into the store
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        /// Every pair with a CSV file when omitted
        #[arg(long)]
        pair: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Anything that can hold bars, signals and backtest results.
pub trait Store: StorePort + ResultPort {
    fn as_store_port(&self) -> &dyn StorePort;
}

impl<T: StorePort + ResultPort> Store for T {
    fn as_store_port(&self) -> &dyn StorePort {
        self
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            strategy,
            pair,
            output,
        } => run_backtest_command(&config, strategy.as_deref(), pair.as_deref(), output.as_ref()),
        Command::Signals {
            config,
            strategy,
            pair,
            save,
        } => run_signals_command(&config, strategy.as_deref(), pair.as_deref(), save),
        Command::Ingest { config, pair } => run_ingest_command(&config, pair.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SignaltraderError> {
    if !path.is_file() {
        return Err(SignaltraderError::ConfigParse {
            file: path.display().to_string(),
            reason: "no such file".into(),
        });
    }
    FileConfigAdapter::from_file(path)
}

/// Config file plus its validation, shared by every command.
fn load_validated(path: &Path) -> Result<FileConfigAdapter, SignaltraderError> {
    let config = load_config(path)?;
    validate_all(&config)?;
    Ok(config)
}

pub fn build_params(config: &dyn ConfigPort) -> Result<IndicatorParams, SignaltraderError> {
    let defaults = IndicatorParams::default();
    let period = |key: &str, default: usize| -> Result<usize, SignaltraderError> {
        let value = integer(config, "indicators", key, default as i64)?;
        usize::try_from(value).map_err(|_| SignaltraderError::ConfigInvalid {
            section: "indicators".into(),
            key: key.into(),
            reason: format!("{key} must be non-negative"),
        })
    };
    let float = |key: &str, default: f64| number(config, "indicators", key, default);

    Ok(IndicatorParams {
        atr_period: period("atr_period", defaults.atr_period)?,
        atr_multiplier: float("atr_multiplier", defaults.atr_multiplier)?,
        macd_short: period("macd_short", defaults.macd_short)?,
        macd_long: period("macd_long", defaults.macd_long)?,
        macd_signal: period("macd_signal", defaults.macd_signal)?,
        bb_window: period("bb_window", defaults.bb_window)?,
        bb_std: float("bb_std", defaults.bb_std)?,
        tenkan: period("tenkan", defaults.tenkan)?,
        kijun: period("kijun", defaults.kijun)?,
        senkou: period("senkou", defaults.senkou)?,
        rsi_period: period("rsi_period", defaults.rsi_period)?,
        rsi_overbought: float("rsi_overbought", defaults.rsi_overbought)?,
        rsi_oversold: float("rsi_oversold", defaults.rsi_oversold)?,
        donchian_window: period("donchian_window", defaults.donchian_window)?,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SignaltraderError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_balance: number(config, "backtest", "initial_balance", defaults.initial_balance)?,
        commission: number(config, "backtest", "commission", defaults.commission)?,
    })
}

/// What a command runs over: pair, timeframe and inclusive window.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTarget {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn build_target(
    config: &dyn ConfigPort,
    pair_override: Option<&str>,
) -> Result<RunTarget, SignaltraderError> {
    let pair = match pair_override {
        Some(symbol) => Pair::parse(symbol).ok_or_else(|| SignaltraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "pair".into(),
            reason: format!("invalid pair '{symbol}', expected BASE/QUOTE"),
        })?,
        None => backtest_pair(config)?,
    };
    let (start, end) = backtest_window(config)?;
    Ok(RunTarget {
        pair,
        timeframe: backtest_timeframe(config)?,
        start,
        end,
    })
}

/// Series for the target window: through the store when there is one,
/// straight from the source otherwise.
pub fn load_target_series(
    store: Option<&dyn StorePort>,
    source: &dyn MarketDataPort,
    target: &RunTarget,
    page_limit: usize,
) -> Result<Series, SignaltraderError> {
    match store {
        Some(store) => get_or_fetch(
            store,
            source,
            &target.pair,
            target.timeframe,
            target.start,
            target.end,
            page_limit,
        ),
        None => Ok(fetch_history(
            source,
            &target.pair,
            target.timeframe,
            Some(target.start),
            Some(target.end),
            page_limit,
        )?
        .window(target.start, target.end)),
    }
}

/// The strategy to run. Stored signals are only available for pairs the
/// store knows.
pub fn resolve_strategy(
    config: &dyn ConfigPort,
    name_override: Option<&str>,
    store: Option<&dyn StorePort>,
    target: &RunTarget,
) -> Result<StrategyKind, SignaltraderError> {
    let kind = match name_override {
        Some("signal-based") => None,
        Some(name) => Some(name.parse::<StrategyKind>()?),
        None => strategy_kind(config)?,
    };
    if let Some(kind) = kind {
        return Ok(kind);
    }

    let store = store.ok_or_else(|| SignaltraderError::ConfigMissing {
        section: "sqlite".into(),
        key: "path".into(),
    })?;
    let pair = store
        .find_pair(&target.pair.symbol)?
        .ok_or_else(|| SignaltraderError::UnknownPair {
            pair: target.pair.symbol.clone(),
        })?;
    let signals = store.load_signals(&pair, target.timeframe, target.start, target.end)?;
    let tolerance = integer(config, "strategy", "signal_tolerance_secs", 300)?.max(0);

    tracing::debug!(pair = %pair, signals = signals.len(), "loaded stored signals");
    Ok(StrategyKind::SignalBased {
        signals,
        tolerance: Duration::seconds(tolerance),
    })
}

#[derive(Debug)]
pub struct BacktestOutcome {
    pub run: BacktestRun,
    pub result: BacktestResult,
    pub result_id: Option<i64>,
}

/// Full pipeline: series, strategy, simulation, metrics, and the result
/// record when a store is present.
pub fn run_backtest_pipeline(
    config: &dyn ConfigPort,
    store: Option<&dyn Store>,
    source: &dyn MarketDataPort,
    strategy_override: Option<&str>,
    pair_override: Option<&str>,
) -> Result<BacktestOutcome, SignaltraderError> {
    let target = build_target(config, pair_override)?;
    let params = build_params(config)?;
    let bt_config = build_backtest_config(config)?;
    let page_limit = page_limit(config)?;

    let store_port = store.map(|s| s.as_store_port());
    let strategy = resolve_strategy(config, strategy_override, store_port, &target)?;
    let series = load_target_series(store_port, source, &target, page_limit)?;

    eprintln!(
        "Running backtest: {} {} {}, {} to {}",
        strategy,
        target.pair,
        target.timeframe,
        target.start.format("%Y-%m-%d"),
        target.end.format("%Y-%m-%d"),
    );
    eprintln!("  Processing: {} bars", series.len());

    let result = run_backtest(&series, &strategy, &params, &bt_config)?;
    let run = BacktestRun::new(
        &target.pair.symbol,
        target.timeframe,
        &strategy,
        &params,
        target.start,
        target.end,
    );

    let result_id = match store {
        Some(store) => Some(store.save_result(&run, &result)?),
        None => None,
    };

    Ok(BacktestOutcome {
        run,
        result,
        result_id,
    })
}

fn page_limit(config: &dyn ConfigPort) -> Result<usize, SignaltraderError> {
    Ok(integer(config, "data", "page_limit", 1000)?.max(1) as usize)
}

fn csv_source(config: &dyn ConfigPort) -> CsvAdapter {
    let dir = config
        .get_string("data", "csv_dir")
        .unwrap_or_else(|| "data".to_string());
    CsvAdapter::new(PathBuf::from(dir))
}

/// The configured store, if `[sqlite] path` is set.
#[cfg(feature = "sqlite")]
pub fn open_store(config: &dyn ConfigPort) -> Result<Option<Box<dyn Store>>, SignaltraderError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    if config.get_string("sqlite", "path").is_none() {
        return Ok(None);
    }
    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Some(Box::new(adapter)))
}

#[cfg(not(feature = "sqlite"))]
pub fn open_store(config: &dyn ConfigPort) -> Result<Option<Box<dyn Store>>, SignaltraderError> {
    if config.get_string("sqlite", "path").is_some() {
        tracing::warn!("built without the sqlite feature; [sqlite] path ignored");
    }
    Ok(None)
}

pub fn print_summary(outcome: &BacktestOutcome) {
    let result = &outcome.result;
    let metrics = &result.metrics;

    eprintln!("\n=== Results: {} ===", outcome.run.name);
    eprintln!("Initial Balance:  {:.2}", result.initial_balance);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Total Return:     {:.2}%", result.total_return);
    eprintln!("Total Trades:     {}", result.total_trades);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Max Drawdown:     {:.2}%", metrics.max_drawdown);
    eprintln!("Win Rate:         {:.2}%", metrics.win_rate);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!(
        "Avg/Best/Worst:   {:.2}% / {:.2}% / {:.2}%",
        metrics.avg_trade, metrics.best_trade, metrics.worst_trade
    );
    eprintln!("Total Fees:       {:.2}", metrics.total_fees);
    if result.position_open() {
        eprintln!("  (position still open, marked to market)");
    }
    if let Some(id) = outcome.result_id {
        eprintln!("\nResult stored with id {id}");
    }
}

fn run_backtest_command(
    config_path: &Path,
    strategy: Option<&str>,
    pair: Option<&str>,
    output_path: Option<&PathBuf>,
) -> Result<(), SignaltraderError> {
    let config = load_validated(config_path)?;
    let store = open_store(&config)?;
    let source = csv_source(&config);

    let outcome = run_backtest_pipeline(&config, store.as_deref(), &source, strategy, pair)?;
    print_summary(&outcome);

    if let Some(path) = output_path {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &outcome.result).map_err(io::Error::from)?;
        eprintln!("Result written to: {}", path.display());
    }
    Ok(())
}

/// Signals for the target window, without simulating.
pub fn signals_for_target(
    config: &dyn ConfigPort,
    store: Option<&dyn StorePort>,
    source: &dyn MarketDataPort,
    strategy_override: Option<&str>,
    target: &RunTarget,
) -> Result<Vec<Signal>, SignaltraderError> {
    let params = build_params(config)?;
    let strategy = resolve_strategy(config, strategy_override, store, target)?;
    let series = load_target_series(store, source, target, page_limit(config)?)?;
    let column = generate_signals(&series, &strategy, &params);
    Ok(column.to_signals(series.bars()))
}

fn run_signals_command(
    config_path: &Path,
    strategy: Option<&str>,
    pair: Option<&str>,
    save: bool,
) -> Result<(), SignaltraderError> {
    let config = load_validated(config_path)?;
    let store = open_store(&config)?;
    let store_port = store.as_deref().map(|s| s.as_store_port());
    let source = csv_source(&config);
    let target = build_target(&config, pair)?;

    let signals = signals_for_target(&config, store_port, &source, strategy, &target)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for signal in &signals {
        let line = serde_json::to_string(signal).map_err(io::Error::from)?;
        writeln!(out, "{line}")?;
    }

    let summary = SignalSummary::from_signals(&signals);
    eprintln!(
        "{} signals: {} buys, {} sells, mean strength {:.2}, mean price {:.2}",
        summary.total, summary.buys, summary.sells, summary.mean_strength, summary.mean_price
    );

    if save {
        let store = store_port.ok_or_else(|| SignaltraderError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })?;
        store.register_pair(&target.pair)?;
        let inserted = store.save_signals(&target.pair, target.timeframe, &signals)?;
        eprintln!("Stored {inserted} new signals");
    }
    Ok(())
}

/// Register each pair and store its full CSV history. Returns the number of
/// bars inserted per pair.
pub fn ingest(
    store: &dyn StorePort,
    source: &dyn MarketDataPort,
    pairs: &[Pair],
    timeframe: Timeframe,
    page_limit: usize,
) -> Result<Vec<(Pair, usize)>, SignaltraderError> {
    let mut inserted = Vec::with_capacity(pairs.len());
    for pair in pairs {
        store.register_pair(pair)?;
        let series = fetch_history(source, pair, timeframe, None, None, page_limit)?;
        let count = store.save_bars(pair, timeframe, series.bars())?;
        tracing::info!(
            pair = %pair,
            %timeframe,
            fetched = series.len(),
            gaps = series.gap_count(),
            inserted = count,
            "ingested"
        );
        inserted.push((pair.clone(), count));
    }
    Ok(inserted)
}

/// Pairs to ingest: the one named on the command line, otherwise every CSV
/// export for the timeframe. `[data] exchange` is recorded on each.
pub fn ingest_pairs(
    config: &dyn ConfigPort,
    source: &CsvAdapter,
    pair: Option<&str>,
    timeframe: Timeframe,
) -> Result<Vec<Pair>, SignaltraderError> {
    let pairs = match pair {
        Some(symbol) => vec![Pair::parse(symbol).ok_or_else(|| SignaltraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "pair".into(),
            reason: format!("invalid pair '{symbol}', expected BASE/QUOTE"),
        })?],
        None => source.list_pairs(timeframe)?,
    };
    Ok(match config.get_string("data", "exchange") {
        Some(exchange) => pairs
            .into_iter()
            .map(|p| p.with_exchange(&exchange))
            .collect(),
        None => pairs,
    })
}

fn run_ingest_command(config_path: &Path, pair: Option<&str>) -> Result<(), SignaltraderError> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?.ok_or_else(|| SignaltraderError::ConfigMissing {
        section: "sqlite".into(),
        key: "path".into(),
    })?;
    let source = csv_source(&config);
    let timeframe = backtest_timeframe(&config)?;

    let pairs = ingest_pairs(&config, &source, pair, timeframe)?;

    for (pair, count) in ingest(store.as_store_port(), &source, &pairs, timeframe, page_limit(&config)?)? {
        eprintln!("  {pair}: {count} new bars");
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SignaltraderError> {
    let config = load_validated(config_path)?;
    let target = build_target(&config, None)?;
    let strategy = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "supertrend".to_string());

    eprintln!("Configuration OK");
    eprintln!("  Pair:      {} ({})", target.pair, target.timeframe);
    eprintln!(
        "  Window:    {} to {}",
        target.start.to_rfc3339(),
        target.end.to_rfc3339()
    );
    eprintln!("  Strategy:  {strategy}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn build_params_defaults() {
        let params = build_params(&make_config("[indicators]\n")).unwrap();
        assert_eq!(params, IndicatorParams::default());
    }

    #[test]
    fn build_params_overrides() {
        let config = make_config("[indicators]\nrsi_period = 10\nbb_std = 1.5\nkijun = 30\n");
        let params = build_params(&config).unwrap();
        assert_eq!(params.rsi_period, 10);
        assert!((params.bb_std - 1.5).abs() < f64::EPSILON);
        assert_eq!(params.kijun, 30);
        assert_eq!(params.tenkan, 9);
    }

    #[test]
    fn build_params_rejects_negative_period() {
        let config = make_config("[indicators]\natr_period = -3\n");
        assert!(matches!(
            build_params(&config),
            Err(SignaltraderError::ConfigInvalid { key, .. }) if key == "atr_period"
        ));
    }

    #[test]
    fn build_backtest_config_reads_values() {
        let config = make_config("[backtest]\ninitial_balance = 2500\ncommission = 0.002\n");
        let bt = build_backtest_config(&config).unwrap();
        assert!((bt.initial_balance - 2500.0).abs() < f64::EPSILON);
        assert!((bt.commission - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn build_backtest_config_defaults() {
        let bt = build_backtest_config(&make_config("[backtest]\n")).unwrap();
        assert_eq!(bt, BacktestConfig::default());
    }

    #[test]
    fn build_target_with_override() {
        let config = make_config(
            "[backtest]\npair = ETH/USDT\ntimeframe = 1h\nstart = 2024-01-01\nend = 2024-02-01\n",
        );
        let target = build_target(&config, Some("btc/usdt")).unwrap();
        assert_eq!(target.pair.symbol, "BTC/USDT");
        assert_eq!(target.timeframe, Timeframe::H1);
        assert!(build_target(&config, Some("BTCUSDT")).is_err());
    }

    #[test]
    fn resolve_strategy_by_name() {
        let config = make_config("[strategy]\nname = rsi\n");
        let target = RunTarget {
            pair: Pair::parse("ETH/USDT").unwrap(),
            timeframe: Timeframe::M1,
            start: Utc::now() - Duration::days(1),
            end: Utc::now(),
        };
        assert_eq!(
            resolve_strategy(&config, None, None, &target).unwrap(),
            StrategyKind::RsiComposite
        );
        assert_eq!(
            resolve_strategy(&config, Some("ichimoku"), None, &target).unwrap(),
            StrategyKind::IchimokuComposite
        );
    }

    #[test]
    fn signal_based_needs_a_store() {
        let config = make_config("[strategy]\nname = signal-based\n");
        let target = RunTarget {
            pair: Pair::parse("ETH/USDT").unwrap(),
            timeframe: Timeframe::M1,
            start: Utc::now() - Duration::days(1),
            end: Utc::now(),
        };
        let err = resolve_strategy(&config, None, None, &target).unwrap_err();
        assert!(matches!(err, SignaltraderError::ConfigMissing { section, .. } if section == "sqlite"));
    }

    #[test]
    fn load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/signaltrader.ini")).unwrap_err();
        assert!(matches!(err, SignaltraderError::ConfigParse { .. }));
    }
}
