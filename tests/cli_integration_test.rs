//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Argument parsing for every subcommand
//! - Loading and validating INI files on disk
//! - Backtest and signal generation over CSV exports in a temp directory
//! - Ingesting CSV exports into a store, idempotently
//! - End-to-end through a SQLite file store

mod common;

use chrono::{Datelike, Timelike};
use clap::Parser;
use common::*;
use signaltrader::adapters::csv_adapter::CsvAdapter;
use signaltrader::cli::{self, Cli, Command};
use signaltrader::domain::config_validation::validate_all;
use signaltrader::domain::error::SignaltraderError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn valid_ini(csv_dir: &Path) -> String {
    format!(
        r#"
[data]
csv_dir = {}
page_limit = 40

[backtest]
pair = ETH/USDT
timeframe = 1m
start = 2023-11-14
end = 2023-11-15
initial_balance = 5000
commission = 0.002

[strategy]
name = supertrend
signal_tolerance_secs = 120

[indicators]
atr_period = 10
atr_multiplier = 2.5
rsi_period = 10
bb_window = 15
"#,
        csv_dir.display()
    )
}

/// Rises, falls, then rises again so trend rules get something to flip on.
fn swing(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 15.0 * (x / 12.0).sin() + x * 0.1
        })
        .collect()
}

fn write_csv(dir: &Path, file: &str, closes: &[f64]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for row in raw_bars(closes) {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            row.timestamp_ms,
            row.open,
            row.high + 0.5,
            row.low - 0.5,
            row.close,
            row.volume
        ));
    }
    fs::write(dir.join(file), content).unwrap();
}

fn csv_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "ETH_USDT_1m.csv", &swing(150));
    write_csv(dir.path(), "BTC_USDT_1m.csv", &rising(90));
    dir
}

mod argument_parsing {
    use super::*;

    #[test]
    fn backtest_with_overrides() {
        let cli = Cli::try_parse_from([
            "signaltrader",
            "backtest",
            "--config",
            "run.ini",
            "--strategy",
            "rsi",
            "--pair",
            "BTC/USDT",
            "-o",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                strategy,
                pair,
                output,
            } => {
                assert_eq!(config, Path::new("run.ini"));
                assert_eq!(strategy.as_deref(), Some("rsi"));
                assert_eq!(pair.as_deref(), Some("BTC/USDT"));
                assert_eq!(output.as_deref(), Some(Path::new("out.json")));
            }
            other => panic!("expected backtest, got {other:?}"),
        }
    }

    #[test]
    fn signals_save_flag() {
        let cli = Cli::try_parse_from(["signaltrader", "signals", "-c", "run.ini", "--save"]).unwrap();
        assert!(matches!(cli.command, Command::Signals { save: true, .. }));
    }

    #[test]
    fn ingest_and_validate() {
        let cli = Cli::try_parse_from(["signaltrader", "ingest", "-c", "run.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Ingest { pair: None, .. }));

        let cli = Cli::try_parse_from(["signaltrader", "validate", "-c", "run.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { .. }));
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["signaltrader", "backtest"]).is_err());
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn loads_and_validates_file() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();
        validate_all(&config).unwrap();

        let params = cli::build_params(&config).unwrap();
        assert_eq!(params.atr_period, 10);
        assert!((params.atr_multiplier - 2.5).abs() < f64::EPSILON);
        assert_eq!(params.bb_window, 15);
        assert_eq!(params.macd_long, 26);

        let bt = cli::build_backtest_config(&config).unwrap();
        assert!((bt.initial_balance - 5000.0).abs() < f64::EPSILON);
        assert!((bt.commission - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn target_window_covers_whole_end_day() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();

        let target = cli::build_target(&config, None).unwrap();
        assert_eq!(target.pair, eth());
        assert_eq!(target.timeframe, Timeframe::M1);
        assert_eq!((target.start.day(), target.start.hour()), (14, 0));
        assert_eq!((target.end.day(), target.end.hour(), target.end.minute()), (15, 23, 59));
    }

    #[test]
    fn invalid_file_fails_validation() {
        let file = write_temp_ini(
            "[backtest]\npair = ETH/USDT\nstart = 2024-01-01\nend = 2024-02-01\n\
             [strategy]\nname = momentum\n",
        );
        let config = cli::load_config(file.path()).unwrap();
        let err = validate_all(&config).unwrap_err();
        assert!(matches!(err, SignaltraderError::ConfigInvalid { key, .. } if key == "name"));
    }

    #[test]
    fn missing_file_is_parse_error() {
        let err = cli::load_config(Path::new("/nonexistent/dir/run.ini")).unwrap_err();
        assert!(matches!(err, SignaltraderError::ConfigParse { .. }));
    }
}

mod csv_pipeline {
    use super::*;

    #[test]
    fn backtest_over_csv_export() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();
        let source = CsvAdapter::new(dir.path().to_path_buf());

        let outcome = cli::run_backtest_pipeline(&config, None, &source, None, None).unwrap();
        let result = &outcome.result;
        assert_eq!(result.equity_curve.len(), 150);
        assert!((result.initial_balance - 5000.0).abs() < f64::EPSILON);
        assert_eq!(outcome.run.strategy, "supertrend");
        assert_eq!(outcome.run.pair, "ETH/USDT");
        assert_eq!(outcome.result_id, None);
        assert_eq!(result.total_trades, result.trades.iter().filter(|t| t.pnl.is_none()).count());
    }

    #[test]
    fn strategy_and_pair_overrides() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();
        let source = CsvAdapter::new(dir.path().to_path_buf());

        let outcome =
            cli::run_backtest_pipeline(&config, None, &source, Some("rsi"), Some("BTC/USDT"))
                .unwrap();
        assert_eq!(outcome.run.strategy, "rsi");
        assert_eq!(outcome.run.pair, "BTC/USDT");
        assert_eq!(outcome.result.equity_curve.len(), 90);
    }

    #[test]
    fn missing_export_is_unknown_pair() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();
        let source = CsvAdapter::new(dir.path().to_path_buf());

        let err = cli::run_backtest_pipeline(&config, None, &source, None, Some("SOL/USDT"))
            .unwrap_err();
        assert!(matches!(err, SignaltraderError::UnknownPair { pair } if pair == "SOL/USDT"));
    }

    #[test]
    fn signals_match_backtest_signals() {
        let dir = csv_dir();
        let file = write_temp_ini(&valid_ini(dir.path()));
        let config = cli::load_config(file.path()).unwrap();
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let target = cli::build_target(&config, None).unwrap();

        let signals = cli::signals_for_target(&config, None, &source, None, &target).unwrap();
        let outcome = cli::run_backtest_pipeline(&config, None, &source, None, None).unwrap();
        assert_eq!(signals, outcome.result.signals);
        for pair in signals.windows(2) {
            assert_ne!(pair[0].signal_type, pair[1].signal_type);
        }
    }
}

mod ingest {
    use super::*;
    use signaltrader::adapters::file_config_adapter::FileConfigAdapter;
    use signaltrader::ports::store_port::StorePort;

    #[test]
    fn ingest_every_listed_pair() {
        let dir = csv_dir();
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let store = MockStore::new();

        let pairs = source.list_pairs(Timeframe::M1).unwrap();
        let counts = cli::ingest(&store, &source, &pairs, Timeframe::M1, 40).unwrap();

        let summary: Vec<(String, usize)> =
            counts.into_iter().map(|(p, n)| (p.symbol, n)).collect();
        assert_eq!(
            summary,
            vec![("BTC/USDT".to_string(), 90), ("ETH/USDT".to_string(), 150)]
        );
        assert_eq!(store.pairs.borrow().len(), 2);
        assert_eq!(store.bar_count("ETH/USDT", Timeframe::M1), 150);
    }

    #[test]
    fn second_ingest_inserts_nothing() {
        let dir = csv_dir();
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let store = MockStore::new();
        let pairs = vec![eth()];

        cli::ingest(&store, &source, &pairs, Timeframe::M1, 1000).unwrap();
        let again = cli::ingest(&store, &source, &pairs, Timeframe::M1, 1000).unwrap();
        assert_eq!(again[0].1, 0);
        assert_eq!(store.bar_count("ETH/USDT", Timeframe::M1), 150);
    }

    #[test]
    fn configured_exchange_recorded_on_registered_pairs() {
        let dir = csv_dir();
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let config = FileConfigAdapter::from_string("[data]\nexchange = binance\n").unwrap();
        let store = MockStore::new();

        let pairs = cli::ingest_pairs(&config, &source, None, Timeframe::M1).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.exchange.as_deref() == Some("binance")));

        cli::ingest(&store, &source, &pairs, Timeframe::M1, 1000).unwrap();
        let registered = store.find_pair("ETH/USDT").unwrap().unwrap();
        assert_eq!(registered.exchange.as_deref(), Some("binance"));
    }

    #[test]
    fn named_pair_without_exchange() {
        let dir = csv_dir();
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let config = FileConfigAdapter::from_string("[data]\ncsv_dir = x\n").unwrap();

        let pairs = cli::ingest_pairs(&config, &source, Some("eth/usdt"), Timeframe::M1).unwrap();
        assert_eq!(pairs, vec![eth()]);

        let err = cli::ingest_pairs(&config, &source, Some("ETHUSDT"), Timeframe::M1).unwrap_err();
        assert!(matches!(err, SignaltraderError::ConfigInvalid { key, .. } if key == "pair"));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_end_to_end {
    use super::*;
    use signaltrader::ports::store_port::StorePort;

    #[test]
    fn ingest_then_backtest_from_file_store() {
        let dir = csv_dir();
        let db_path = dir.path().join("signaltrader.db");
        let ini = format!(
            "{}\n[sqlite]\npath = {}\npool_size = 2\n",
            valid_ini(dir.path()),
            db_path.display()
        );
        let file = write_temp_ini(&ini);
        let config = cli::load_config(file.path()).unwrap();
        validate_all(&config).unwrap();

        let store = cli::open_store(&config).unwrap().expect("sqlite path configured");
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let counts = cli::ingest(store.as_store_port(), &source, &[eth()], Timeframe::M1, 40).unwrap();
        assert_eq!(counts[0].1, 150);

        let outcome =
            cli::run_backtest_pipeline(&config, Some(&*store), &source, None, None)
                .unwrap();
        assert_eq!(outcome.result.equity_curve.len(), 150);
        assert!(outcome.result_id.is_some());
        assert!(db_path.exists());
    }

    #[test]
    fn saved_signals_replay_through_signal_based() {
        let dir = csv_dir();
        let db_path = dir.path().join("signals.db");
        let ini = format!(
            "{}\n[sqlite]\npath = {}\n",
            valid_ini(dir.path()),
            db_path.display()
        );
        let file = write_temp_ini(&ini);
        let config = cli::load_config(file.path()).unwrap();
        let store = cli::open_store(&config).unwrap().expect("sqlite path configured");
        let source = CsvAdapter::new(dir.path().to_path_buf());
        let target = cli::build_target(&config, None).unwrap();

        let port = store.as_store_port();
        let signals = cli::signals_for_target(&config, Some(port), &source, None, &target).unwrap();
        port.register_pair(&target.pair).unwrap();
        port.save_signals(&target.pair, target.timeframe, &signals).unwrap();

        let replay = cli::run_backtest_pipeline(
            &config,
            Some(&*store),
            &source,
            Some("signal-based"),
            None,
        )
        .unwrap();
        let direct = cli::run_backtest_pipeline(&config, None, &source, None, None).unwrap();
        assert_eq!(replay.result.total_trades, direct.result.total_trades);
        assert!((replay.result.final_balance - direct.result.final_balance).abs() < 1e-6);
    }
}
