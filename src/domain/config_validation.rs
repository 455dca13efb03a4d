//! Configuration validation.
//!
//! Every key is checked before a run. Errors name the section and key.

use crate::domain::error::SignaltraderError;
use crate::domain::series::{Pair, Timeframe};
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub const STRATEGY_NAMES: [&str; 5] = ["signal-based", "supertrend", "bollinger", "rsi", "ichimoku"];

/// Every key each section understands.
pub const KNOWN_KEYS: [(&str, &[&str]); 5] = [
    ("sqlite", &["path", "pool_size"]),
    ("data", &["csv_dir", "page_limit", "exchange"]),
    (
        "backtest",
        &["pair", "timeframe", "start", "end", "initial_balance", "commission"],
    ),
    ("strategy", &["name", "signal_tolerance_secs"]),
    (
        "indicators",
        &[
            "atr_period",
            "atr_multiplier",
            "macd_short",
            "macd_long",
            "macd_signal",
            "bb_window",
            "bb_std",
            "tenkan",
            "kijun",
            "senkou",
            "rsi_period",
            "rsi_overbought",
            "rsi_oversold",
            "donchian_window",
        ],
    ),
];

/// `(section, key)` pairs the known sections carry but nothing reads.
/// Usually a typo, so they are reported rather than rejected.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<(String, String)> {
    KNOWN_KEYS
        .iter()
        .flat_map(|(section, known)| {
            config
                .keys(section)
                .into_iter()
                .filter(|key| !known.contains(&key.as_str()))
                .map(|key| (section.to_string(), key))
        })
        .collect()
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), SignaltraderError> {
    for (section, key) in unknown_keys(config) {
        tracing::warn!(%section, %key, "unrecognised config key ignored");
    }
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_indicator_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SignaltraderError> {
    let balance = number(config, "backtest", "initial_balance", 10_000.0)?;
    if balance <= 0.0 {
        return Err(invalid("backtest", "initial_balance", "initial_balance must be positive"));
    }
    let commission = number(config, "backtest", "commission", 0.001)?;
    if !(0.0..1.0).contains(&commission) {
        return Err(invalid(
            "backtest",
            "commission",
            "commission must be a fraction in [0, 1)",
        ));
    }
    backtest_pair(config)?;
    backtest_timeframe(config)?;
    backtest_window(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SignaltraderError> {
    if let Some(name) = config.get_string("strategy", "name") {
        let name = name.trim();
        if !STRATEGY_NAMES.contains(&name) {
            return Err(invalid(
                "strategy",
                "name",
                &format!("unknown strategy '{name}', expected one of {}", STRATEGY_NAMES.join(", ")),
            ));
        }
    }
    if integer(config, "strategy", "signal_tolerance_secs", 300)? < 0 {
        return Err(invalid(
            "strategy",
            "signal_tolerance_secs",
            "signal_tolerance_secs must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), SignaltraderError> {
    const PERIODS: [(&str, i64); 10] = [
        ("atr_period", 7),
        ("macd_short", 12),
        ("macd_long", 26),
        ("macd_signal", 9),
        ("bb_window", 20),
        ("tenkan", 9),
        ("kijun", 26),
        ("senkou", 52),
        ("rsi_period", 14),
        ("donchian_window", 20),
    ];
    for (key, default) in PERIODS {
        if integer(config, "indicators", key, default)? < 1 {
            return Err(invalid("indicators", key, &format!("{key} must be at least 1")));
        }
    }
    for (key, default) in [("atr_multiplier", 3.0), ("bb_std", 2.0)] {
        if number(config, "indicators", key, default)? <= 0.0 {
            return Err(invalid("indicators", key, &format!("{key} must be positive")));
        }
    }

    let short = integer(config, "indicators", "macd_short", 12)?;
    let long = integer(config, "indicators", "macd_long", 26)?;
    if short >= long {
        return Err(invalid(
            "indicators",
            "macd_short",
            "macd_short must be less than macd_long",
        ));
    }

    let oversold = number(config, "indicators", "rsi_oversold", 30.0)?;
    let overbought = number(config, "indicators", "rsi_overbought", 70.0)?;
    if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
        return Err(invalid(
            "indicators",
            "rsi_oversold",
            "RSI thresholds must be within [0, 100]",
        ));
    }
    if oversold >= overbought {
        return Err(invalid(
            "indicators",
            "rsi_oversold",
            "rsi_oversold must be less than rsi_overbought",
        ));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SignaltraderError> {
    if integer(config, "data", "page_limit", 1000)? < 1 {
        return Err(invalid("data", "page_limit", "page_limit must be at least 1"));
    }
    if integer(config, "sqlite", "pool_size", 4)? < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

/// `[backtest] pair`, e.g. `ETH/USDT`.
pub fn backtest_pair(config: &dyn ConfigPort) -> Result<Pair, SignaltraderError> {
    let value = required(config, "backtest", "pair")?;
    Pair::parse(&value).ok_or_else(|| {
        invalid(
            "backtest",
            "pair",
            &format!("invalid pair '{value}', expected BASE/QUOTE"),
        )
    })
}

pub fn backtest_timeframe(config: &dyn ConfigPort) -> Result<Timeframe, SignaltraderError> {
    let value = config
        .get_string("backtest", "timeframe")
        .unwrap_or_else(|| "1m".to_string());
    value
        .parse::<Timeframe>()
        .map_err(|e: SignaltraderError| invalid("backtest", "timeframe", &e.to_string()))
}

/// Inclusive `[start, end]`. A bare date as `end` covers that whole day.
pub fn backtest_window(
    config: &dyn ConfigPort,
) -> Result<(DateTime<Utc>, DateTime<Utc>), SignaltraderError> {
    let start = instant(config, "start", false)?;
    let end = instant(config, "end", true)?;
    if start >= end {
        return Err(invalid("backtest", "start", "start must be before end"));
    }
    Ok((start, end))
}

/// RFC 3339, or `YYYY-MM-DD` taken as the first (or last) millisecond of
/// that day.
pub fn parse_instant(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time).and_utc())
}

fn instant(
    config: &dyn ConfigPort,
    key: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, SignaltraderError> {
    let value = required(config, "backtest", key)?;
    parse_instant(&value, end_of_day).ok_or_else(|| {
        invalid(
            "backtest",
            key,
            &format!("invalid {key} '{value}', expected YYYY-MM-DD or RFC 3339"),
        )
    })
}

/// The configured rule-based strategy. `signal-based` is reported as
/// `None` since it needs stored signals to be built.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<Option<StrategyKind>, SignaltraderError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "supertrend".to_string());
    match name.trim() {
        "signal-based" => Ok(None),
        other => other.parse::<StrategyKind>().map(Some),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SignaltraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SignaltraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Present but non-numeric is an error rather than a silent default.
pub fn number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SignaltraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, &format!("{key} must be a number, got '{raw}'"))),
    }
}

pub fn integer(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SignaltraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("{key} must be an integer, got '{raw}'"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SignaltraderError {
    SignaltraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
