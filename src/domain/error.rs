//! Domain error types.

/// Top-level error type for signaltrader.
///
/// Degenerate numeric cases (RSI with no losses, profit factor with no losing
/// trades) and ignored signals (BUY while long, SELL while flat) are resolved
/// by convention and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SignaltraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient data for {pair}: have {bars} bars, need {minimum}")]
    InsufficientData {
        pair: String,
        bars: usize,
        minimum: usize,
    },

    #[error("unknown pair {pair}")]
    UnknownPair { pair: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("invalid bar at {timestamp_ms}: {reason}")]
    InvalidBar { timestamp_ms: i64, reason: String },

    #[error("invalid signal {field} {value:?}")]
    InvalidSignal { field: &'static str, value: String },

    #[error("invalid timeframe {value:?}")]
    InvalidTimeframe { value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SignaltraderError> for std::process::ExitCode {
    fn from(err: &SignaltraderError) -> Self {
        let code: u8 = match err {
            SignaltraderError::Io(_) => 1,
            SignaltraderError::ConfigParse { .. }
            | SignaltraderError::ConfigMissing { .. }
            | SignaltraderError::ConfigInvalid { .. }
            | SignaltraderError::InvalidTimeframe { .. } => 2,
            SignaltraderError::Database { .. } | SignaltraderError::DatabaseQuery { .. } => 3,
            SignaltraderError::MarketData { .. } | SignaltraderError::UnknownPair { .. } => 4,
            SignaltraderError::InsufficientData { .. }
            | SignaltraderError::InvalidBar { .. }
            | SignaltraderError::InvalidSignal { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
