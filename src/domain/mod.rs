//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod indicator_helpers;
pub mod signal;
pub mod strategy;
pub mod portfolio;
pub mod backtest;
pub mod metrics;
pub mod market_data;
pub mod config_validation;
pub mod error;
