//! Trading signals and the per-bar signal column the rules write into.
//!
//! A bar carries at most one decision. HOLD is the absence of a claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SignaltraderError;
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = SignaltraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(SignalType::Buy),
            "SELL" => Ok(SignalType::Sell),
            _ => Err(SignaltraderError::InvalidSignal {
                field: "type",
                value: s.trim().to_string(),
            }),
        }
    }
}

/// Which rule produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSource {
    RsiDivergence,
    RsiOversold,
    RsiOverbought,
    BbBounce,
    BbSqueeze,
    BbBreakout,
    BbTrend,
    Ichimoku,
    Supertrend,
    Stored,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::RsiDivergence => "RSI_DIVERGENCE",
            SignalSource::RsiOversold => "RSI_OVERSOLD",
            SignalSource::RsiOverbought => "RSI_OVERBOUGHT",
            SignalSource::BbBounce => "BB_BOUNCE",
            SignalSource::BbSqueeze => "BB_SQUEEZE",
            SignalSource::BbBreakout => "BB_BREAKOUT",
            SignalSource::BbTrend => "BB_TREND",
            SignalSource::Ichimoku => "ICHIMOKU",
            SignalSource::Supertrend => "SUPERTREND",
            SignalSource::Stored => "STORED",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalSource {
    type Err = SignaltraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = match s.trim() {
            "RSI_DIVERGENCE" => SignalSource::RsiDivergence,
            "RSI_OVERSOLD" => SignalSource::RsiOversold,
            "RSI_OVERBOUGHT" => SignalSource::RsiOverbought,
            "BB_BOUNCE" => SignalSource::BbBounce,
            "BB_SQUEEZE" => SignalSource::BbSqueeze,
            "BB_BREAKOUT" => SignalSource::BbBreakout,
            "BB_TREND" => SignalSource::BbTrend,
            "ICHIMOKU" => SignalSource::Ichimoku,
            "SUPERTREND" => SignalSource::Supertrend,
            "STORED" => SignalSource::Stored,
            other => {
                return Err(SignaltraderError::InvalidSignal {
                    field: "source",
                    value: other.to_string(),
                });
            }
        };
        Ok(source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub signal_type: SignalType,
    pub source: SignalSource,
    pub strength: f64,
    pub price: f64,
}

/// The decision held by one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    pub signal_type: SignalType,
    pub source: SignalSource,
    pub strength: f64,
}

/// One optional claim per bar, written by the rules in priority order.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalColumn {
    claims: Vec<Option<Claim>>,
}

impl SignalColumn {
    pub fn new(len: usize) -> Self {
        SignalColumn {
            claims: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Claim> {
        self.claims.get(i).and_then(Option::as_ref)
    }

    pub fn signal_type(&self, i: usize) -> Option<SignalType> {
        self.get(i).map(|c| c.signal_type)
    }

    pub fn types(&self) -> Vec<Option<SignalType>> {
        self.claims.iter().map(|c| c.map(|c| c.signal_type)).collect()
    }

    /// Number of bars holding a decision.
    pub fn count(&self) -> usize {
        self.claims.iter().flatten().count()
    }

    /// First writer wins: set the claim only if the bar is still unclaimed.
    pub fn claim(
        &mut self,
        i: usize,
        signal_type: SignalType,
        source: SignalSource,
        strength: f64,
    ) -> bool {
        match self.claims.get_mut(i) {
            Some(slot @ None) => {
                *slot = Some(Claim {
                    signal_type,
                    source,
                    strength,
                });
                true
            }
            _ => false,
        }
    }

    /// Claim an unclaimed bar, or add `strength` to an existing claim in the
    /// same direction. An opposite claim is left as is.
    pub fn accumulate(
        &mut self,
        i: usize,
        signal_type: SignalType,
        source: SignalSource,
        strength: f64,
    ) -> bool {
        match self.claims.get_mut(i) {
            Some(Some(existing)) => {
                if existing.signal_type != signal_type {
                    return false;
                }
                existing.strength += strength;
                true
            }
            Some(slot @ None) => {
                *slot = Some(Claim {
                    signal_type,
                    source,
                    strength,
                });
                true
            }
            None => false,
        }
    }

    /// Blank every claim equal to the previous surviving claim, collapsing
    /// runs of the same decision to their first bar.
    pub fn suppress_duplicates(&mut self) {
        let mut last: Option<SignalType> = None;
        for slot in self.claims.iter_mut() {
            let Some(claim) = *slot else { continue };
            if last == Some(claim.signal_type) {
                *slot = None;
            } else {
                last = Some(claim.signal_type);
            }
        }
    }

    /// Materialise the claims as signals stamped with each bar's close.
    pub fn to_signals(&self, bars: &[Bar]) -> Vec<Signal> {
        self.claims
            .iter()
            .zip(bars)
            .filter_map(|(claim, bar)| {
                claim.map(|c| Signal {
                    timestamp: bar.timestamp,
                    signal_type: c.signal_type,
                    source: c.source,
                    strength: c.strength,
                    price: bar.close,
                })
            })
            .collect()
    }
}

/// Aggregate counts over a list of signals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub total: usize,
    pub buys: usize,
    pub sells: usize,
    pub mean_strength: f64,
    pub mean_price: f64,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl SignalSummary {
    pub fn from_signals(signals: &[Signal]) -> Self {
        let total = signals.len();
        let buys = signals
            .iter()
            .filter(|s| s.signal_type == SignalType::Buy)
            .count();
        let (mean_strength, mean_price) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                signals.iter().map(|s| s.strength).sum::<f64>() / total as f64,
                signals.iter().map(|s| s.price).sum::<f64>() / total as f64,
            )
        };

        SignalSummary {
            total,
            buys,
            sells: total - buys,
            mean_strength,
            mean_price,
            first: signals.iter().map(|s| s.timestamp).min(),
            last: signals.iter().map(|s| s.timestamp).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::make_bars;

    use SignalType::{Buy, Sell};

    #[test]
    fn claim_first_writer_wins() {
        let mut col = SignalColumn::new(3);
        assert!(col.claim(1, Buy, SignalSource::BbBounce, 1.0));
        assert!(!col.claim(1, Sell, SignalSource::BbTrend, 5.0));
        let c = col.get(1).unwrap();
        assert_eq!(c.signal_type, Buy);
        assert_eq!(c.source, SignalSource::BbBounce);
    }

    #[test]
    fn claim_out_of_range_is_ignored() {
        let mut col = SignalColumn::new(2);
        assert!(!col.claim(5, Buy, SignalSource::BbBounce, 1.0));
        assert_eq!(col.count(), 0);
    }

    #[test]
    fn accumulate_same_direction_adds_strength() {
        let mut col = SignalColumn::new(1);
        col.claim(0, Buy, SignalSource::RsiOversold, 1.0);
        assert!(col.accumulate(0, Buy, SignalSource::Ichimoku, 3.0));
        let c = col.get(0).unwrap();
        assert!((c.strength - 4.0).abs() < f64::EPSILON);
        assert_eq!(c.source, SignalSource::RsiOversold);
    }

    #[test]
    fn accumulate_opposite_direction_untouched() {
        let mut col = SignalColumn::new(1);
        col.claim(0, Buy, SignalSource::BbBounce, 1.0);
        assert!(!col.accumulate(0, Sell, SignalSource::Supertrend, 1.0));
        let c = col.get(0).unwrap();
        assert_eq!(c.signal_type, Buy);
        assert!((c.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn accumulate_claims_empty_bar() {
        let mut col = SignalColumn::new(1);
        assert!(col.accumulate(0, Sell, SignalSource::Supertrend, 1.0));
        assert_eq!(col.signal_type(0), Some(Sell));
    }

    #[test]
    fn suppress_duplicates_skips_blanks() {
        let mut col = SignalColumn::new(7);
        col.claim(0, Buy, SignalSource::BbBounce, 1.0);
        col.claim(2, Buy, SignalSource::BbTrend, 1.0);
        col.claim(3, Sell, SignalSource::BbTrend, 1.0);
        col.claim(4, Sell, SignalSource::BbTrend, 1.0);
        col.claim(6, Buy, SignalSource::BbTrend, 1.0);
        col.suppress_duplicates();
        assert_eq!(
            col.types(),
            vec![Some(Buy), None, None, Some(Sell), None, None, Some(Buy)]
        );
    }

    #[test]
    fn to_signals_uses_bar_close() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let mut col = SignalColumn::new(3);
        col.claim(1, Sell, SignalSource::Ichimoku, 2.0);
        let signals = col.to_signals(&bars);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].timestamp, bars[1].timestamp);
        assert!((signals[0].price - 101.0).abs() < f64::EPSILON);
        assert_eq!(signals[0].source, SignalSource::Ichimoku);
    }

    #[test]
    fn source_tags_parse_back() {
        for source in [
            SignalSource::RsiDivergence,
            SignalSource::BbSqueeze,
            SignalSource::Supertrend,
            SignalSource::Stored,
        ] {
            assert_eq!(source.as_str().parse::<SignalSource>().unwrap(), source);
        }
        assert!("MACD".parse::<SignalSource>().is_err());
        assert_eq!("buy".parse::<SignalType>().unwrap(), Buy);
    }

    #[test]
    fn serde_uses_tags() {
        assert_eq!(serde_json::to_string(&SignalSource::BbBreakout).unwrap(), "\"BB_BREAKOUT\"");
        assert_eq!(serde_json::to_string(&Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn summary_counts() {
        let bars = make_bars(&[100.0, 110.0, 120.0]);
        let mut col = SignalColumn::new(3);
        col.claim(0, Buy, SignalSource::BbBounce, 1.0);
        col.claim(2, Sell, SignalSource::BbTrend, 3.0);
        let summary = SignalSummary::from_signals(&col.to_signals(&bars));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.buys, 1);
        assert_eq!(summary.sells, 1);
        assert!((summary.mean_strength - 2.0).abs() < f64::EPSILON);
        assert!((summary.mean_price - 110.0).abs() < f64::EPSILON);
        assert_eq!(summary.first, Some(bars[0].timestamp));
        assert_eq!(summary.last, Some(bars[2].timestamp));
    }

    #[test]
    fn summary_empty() {
        let summary = SignalSummary::from_signals(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.mean_strength.abs() < f64::EPSILON);
        assert!(summary.first.is_none());
    }
}
