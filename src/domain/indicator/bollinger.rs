//! Bollinger Bands indicator.
//!
//! - Middle: simple moving average of close over `window` bars
//! - Upper/Lower: Middle ± k × StdDev, plus the 1σ bands
//! - %B = (close - lower) / (upper - lower)
//! - Bandwidth = (upper - lower) / middle
//!
//! StdDev is the sample standard deviation (divides by N-1).
//! Warmup: first (window-1) bars are undefined. %B is undefined when the
//! bands have collapsed onto each other.

use crate::domain::indicator::Column;
use crate::domain::indicator_helpers::{defined, rolling_mean, rolling_std};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub mid: Column,
    pub std: Column,
    pub upper: Column,
    pub lower: Column,
    pub upper_1std: Column,
    pub lower_1std: Column,
    pub percent_b: Column,
    pub bandwidth: Column,
}

pub fn calculate_bollinger(closes: &[f64], window: usize, k: f64) -> BollingerSeries {
    let values = defined(closes);
    let mid = rolling_mean(&values, window);
    let std = rolling_std(&values, window);

    let band = |sign: f64, mult: f64| -> Column {
        mid.iter()
            .zip(&std)
            .map(|(m, s)| Some((*m)? + sign * mult * (*s)?))
            .collect()
    };
    let upper = band(1.0, k);
    let lower = band(-1.0, k);
    let upper_1std = band(1.0, 1.0);
    let lower_1std = band(-1.0, 1.0);

    let mut percent_b = Vec::with_capacity(closes.len());
    let mut bandwidth = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let (pb, bw) = match (upper[i], lower[i], mid[i]) {
            (Some(u), Some(l), Some(m)) => {
                let width = u - l;
                let pb = (width != 0.0).then(|| (closes[i] - l) / width);
                let bw = (m != 0.0).then(|| width / m);
                (pb, bw)
            }
            _ => (None, None),
        };
        percent_b.push(pb);
        bandwidth.push(bw);
    }

    BollingerSeries {
        mid,
        std,
        upper,
        lower,
        upper_1std,
        lower_1std,
        percent_b,
        bandwidth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bollinger_warmup() {
        let bb = calculate_bollinger(&[100.0, 102.0, 104.0, 103.0], 3, 2.0);
        assert!(bb.mid[0].is_none());
        assert!(bb.upper[1].is_none());
        assert!(bb.lower[2].is_some());
    }

    #[test]
    fn bollinger_known_values() {
        let bb = calculate_bollinger(&[2.0, 4.0, 6.0], 3, 2.0);
        // mean 4, sample std 2
        assert_relative_eq!(bb.mid[2].unwrap(), 4.0);
        assert_relative_eq!(bb.std[2].unwrap(), 2.0);
        assert_relative_eq!(bb.upper[2].unwrap(), 8.0);
        assert_relative_eq!(bb.lower[2].unwrap(), 0.0);
        assert_relative_eq!(bb.upper_1std[2].unwrap(), 6.0);
        assert_relative_eq!(bb.lower_1std[2].unwrap(), 2.0);
        // (6 - 0) / 8
        assert_relative_eq!(bb.percent_b[2].unwrap(), 0.75);
        // 8 / 4
        assert_relative_eq!(bb.bandwidth[2].unwrap(), 2.0);
    }

    #[test]
    fn bollinger_constant_prices_collapse() {
        let bb = calculate_bollinger(&[100.0; 100], 20, 2.0);
        for i in 19..100 {
            assert_eq!(bb.upper[i], Some(100.0));
            assert_eq!(bb.lower[i], Some(100.0));
            assert_eq!(bb.mid[i], Some(100.0));
            assert_eq!(bb.bandwidth[i], Some(0.0));
            assert!(bb.percent_b[i].is_none());
        }
    }

    #[test]
    fn bollinger_upper_above_lower() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let bb = calculate_bollinger(&closes, 10, 2.0);
        for i in 9..30 {
            assert!(bb.upper[i].unwrap() >= bb.mid[i].unwrap());
            assert!(bb.mid[i].unwrap() >= bb.lower[i].unwrap());
        }
    }
}
