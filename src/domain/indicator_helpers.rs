//! Rolling-window primitives shared by the indicators.
//!
//! Window functions follow the usual dataframe convention: the value at `i`
//! covers `values[i+1-window..=i]` and is `None` until a full window of
//! defined inputs is available.

use crate::domain::indicator::Column;

fn full_window(values: &[Option<f64>], i: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || i + 1 < window {
        return None;
    }
    values[i + 1 - window..=i].iter().copied().collect()
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Column {
    (0..values.len())
        .map(|i| {
            full_window(values, i, window).map(|w| w.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Column {
    (0..values.len())
        .map(|i| full_window(values, i, window).map(|w| w.into_iter().fold(f64::MIN, f64::max)))
        .collect()
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Column {
    (0..values.len())
        .map(|i| full_window(values, i, window).map(|w| w.into_iter().fold(f64::MAX, f64::min)))
        .collect()
}

/// Sample standard deviation (n-1 denominator). Undefined for windows below 2.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Column {
    if window < 2 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            full_window(values, i, window).map(|w| {
                let mean = w.iter().sum::<f64>() / window as f64;
                let variance = w
                    .iter()
                    .map(|v| {
                        let diff = v - mean;
                        diff * diff
                    })
                    .sum::<f64>()
                    / (window - 1) as f64;
                variance.sqrt()
            })
        })
        .collect()
}

/// Shift a column by `offset` bars. A positive offset moves the value at `i`
/// to `i + offset`; a negative one moves it back to `i - |offset|`.
pub fn shift(values: &[Option<f64>], offset: isize) -> Column {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let src = i - offset;
            if src >= 0 && src < n {
                values[src as usize]
            } else {
                None
            }
        })
        .collect()
}

/// Quantile over the defined values with linear interpolation between the
/// closest ranks.
pub fn quantile(values: &[Option<f64>], q: f64) -> Option<f64> {
    let mut defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        return None;
    }
    defined.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (defined.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(defined[lower] + (defined[upper] - defined[lower]) * frac)
}

/// Lift a plain slice into a column with every value defined.
pub fn defined(values: &[f64]) -> Column {
    values.iter().copied().map(Some).collect()
}
