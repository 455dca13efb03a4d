//! Exponential Moving Average.
//!
//! alpha = 2/(n+1), seeded with the first value, then
//! EMA[i] = alpha*x[i] + (1-alpha)*EMA[i-1]. Defined from bar 0 (no warmup).

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let ema = if i == 0 {
            value
        } else {
            alpha * value + (1.0 - alpha) * out[i - 1]
        };
        out.push(ema);
    }

    out
}
