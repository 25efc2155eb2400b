//! Null-safe statistics over sequences that may contain non-finite values.
//!
//! Every function drops `NaN`/`±inf` first and returns `None` when too few
//! finite values remain or the result itself overflows, so a report never
//! carries a NaN or an infinity.

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Arithmetic mean of the finite values. `None` for empty input.
pub fn average(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.iter().filter(|v| v.is_finite()) {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum / count as f64).filter(|v| v.is_finite())
}

/// Median of the finite values; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Population variance of the finite values. Needs at least two of them.
pub fn variance(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    if !mean.is_finite() {
        return None;
    }
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;

    Some(var).filter(|v| v.is_finite())
}

/// Quantile `q` (clamped to 0..=1) using linear interpolation between the
/// closest ranks of the sorted finite values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if !q.is_finite() {
        return None;
    }
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    // weighted blend; `hi - lo` can overflow for values of opposite sign
    let blended = sorted[lo] * (1.0 - frac) + sorted[hi] * frac;
    Some(blended).filter(|v| v.is_finite())
}

/// Rounds to `decimals` places. `None` for non-finite input.
pub fn round_number(value: f64, decimals: u32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // very large magnitudes overflow the scaled value; keep the original then
    if rounded.is_finite() {
        Some(rounded)
    } else {
        Some(value)
    }
}

/// [`round_number`] with the default precision of 4 decimals.
pub fn round4(value: f64) -> Option<f64> {
    round_number(value, 4)
}

/// Rounds an optional value, passing `None` through.
pub fn round_opt(value: Option<f64>, decimals: u32) -> Option<f64> {
    value.and_then(|v| round_number(v, decimals))
}
