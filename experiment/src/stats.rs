//! Summary statistics that tolerate missing values. A step with no vehicles has no mean speed,
//! and shouldn't drag averages down to 0.

/// The mean of all values that aren't NaN, or None if there aren't any.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0;
    for x in values {
        if !x.is_nan() {
            sum += x;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / (count as f64))
    }
}

/// Population mean and standard deviation of the values that aren't NaN.
pub fn nan_mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let mean = nan_mean(values)?;
    let squares: Vec<f64> = values.iter().map(|x| (x - mean).powi(2)).collect();
    let variance = nan_mean(&squares)?;
    Some((mean, variance.sqrt()))
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
