// Small statistics helpers over f64 slices
// Population statistics, matching how interval regularity is measured everywhere else

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Coefficient of variation (std / mean). None when the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    Some(std_dev(values)? / m)
}

/// Median; averages the middle pair for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Weighted median: the smallest value whose cumulative weight reaches half the total
pub fn weighted_median(values: &[(f64, f64)]) -> Option<f64> {
    let total: f64 = values.iter().map(|(_, w)| w.max(0.0)).sum();
    if values.is_empty() || total <= 0.0 {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for &(value, weight) in &sorted {
        cumulative += weight.max(0.0);
        if cumulative >= half {
            return Some(value);
        }
    }

    sorted.last().map(|(v, _)| *v)
}
