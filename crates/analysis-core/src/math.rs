//! Numeric helpers shared by the valuation engines.
//!
//! Every helper takes and returns [`Metric`] so that a missing operand or a
//! zero denominator resolves to `Indeterminate` instead of panicking or
//! producing an infinity.
use crate::Metric;

/// Divide two metrics. Indeterminate when either side is missing or the
/// denominator is zero.
pub fn safe_divide(numerator: Metric, denominator: Metric) -> Metric {
    match (numerator.value(), denominator.non_zero()) {
        (Some(n), Some(d)) => Metric::new(n / d),
        _ => Metric::Indeterminate,
    }
}

/// Clamp a score into [0, 100].
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Median of an unsorted slice (mean of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Metric {
    if values.is_empty() {
        return Metric::Indeterminate;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Metric::new((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Metric::new(sorted[mid])
    }
}

pub fn mean(values: &[f64]) -> Metric {
    if values.is_empty() {
        return Metric::Indeterminate;
    }
    Metric::new(values.iter().sum::<f64>() / values.len() as f64)
}

/// Reported net debt, else debt minus cash with a single missing side taken
/// as zero. Indeterminate only when none of the three is reported.
pub fn net_debt(reported: Metric, total_debt: Metric, total_cash: Metric) -> Metric {
    if reported.is_present() {
        return reported;
    }
    if total_debt.is_indeterminate() && total_cash.is_indeterminate() {
        return Metric::Indeterminate;
    }
    Metric::new(total_debt.unwrap_or(0.0) - total_cash.unwrap_or(0.0))
}

/// Render a number with thousands separators, e.g. `1,234,567.89`.
/// Indeterminate renders as `N/A`; the suffix is appended after a space.
pub fn format_number(value: Metric, decimals: usize, suffix: &str) -> String {
    let Some(v) = value.value() else {
        return "N/A".to_string();
    };
    let raw = format!("{:.*}", decimals, v.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (raw.clone(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if v < 0.0 && raw.chars().any(|c| c != '0' && c != '.') {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    if !suffix.is_empty() {
        out.push(' ');
        out.push_str(suffix);
    }
    out
}

/// Render a decimal fraction as a percentage, e.g. `0.1234` → `12.3%`.
pub fn format_percent(value: Metric, decimals: usize) -> String {
    match value.value() {
        Some(v) => format!("{:.*}%", decimals, v * 100.0),
        None => "N/A".to_string(),
    }
}
