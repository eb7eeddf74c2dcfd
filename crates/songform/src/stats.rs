//! Small descriptive statistics used by the aggregation layer. Every
//! function returns `None` where the statistic is undefined.

use std::cmp::Ordering;

use crate::ids::format_offset;

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(sum(values) / values.len() as f64)
}

/// Median, averaging the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((squares / (values.len() - 1) as f64).sqrt())
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}

pub fn ratio_opt(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    ratio(numerator?, denominator?)
}

/// Round half to even.
pub fn round_even(value: f64) -> f64 {
    value.round_ties_even()
}

/// Distinct values with their counts, ascending by value.
fn counts<T: Copy + PartialOrd>(values: &[T]) -> Vec<(T, usize)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mut runs: Vec<(T, usize)> = Vec::new();
    for value in sorted {
        match runs.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => runs.push((value, 1)),
        }
    }
    runs
}

/// Values tied for the highest count, ascending, and that count.
pub fn modes<T: Copy + PartialOrd>(values: &[T]) -> (Vec<T>, usize) {
    top_tier(counts(values))
}

/// Values tied for the highest count once the modes are left out.
pub fn second_modes<T: Copy + PartialOrd>(values: &[T]) -> (Vec<T>, usize) {
    let runs = counts(values);
    let (first, _) = top_tier(runs.clone());
    top_tier(
        runs.into_iter()
            .filter(|(value, _)| !first.contains(value))
            .collect(),
    )
}

fn top_tier<T: Copy>(runs: Vec<(T, usize)>) -> (Vec<T>, usize) {
    let best = runs.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let values = runs
        .into_iter()
        .filter(|(_, count)| *count == best)
        .map(|(value, _)| value)
        .collect();
    (values, best)
}

/// Number of distinct values.
pub fn n_unique<T: Copy + PartialOrd>(values: &[T]) -> usize {
    counts(values).len()
}

pub fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_offset(*v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn join_ints(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `None` for an empty list so the column renders null.
pub fn nonempty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}
