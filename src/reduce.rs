// NaN-aware scalar reductions shared by the season analyzer and the temporal statistics.

use ndarray::Array1;

// Largest non-NaN value, NaN when there is none
pub fn nan_max<'a, I: IntoIterator<Item = &'a f32>>(values: I) -> f32 {
  values
    .into_iter()
    .filter(|v| !v.is_nan())
    .fold(f32::NAN, |acc, &v| if acc.is_nan() || v > acc { v } else { acc })
}

// Smallest non-NaN value, NaN when there is none
pub fn nan_min<'a, I: IntoIterator<Item = &'a f32>>(values: I) -> f32 {
  values
    .into_iter()
    .filter(|v| !v.is_nan())
    .fold(f32::NAN, |acc, &v| if acc.is_nan() || v < acc { v } else { acc })
}

// Median of the finite values; even counts average the two middle values
pub fn median<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> f64 {
  let mut sorted: Vec<f64> = values.into_iter().copied().filter(|v| !v.is_nan()).collect();
  if sorted.is_empty() {
    return f64::NAN;
  }
  sorted.sort_by(|a, b| a.total_cmp(b));
  let mid = sorted.len() / 2;
  if sorted.len() % 2 == 0 {
    (sorted[mid - 1] + sorted[mid]) / 2.0
  } else {
    sorted[mid]
  }
}

// First differences x[i+1] - x[i]
pub fn diff(values: &[f32]) -> Array1<f64> {
  values.windows(2).map(|w| w[1] as f64 - w[0] as f64).collect()
}
