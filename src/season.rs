//! Season curve analysis of a single pixel.
//!
//! [`SeasonCurveAnalyzer::analyze`] turns one completed and smoothed vegetation index
//! series into a [`SeasonMetrics`] record. The function is pure: it reads only the
//! pixel's own series and the shared time axis, so pixels can be processed in any order
//! or in parallel with identical results.

use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayView1};
use std::fmt;
use std::str::FromStr;

use crate::arg_extremum::{nan_arg, Extremum};
use crate::error::{PhenologyError, Result};
use crate::reduce::{median, nan_min};
use crate::volume::TimeAxis;

/// How the start of season is picked among the rising points of the greenup segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SosMode {
  /// Rising point lying furthest below the median of the rising values.
  First,
  /// Rising point closest to the median of the rising values.
  #[default]
  Median,
}

impl SosMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      SosMode::First => "first",
      SosMode::Median => "median",
    }
  }

  fn selection(self) -> Selection {
    match self {
      SosMode::First => Selection::FurthestBelow,
      SosMode::Median => Selection::Nearest,
    }
  }
}

impl FromStr for SosMode {
  type Err = PhenologyError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "first" => Ok(SosMode::First),
      "median" => Ok(SosMode::Median),
      _ => Err(PhenologyError::InvalidArgument(format!(
        "sos_mode should be either 'median' or 'first', got '{}'",
        s
      ))),
    }
  }
}

impl fmt::Display for SosMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How the end of season is picked among the falling points of the senescing segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EosMode {
  /// Falling point lying furthest below the median of the falling values.
  Last,
  /// Falling point closest to the median of the falling values.
  #[default]
  Median,
}

impl EosMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      EosMode::Last => "last",
      EosMode::Median => "median",
    }
  }

  fn selection(self) -> Selection {
    match self {
      EosMode::Last => Selection::FurthestBelow,
      EosMode::Median => Selection::Nearest,
    }
  }
}

impl FromStr for EosMode {
  type Err = PhenologyError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "last" => Ok(EosMode::Last),
      "median" => Ok(EosMode::Median),
      _ => Err(PhenologyError::InvalidArgument(format!(
        "eos_mode should be either 'median' or 'last', got '{}'",
        s
      ))),
    }
  }
}

impl fmt::Display for EosMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy)]
enum Selection {
  FurthestBelow,
  Nearest,
}

#[derive(Debug, Clone, Copy)]
enum Slope {
  Rising,
  Falling,
}

impl Slope {
  fn matches(self, derivative: f64) -> bool {
    match self {
      Slope::Rising => derivative > 0.0,
      Slope::Falling => derivative < 0.0,
    }
  }
}

/// Season shape statistics of one pixel.
///
/// Day-of-year fields are `None` when undefined; magnitudes are `NaN` when undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonMetrics {
  pub peak_value: f32,
  pub peak_doy: Option<i16>,
  pub trough_value: f32,
  pub amplitude: f32,
  pub start_value: f32,
  pub start_doy: Option<i16>,
  pub end_value: f32,
  pub end_doy: Option<i16>,
  pub length_doy: Option<i16>,
  pub green_rate: f32,
  pub senesce_rate: f32,
}

impl SeasonMetrics {
  /// Record with every statistic undefined.
  pub fn missing() -> Self {
    SeasonMetrics {
      peak_value: f32::NAN,
      peak_doy: None,
      trough_value: f32::NAN,
      amplitude: f32::NAN,
      start_value: f32::NAN,
      start_doy: None,
      end_value: f32::NAN,
      end_doy: None,
      length_doy: None,
      green_rate: f32::NAN,
      senesce_rate: f32::NAN,
    }
  }
}

// A point selected on one side of the peak
#[derive(Debug, Clone, Copy)]
struct Transition {
  value: f32,
  doy: i16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonCurveAnalyzer {
  sos_mode: SosMode,
  eos_mode: EosMode,
}

impl SeasonCurveAnalyzer {
  pub fn new(sos_mode: SosMode, eos_mode: EosMode) -> Self {
    SeasonCurveAnalyzer { sos_mode, eos_mode }
  }

  pub fn sos_mode(&self) -> SosMode {
    self.sos_mode
  }

  pub fn eos_mode(&self) -> EosMode {
    self.eos_mode
  }

  /// Computes the season metrics of one pixel series sampled on `axis`.
  ///
  /// A series without a single valid observation yields [`SeasonMetrics::missing`].
  pub fn analyze(&self, values: ArrayView1<'_, f32>, axis: &TimeAxis) -> SeasonMetrics {
    let doy = axis.day_of_year();
    let elapsed = axis.elapsed_days();

    let Some(peak_index) = nan_arg(values, Extremum::Max) else {
      return SeasonMetrics::missing();
    };
    let peak_value = values[peak_index];
    let peak_doy = doy[peak_index];
    let peak_time = elapsed[peak_index];

    let trough_value = nan_min(values.iter());
    let amplitude = peak_value - trough_value;

    let greenup = mask_segment(values, elapsed, |t| t < peak_time);
    let start = select_transition(&greenup, axis, Slope::Rising, self.sos_mode.selection());

    let senescence = mask_segment(values, elapsed, |t| t > peak_time);
    let end = select_transition(&senescence, axis, Slope::Falling, self.eos_mode.selection());

    let start_doy = start.map(|s| s.doy);
    let end_doy = end.map(|e| e.doy);
    let start_value = start.map_or(f32::NAN, |s| s.value);
    let end_value = end.map_or(f32::NAN, |e| e.value);

    SeasonMetrics {
      peak_value,
      peak_doy: Some(peak_doy),
      trough_value,
      amplitude,
      start_value,
      start_doy,
      end_value,
      end_doy,
      length_doy: season_length(start_doy, end_doy, axis.last_day_of_year()),
      green_rate: rate(peak_value - start_value, start_doy, Some(peak_doy)),
      senesce_rate: rate(end_value - peak_value, Some(peak_doy), end_doy),
    }
  }
}

/// Analyzes a standalone series given with its own timestamps.
pub fn analyze_series(
  values: &[f32],
  timestamps: &[NaiveDateTime],
  sos_mode: SosMode,
  eos_mode: EosMode,
) -> Result<SeasonMetrics> {
  if values.len() != timestamps.len() {
    return Err(PhenologyError::InvalidArgument(format!(
      "{} values supplied with {} timestamps",
      values.len(),
      timestamps.len()
    )));
  }
  let axis = TimeAxis::new(timestamps)?;
  let analyzer = SeasonCurveAnalyzer::new(sos_mode, eos_mode);
  Ok(analyzer.analyze(ArrayView1::from(values), &axis))
}

// Full-length copy of the series with every step outside the segment set to NaN
fn mask_segment<F: Fn(f64) -> bool>(values: ArrayView1<'_, f32>, elapsed: &[f64], keep: F) -> Array1<f32> {
  values
    .iter()
    .zip(elapsed)
    .map(|(&v, &t)| if keep(t) { v } else { f32::NAN })
    .collect()
}

fn select_transition(segment: &Array1<f32>, axis: &TimeAxis, slope: Slope, selection: Selection) -> Option<Transition> {
  let derivative = gradient(segment, axis.elapsed_days());

  let candidates: Array1<f32> = segment
    .iter()
    .zip(&derivative)
    .map(|(&v, &d)| if slope.matches(d) { v } else { f32::NAN })
    .collect();

  let candidate_values: Vec<f64> = candidates.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
  if candidate_values.is_empty() {
    return None;
  }
  let centre = median(&candidate_values);

  let distance = candidates.mapv(|v| (v as f64 - centre) as f32);
  let index = match selection {
    Selection::FurthestBelow => nan_arg(distance.view(), Extremum::Min),
    Selection::Nearest => nan_arg(distance.mapv(f32::abs).view(), Extremum::Min),
  }?;

  Some(Transition {
    value: segment[index],
    doy: axis.day_of_year()[index],
  })
}

/// Time derivative of `values` sampled at the (strictly increasing) coordinates `x`.
///
/// Interior points use second-order central differences for uneven spacing, the two
/// end points one-sided first differences. A NaN anywhere in a stencil gives NaN.
pub fn gradient(values: &Array1<f32>, x: &[f64]) -> Vec<f64> {
  let n = values.len();
  if n < 2 {
    return vec![f64::NAN; n];
  }
  let v = |i: usize| values[i] as f64;

  let mut out = Vec::with_capacity(n);
  out.push((v(1) - v(0)) / (x[1] - x[0]));
  for i in 1..n - 1 {
    let hs = x[i] - x[i - 1];
    let hd = x[i + 1] - x[i];
    let numerator = hs * hs * v(i + 1) + (hd * hd - hs * hs) * v(i) - hd * hd * v(i - 1);
    out.push(numerator / (hs * hd * (hd + hs)));
  }
  out.push((v(n - 1) - v(n - 2)) / (x[n - 1] - x[n - 2]));
  out
}

// EOS - SOS, wrapped into the following cycle when the season crosses the year boundary.
// Undefined when the record ends too early in the following year for the wrap to be non-negative.
fn season_length(start_doy: Option<i16>, end_doy: Option<i16>, last_doy: i16) -> Option<i16> {
  let (start, end) = (start_doy?, end_doy?);
  let raw = end as i32 - start as i32;
  let length = if raw >= 0 { raw } else { last_doy as i32 + raw };
  if length < 0 {
    return None;
  }
  i16::try_from(length).ok()
}

// Change in value per day; undefined when either day is missing or both coincide
fn rate(change: f32, from_doy: Option<i16>, to_doy: Option<i16>) -> f32 {
  match (from_doy, to_doy) {
    (Some(from), Some(to)) if to != from => change / (to as f32 - from as f32),
    _ => f32::NAN,
  }
}
