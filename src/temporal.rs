//! Temporal shape statistics over a volume.
//!
//! Each statistic reduces a pixel's series to one scalar and, unlike phenology, only
//! the requested statistics are computed. The Fourier descriptors (`f_std_nK`,
//! `f_mean_nK`, `f_median_nK`) and `discordance` are columns of one spectral pass per
//! pixel, so requesting several of them costs a single FFT.

use ndarray::{s, Array1, Array2};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{PhenologyError, Result};
use crate::layers::{LayerData, StatisticLayerSet};
use crate::parallel::map_pixels;
use crate::phenology::{parse_stats, unique_request};
use crate::reduce::{diff, median};
use crate::volume::{require_materialized, VolumeSource};

/// Half-width of the neighbourhood a point must dominate to count as a peak.
pub const PEAK_SUPPORT: usize = 10;
/// Number of spectrum bins in each Fourier band.
pub const FOURIER_STEP: usize = 5;
/// Harmonics kept in the reconstruction used by `discordance`.
pub const DISCORDANCE_HARMONICS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FourierSummary {
  Std,
  Mean,
  Median,
}

impl FourierSummary {
  fn index(self) -> usize {
    match self {
      FourierSummary::Std => 0,
      FourierSummary::Mean => 1,
      FourierSummary::Median => 2,
    }
  }
}

/// Fourier band, numbered from 1 like the statistic names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Harmonic {
  N1,
  N2,
  N3,
}

impl Harmonic {
  pub const ALL: [Harmonic; 3] = [Harmonic::N1, Harmonic::N2, Harmonic::N3];

  fn index(self) -> usize {
    match self {
      Harmonic::N1 => 0,
      Harmonic::N2 => 1,
      Harmonic::N3 => 2,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalStat {
  Discordance,
  Fourier(FourierSummary, Harmonic),
  MeanChange,
  MedianChange,
  AbsChange,
  Complexity,
  CentralDiff,
  NumPeaks,
}

impl TemporalStat {
  pub const ALL: [TemporalStat; 16] = [
    TemporalStat::Discordance,
    TemporalStat::Fourier(FourierSummary::Std, Harmonic::N1),
    TemporalStat::Fourier(FourierSummary::Std, Harmonic::N2),
    TemporalStat::Fourier(FourierSummary::Std, Harmonic::N3),
    TemporalStat::Fourier(FourierSummary::Mean, Harmonic::N1),
    TemporalStat::Fourier(FourierSummary::Mean, Harmonic::N2),
    TemporalStat::Fourier(FourierSummary::Mean, Harmonic::N3),
    TemporalStat::Fourier(FourierSummary::Median, Harmonic::N1),
    TemporalStat::Fourier(FourierSummary::Median, Harmonic::N2),
    TemporalStat::Fourier(FourierSummary::Median, Harmonic::N3),
    TemporalStat::MeanChange,
    TemporalStat::MedianChange,
    TemporalStat::AbsChange,
    TemporalStat::Complexity,
    TemporalStat::CentralDiff,
    TemporalStat::NumPeaks,
  ];

  pub fn name(&self) -> &'static str {
    use FourierSummary::*;
    use Harmonic::*;
    match self {
      TemporalStat::Discordance => "discordance",
      TemporalStat::Fourier(Std, N1) => "f_std_n1",
      TemporalStat::Fourier(Std, N2) => "f_std_n2",
      TemporalStat::Fourier(Std, N3) => "f_std_n3",
      TemporalStat::Fourier(Mean, N1) => "f_mean_n1",
      TemporalStat::Fourier(Mean, N2) => "f_mean_n2",
      TemporalStat::Fourier(Mean, N3) => "f_mean_n3",
      TemporalStat::Fourier(Median, N1) => "f_median_n1",
      TemporalStat::Fourier(Median, N2) => "f_median_n2",
      TemporalStat::Fourier(Median, N3) => "f_median_n3",
      TemporalStat::MeanChange => "mean_change",
      TemporalStat::MedianChange => "median_change",
      TemporalStat::AbsChange => "abs_change",
      TemporalStat::Complexity => "complexity",
      TemporalStat::CentralDiff => "central_diff",
      TemporalStat::NumPeaks => "num_peaks",
    }
  }

  pub fn title(&self) -> &'static str {
    use FourierSummary::*;
    use Harmonic::*;
    match self {
      TemporalStat::Discordance => "Mean residual of a low-pass Fourier reconstruction",
      TemporalStat::Fourier(Std, N1) => "Standard deviation of Fourier band 1",
      TemporalStat::Fourier(Std, N2) => "Standard deviation of Fourier band 2",
      TemporalStat::Fourier(Std, N3) => "Standard deviation of Fourier band 3",
      TemporalStat::Fourier(Mean, N1) => "Mean of Fourier band 1",
      TemporalStat::Fourier(Mean, N2) => "Mean of Fourier band 2",
      TemporalStat::Fourier(Mean, N3) => "Mean of Fourier band 3",
      TemporalStat::Fourier(Median, N1) => "Median of Fourier band 1",
      TemporalStat::Fourier(Median, N2) => "Median of Fourier band 2",
      TemporalStat::Fourier(Median, N3) => "Median of Fourier band 3",
      TemporalStat::MeanChange => "Mean of the first differences",
      TemporalStat::MedianChange => "Median of the first differences",
      TemporalStat::AbsChange => "Mean absolute first difference",
      TemporalStat::Complexity => "Complexity estimate of the series",
      TemporalStat::CentralDiff => "Mean central second difference",
      TemporalStat::NumPeaks => "Number of peaks",
    }
  }

  fn reducer(self) -> Reducer {
    match self {
      TemporalStat::Discordance => Reducer::Spectral(SpectralColumn::Discordance),
      TemporalStat::Fourier(summary, harmonic) => Reducer::Spectral(SpectralColumn::Band(summary, harmonic)),
      TemporalStat::MeanChange => Reducer::Series(mean_change),
      TemporalStat::MedianChange => Reducer::Series(median_change),
      TemporalStat::AbsChange => Reducer::Series(abs_change),
      TemporalStat::Complexity => Reducer::Series(complexity),
      TemporalStat::CentralDiff => Reducer::Series(central_diff),
      TemporalStat::NumPeaks => Reducer::Series(num_peaks),
    }
  }
}

impl FromStr for TemporalStat {
  type Err = PhenologyError;

  fn from_str(s: &str) -> Result<Self> {
    TemporalStat::ALL
      .iter()
      .copied()
      .find(|stat| stat.name() == s)
      .ok_or_else(|| PhenologyError::UnknownStatistic {
        name: s.to_string(),
        expected: TemporalStat::ALL.map(|stat| stat.name()).join(", "),
      })
  }
}

impl fmt::Display for TemporalStat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy)]
enum SpectralColumn {
  Discordance,
  Band(FourierSummary, Harmonic),
}

#[derive(Clone, Copy)]
enum Reducer {
  Series(fn(&[f32]) -> f64),
  Spectral(SpectralColumn),
}

impl Reducer {
  fn apply(&self, series: &[f32], spectral: Option<&SpectralSummary>) -> f64 {
    match self {
      Reducer::Series(reduce) => reduce(series),
      Reducer::Spectral(column) => spectral.map_or(f64::NAN, |s| s.column(*column)),
    }
  }
}

// --- Series reductions ---

/// Mean of the first differences.
pub fn mean_change(series: &[f32]) -> f64 {
  diff(series).mean().unwrap_or(f64::NAN)
}

/// Median of the first differences.
pub fn median_change(series: &[f32]) -> f64 {
  median(&diff(series))
}

/// Mean absolute first difference.
pub fn abs_change(series: &[f32]) -> f64 {
  diff(series).mapv(f64::abs).mean().unwrap_or(f64::NAN)
}

/// Complexity estimate: length of the series' first-difference vector.
pub fn complexity(series: &[f32]) -> f64 {
  diff(series).mapv(|d| d * d).sum().sqrt()
}

/// Mean of the central approximation of the second derivative.
pub fn central_diff(series: &[f32]) -> f64 {
  let second: Array1<f64> = series
    .windows(3)
    .map(|w| (w[2] as f64 - 2.0 * w[1] as f64 + w[0] as f64) / 2.0)
    .collect();
  second.mean().unwrap_or(f64::NAN)
}

/// Number of points larger than all of their [`PEAK_SUPPORT`] neighbours on each side.
pub fn num_peaks(series: &[f32]) -> f64 {
  let n = PEAK_SUPPORT;
  if series.len() < 2 * n + 1 {
    return 0.0;
  }
  (n..series.len() - n)
    .filter(|&i| (1..=n).all(|k| series[i] > series[i - k] && series[i] > series[i + k]))
    .count() as f64
}

// --- Spectral pass ---

/// FFT plans for one series length, shared by all pixels.
#[derive(Clone)]
pub struct FourierPlans {
  forward: Arc<dyn Fft<f64>>,
  inverse: Arc<dyn Fft<f64>>,
}

impl FourierPlans {
  pub fn new(len: usize) -> Self {
    let mut planner = FftPlanner::new();
    FourierPlans {
      forward: planner.plan_fft_forward(len),
      inverse: planner.plan_fft_inverse(len),
    }
  }
}

/// All spectral columns of one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralSummary {
  // [summary][harmonic]
  bands: [[f64; 3]; 3],
  discordance: f64,
}

impl SpectralSummary {
  /// Computes the band summaries of the magnitude spectrum and the low-pass
  /// reconstruction residual.
  ///
  /// Band K covers bins `1 + (K-1)*FOURIER_STEP .. 1 + K*FOURIER_STEP` of the full
  /// (two-sided) spectrum, so for short series the upper bands reach into the mirrored
  /// negative frequencies. The DC bin is excluded; bins past the series length are
  /// dropped and a band left without bins summarises to NaN.
  /// `plans` must have been built for `series.len()`.
  pub fn compute(series: &[f32], plans: &FourierPlans) -> Self {
    let n = series.len();
    if n == 0 {
      return SpectralSummary {
        bands: [[f64::NAN; 3]; 3],
        discordance: f64::NAN,
      };
    }
    let mut spectrum: Vec<Complex<f64>> = series.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
    plans.forward.process(&mut spectrum);

    let magnitudes: Array1<f64> = spectrum.iter().map(|c| c.norm()).collect();
    let mut bands = [[f64::NAN; 3]; 3];
    for harmonic in Harmonic::ALL {
      let lo = 1 + harmonic.index() * FOURIER_STEP;
      let hi = (lo + FOURIER_STEP).min(magnitudes.len());
      if lo >= hi {
        continue;
      }
      let band = magnitudes.slice(s![lo..hi]);
      bands[FourierSummary::Std.index()][harmonic.index()] = band.std(0.0);
      bands[FourierSummary::Mean.index()][harmonic.index()] = band.mean().unwrap_or(f64::NAN);
      bands[FourierSummary::Median.index()][harmonic.index()] = median(&band);
    }

    // Low-pass reconstruction from the DC term and the first harmonics.
    let mut filtered = spectrum;
    for (k, coefficient) in filtered.iter_mut().enumerate() {
      if k.min(n - k) > DISCORDANCE_HARMONICS {
        *coefficient = Complex::new(0.0, 0.0);
      }
    }
    plans.inverse.process(&mut filtered);
    let residuals: Array1<f64> = series
      .iter()
      .zip(&filtered)
      .map(|(&v, c)| (v as f64 - c.re / n as f64).abs())
      .collect();

    SpectralSummary {
      bands,
      discordance: residuals.mean().unwrap_or(f64::NAN),
    }
  }

  fn column(&self, column: SpectralColumn) -> f64 {
    match column {
      SpectralColumn::Discordance => self.discordance,
      SpectralColumn::Band(summary, harmonic) => self.bands[summary.index()][harmonic.index()],
    }
  }

  /// Value of one Fourier descriptor.
  pub fn band(&self, summary: FourierSummary, harmonic: Harmonic) -> f64 {
    self.column(SpectralColumn::Band(summary, harmonic))
  }

  pub fn discordance(&self) -> f64 {
    self.discordance
  }
}

// --- Engine ---

#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalStatisticsEngine {
  config: EngineConfig,
}

impl TemporalStatisticsEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  /// Computes the requested temporal statistics for every pixel of `source`.
  ///
  /// A pixel with any missing observation yields NaN for every statistic.
  pub fn run(&self, source: &dyn VolumeSource, stats: &[TemporalStat]) -> Result<StatisticLayerSet> {
    let volume = require_materialized(source)?;
    let stats = unique_request(stats)?;

    let start_time = Instant::now();
    let (rows, cols, steps) = volume.dim();
    debug!(rows, cols, steps, stats = stats.len(), "computing temporal statistics");

    let reducers: Vec<Reducer> = stats.iter().map(|stat| stat.reducer()).collect();
    let needs_spectrum = reducers.iter().any(|r| matches!(r, Reducer::Spectral(_)));
    let plans = FourierPlans::new(steps);

    let per_pixel = map_pixels(volume, &self.config, |lane| {
      let owned: Vec<f32>;
      let series: &[f32] = match lane.as_slice() {
        Some(slice) => slice,
        None => {
          owned = lane.to_vec();
          &owned
        }
      };
      if series.iter().any(|v| v.is_nan()) {
        return vec![f32::NAN; reducers.len()];
      }
      let spectral = needs_spectrum.then(|| SpectralSummary::compute(series, &plans));
      reducers
        .iter()
        .map(|reducer| reducer.apply(series, spectral.as_ref()) as f32)
        .collect::<Vec<f32>>()
    })?;

    let mut layers = StatisticLayerSet::new(volume.grid().clone(), volume.empty_pixel_mask());
    for (column, stat) in stats.iter().enumerate() {
      let values: Array2<f32> = per_pixel.map(|pixel| pixel[column]);
      layers.insert(stat.name(), LayerData::Float32(values))?;
    }

    info!(
      pixels = rows * cols,
      layers = layers.len(),
      elapsed_s = start_time.elapsed().as_secs_f64(),
      "temporal statistics computed"
    );
    Ok(layers)
  }
}

/// Temporal statistics of `source` for the statistics named in `stats`.
pub fn compute_temporal_stats(source: &dyn VolumeSource, stats: &[&str]) -> Result<StatisticLayerSet> {
  require_materialized(source)?;
  let stats: Vec<TemporalStat> = parse_stats(stats)?;
  TemporalStatisticsEngine::new().run(source, &stats)
}
