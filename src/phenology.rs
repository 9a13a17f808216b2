//! Phenology statistics over a whole volume.
//!
//! Every pixel is analysed with [`SeasonCurveAnalyzer`]; all eleven statistics are
//! always computed (LOS needs SOS and EOS, the rates need the peak, ...) and only the
//! requested ones are materialised as layers, in the order they were requested.

use ndarray::Array2;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{PhenologyError, Result};
use crate::layers::{LayerData, StatisticLayerSet, DOY_NODATA};
use crate::parallel::map_pixels;
use crate::season::{EosMode, SeasonCurveAnalyzer, SeasonMetrics, SosMode};
use crate::volume::{require_materialized, TimeSeriesVolume, VolumeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhenologyStat {
  Sos,
  Pos,
  Eos,
  Trough,
  VSos,
  VPos,
  VEos,
  Los,
  Aos,
  Rog,
  Ros,
}

impl PhenologyStat {
  pub const ALL: [PhenologyStat; 11] = [
    PhenologyStat::Sos,
    PhenologyStat::Pos,
    PhenologyStat::Eos,
    PhenologyStat::Trough,
    PhenologyStat::VSos,
    PhenologyStat::VPos,
    PhenologyStat::VEos,
    PhenologyStat::Los,
    PhenologyStat::Aos,
    PhenologyStat::Rog,
    PhenologyStat::Ros,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      PhenologyStat::Sos => "SOS",
      PhenologyStat::Pos => "POS",
      PhenologyStat::Eos => "EOS",
      PhenologyStat::Trough => "Trough",
      PhenologyStat::VSos => "vSOS",
      PhenologyStat::VPos => "vPOS",
      PhenologyStat::VEos => "vEOS",
      PhenologyStat::Los => "LOS",
      PhenologyStat::Aos => "AOS",
      PhenologyStat::Rog => "ROG",
      PhenologyStat::Ros => "ROS",
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      PhenologyStat::Sos => "Day of year of the start of season",
      PhenologyStat::Pos => "Day of year of the peak of season",
      PhenologyStat::Eos => "Day of year of the end of season",
      PhenologyStat::Trough => "Minimum value of the season",
      PhenologyStat::VSos => "Value at the start of season",
      PhenologyStat::VPos => "Value at the peak of season",
      PhenologyStat::VEos => "Value at the end of season",
      PhenologyStat::Los => "Length of season (days)",
      PhenologyStat::Aos => "Amplitude of season",
      PhenologyStat::Rog => "Rate of greening",
      PhenologyStat::Ros => "Rate of senescence",
    }
  }

  /// Whether the statistic is a day of year (`Int16` layer) rather than a value.
  pub fn is_day_of_year(&self) -> bool {
    matches!(
      self,
      PhenologyStat::Sos | PhenologyStat::Pos | PhenologyStat::Eos | PhenologyStat::Los
    )
  }

  fn layer(self, metrics: &Array2<SeasonMetrics>) -> LayerData {
    match self {
      PhenologyStat::Sos => day_layer(metrics, |m| m.start_doy),
      PhenologyStat::Pos => day_layer(metrics, |m| m.peak_doy),
      PhenologyStat::Eos => day_layer(metrics, |m| m.end_doy),
      PhenologyStat::Los => day_layer(metrics, |m| m.length_doy),
      PhenologyStat::Trough => value_layer(metrics, |m| m.trough_value),
      PhenologyStat::VSos => value_layer(metrics, |m| m.start_value),
      PhenologyStat::VPos => value_layer(metrics, |m| m.peak_value),
      PhenologyStat::VEos => value_layer(metrics, |m| m.end_value),
      PhenologyStat::Aos => value_layer(metrics, |m| m.amplitude),
      PhenologyStat::Rog => value_layer(metrics, |m| m.green_rate),
      PhenologyStat::Ros => value_layer(metrics, |m| m.senesce_rate),
    }
  }
}

impl FromStr for PhenologyStat {
  type Err = PhenologyError;

  fn from_str(s: &str) -> Result<Self> {
    PhenologyStat::ALL
      .iter()
      .copied()
      .find(|stat| stat.name() == s)
      .ok_or_else(|| PhenologyError::UnknownStatistic {
        name: s.to_string(),
        expected: PhenologyStat::ALL.map(|stat| stat.name()).join(", "),
      })
  }
}

impl fmt::Display for PhenologyStat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

fn day_layer<F: Fn(&SeasonMetrics) -> Option<i16>>(metrics: &Array2<SeasonMetrics>, field: F) -> LayerData {
  LayerData::Int16(metrics.map(|m| field(m).unwrap_or(DOY_NODATA)))
}

fn value_layer<F: Fn(&SeasonMetrics) -> f32>(metrics: &Array2<SeasonMetrics>, field: F) -> LayerData {
  LayerData::Float32(metrics.map(field))
}

/// Parses statistic names, failing on the first unknown one.
pub fn parse_stats<T: FromStr<Err = PhenologyError>>(names: &[&str]) -> Result<Vec<T>> {
  names.iter().map(|name| name.parse::<T>()).collect()
}

// Keeps the first occurrence of every statistic and rejects an empty request
pub(crate) fn unique_request<T: Copy + PartialEq>(stats: &[T]) -> Result<Vec<T>> {
  let mut unique: Vec<T> = Vec::with_capacity(stats.len());
  for &stat in stats {
    if !unique.contains(&stat) {
      unique.push(stat);
    }
  }
  if unique.is_empty() {
    return Err(PhenologyError::InvalidArgument(
      "no output selected, request at least one statistic".to_string(),
    ));
  }
  Ok(unique)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhenologyEngine {
  analyzer: SeasonCurveAnalyzer,
  config: EngineConfig,
}

impl PhenologyEngine {
  pub fn new(sos_mode: SosMode, eos_mode: EosMode) -> Self {
    PhenologyEngine {
      analyzer: SeasonCurveAnalyzer::new(sos_mode, eos_mode),
      config: EngineConfig::default(),
    }
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  /// Season metrics of every pixel of an already zero-filled volume.
  pub fn analyze_volume(&self, volume: &TimeSeriesVolume) -> Result<Array2<SeasonMetrics>> {
    let axis = volume.time_axis();
    map_pixels(volume, &self.config, |series| self.analyzer.analyze(series, axis))
  }

  /// Computes the requested statistics for every pixel of `source`.
  ///
  /// All-missing pixels are zero-filled in a working copy before the analysis and
  /// reported through [`StatisticLayerSet::nodata_mask`].
  pub fn run(&self, source: &dyn VolumeSource, stats: &[PhenologyStat]) -> Result<StatisticLayerSet> {
    let volume = require_materialized(source)?;
    let stats = unique_request(stats)?;

    let start_time = Instant::now();
    let (rows, cols, steps) = volume.dim();
    debug!(
      rows,
      cols,
      steps,
      sos_mode = %self.analyzer.sos_mode(),
      eos_mode = %self.analyzer.eos_mode(),
      "computing phenology"
    );

    let (working, mask) = volume.fill_empty_pixels(0.0);
    let empty_pixels = mask.iter().filter(|&&empty| empty).count();
    if empty_pixels > 0 {
      debug!(empty_pixels, "zero-filled pixels without valid observations");
    }

    let metrics = self.analyze_volume(&working)?;

    let mut layers = StatisticLayerSet::new(volume.grid().clone(), mask);
    for stat in stats {
      layers.insert(stat.name(), stat.layer(&metrics))?;
    }

    info!(
      pixels = rows * cols,
      layers = layers.len(),
      elapsed_s = start_time.elapsed().as_secs_f64(),
      "phenology computed"
    );
    Ok(layers)
  }
}

/// Land surface phenology of `source` for the statistics named in `stats`.
///
/// Arguments are validated before any computation: deferred inputs fail with
/// `UnsupportedInputKind`, bad modes with `InvalidArgument`, unknown names with
/// `UnknownStatistic`.
pub fn compute_phenology(
  source: &dyn VolumeSource,
  stats: &[&str],
  sos_mode: &str,
  eos_mode: &str,
) -> Result<StatisticLayerSet> {
  require_materialized(source)?;
  let sos_mode: SosMode = sos_mode.parse()?;
  let eos_mode: EosMode = eos_mode.parse()?;
  let stats: Vec<PhenologyStat> = parse_stats(stats)?;

  PhenologyEngine::new(sos_mode, eos_mode).run(source, &stats)
}
