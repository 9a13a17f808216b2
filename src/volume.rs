//! Time series volumes: the (row, column, time) arrays consumed by both engines.
//!
//! A [`TimeSeriesVolume`] is always materialised in memory. Inputs that are only
//! described (chunked, lazily loaded) are represented by [`DeferredVolume`] and must
//! be computed explicitly before analysis; the engines reject them through the
//! [`VolumeSource`] trait.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PhenologyError, Result};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Spatial coordinates and attributes carried unchanged from the input volume to every output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridMetadata {
  /// Column (x) coordinates of pixel centres.
  pub x: Vec<f64>,
  /// Row (y) coordinates of pixel centres.
  pub y: Vec<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geo_transform: Option<[f64; 6]>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub wkt: Option<String>,
  #[serde(default)]
  pub attrs: BTreeMap<String, String>,
}

impl GridMetadata {
  // Plain index coordinates (0, 1, 2, ...) for data without georeferencing
  pub fn indexed(height: usize, width: usize) -> Self {
    GridMetadata {
      x: (0..width).map(|c| c as f64).collect(),
      y: (0..height).map(|r| r as f64).collect(),
      ..Default::default()
    }
  }

  // Pixel-centre coordinates derived from a GDAL geotransform
  pub fn from_geo_transform(geo_transform: [f64; 6], height: usize, width: usize) -> Self {
    let x = (0..width)
      .map(|c| geo_transform[0] + (c as f64 + 0.5) * geo_transform[1])
      .collect();
    let y = (0..height)
      .map(|r| geo_transform[3] + (r as f64 + 0.5) * geo_transform[5])
      .collect();
    GridMetadata {
      x,
      y,
      geo_transform: Some(geo_transform),
      ..Default::default()
    }
  }

  /// Grid shape as (rows, columns).
  pub fn shape(&self) -> (usize, usize) {
    (self.y.len(), self.x.len())
  }
}

/// Time coordinate of a volume expressed the two ways the analysis needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
  elapsed_days: Vec<f64>,
  day_of_year: Vec<i16>,
}

impl TimeAxis {
  /// Builds the axis, rejecting empty, unordered or duplicated timestamps.
  pub fn new(timestamps: &[NaiveDateTime]) -> Result<Self> {
    let Some(first) = timestamps.first() else {
      return Err(PhenologyError::InvalidVolume("the time axis is empty".to_string()));
    };
    for pair in timestamps.windows(2) {
      if pair[1] <= pair[0] {
        return Err(PhenologyError::InvalidVolume(format!(
          "timestamps must be strictly increasing ({} is followed by {})",
          pair[0], pair[1]
        )));
      }
    }

    let elapsed_days = timestamps
      .iter()
      .map(|t| (*t - *first).num_milliseconds() as f64 / MILLIS_PER_DAY)
      .collect();
    let day_of_year = timestamps.iter().map(|t| t.ordinal() as i16).collect();

    Ok(TimeAxis { elapsed_days, day_of_year })
  }

  /// Days since the first observation; used as the derivative coordinate.
  pub fn elapsed_days(&self) -> &[f64] {
    &self.elapsed_days
  }

  pub fn day_of_year(&self) -> &[i16] {
    &self.day_of_year
  }

  /// Day of year of the last observation in the record.
  pub fn last_day_of_year(&self) -> i16 {
    self.day_of_year.last().copied().unwrap_or(0)
  }
}

/// Converts calendar dates to midnight timestamps.
pub fn dates_to_timestamps(dates: &[NaiveDate]) -> Vec<NaiveDateTime> {
  dates.iter().map(|d| d.and_time(NaiveTime::default())).collect()
}

/// A fully materialised (row, column, time) vegetation index volume.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesVolume {
  data: Array3<f32>,
  timestamps: Vec<NaiveDateTime>,
  axis: TimeAxis,
  grid: GridMetadata,
}

impl TimeSeriesVolume {
  /// Creates a volume, checking that the timestamps and grid coordinates match the array.
  pub fn new(data: Array3<f32>, timestamps: Vec<NaiveDateTime>, grid: GridMetadata) -> Result<Self> {
    let (rows, cols, steps) = data.dim();
    if timestamps.len() != steps {
      return Err(PhenologyError::InvalidVolume(format!(
        "{} timestamps supplied for a time axis of length {}",
        timestamps.len(),
        steps
      )));
    }
    if grid.shape() != (rows, cols) {
      return Err(PhenologyError::InvalidVolume(format!(
        "grid coordinates describe {}x{} pixels but the data has {}x{}",
        grid.shape().0,
        grid.shape().1,
        rows,
        cols
      )));
    }
    let axis = TimeAxis::new(&timestamps)?;

    // Pixel series are read as contiguous lanes along the time axis.
    let data = if data.is_standard_layout() {
      data
    } else {
      data.as_standard_layout().into_owned()
    };

    Ok(TimeSeriesVolume { data, timestamps, axis, grid })
  }

  /// Creates a volume from calendar dates and plain index coordinates.
  pub fn from_dates(data: Array3<f32>, dates: &[NaiveDate]) -> Result<Self> {
    let (rows, cols, _) = data.dim();
    Self::new(data, dates_to_timestamps(dates), GridMetadata::indexed(rows, cols))
  }

  pub fn data(&self) -> ArrayView3<'_, f32> {
    self.data.view()
  }

  pub fn timestamps(&self) -> &[NaiveDateTime] {
    &self.timestamps
  }

  pub fn grid(&self) -> &GridMetadata {
    &self.grid
  }

  /// (rows, columns, time steps)
  pub fn dim(&self) -> (usize, usize, usize) {
    self.data.dim()
  }

  pub fn time_axis(&self) -> &TimeAxis {
    &self.axis
  }

  /// The series of one pixel.
  pub fn pixel(&self, row: usize, col: usize) -> ArrayView1<'_, f32> {
    self.data.slice(s![row, col, ..])
  }

  /// True where every observation of the pixel is missing.
  pub fn empty_pixel_mask(&self) -> Array2<bool> {
    self.data.map_axis(Axis(2), |series| series.iter().all(|v| v.is_nan()))
  }

  /// Returns a working copy in which all-missing pixels are replaced by `value`,
  /// together with the mask of the replaced pixels. Partially missing pixels are left untouched.
  pub fn fill_empty_pixels(&self, value: f32) -> (TimeSeriesVolume, Array2<bool>) {
    let mask = self.empty_pixel_mask();
    let mut data = self.data.clone();
    for ((row, col), &empty) in mask.indexed_iter() {
      if empty {
        data.slice_mut(s![row, col, ..]).fill(value);
      }
    }
    let working = TimeSeriesVolume {
      data,
      timestamps: self.timestamps.clone(),
      axis: self.axis.clone(),
      grid: self.grid.clone(),
    };
    (working, mask)
  }
}

/// Anything an engine can be asked to analyse.
pub trait VolumeSource {
  /// Short name of the input kind used in error messages.
  fn kind(&self) -> &'static str;

  /// The in-memory volume, or `None` when the data has not been computed yet.
  fn materialized(&self) -> Option<&TimeSeriesVolume>;
}

impl VolumeSource for TimeSeriesVolume {
  fn kind(&self) -> &'static str {
    "in-memory"
  }

  fn materialized(&self) -> Option<&TimeSeriesVolume> {
    Some(self)
  }
}

pub(crate) fn require_materialized(source: &dyn VolumeSource) -> Result<&TimeSeriesVolume> {
  source
    .materialized()
    .ok_or_else(|| PhenologyError::UnsupportedInputKind(source.kind().to_string()))
}

pub type VolumeLoader = Box<dyn Fn() -> Result<TimeSeriesVolume> + Send + Sync>;

/// A volume of announced shape whose values are produced on demand by a loader.
pub struct DeferredVolume {
  shape: (usize, usize, usize),
  loader: VolumeLoader,
}

impl DeferredVolume {
  pub fn new(shape: (usize, usize, usize), loader: VolumeLoader) -> Self {
    DeferredVolume { shape, loader }
  }

  /// Runs the loader and checks that it produced the announced shape.
  pub fn compute(&self) -> Result<TimeSeriesVolume> {
    let volume = (self.loader)()?;
    if volume.dim() != self.shape {
      return Err(PhenologyError::InvalidVolume(format!(
        "deferred volume announced shape {:?} but loaded {:?}",
        self.shape,
        volume.dim()
      )));
    }
    Ok(volume)
  }
}

impl fmt::Debug for DeferredVolume {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeferredVolume")
      .field("shape", &self.shape)
      .finish_non_exhaustive()
  }
}

impl VolumeSource for DeferredVolume {
  fn kind(&self) -> &'static str {
    "deferred"
  }

  fn materialized(&self) -> Option<&TimeSeriesVolume> {
    None
  }
}
