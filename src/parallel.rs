// Per-pixel map over a volume.
//
// Every pixel is computed from its own series only and written to its own slot,
// so the map runs without locks and gives the same result for any thread count.

use ndarray::{s, Array2, ArrayView1};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::error::{PhenologyError, Result};
use crate::volume::TimeSeriesVolume;

pub(crate) fn map_pixels<T, F>(volume: &TimeSeriesVolume, config: &EngineConfig, per_pixel: F) -> Result<Array2<T>>
where
  T: Send,
  F: Fn(ArrayView1<'_, f32>) -> T + Sync,
{
  let (rows, cols, _) = volume.dim();
  let data = volume.data();
  let pixel = |index: usize| per_pixel(data.slice(s![index / cols, index % cols, ..]));

  let values: Vec<T> = match config.jobs {
    1 => (0..rows * cols).map(pixel).collect(),
    0 => (0..rows * cols).into_par_iter().map(pixel).collect(),
    jobs => {
      let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
      pool.install(|| (0..rows * cols).into_par_iter().map(pixel).collect())
    }
  };

  Array2::from_shape_vec((rows, cols), values).map_err(|e| PhenologyError::InvalidVolume(e.to_string()))
}
