//! NaN-aware index of the maximum or minimum of a series.
//!
//! Ordinary arg-reductions have no sensible answer for a slice made only of missing
//! values. Here such slices yield `None`; every other slice yields the same index as a
//! plain argmax/argmin, ties resolved to the first occurrence.

use ndarray::{Array, ArrayView, ArrayView1, Axis, Dimension, RemoveAxis};

use crate::reduce::{nan_max, nan_min};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
  Max,
  Min,
}

/// Index of the requested extremum of `series`, or `None` when every value is NaN.
///
/// Missing values are first replaced by a fill value that cannot win the comparison
/// (the slice minimum minus one for `Max`, the slice maximum plus one for `Min`), then
/// an ordinary first-occurrence arg-reduction is run over the filled slice.
pub fn nan_arg(series: ArrayView1<'_, f32>, extremum: Extremum) -> Option<usize> {
  if series.iter().all(|v| v.is_nan()) {
    return None;
  }

  let fill = match extremum {
    Extremum::Max => nan_min(series.iter()) - 1.0,
    Extremum::Min => nan_max(series.iter()) + 1.0,
  };

  let mut best: Option<(usize, f32)> = None;
  for (index, &value) in series.iter().enumerate() {
    let value = if value.is_nan() { fill } else { value };
    let wins = match best {
      None => true,
      Some((_, current)) => match extremum {
        Extremum::Max => value > current,
        Extremum::Min => value < current,
      },
    };
    if wins {
      best = Some((index, value));
    }
  }

  best.map(|(index, _)| index)
}

/// Applies [`nan_arg`] to every lane of `array` along `axis`.
pub fn nan_arg_axis<D>(array: ArrayView<'_, f32, D>, axis: Axis, extremum: Extremum) -> Array<Option<usize>, D::Smaller>
where
  D: Dimension + RemoveAxis,
{
  array.map_axis(axis, |lane| nan_arg(lane, extremum))
}
