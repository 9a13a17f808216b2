//! Labeled 2-D statistic layers produced by the engines.

use ndarray::Array2;

use crate::error::{PhenologyError, Result};
use crate::volume::GridMetadata;

/// Nodata value of day-of-year layers.
pub const DOY_NODATA: i16 = -9999;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
  /// Day-of-year statistics; undefined pixels hold [`DOY_NODATA`].
  Int16(Array2<i16>),
  /// Value statistics; undefined pixels hold NaN.
  Float32(Array2<f32>),
}

impl LayerData {
  pub fn dim(&self) -> (usize, usize) {
    match self {
      LayerData::Int16(data) => data.dim(),
      LayerData::Float32(data) => data.dim(),
    }
  }

  pub fn nodata(&self) -> f64 {
    match self {
      LayerData::Int16(_) => DOY_NODATA as f64,
      LayerData::Float32(_) => f64::NAN,
    }
  }

  /// Values as `f32` with every undefined pixel set to NaN.
  pub fn to_f32(&self) -> Array2<f32> {
    match self {
      LayerData::Int16(data) => data.mapv(|v| if v == DOY_NODATA { f32::NAN } else { v as f32 }),
      LayerData::Float32(data) => data.clone(),
    }
  }

  pub fn as_int16(&self) -> Option<&Array2<i16>> {
    match self {
      LayerData::Int16(data) => Some(data),
      LayerData::Float32(_) => None,
    }
  }

  pub fn as_float32(&self) -> Option<&Array2<f32>> {
    match self {
      LayerData::Float32(data) => Some(data),
      LayerData::Int16(_) => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticLayer {
  name: String,
  data: LayerData,
}

impl StatisticLayer {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn data(&self) -> &LayerData {
    &self.data
  }
}

/// Ordered mapping from statistic name to layer, sharing one grid.
///
/// Alongside the layers the set keeps the mask of pixels whose input series was
/// entirely missing. Those pixels were analysed as zero-valued series, so their
/// layer values must not be read as observations.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticLayerSet {
  grid: GridMetadata,
  layers: Vec<StatisticLayer>,
  nodata_mask: Array2<bool>,
}

impl StatisticLayerSet {
  pub(crate) fn new(grid: GridMetadata, nodata_mask: Array2<bool>) -> Self {
    StatisticLayerSet {
      grid,
      layers: Vec::new(),
      nodata_mask,
    }
  }

  pub(crate) fn insert(&mut self, name: &str, data: LayerData) -> Result<()> {
    if self.get(name).is_some() {
      return Err(PhenologyError::InvalidArgument(format!("layer '{}' is already present", name)));
    }
    if data.dim() != self.grid.shape() {
      return Err(PhenologyError::GridMismatch(format!(
        "layer '{}' has shape {:?}, the grid is {:?}",
        name,
        data.dim(),
        self.grid.shape()
      )));
    }
    self.layers.push(StatisticLayer {
      name: name.to_string(),
      data,
    });
    Ok(())
  }

  pub fn grid(&self) -> &GridMetadata {
    &self.grid
  }

  pub fn len(&self) -> usize {
    self.layers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.layers.is_empty()
  }

  /// Layer names in insertion order.
  pub fn names(&self) -> Vec<&str> {
    self.layers.iter().map(|l| l.name.as_str()).collect()
  }

  pub fn get(&self, name: &str) -> Option<&LayerData> {
    self.layers.iter().find(|l| l.name == name).map(|l| &l.data)
  }

  pub fn iter(&self) -> impl Iterator<Item = &StatisticLayer> {
    self.layers.iter()
  }

  /// True where the input pixel had no valid observation.
  pub fn nodata_mask(&self) -> &Array2<bool> {
    &self.nodata_mask
  }

  /// The no-data mask as a 0/1 layer, suitable for writing next to the statistics.
  pub fn mask_layer(&self) -> LayerData {
    LayerData::Int16(self.nodata_mask.mapv(i16::from))
  }

  /// Combines two sets computed on the same grid. Layers of `other` follow those of
  /// `self`; the no-data masks are united.
  pub fn merge(mut self, other: StatisticLayerSet) -> Result<Self> {
    if self.grid != other.grid {
      return Err(PhenologyError::GridMismatch(
        "layer sets do not share the same grid coordinates and attributes".to_string(),
      ));
    }
    for layer in other.layers {
      self.insert(&layer.name, layer.data)?;
    }
    self.nodata_mask.zip_mut_with(&other.nodata_mask, |a, &b| *a = *a || b);
    Ok(self)
  }
}
