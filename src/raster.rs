//! GeoTIFF input and output around the engines.
//!
//! A multi-band raster is read as a time series volume (band `b` is time step `b`),
//! and every statistic layer is written as its own single-band GeoTIFF carrying the
//! geotransform and projection of the input.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array3;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::layers::{LayerData, StatisticLayerSet};
use crate::volume::{dates_to_timestamps, GridMetadata, TimeSeriesVolume};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads one ISO date (YYYY-MM-DD) per line; blank lines and `#` comments are skipped.
pub fn read_dates(path: &Path) -> Result<Vec<NaiveDate>> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read dates file: {}", path.display()))?;
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(|line| {
      NaiveDate::parse_from_str(line, DATE_FORMAT).with_context(|| format!("Invalid date '{}' in {}", line, path.display()))
    })
    .collect()
}

// Dates taken from the band descriptions (the first 10 characters must be YYYY-MM-DD)
fn band_dates(dataset: &Dataset, count: usize) -> Result<Vec<NaiveDate>> {
  (1..=count)
    .map(|index| {
      let band = dataset.rasterband(index)?;
      let description = band.description()?;
      let date = description.get(..10).unwrap_or(&description);
      NaiveDate::parse_from_str(date, DATE_FORMAT).with_context(|| {
        format!(
          "Band {} has no date in its description ('{}'); supply a dates file instead",
          index, description
        )
      })
    })
    .collect()
}

/// Reads a multi-band raster into a volume. Band nodata values become NaN.
///
/// When `dates` is `None`, the acquisition dates are parsed from the band descriptions.
pub fn read_volume(path: &Path, dates: Option<Vec<NaiveDate>>) -> Result<TimeSeriesVolume> {
  let dataset = Dataset::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;
  let (width, height) = dataset.raster_size();
  let count = dataset.raster_count();

  let dates = match dates {
    Some(dates) => dates,
    None => band_dates(&dataset, count)?,
  };
  if dates.len() != count {
    anyhow::bail!("{} dates supplied for a raster with {} bands", dates.len(), count);
  }

  let mut data = Array3::<f32>::from_elem((height, width, count), f32::NAN);
  for index in 1..=count {
    let band = dataset.rasterband(index)?;
    let nodata = band.no_data_value();
    let buffer: Buffer<f32> = band
      .read_as((0, 0), (width, height), (width, height), Some(ResampleAlg::NearestNeighbour))
      .with_context(|| format!("Failed to read band {}", index))?;

    for (offset, &value) in buffer.data().iter().enumerate() {
      let is_nodata = nodata.is_some_and(|ndv| value as f64 == ndv);
      if !is_nodata {
        data[[offset / width, offset % width, index - 1]] = value;
      }
    }
  }

  let mut grid = match dataset.geo_transform() {
    Ok(geo_transform) => GridMetadata::from_geo_transform(geo_transform, height, width),
    Err(_) => GridMetadata::indexed(height, width),
  };
  let projection = dataset.projection();
  if !projection.is_empty() {
    grid.wkt = Some(projection);
  }
  grid.attrs.insert("source".to_string(), path.display().to_string());

  Ok(TimeSeriesVolume::new(data, dates_to_timestamps(&dates), grid)?)
}

// Writes one single-band tiled GeoTIFF
fn write_band<T: GdalType + Copy>(path: &Path, values: Vec<T>, grid: &GridMetadata, nodata: f64) -> Result<()> {
  let (height, width) = grid.shape();
  let driver = DriverManager::get_driver_by_name("GTiff")?;
  let options = CslStringList::from_iter(["TILED=YES", "BLOCKXSIZE=16", "BLOCKYSIZE=16"]);

  let mut ds = driver
    .create_with_band_type_with_options::<T, _>(path, width, height, 1, &options)
    .with_context(|| format!("Failed to create GeoTIFF file: {}", path.display()))?;

  if let Some(wkt) = &grid.wkt {
    ds.set_projection(wkt)?;
  }
  if let Some(geo_transform) = &grid.geo_transform {
    ds.set_geo_transform(geo_transform)?;
  }

  let mut band = ds.rasterband(1)?;
  band.set_no_data_value(Some(nodata))?;
  let mut buffer = Buffer::new((width, height), values);
  band
    .write((0, 0), (width, height), &mut buffer)
    .with_context(|| format!("Failed to write data to {}", path.display()))?;
  Ok(())
}

fn write_layer(path: &Path, layer: &LayerData, grid: &GridMetadata) -> Result<()> {
  match layer {
    LayerData::Int16(data) => write_band(path, data.iter().copied().collect(), grid, layer.nodata()),
    LayerData::Float32(data) => write_band(path, data.iter().copied().collect(), grid, layer.nodata()),
  }
}

pub fn layer_path(prefix: &str, name: &str) -> PathBuf {
  PathBuf::from(format!("{}_{}.tif", prefix, name))
}

/// Writes every layer as `<prefix>_<name>.tif`, plus `<prefix>_nodata_mask.tif` when
/// `include_mask` is set. Returns the written paths in order.
pub fn write_layers(set: &StatisticLayerSet, prefix: &str, include_mask: bool) -> Result<Vec<PathBuf>> {
  let mut written = Vec::with_capacity(set.len() + 1);
  for layer in set.iter() {
    let path = layer_path(prefix, layer.name());
    write_layer(&path, layer.data(), set.grid())?;
    written.push(path);
  }
  if include_mask {
    let path = layer_path(prefix, "nodata_mask");
    write_layer(&path, &set.mask_layer(), set.grid())?;
    written.push(path);
  }
  Ok(written)
}

#[derive(Debug, Serialize)]
struct LayerInfo<'a> {
  name: &'a str,
  data_type: &'static str,
  nodata: Option<f64>,
}

#[derive(Debug, Serialize)]
struct LayerSetMetadata<'a> {
  layers: Vec<LayerInfo<'a>>,
  dates: Vec<String>,
  grid: &'a GridMetadata,
  nodata_pixels: usize,
  processing_params: serde_json::Value,
}

/// Writes a JSON sidecar describing the layers, the input dates and the grid.
pub fn write_metadata(
  path: &Path,
  set: &StatisticLayerSet,
  volume: &TimeSeriesVolume,
  processing_params: serde_json::Value,
) -> Result<()> {
  let layers = set
    .iter()
    .map(|layer| {
      let (data_type, nodata) = match layer.data() {
        LayerData::Int16(_) => ("Int16", Some(layer.data().nodata())),
        LayerData::Float32(_) => ("Float32", None),
      };
      LayerInfo {
        name: layer.name(),
        data_type,
        nodata,
      }
    })
    .collect();

  let metadata = LayerSetMetadata {
    layers,
    dates: volume.timestamps().iter().map(|t| t.date().format(DATE_FORMAT).to_string()).collect(),
    grid: set.grid(),
    nodata_pixels: set.nodata_mask().iter().filter(|&&empty| empty).count(),
    processing_params,
  };
  let json_string = serde_json::to_string_pretty(&metadata)?;
  std::fs::write(path, json_string).with_context(|| format!("Failed to write metadata: {}", path.display()))?;
  Ok(())
}
