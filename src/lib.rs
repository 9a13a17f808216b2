//! # Phenology Calculator Library
//!
//! Land surface phenology and temporal shape statistics for vegetation index time
//! series stored as (row, column, time) volumes.
//!
//! The main components are:
//! - `TimeSeriesVolume`: the in-memory input volume with its time axis and grid.
//! - `PhenologyEngine` / `compute_phenology`: per-pixel season metrics (SOS, POS, EOS,
//!   LOS, AOS, rates of greening and senescence, ...).
//! - `TemporalStatisticsEngine` / `compute_temporal_stats`: change, peak and Fourier
//!   descriptors of each pixel series.
//! - `StatisticLayerSet`: the ordered named 2-D layers both engines return.
//!
//! With the `gdal` feature the `raster` module reads multi-band GeoTIFFs and writes
//! the layers back as GeoTIFFs; the `phenology_calculator` binary is built on it.

pub mod arg_extremum;
pub mod config;
pub mod error;
pub mod layers;
pub mod phenology;
pub mod season;
pub mod temporal;
pub mod text;
pub mod volume;

mod parallel;
mod reduce;

#[cfg(feature = "gdal")]
pub mod raster;

pub use arg_extremum::{nan_arg, nan_arg_axis, Extremum};
pub use config::EngineConfig;
pub use error::{PhenologyError, Result};
pub use layers::{LayerData, StatisticLayer, StatisticLayerSet, DOY_NODATA};
pub use phenology::{compute_phenology, parse_stats, PhenologyEngine, PhenologyStat};
pub use season::{analyze_series, EosMode, SeasonCurveAnalyzer, SeasonMetrics, SosMode};
pub use temporal::{compute_temporal_stats, FourierSummary, Harmonic, TemporalStat, TemporalStatisticsEngine};
pub use volume::{DeferredVolume, GridMetadata, TimeAxis, TimeSeriesVolume, VolumeSource};
