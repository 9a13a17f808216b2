use approx::assert_relative_eq;
use chrono::NaiveDate;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use phenology_calculator::{
  analyze_series, compute_phenology, DeferredVolume, EngineConfig, EosMode, LayerData, PhenologyEngine,
  PhenologyError, PhenologyStat, SosMode, StatisticLayerSet, TimeSeriesVolume, DOY_NODATA,
};

const SEASON: [f32; 8] = [0.1, 0.2, 0.5, 0.9, 0.95, 0.6, 0.3, 0.1];
const SEASON_DOYS: [u32; 8] = [1, 30, 60, 90, 120, 150, 180, 210];

fn doy_dates(year: i32, doys: &[u32]) -> Vec<NaiveDate> {
  doys.iter().map(|&d| NaiveDate::from_yo_opt(year, d).unwrap()).collect()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn single_pixel(values: &[f32], dates: &[NaiveDate]) -> TimeSeriesVolume {
  let data = Array3::from_shape_vec((1, 1, values.len()), values.to_vec()).unwrap();
  TimeSeriesVolume::from_dates(data, dates).unwrap()
}

fn day(set: &StatisticLayerSet, name: &str, row: usize, col: usize) -> i16 {
  set.get(name).unwrap().as_int16().unwrap()[[row, col]]
}

fn value(set: &StatisticLayerSet, name: &str, row: usize, col: usize) -> f32 {
  set.get(name).unwrap().as_float32().unwrap()[[row, col]]
}

fn all_names() -> Vec<&'static str> {
  PhenologyStat::ALL.iter().map(|s| s.name()).collect()
}

fn layer_bits(data: &LayerData) -> Vec<u32> {
  data.to_f32().iter().map(|v| v.to_bits()).collect()
}

fn random_volume(rows: usize, cols: usize, seed: u64) -> TimeSeriesVolume {
  let mut rng = StdRng::seed_from_u64(seed);
  let doys: Vec<u32> = (0..12).map(|i| 1 + i * 30).collect();
  let data = Array3::from_shape_fn((rows, cols, doys.len()), |(_, _, t)| {
    // A noisy single hump with an occasional gap.
    let hump = (std::f32::consts::PI * t as f32 / 11.0).sin();
    if rng.gen_bool(0.05) {
      f32::NAN
    } else {
      0.2 + 0.6 * hump + rng.gen_range(-0.05..0.05)
    }
  });
  TimeSeriesVolume::from_dates(data, &doy_dates(2021, &doys)).unwrap()
}

#[test]
fn test_single_season_median_modes() {
  let volume = single_pixel(&SEASON, &doy_dates(2020, &SEASON_DOYS));
  let set = compute_phenology(&volume, &all_names(), "median", "median").unwrap();

  assert_eq!(day(&set, "POS", 0, 0), 120);
  assert_relative_eq!(value(&set, "vPOS", 0, 0), 0.95);
  assert_relative_eq!(value(&set, "Trough", 0, 0), 0.1);
  assert_relative_eq!(value(&set, "AOS", 0, 0), 0.85, epsilon = 1e-6);

  // Rising points before the peak are days 1, 30 and 60; their median value is 0.2.
  assert_eq!(day(&set, "SOS", 0, 0), 30);
  assert_relative_eq!(value(&set, "vSOS", 0, 0), 0.2);

  let sos = day(&set, "SOS", 0, 0);
  let eos = day(&set, "EOS", 0, 0);
  assert!(sos >= 1 && sos < 120);
  assert!(eos > 120 && eos <= 210);
  assert_eq!(day(&set, "LOS", 0, 0), eos - sos);

  let rog = value(&set, "ROG", 0, 0);
  assert_relative_eq!(rog, (0.95 - 0.2) / 90.0, epsilon = 1e-6);
  assert!(value(&set, "ROS", 0, 0) < 0.0);
}

#[test]
fn test_first_and_last_modes_select_lowest_candidate_not_earliest_or_latest() {
  let volume = single_pixel(&SEASON, &doy_dates(2020, &SEASON_DOYS));
  let set = compute_phenology(&volume, &all_names(), "first", "last").unwrap();

  // "first" and "last" pick the candidate lying furthest below the median value,
  // which is the lowest rising (falling) point, not the earliest (latest) one in time.
  assert_eq!(day(&set, "SOS", 0, 0), 1);
  assert_relative_eq!(value(&set, "vSOS", 0, 0), 0.1);
  assert_eq!(day(&set, "EOS", 0, 0), 210);
  assert_relative_eq!(value(&set, "vEOS", 0, 0), 0.1);
  assert_eq!(day(&set, "LOS", 0, 0), 209);
  assert_relative_eq!(value(&set, "ROG", 0, 0), 0.85 / 119.0, epsilon = 1e-6);
  assert_relative_eq!(value(&set, "ROS", 0, 0), -0.85 / 90.0, epsilon = 1e-6);
}

#[test]
fn test_amplitude_is_peak_minus_trough() {
  let volume = random_volume(4, 5, 7);
  let set = compute_phenology(&volume, &["vPOS", "Trough", "AOS"], "median", "median").unwrap();
  for row in 0..4 {
    for col in 0..5 {
      let expected = value(&set, "vPOS", row, col) - value(&set, "Trough", row, col);
      assert_relative_eq!(value(&set, "AOS", row, col), expected, epsilon = 1e-6);
    }
  }
}

#[test]
fn test_season_crossing_year_boundary_wraps_length() {
  let dates = [
    ymd(2020, 10, 1),
    ymd(2020, 11, 1),
    ymd(2020, 12, 1),
    ymd(2021, 1, 1),
    ymd(2021, 2, 1),
    ymd(2021, 3, 1),
    ymd(2021, 12, 1),
  ];
  let values = [0.2, 0.5, 0.9, 0.6, 0.3, 0.15, 0.1];
  let volume = single_pixel(&values, &dates);
  let set = compute_phenology(&volume, &["SOS", "POS", "EOS", "LOS"], "median", "median").unwrap();

  assert_eq!(day(&set, "SOS", 0, 0), 275);
  assert_eq!(day(&set, "POS", 0, 0), 336);
  assert_eq!(day(&set, "EOS", 0, 0), 60);
  // EOS is taken from the following cycle: last day of the record (335) + (60 - 275).
  assert_eq!(day(&set, "LOS", 0, 0), 120);
}

#[test]
fn test_season_ending_early_in_following_year_has_undefined_length() {
  let dates = [
    ymd(2020, 9, 1),
    ymd(2020, 10, 1),
    ymd(2020, 11, 1),
    ymd(2020, 12, 1),
    ymd(2021, 1, 1),
    ymd(2021, 2, 1),
    ymd(2021, 3, 1),
  ];
  let values = [0.1, 0.3, 0.6, 0.9, 0.5, 0.3, 0.2];
  let volume = single_pixel(&values, &dates);
  let set = compute_phenology(&volume, &["SOS", "EOS", "LOS"], "median", "median").unwrap();

  assert_eq!(day(&set, "SOS", 0, 0), 245);
  assert_eq!(day(&set, "EOS", 0, 0), 32);
  // 60 + (32 - 245) would be negative; the length is reported as missing instead.
  assert_eq!(day(&set, "LOS", 0, 0), DOY_NODATA);
}

#[test]
fn test_season_length_is_never_negative() {
  let volume = random_volume(8, 8, 99);
  let set = compute_phenology(&volume, &["LOS"], "median", "median").unwrap();
  for &length in set.get("LOS").unwrap().as_int16().unwrap().iter() {
    assert!(length >= 0 || length == DOY_NODATA, "LOS = {}", length);
  }
}

#[test]
fn test_monotonic_series_has_no_end_of_season() {
  let values = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
  let volume = single_pixel(&values, &doy_dates(2020, &SEASON_DOYS));
  let set = compute_phenology(&volume, &all_names(), "median", "median").unwrap();

  assert_eq!(day(&set, "EOS", 0, 0), DOY_NODATA);
  assert_eq!(day(&set, "LOS", 0, 0), DOY_NODATA);
  assert!(value(&set, "vEOS", 0, 0).is_nan());
  assert!(value(&set, "ROS", 0, 0).is_nan());

  assert_eq!(day(&set, "POS", 0, 0), 210);
  assert_ne!(day(&set, "SOS", 0, 0), DOY_NODATA);
  assert!(value(&set, "ROG", 0, 0).is_finite());
}

#[test]
fn test_empty_pixel_is_zero_filled_and_masked() {
  let mut values = SEASON.to_vec();
  values.extend([f32::NAN; 8]);
  let data = Array3::from_shape_vec((1, 2, 8), values).unwrap();
  let volume = TimeSeriesVolume::from_dates(data, &doy_dates(2020, &SEASON_DOYS)).unwrap();

  let set = compute_phenology(&volume, &all_names(), "median", "median").unwrap();

  assert_eq!(set.nodata_mask()[[0, 0]], false);
  assert_eq!(set.nodata_mask()[[0, 1]], true);
  assert_eq!(set.mask_layer().as_int16().unwrap()[[0, 1]], 1);

  // A flat zero series: the peak is the first observation and no transition exists.
  assert_eq!(value(&set, "vPOS", 0, 1), 0.0);
  assert_eq!(day(&set, "POS", 0, 1), 1);
  assert_eq!(day(&set, "SOS", 0, 1), DOY_NODATA);
  assert_eq!(day(&set, "EOS", 0, 1), DOY_NODATA);

  // The valid neighbour is unaffected.
  assert_eq!(day(&set, "POS", 0, 0), 120);
}

#[test]
fn test_partially_missing_pixel_keeps_its_peak() {
  let mut values = SEASON;
  values[1] = f32::NAN;
  let volume = single_pixel(&values, &doy_dates(2020, &SEASON_DOYS));
  let set = compute_phenology(&volume, &["POS", "vPOS"], "median", "median").unwrap();

  assert_eq!(set.nodata_mask()[[0, 0]], false);
  assert_eq!(day(&set, "POS", 0, 0), 120);
  assert_relative_eq!(value(&set, "vPOS", 0, 0), 0.95);
}

#[test]
fn test_requested_subset_keeps_order_and_values() {
  let volume = random_volume(3, 4, 11);
  let full = compute_phenology(&volume, &all_names(), "median", "median").unwrap();
  let subset = compute_phenology(&volume, &["LOS", "SOS", "AOS"], "median", "median").unwrap();

  assert_eq!(subset.names(), vec!["LOS", "SOS", "AOS"]);
  for name in ["LOS", "SOS", "AOS"] {
    assert_eq!(layer_bits(subset.get(name).unwrap()), layer_bits(full.get(name).unwrap()));
  }

  // Duplicates collapse onto the first occurrence.
  let repeated = compute_phenology(&volume, &["SOS", "EOS", "SOS"], "median", "median").unwrap();
  assert_eq!(repeated.names(), vec!["SOS", "EOS"]);
}

#[test]
fn test_layer_types_follow_statistic_kind() {
  let volume = random_volume(2, 2, 3);
  let set = compute_phenology(&volume, &all_names(), "median", "median").unwrap();
  assert_eq!(set.len(), 11);
  for stat in PhenologyStat::ALL {
    let layer = set.get(stat.name()).unwrap();
    assert_eq!(layer.as_int16().is_some(), stat.is_day_of_year(), "{}", stat);
    assert_eq!(layer.dim(), (2, 2));
  }
  assert_eq!(set.grid(), volume.grid());
}

#[test]
fn test_repeated_runs_are_identical() {
  let volume = random_volume(5, 6, 21);
  let first = compute_phenology(&volume, &all_names(), "median", "median").unwrap();
  let second = compute_phenology(&volume, &all_names(), "median", "median").unwrap();
  for name in all_names() {
    assert_eq!(layer_bits(first.get(name).unwrap()), layer_bits(second.get(name).unwrap()));
  }
}

#[test]
fn test_thread_count_does_not_change_results() {
  let volume = random_volume(9, 7, 42);
  let stats = PhenologyStat::ALL;
  let run = |config: EngineConfig| {
    PhenologyEngine::new(SosMode::Median, EosMode::Median)
      .with_config(config)
      .run(&volume, &stats)
      .unwrap()
  };

  let sequential = run(EngineConfig::sequential());
  for config in [EngineConfig::default(), EngineConfig::with_jobs(3)] {
    let parallel = run(config);
    for name in all_names() {
      assert_eq!(
        layer_bits(parallel.get(name).unwrap()),
        layer_bits(sequential.get(name).unwrap()),
        "{} differs with jobs = {}",
        name,
        config.jobs
      );
    }
  }
}

#[test]
fn test_analyze_series_matches_volume_result() {
  let dates = doy_dates(2020, &SEASON_DOYS);
  let timestamps: Vec<_> = dates.iter().map(|d| d.and_hms_opt(0, 0, 0).unwrap()).collect();
  let metrics = analyze_series(&SEASON, &timestamps, SosMode::First, EosMode::Last).unwrap();

  assert_eq!(metrics.peak_doy, Some(120));
  assert_eq!(metrics.start_doy, Some(1));
  assert_eq!(metrics.end_doy, Some(210));
  assert_eq!(metrics.length_doy, Some(209));

  let err = analyze_series(&SEASON[..4], &timestamps, SosMode::First, EosMode::Last).unwrap_err();
  assert!(matches!(err, PhenologyError::InvalidArgument(_)));
}

#[test]
fn test_unknown_statistic_is_rejected() {
  let volume = single_pixel(&SEASON, &doy_dates(2020, &SEASON_DOYS));
  let err = compute_phenology(&volume, &["SOS", "sos"], "median", "median").unwrap_err();
  match err {
    PhenologyError::UnknownStatistic { name, expected } => {
      assert_eq!(name, "sos");
      assert!(expected.contains("SOS"));
    }
    other => panic!("unexpected error: {}", other),
  }
}

#[test]
fn test_invalid_modes_and_empty_request() {
  let volume = single_pixel(&SEASON, &doy_dates(2020, &SEASON_DOYS));
  let bad_sos = compute_phenology(&volume, &["SOS"], "last", "median").unwrap_err();
  assert!(matches!(bad_sos, PhenologyError::InvalidArgument(_)));

  let bad_eos = compute_phenology(&volume, &["SOS"], "median", "first").unwrap_err();
  assert!(matches!(bad_eos, PhenologyError::InvalidArgument(_)));

  let empty = compute_phenology(&volume, &[], "median", "median").unwrap_err();
  assert!(matches!(empty, PhenologyError::InvalidArgument(_)));
}

#[test]
fn test_deferred_volume_is_rejected_until_computed() {
  let dates = doy_dates(2020, &SEASON_DOYS);
  let deferred = DeferredVolume::new(
    (1, 1, 8),
    Box::new(move || {
      let data = Array3::from_shape_vec((1, 1, 8), SEASON.to_vec()).unwrap();
      TimeSeriesVolume::from_dates(data, &dates)
    }),
  );
  // The input kind is checked before the arguments.
  let err = compute_phenology(&deferred, &["nonsense"], "bogus", "median").unwrap_err();
  assert!(matches!(err, PhenologyError::UnsupportedInputKind(_)));

  let volume = deferred.compute().unwrap();
  let set = compute_phenology(&volume, &["POS"], "median", "median").unwrap();
  assert_eq!(day(&set, "POS", 0, 0), 120);
}
