#![cfg(feature = "gdal")]

use assert_cmd::Command;
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use std::path::Path;

const SEASON: [f32; 8] = [0.1, 0.2, 0.5, 0.9, 0.95, 0.6, 0.3, 0.1];
const DATES: &str = "2020-01-01\n2020-01-30\n2020-02-29\n2020-03-30\n2020-04-29\n2020-05-29\n2020-06-28\n2020-07-28\n";
const NODATA: f64 = -1.0;

// 3 x 2 raster, one band per acquisition; the last pixel is nodata throughout.
fn write_input(path: &Path) {
  let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
  let mut ds = driver.create_with_band_type::<f32, _>(path, 3, 2, SEASON.len()).unwrap();
  ds.set_geo_transform(&[600_000.0, 10.0, 0.0, 5_000_000.0, 0.0, -10.0]).unwrap();

  for (index, &value) in SEASON.iter().enumerate() {
    let mut band = ds.rasterband(index + 1).unwrap();
    band.set_no_data_value(Some(NODATA)).unwrap();
    let mut values = vec![value; 6];
    values[5] = NODATA as f32;
    let mut buffer = Buffer::new((3, 2), values);
    band.write((0, 0), (3, 2), &mut buffer).unwrap();
  }
}

fn read_first_band<T: gdal::raster::GdalType + Copy>(path: &Path) -> Vec<T> {
  let ds = Dataset::open(path).unwrap();
  let band = ds.rasterband(1).unwrap();
  let buffer = band.read_as::<T>((0, 0), (3, 2), (3, 2), None).unwrap();
  buffer.data().to_vec()
}

#[test]
fn test_cli_writes_requested_layers() {
  let temp_dir = tempfile::tempdir().unwrap();
  let input = temp_dir.path().join("ndvi.tif");
  let dates = temp_dir.path().join("dates.txt");
  let prefix = temp_dir.path().join("season");
  write_input(&input);
  std::fs::write(&dates, DATES).unwrap();

  let mut cmd = Command::cargo_bin("phenology_calculator").unwrap();
  cmd
    .current_dir(temp_dir.path())
    .arg("-i")
    .arg(&input)
    .arg("-o")
    .arg(&prefix)
    .arg("--dates")
    .arg(&dates)
    .arg("--stats")
    .arg("POS,vPOS,LOS")
    .arg("--temporal")
    .arg("complexity")
    .arg("--mask")
    .arg("-j")
    .arg("2")
    .assert()
    .success();

  let output = |name: &str| temp_dir.path().join(format!("season_{}.tif", name));
  for name in ["POS", "vPOS", "LOS", "complexity", "nodata_mask"] {
    assert!(output(name).exists(), "missing output for {}", name);
  }

  let pos: Vec<i16> = read_first_band(&output("POS"));
  assert_eq!(pos[0], 120);

  let vpos: Vec<f32> = read_first_band(&output("vPOS"));
  assert!((vpos[0] - 0.95).abs() < 1e-6);
  assert_eq!(vpos[5], 0.0);

  let mask: Vec<i16> = read_first_band(&output("nodata_mask"));
  assert_eq!(mask, vec![0, 0, 0, 0, 0, 1]);

  let complexity: Vec<f32> = read_first_band(&output("complexity"));
  assert!(complexity[0] > 0.0);
  assert!(complexity[5].is_nan());

  let metadata = std::fs::read_to_string(temp_dir.path().join("season_metadata.json")).unwrap();
  let metadata: serde_json::Value = serde_json::from_str(&metadata).unwrap();
  assert_eq!(metadata["layers"].as_array().unwrap().len(), 4);
  assert_eq!(metadata["nodata_pixels"], 1);
}

#[test]
fn test_cli_rejects_unknown_statistic() {
  let temp_dir = tempfile::tempdir().unwrap();
  let input = temp_dir.path().join("ndvi.tif");
  write_input(&input);

  let mut cmd = Command::cargo_bin("phenology_calculator").unwrap();
  cmd
    .current_dir(temp_dir.path())
    .arg("-i")
    .arg(&input)
    .arg("-o")
    .arg(temp_dir.path().join("out"))
    .arg("--stats")
    .arg("SOS,peak")
    .assert()
    .failure();
}

#[test]
fn test_cli_requires_an_output() {
  let temp_dir = tempfile::tempdir().unwrap();
  let mut cmd = Command::cargo_bin("phenology_calculator").unwrap();
  cmd
    .current_dir(temp_dir.path())
    .arg("-i")
    .arg(temp_dir.path().join("missing.tif"))
    .arg("-o")
    .arg(temp_dir.path().join("out"))
    .assert()
    .failure();
}
