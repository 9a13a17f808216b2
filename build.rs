fn main() {
  // GDAL is only linked when the raster front end is enabled.
  if std::env::var_os("CARGO_FEATURE_GDAL").is_none() {
    return;
  }
  let target = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
  if target == "windows" {
    if let Err(err) = vcpkg::Config::new().find_package("gdal") {
      println!("cargo:warning=vcpkg could not locate gdal: {}", err);
    }
  }
}
