use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use phenology_calculator::config::{AppDefaults, CONFIG_FILE};
use phenology_calculator::raster::{layer_path, read_dates, read_volume, write_layers, write_metadata};
use phenology_calculator::{text, EngineConfig, PhenologyEngine, StatisticLayerSet, TemporalStatisticsEngine};

mod cli;

use cli::{build_command, ProcessConfig};

fn setup_logging(verbose: bool) {
  let level = if verbose { Level::DEBUG } else { Level::INFO };
  let subscriber = FmtSubscriber::builder().with_max_level(level).with_target(false).finish();
  if tracing::subscriber::set_global_default(subscriber).is_err() {
    eprintln!("{}: logging was already initialised", text::warning("Warning"));
  }
}

// Lists every file the run is going to produce.
fn print_plan(config: &ProcessConfig, line: &str) {
  let prefix = &config.output_prefix;
  let entry = |title: &str, name: &str| text::output_entry(title, &layer_path(prefix, name).display().to_string());

  if !config.phenology.is_empty() {
    println!(
      "The following phenology statistics will be calculated [{}] (SOS mode: {}, EOS mode: {}):",
      config.phenology.len(),
      config.sos_mode,
      config.eos_mode
    );
    println!("{}", line);
    for stat in &config.phenology {
      println!("{}", entry(stat.title(), stat.name()));
    }
    println!();
  }
  if !config.temporal.is_empty() {
    println!("The following temporal statistics will be calculated [{}]:", config.temporal.len());
    println!("{}", line);
    for stat in &config.temporal {
      println!("{}", entry(stat.title(), stat.name()));
    }
    println!();
  }
  if config.write_mask {
    println!("{}", entry("Pixels without any valid observation", "nodata_mask"));
  }
  if config.write_metadata {
    println!(
      "{}",
      text::output_entry("Metadata sidecar", &metadata_path(prefix).display().to_string())
    );
  }
}

fn metadata_path(prefix: &str) -> PathBuf {
  PathBuf::from(format!("{}_metadata.json", prefix))
}

fn main() {
  if let Err(err) = run() {
    let output = format!("{}: {:#}", text::error("Error"), err);
    eprintln!("{}\n", text::bold(output));
    std::process::exit(1);
  }
}

fn run() -> Result<()> {
  let start_time = Instant::now();
  let app = build_command();

  println!(
    "{}",
    text::banner(
      "Land Surface Phenology Calculator",
      env!("CARGO_PKG_VERSION"),
      "Tool for calculating Land Surface Phenology metrics and temporal statistics\nfrom a vegetation index time series raster.",
      app.get_author().unwrap_or_default(),
    )
  );

  let matches = app.get_matches();
  let defaults = AppDefaults::load(Path::new(CONFIG_FILE)).context("Failed to read app.config")?;
  let config = ProcessConfig::from_matches(&matches, &defaults)?;

  setup_logging(config.verbose);
  for message in &config.warnings {
    warn!("{}", message);
  }

  let line = text::rule(false);
  let dline = text::rule(true);

  print_plan(&config, &line);
  println!("{}\n", dline);

  // Input
  let mut part_time = Instant::now();
  let dates = match &config.dates_file {
    Some(path) => Some(read_dates(path)?),
    None => None,
  };
  let volume = read_volume(&config.input_file, dates)?;
  let (rows, cols, steps) = volume.dim();
  println!(
    "{} Input raster ({} x {}, {} acquisitions) read in {:.2} seconds.",
    text::check_icon(),
    cols,
    rows,
    steps,
    part_time.elapsed().as_secs_f64()
  );

  // Statistics
  part_time = Instant::now();
  let engine_config = EngineConfig::with_jobs(config.jobs);
  let mut layers: Option<StatisticLayerSet> = None;

  if !config.phenology.is_empty() {
    let phenology = PhenologyEngine::new(config.sos_mode, config.eos_mode)
      .with_config(engine_config)
      .run(&volume, &config.phenology)
      .context("Phenology calculation failed")?;
    println!(
      "{} Phenology statistics calculated in {:.2} seconds.",
      text::check_icon(),
      part_time.elapsed().as_secs_f64()
    );
    layers = Some(phenology);
    part_time = Instant::now();
  }

  if !config.temporal.is_empty() {
    let temporal = TemporalStatisticsEngine::new()
      .with_config(engine_config)
      .run(&volume, &config.temporal)
      .context("Temporal statistics calculation failed")?;
    println!(
      "{} Temporal statistics calculated in {:.2} seconds.",
      text::check_icon(),
      part_time.elapsed().as_secs_f64()
    );
    layers = Some(match layers {
      Some(phenology) => phenology.merge(temporal)?,
      None => temporal,
    });
    part_time = Instant::now();
  }

  let Some(layers) = layers else {
    anyhow::bail!("No output selected.");
  };

  // Output
  let written = write_layers(&layers, &config.output_prefix, config.write_mask)?;
  if config.write_metadata {
    let params = json!({
      "input_file": config.input_file.display().to_string(),
      "phenology": config.phenology.iter().map(|s| s.name()).collect::<Vec<_>>(),
      "temporal": config.temporal.iter().map(|s| s.name()).collect::<Vec<_>>(),
      "sos_mode": config.sos_mode.as_str(),
      "eos_mode": config.eos_mode.as_str(),
      "jobs": config.jobs,
    });
    write_metadata(&metadata_path(&config.output_prefix), &layers, &volume, params)?;
  }
  println!(
    "{} {} output files written in {:.2} seconds.",
    text::check_icon(),
    written.len(),
    part_time.elapsed().as_secs_f64()
  );

  let empty_pixels = layers.nodata_mask().iter().filter(|&&empty| empty).count();
  if empty_pixels > 0 {
    println!(
      "{}: {} pixels had no valid observation (use --mask to write them out).",
      text::warning("Note"),
      empty_pixels
    );
  }

  println!("{}", line);
  println!("{}", text::success("Calculations completed successfully."));
  println!("Total elapsed time: {:.2} seconds.", start_time.elapsed().as_secs_f64());
  println!();

  Ok(())
}
