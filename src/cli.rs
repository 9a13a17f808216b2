use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use phenology_calculator::config::AppDefaults;
use phenology_calculator::{parse_stats, text, EosMode, PhenologyStat, SosMode, TemporalStat};

// Selection keyword that requests every statistic of a group
const ALL: &str = "all";

// Help text listing the selectable statistics with their titles.
fn generate_stats_help<'a, I: Iterator<Item = (&'a str, &'a str)>>(stats: I) -> String {
  stats
    .map(|(name, title)| {
      // Maximum length of statistic name plus spaces
      let name_display_width: usize = 16;
      let spaces = " ".repeat(name_display_width.saturating_sub(name.len()));
      format!("  {}{}{}\n", text::bold(name), spaces, title)
    })
    .collect::<String>()
}

pub fn build_command() -> Command {
  Command::new("Land Surface Phenology Calculator")
    .version(env!("CARGO_PKG_VERSION"))
    .author("Richard Feciskanin <richard.feciskanin@uniba.sk>")
    .after_help(format!(
      "{}\n{}\n{}\n{}",
      text::bold(format!("{} (--stats, comma separated or 'all'):", text::underline("Phenology statistics"))),
      generate_stats_help(PhenologyStat::ALL.iter().map(|s| (s.name(), s.title()))),
      text::bold(format!("{} (--temporal, comma separated or 'all'):", text::underline("Temporal statistics"))),
      generate_stats_help(TemporalStat::ALL.iter().map(|s| (s.name(), s.title())))
    ))
    .arg(
      Arg::new("input_file")
        .short('i')
        .long("input-file")
        .value_name("file")
        .required(true)
        .help("Specify the input multi-band raster (one band per acquisition)"),
    )
    .arg(
      Arg::new("output_prefix")
        .short('o')
        .long("output-prefix")
        .value_name("prefix")
        .required(true)
        .help("Specify the output file(s) prefix"),
    )
    .arg(
      Arg::new("dates")
        .long("dates")
        .value_name("file")
        .help("File with one acquisition date (YYYY-MM-DD) per band; band descriptions are used if omitted"),
    )
    .arg(
      Arg::new("stats")
        .short('s')
        .long("stats")
        .value_name("list")
        .help("Phenology statistics to calculate"),
    )
    .arg(
      Arg::new("temporal")
        .short('t')
        .long("temporal")
        .value_name("list")
        .help("Temporal statistics to calculate"),
    )
    .arg(
      Arg::new("sos_mode")
        .long("sos-mode")
        .value_name("mode")
        .help("Start of season selection: 'median' or 'first' [default: median]"),
    )
    .arg(
      Arg::new("eos_mode")
        .long("eos-mode")
        .value_name("mode")
        .help("End of season selection: 'median' or 'last' [default: median]"),
    )
    .arg(
      Arg::new("jobs")
        .short('j')
        .long("jobs")
        .help("Specify the number of threads to use (if omitted, all available processors are used)"),
    )
    .arg(
      Arg::new("mask")
        .long("mask")
        .help("Also write the mask of pixels without any valid observation")
        .action(ArgAction::SetTrue),
    )
    .arg(
      Arg::new("no_metadata")
        .long("no-metadata")
        .help("Do not write the JSON metadata sidecar")
        .action(ArgAction::SetTrue),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help("Print debug log messages")
        .action(ArgAction::SetTrue),
    )
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
  pub input_file: PathBuf,
  pub output_prefix: String,
  pub dates_file: Option<PathBuf>,
  pub phenology: Vec<PhenologyStat>,
  pub temporal: Vec<TemporalStat>,
  pub sos_mode: SosMode,
  pub eos_mode: EosMode,
  pub jobs: usize,
  pub write_mask: bool,
  pub write_metadata: bool,
  pub verbose: bool,
  // Problems that did not stop the run, reported once logging is up
  pub warnings: Vec<String>,
}

impl ProcessConfig {
  /// Resolves the command line against the `app.config` defaults. CLI values win.
  pub fn from_matches(matches: &ArgMatches, defaults: &AppDefaults) -> Result<Self> {
    let mut warnings = Vec::new();

    let phenology = match matches.get_one::<String>("stats") {
      Some(list) => select(list, &PhenologyStat::ALL)?,
      None => Vec::new(),
    };
    let temporal = match matches.get_one::<String>("temporal") {
      Some(list) => select(list, &TemporalStat::ALL)?,
      None => Vec::new(),
    };
    if phenology.is_empty() && temporal.is_empty() {
      bail!("No output selected. Please select at least one statistic with --stats or --temporal.");
    }

    let sos_mode = match matches.get_one::<String>("sos_mode") {
      Some(mode) => mode.parse()?,
      None => defaults.sos_mode.unwrap_or_default(),
    };
    let eos_mode = match matches.get_one::<String>("eos_mode") {
      Some(mode) => mode.parse()?,
      None => defaults.eos_mode.unwrap_or_default(),
    };

    let num_procs = num_cpus::get();
    let requested = match matches.get_one::<String>("jobs") {
      Some(jobs_str) => match jobs_str.parse::<usize>() {
        Ok(jobs) => Some(jobs),
        Err(_) => {
          warnings.push("'jobs' value is not a valid number. Using the number of processors.".to_string());
          None
        }
      },
      None => defaults.jobs,
    };
    let jobs = match requested {
      Some(jobs) if jobs > 0 => jobs.min(num_procs),
      Some(_) => {
        warnings.push("'jobs' value must be greater than 0. Using the number of processors.".to_string());
        num_procs
      }
      None => num_procs,
    };

    Ok(ProcessConfig {
      input_file: PathBuf::from(required(matches, "input_file")?),
      output_prefix: required(matches, "output_prefix")?,
      dates_file: matches.get_one::<String>("dates").map(PathBuf::from),
      phenology,
      temporal,
      sos_mode,
      eos_mode,
      jobs,
      write_mask: matches.get_flag("mask"),
      write_metadata: !matches.get_flag("no_metadata"),
      verbose: matches.get_flag("verbose"),
      warnings,
    })
  }
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
  match matches.get_one::<String>(id) {
    Some(value) => Ok(value.clone()),
    None => bail!("Missing required argument '{}'", id),
  }
}

// Parses a comma separated selection; 'all' selects the whole group
fn select<T>(list: &str, all: &[T]) -> Result<Vec<T>>
where
  T: Copy + PartialEq + std::str::FromStr<Err = phenology_calculator::PhenologyError>,
{
  if list.trim() == ALL {
    return Ok(all.to_vec());
  }
  let names: Vec<&str> = list.split(',').map(str::trim).filter(|name| !name.is_empty()).collect();
  let mut selected: Vec<T> = Vec::with_capacity(names.len());
  for stat in parse_stats::<T>(&names)? {
    if !selected.contains(&stat) {
      selected.push(stat);
    }
  }
  Ok(selected)
}
