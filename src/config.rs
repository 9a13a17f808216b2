use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::season::{EosMode, SosMode};

/// Name of the optional defaults file looked up in the working directory.
pub const CONFIG_FILE: &str = "app.config";

// Execution settings shared by both engines.
// jobs: 0 = rayon's global pool, 1 = sequential, n = dedicated pool of n threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
  pub jobs: usize,
}

impl EngineConfig {
  pub fn sequential() -> Self {
    EngineConfig { jobs: 1 }
  }

  pub fn with_jobs(jobs: usize) -> Self {
    EngineConfig { jobs }
  }
}

// Defaults read from a key=value file; any key may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppDefaults {
  pub sos_mode: Option<SosMode>,
  pub eos_mode: Option<EosMode>,
  pub jobs: Option<usize>,
}

impl AppDefaults {
  // Loads defaults from `path`. A missing file gives empty defaults,
  // a malformed mode value is reported as an error.
  pub fn load(path: &Path) -> Result<Self> {
    let sos_mode = load_config_value(path, "sos_mode").map(|v| v.parse()).transpose()?;
    let eos_mode = load_config_value(path, "eos_mode").map(|v| v.parse()).transpose()?;
    let jobs = load_config_value(path, "jobs").and_then(|v| v.parse::<usize>().ok());
    Ok(AppDefaults { sos_mode, eos_mode, jobs })
  }
}

// Loads a configuration value from a key=value file for a given key.
// Lines starting with '#' are comments.
pub fn load_config_value(config_path: &Path, key_to_find: &str) -> Option<String> {
  if !config_path.exists() {
    return None;
  }

  let file = File::open(config_path).ok()?;
  let reader = BufReader::new(file);

  for line in reader.lines() {
    let line = line.ok()?;
    if line.trim_start().starts_with('#') {
      continue;
    }
    if let Some((key, value)) = line.split_once('=') {
      if key.trim() == key_to_find {
        return Some(value.trim().to_string());
      }
    }
  }
  None
}
