use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Healthy glucose band in mmol/L, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl Default for TargetRange {
    fn default() -> Self {
        Self {
            min: 3.9,
            max: 10.0,
        }
    }
}

impl TargetRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min >= self.max {
            return Err(ConfigError::InvalidTargetRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Immutable run configuration handed to every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub target_range: TargetRange,
    /// Width and height in pixels of one daily dashboard panel.
    pub figure_size: (u32, u32),
    pub data_dir: PathBuf,
    pub glucose_file: String,
    pub sleep_file: String,
    pub workout_file: String,
    pub nutrition_file: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_range: TargetRange::default(),
            figure_size: (1500, 400),
            data_dir: PathBuf::from("data"),
            glucose_file: "glucose_data.csv".to_string(),
            sleep_file: "sleepdata.csv".to_string(),
            workout_file: "workout_data.csv".to_string(),
            nutrition_file: "food_log.csv".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = toml::from_str(contents)?;
        config.target_range.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Align glucose, sleep, workout and meal exports onto a per-minute timeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory containing the four CSV exports
    #[arg(long, env = "GLUCOSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Lower bound of the target glucose range (mmol/L)
    #[arg(long)]
    pub target_min: Option<f64>,

    /// Upper bound of the target glucose range (mmol/L)
    #[arg(long)]
    pub target_max: Option<f64>,

    /// Write the merged per-minute table as CSV
    #[arg(long)]
    pub csv_output: Option<PathBuf>,

    /// Write the merged per-minute table as a Feather (Arrow IPC) file
    #[arg(long)]
    pub feather_output: Option<PathBuf>,

    /// Write the validation report as JSON
    #[arg(long)]
    pub report_output: Option<PathBuf>,

    /// Dashboard SVG output path
    #[arg(long, default_value = "output/glucose_dashboard.svg")]
    pub dashboard: PathBuf,

    /// Skip dashboard rendering
    #[arg(long)]
    pub no_dashboard: bool,

    /// Generate a week of sample data into the data directory first
    #[arg(long)]
    pub create_sample: bool,

    /// Print per-day glucose statistics
    #[arg(long)]
    pub summary: bool,
}

impl Args {
    /// Resolve the effective configuration: defaults, then the TOML file, then flags.
    pub fn resolve_config(&self) -> Result<TrackerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_toml_file(path)?,
            None => TrackerConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(min) = self.target_min {
            config.target_range.min = min;
        }
        if let Some(max) = self.target_max {
            config.target_range.max = max;
        }
        config.target_range.validate()?;

        Ok(config)
    }
}
