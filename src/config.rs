//! Configuration for ingestion, sampling and caching.
//!
//! Every field has a serde default, so a config file only needs the keys it
//! overrides:
//!
//! ```json
//! { "sampling": { "min": 100, "max": 50000, "default": 1000 },
//!   "cache": { "expiry": "indefinite" } }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Bounds on the number of points drawn per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBounds {
    #[serde(default = "default_sample_min")]
    pub min: usize,

    #[serde(default = "default_sample_max")]
    pub max: usize,

    #[serde(default = "default_sample_size")]
    pub default: usize,
}

fn default_sample_min() -> usize {
    10
}

fn default_sample_max() -> usize {
    1000
}

fn default_sample_size() -> usize {
    100
}

impl Default for SampleBounds {
    fn default() -> Self {
        Self {
            min: default_sample_min(),
            max: default_sample_max(),
            default: default_sample_size(),
        }
    }
}

/// How long a cached pipeline result stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheExpiry {
    /// Expire a fixed time after insertion, regardless of access.
    Ttl { seconds: u64 },
    /// Keep for the life of the process.
    Indefinite,
}

impl CacheExpiry {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            CacheExpiry::Ttl { seconds } => Some(Duration::from_secs(*seconds)),
            CacheExpiry::Indefinite => None,
        }
    }
}

impl Default for CacheExpiry {
    fn default() -> Self {
        CacheExpiry::Ttl { seconds: 60 * 60 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub expiry: CacheExpiry,
}

/// Variable names looked up in the containers (StAMPS `ps_plot` defaults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    #[serde(default = "default_coordinates_field")]
    pub coordinates: String,

    #[serde(default = "default_displacement_field")]
    pub displacement: String,

    #[serde(default = "default_day_field")]
    pub day: String,

    #[serde(default = "default_master_day_field")]
    pub master_day: String,

    #[serde(default = "default_bperp_field")]
    pub bperp: String,

    #[serde(default = "default_velocity_field")]
    pub average_velocity: String,
}

fn default_coordinates_field() -> String {
    "lonlat".to_string()
}

fn default_displacement_field() -> String {
    "ph_mm".to_string()
}

fn default_day_field() -> String {
    "day".to_string()
}

fn default_master_day_field() -> String {
    "master_day".to_string()
}

fn default_bperp_field() -> String {
    "bperp".to_string()
}

fn default_velocity_field() -> String {
    "ph_disp".to_string()
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            coordinates: default_coordinates_field(),
            displacement: default_displacement_field(),
            day: default_day_field(),
            master_day: default_master_day_field(),
            bperp: default_bperp_field(),
            average_velocity: default_velocity_field(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: SampleBounds,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fields: FieldNames,

    /// Leading epochs averaged when no velocity vector is supplied.
    #[serde(default = "default_average_window")]
    pub average_window: usize,

    /// Dataset used when the caller supplies no input.
    #[serde(default = "default_dataset")]
    pub default_dataset: PathBuf,

    /// Points pre-selected for time-series views.
    #[serde(default = "default_selection")]
    pub default_selection: usize,

    /// Histogram bin width (mm).
    #[serde(default = "default_histogram_step")]
    pub histogram_step: f64,
}

fn default_average_window() -> usize {
    6
}

fn default_dataset() -> PathBuf {
    PathBuf::from("ps_plot_ts_v-do.mat")
}

fn default_selection() -> usize {
    2
}

fn default_histogram_step() -> f64 {
    5.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SampleBounds::default(),
            cache: CacheConfig::default(),
            fields: FieldNames::default(),
            average_window: default_average_window(),
            default_dataset: default_dataset(),
            default_selection: default_selection(),
            histogram_step: default_histogram_step(),
        }
    }
}

impl Config {
    /// Load and validate a JSON configuration file.
    pub fn from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| PipelineError::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        if s.min == 0 || s.min > s.max {
            return Err(PipelineError::Config(format!(
                "sample bounds [{}, {}] are empty or start at zero",
                s.min, s.max
            )));
        }
        if !(s.min..=s.max).contains(&s.default) {
            return Err(PipelineError::Config(format!(
                "default sample size {} is outside [{}, {}]",
                s.default, s.min, s.max
            )));
        }
        if self.average_window == 0 {
            return Err(PipelineError::Config("average_window must be at least 1".into()));
        }
        if !(self.histogram_step.is_finite() && self.histogram_step > 0.0) {
            return Err(PipelineError::Config(format!(
                "histogram_step must be positive, got {}",
                self.histogram_step
            )));
        }
        Ok(())
    }
}
