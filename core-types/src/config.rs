// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::BTreeMap, fmt, path::Path, path::PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Forecast run configuration: horizon, window split, model, sampler and compute knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Forecast horizon in hours; divided by `model.blanket_dt` to get predicted states.
    pub lead_time: u32,
    #[serde(default = "default_assimilation_length")]
    pub assimilation_length: usize,
    #[serde(default)]
    pub past_window_size: WindowSplit,
    #[serde(default)]
    pub preds_per_step: WindowSplit,
    pub model: ModelConfig,
    pub diffusion: DiffusionConfig,
    #[serde(default)]
    pub compute: ComputeConfig,
    pub paths: PathsConfig,
}

fn default_assimilation_length() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub blanket_size: usize,
    /// Spacing between window elements, in hours.
    #[serde(default = "default_blanket_dt")]
    pub blanket_dt: u32,
    /// Diffusion steps used when `diffusion.num_steps` is unset.
    #[serde(default = "default_denoising_steps")]
    pub denoising_steps: usize,
    #[serde(default)]
    pub noise_level: f64,
    pub latent_channels: usize,
    pub spatial_nodes: usize,
}

fn default_blanket_dt() -> u32 {
    1
}

fn default_denoising_steps() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffusionConfig {
    #[serde(default)]
    pub num_steps: Option<usize>,
    #[serde(default = "default_mmps_iters")]
    pub mmps_iters: usize,
    pub sampler: SamplerSettings,
}

fn default_mmps_iters() -> usize {
    1
}

/// Raw sampler selector as written in the config file; validated by the forecast engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSettings {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Float32,
    Float16,
    Bfloat16,
}

/// Device and numeric precision, resolved once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeConfig {
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub precision: Precision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON file with per-channel latent `mean` and `std`.
    pub latent_stats: PathBuf,
}

/// Size of one side of the window split: explicit or derived from the other side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSplit", into = "RawSplit")]
pub enum WindowSplit {
    #[default]
    Auto,
    Fixed(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSplit {
    Count(usize),
    Keyword(String),
}

impl TryFrom<RawSplit> for WindowSplit {
    type Error = String;

    fn try_from(value: RawSplit) -> Result<Self, Self::Error> {
        match value {
            RawSplit::Count(n) => Ok(WindowSplit::Fixed(n)),
            RawSplit::Keyword(word) => {
                let trimmed = word.trim();
                if trimmed.eq_ignore_ascii_case("auto") {
                    return Ok(WindowSplit::Auto);
                }
                trimmed
                    .parse::<usize>()
                    .map(WindowSplit::Fixed)
                    .map_err(|_| format!("expected a count or \"auto\", got '{word}'"))
            }
        }
    }
}

impl From<WindowSplit> for RawSplit {
    fn from(value: WindowSplit) -> Self {
        match value {
            WindowSplit::Auto => RawSplit::Keyword("auto".to_string()),
            WindowSplit::Fixed(n) => RawSplit::Count(n),
        }
    }
}

impl fmt::Display for WindowSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSplit::Auto => write!(f, "auto"),
            WindowSplit::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl ForecastConfig {
    /// Loads a TOML file, applies `FORECAST_*` environment overrides (nested keys use `__`),
    /// and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(environment_overrides())
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`ForecastConfig::load`] for an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.blanket_dt == 0 {
            return Err(ConfigError::Message(
                "model.blanket_dt must be at least 1 hour".to_string(),
            ));
        }
        if self.model.blanket_size < 2 {
            return Err(ConfigError::Message(
                "model.blanket_size must be at least 2".to_string(),
            ));
        }
        if self.assimilation_length == 0 {
            return Err(ConfigError::Message(
                "assimilation_length must be at least 1".to_string(),
            ));
        }
        if self.lead_steps() == 0 {
            return Err(ConfigError::Message(format!(
                "lead_time of {}h is shorter than one {}h step",
                self.lead_time, self.model.blanket_dt
            )));
        }
        if self.model.latent_channels == 0 || self.model.spatial_nodes == 0 {
            return Err(ConfigError::Message(
                "model.latent_channels and model.spatial_nodes must be positive".to_string(),
            ));
        }
        if !(self.model.noise_level.is_finite() && self.model.noise_level >= 0.0) {
            return Err(ConfigError::Message(
                "model.noise_level must be a non-negative number".to_string(),
            ));
        }
        if self.diffusion_steps() == 0 {
            return Err(ConfigError::Message(
                "diffusion step count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of predicted states (in `blanket_dt` units).
    pub fn lead_steps(&self) -> usize {
        (self.lead_time / self.model.blanket_dt.max(1)) as usize
    }

    pub fn diffusion_steps(&self) -> usize {
        self.diffusion.num_steps.unwrap_or(self.model.denoising_steps)
    }
}

fn environment_overrides() -> Environment {
    Environment::with_prefix("FORECAST")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
