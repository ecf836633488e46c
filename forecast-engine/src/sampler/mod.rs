// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! The generative sampler seam: configuration, per-window request and output contract.

mod persistence;

use std::{collections::BTreeMap, fmt, ops::Range, str::FromStr, time::Instant};

use core_types::{config::ComputeConfig, ForecastConfig, Timestamp};
use ndarray::{s, Array3, ArrayView3};
use serde::Serialize;

use crate::{
    conditioning::ConditioningState,
    error::{ForecastError, SamplerError},
    schedule::ScheduleParameters,
};

pub use persistence::PersistenceSampler;

/// Noise-schedule sampler families the denoiser understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SamplerFamily {
    /// Predictor-corrector.
    #[serde(rename = "pc")]
    PredictorCorrector,
    /// Linear multistep.
    #[serde(rename = "lms")]
    LinearMultistep,
}

impl SamplerFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplerFamily::PredictorCorrector => "pc",
            SamplerFamily::LinearMultistep => "lms",
        }
    }
}

impl FromStr for SamplerFamily {
    type Err = SamplerError;

    fn from_str(selector: &str) -> Result<Self, Self::Err> {
        match selector {
            "pc" => Ok(SamplerFamily::PredictorCorrector),
            "lms" => Ok(SamplerFamily::LinearMultistep),
            _ => Err(SamplerError::UnknownFamily(selector.to_string())),
        }
    }
}

impl fmt::Display for SamplerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated sampler configuration, passed through to the sampler untouched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SamplerSpec {
    family: SamplerFamily,
    options: BTreeMap<String, f64>,
    diffusion_steps: usize,
    mmps_iters: usize,
    compute: ComputeConfig,
}

impl SamplerSpec {
    pub fn new(family: SamplerFamily, diffusion_steps: usize) -> Result<Self, SamplerError> {
        if diffusion_steps == 0 {
            return Err(SamplerError::NoDiffusionSteps);
        }
        Ok(Self {
            family,
            options: BTreeMap::new(),
            diffusion_steps,
            mmps_iters: 1,
            compute: ComputeConfig::default(),
        })
    }

    pub fn from_config(config: &ForecastConfig) -> Result<Self, SamplerError> {
        let family: SamplerFamily = config.diffusion.sampler.kind.parse()?;
        let mut spec = Self::new(family, config.diffusion_steps())?
            .with_mmps_iters(config.diffusion.mmps_iters)?
            .with_compute(config.compute);
        for (name, value) in &config.diffusion.sampler.config {
            spec = spec.with_option(name, *value)?;
        }
        Ok(spec)
    }

    pub fn with_option(mut self, name: &str, value: f64) -> Result<Self, SamplerError> {
        if !value.is_finite() {
            return Err(SamplerError::InvalidOption {
                name: name.to_string(),
                reason: format!("{value} is not finite"),
            });
        }
        self.options.insert(name.to_string(), value);
        Ok(self)
    }

    pub fn with_mmps_iters(mut self, iters: usize) -> Result<Self, SamplerError> {
        if iters == 0 {
            return Err(SamplerError::InvalidOption {
                name: "mmps_iters".to_string(),
                reason: "at least one iteration is required".to_string(),
            });
        }
        self.mmps_iters = iters;
        Ok(self)
    }

    pub fn with_compute(mut self, compute: ComputeConfig) -> Self {
        self.compute = compute;
        self
    }

    pub fn family(&self) -> SamplerFamily {
        self.family
    }

    pub fn option(&self, name: &str) -> Option<f64> {
        self.options.get(name).copied()
    }

    pub fn options(&self) -> &BTreeMap<String, f64> {
        &self.options
    }

    pub fn diffusion_steps(&self) -> usize {
        self.diffusion_steps
    }

    pub fn mmps_iters(&self) -> usize {
        self.mmps_iters
    }

    pub fn compute(&self) -> ComputeConfig {
        self.compute
    }
}

/// Everything a sampler sees for one window.
#[derive(Clone, Debug)]
pub struct WindowRequest<'a> {
    pub step: usize,
    pub conditioning: &'a ConditioningState,
    pub timestamps: &'a [Timestamp],
    /// Window positions the conditioning vector observes, `[cond_start_idx, P)`.
    pub observed: Range<usize>,
    pub schedule: ScheduleParameters,
    pub spatial_nodes: usize,
    pub latent_channels: usize,
    pub spec: &'a SamplerSpec,
}

impl WindowRequest<'_> {
    pub fn expected_shape(&self) -> (usize, usize, usize) {
        (
            self.schedule.blanket_size(),
            self.spatial_nodes,
            self.latent_channels,
        )
    }

    /// Observation operator: the observed sub-window of `window`, flattened in the same
    /// order as the conditioning vector.
    pub fn observe(&self, window: ArrayView3<'_, f32>) -> Vec<f32> {
        window
            .slice(s![self.observed.clone(), .., ..])
            .iter()
            .copied()
            .collect()
    }
}

/// Produces one fully denoised window of latent states per call.
pub trait GenerativeSampler {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sample(&mut self, request: &WindowRequest<'_>) -> Result<Array3<f32>, Self::Error>;
}

/// Wraps a sampler with call timing and the output contract (shape, finiteness).
#[derive(Debug)]
pub struct SamplerAdapter<G> {
    inner: G,
    calls: usize,
}

impl<G: GenerativeSampler> SamplerAdapter<G> {
    pub fn new(inner: G) -> Self {
        Self { inner, calls: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn into_inner(self) -> G {
        self.inner
    }

    pub fn sample(&mut self, request: &WindowRequest<'_>) -> Result<Array3<f32>, ForecastError> {
        let step = request.step;
        let started = Instant::now();
        self.calls += 1;
        let window = self
            .inner
            .sample(request)
            .map_err(|source| ForecastError::Sampling {
                step,
                source: Box::new(source),
            })?;
        log::debug!(
            "[forecast] step {step}: {} sampler returned in {:.2?}",
            request.spec.family(),
            started.elapsed()
        );
        let expected = request.expected_shape();
        if window.dim() != expected {
            return Err(ForecastError::SampleShape {
                step,
                expected,
                actual: window.dim(),
            });
        }
        if window.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteSample { step });
        }
        Ok(window)
    }
}
