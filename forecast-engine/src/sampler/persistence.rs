// Copyright (c) James Kassemi, SC, US. All rights reserved.
use ndarray::Array3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::{GenerativeSampler, SamplerSpec, WindowRequest};
use crate::error::SamplerError;

const PERTURBATION_OPTION: &str = "perturbation";
const SEED_OPTION: &str = "seed";

/// Reference backend that needs no neural model: the observed sub-window is reproduced from
/// the conditioning vector and every later position repeats the latest conditioned state.
///
/// With a positive `perturbation`, predicted positions receive Gaussian noise scaled by the
/// conditioning standard deviation.
#[derive(Debug)]
pub struct PersistenceSampler {
    rng: StdRng,
    perturbation: f64,
}

impl PersistenceSampler {
    pub fn new(perturbation: f64, seed: u64) -> Result<Self, SamplerError> {
        if !(perturbation.is_finite() && perturbation >= 0.0) {
            return Err(SamplerError::InvalidOption {
                name: PERTURBATION_OPTION.to_string(),
                reason: format!("{perturbation} must be a non-negative number"),
            });
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            perturbation,
        })
    }

    /// Reads the `perturbation` (default 0) and `seed` (default 0) options.
    pub fn from_spec(spec: &SamplerSpec) -> Result<Self, SamplerError> {
        let perturbation = spec.option(PERTURBATION_OPTION).unwrap_or(0.0);
        let seed = match spec.option(SEED_OPTION) {
            Some(seed) if seed < 0.0 || seed.fract() != 0.0 => {
                return Err(SamplerError::InvalidOption {
                    name: SEED_OPTION.to_string(),
                    reason: format!("{seed} is not a non-negative integer"),
                })
            }
            Some(seed) => seed as u64,
            None => 0,
        };
        Self::new(perturbation, seed)
    }
}

impl GenerativeSampler for PersistenceSampler {
    type Error = SamplerError;

    fn sample(&mut self, request: &WindowRequest<'_>) -> Result<Array3<f32>, Self::Error> {
        let conditioning = request.conditioning;
        let observed = request.observed.clone();
        if conditioning.timesteps() != observed.len() || observed.is_empty() {
            return Err(SamplerError::ObservedRange {
                expected: observed.len(),
                actual: conditioning.timesteps(),
            });
        }
        let (window_len, nodes, channels) = request.expected_shape();
        let latest = observed.len() - 1;
        let mut window = Array3::<f32>::zeros((window_len, nodes, channels));
        for (t, mut state) in window.outer_iter_mut().enumerate() {
            // Positions before the observed range are never saved; mirror the earliest state.
            let source = t.saturating_sub(observed.start).min(latest);
            let (Some(values), Some(covariance)) = (
                conditioning.step(source),
                conditioning.step_covariance(source),
            ) else {
                return Err(SamplerError::ObservedRange {
                    expected: observed.len(),
                    actual: conditioning.timesteps(),
                });
            };
            let predicted = t >= observed.end;
            for ((slot, value), variance) in state.iter_mut().zip(values).zip(covariance) {
                *slot = *value;
                if predicted && self.perturbation > 0.0 {
                    let noise: f64 = self.rng.sample(StandardNormal);
                    *slot += (noise * self.perturbation * (*variance as f64).sqrt()) as f32;
                }
            }
        }
        Ok(window)
    }
}
