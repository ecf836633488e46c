// Copyright (c) James Kassemi, SC, US. All rights reserved.
use ndarray::ArrayView3;

use crate::error::ConditioningError;

/// Flattened `(time, node, channel)` conditioning vector with its per-element covariance.
///
/// Only the latest conditioning window is held; each update replaces it completely.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditioningState {
    vector: Vec<f32>,
    covariance: Vec<f32>,
    timesteps: usize,
    spatial_nodes: usize,
    latent_channels: usize,
}

impl ConditioningState {
    pub fn initialize(
        latents: Vec<f32>,
        covariance: Vec<f32>,
        spatial_nodes: usize,
        latent_channels: usize,
    ) -> Result<Self, ConditioningError> {
        if latents.len() != covariance.len() {
            return Err(ConditioningError::LengthMismatch {
                vector: latents.len(),
                covariance: covariance.len(),
            });
        }
        let state_len = spatial_nodes * latent_channels;
        if state_len == 0 || latents.is_empty() || latents.len() % state_len != 0 {
            return Err(ConditioningError::Ragged {
                len: latents.len(),
                state_len,
            });
        }
        Ok(Self {
            timesteps: latents.len() / state_len,
            vector: latents,
            covariance,
            spatial_nodes,
            latent_channels,
        })
    }

    /// Seeds the state from standardized observations, broadcasting the per-channel variance.
    pub fn from_observation(
        observation: ArrayView3<'_, f32>,
        channel_variance: &[f32],
    ) -> Result<Self, ConditioningError> {
        let (_, nodes, channels) = observation.dim();
        check_variance(channel_variance, channels)?;
        let vector: Vec<f32> = observation.iter().copied().collect();
        let covariance = broadcast(channel_variance, vector.len());
        Self::initialize(vector, covariance, nodes, channels)
    }

    /// Replaces the state with `window_slice` and a covariance rebuilt from the channel variance.
    pub fn update(
        &mut self,
        window_slice: ArrayView3<'_, f32>,
        channel_variance: &[f32],
    ) -> Result<(), ConditioningError> {
        let (timesteps, nodes, channels) = window_slice.dim();
        if (nodes, channels) != (self.spatial_nodes, self.latent_channels) || timesteps == 0 {
            return Err(ConditioningError::Shape {
                expected: timesteps.max(1) * self.state_len(),
                actual: window_slice.len(),
                timesteps,
                nodes: self.spatial_nodes,
                channels: self.latent_channels,
            });
        }
        check_variance(channel_variance, channels)?;
        self.vector = window_slice.iter().copied().collect();
        self.covariance = broadcast(channel_variance, self.vector.len());
        self.timesteps = timesteps;
        Ok(())
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn covariance(&self) -> &[f32] {
        &self.covariance
    }

    /// Number of conditioned timesteps held.
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn spatial_nodes(&self) -> usize {
        self.spatial_nodes
    }

    pub fn latent_channels(&self) -> usize {
        self.latent_channels
    }

    /// Values of one conditioned timestep, `nodes * channels` long.
    pub fn step(&self, idx: usize) -> Option<&[f32]> {
        let len = self.state_len();
        self.vector.get(idx * len..(idx + 1) * len)
    }

    /// Covariance of one conditioned timestep.
    pub fn step_covariance(&self, idx: usize) -> Option<&[f32]> {
        let len = self.state_len();
        self.covariance.get(idx * len..(idx + 1) * len)
    }

    fn state_len(&self) -> usize {
        self.spatial_nodes * self.latent_channels
    }
}

fn check_variance(channel_variance: &[f32], channels: usize) -> Result<(), ConditioningError> {
    if channel_variance.len() != channels {
        return Err(ConditioningError::ChannelVariance {
            expected: channels,
            actual: channel_variance.len(),
        });
    }
    Ok(())
}

// Channel is the fastest-varying axis of the flattened layout.
fn broadcast(channel_variance: &[f32], len: usize) -> Vec<f32> {
    channel_variance.iter().copied().cycle().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    #[test]
    fn from_observation_broadcasts_channel_variance() {
        let observation = Array3::from_shape_fn((1, 2, 3), |(_, n, c)| (n * 3 + c) as f32);
        let state = ConditioningState::from_observation(observation.view(), &[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(state.timesteps(), 1);
        assert_eq!(state.vector(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(state.covariance(), &[0.1, 0.2, 0.3, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn update_replaces_vector_and_covariance() {
        let observation = Array3::<f32>::zeros((1, 1, 2));
        let mut state = ConditioningState::from_observation(observation.view(), &[1.0, 1.0]).unwrap();
        let window = Array3::from_shape_fn((6, 1, 2), |(t, _, c)| (t * 10 + c) as f32);
        state.update(window.slice(s![2..6, .., ..]), &[0.5, 0.25]).unwrap();
        assert_eq!(state.timesteps(), 4);
        assert_eq!(state.step(0), Some(&[20.0, 21.0][..]));
        assert_eq!(state.step(3), Some(&[50.0, 51.0][..]));
        assert_eq!(state.step(4), None);
        assert_eq!(state.covariance().len(), 8);
        assert_eq!(state.step_covariance(2), Some(&[0.5, 0.25][..]));
    }

    #[test]
    fn initialize_checks_lengths() {
        assert_eq!(
            ConditioningState::initialize(vec![0.0; 4], vec![0.0; 3], 2, 2),
            Err(ConditioningError::LengthMismatch {
                vector: 4,
                covariance: 3
            })
        );
        assert!(ConditioningState::initialize(vec![0.0; 5], vec![0.0; 5], 2, 2).is_err());
        let state = ConditioningState::initialize(vec![0.0; 8], vec![0.0; 8], 2, 2).unwrap();
        assert_eq!(state.timesteps(), 2);
    }

    #[test]
    fn rejects_channel_variance_of_wrong_length() {
        let observation = Array3::<f32>::zeros((1, 1, 2));
        assert_eq!(
            ConditioningState::from_observation(observation.view(), &[1.0]),
            Err(ConditioningError::ChannelVariance {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn update_rejects_foreign_state_shape() {
        let observation = Array3::<f32>::zeros((1, 2, 2));
        let mut state = ConditioningState::from_observation(observation.view(), &[1.0, 1.0]).unwrap();
        let wrong = Array3::<f32>::zeros((3, 1, 2));
        assert!(state.update(wrong.view(), &[1.0, 1.0]).is_err());
    }
}
