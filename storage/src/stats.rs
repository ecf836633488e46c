// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{fs, path::Path};

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Per-channel statistics of the latent space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatentStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl LatentStats {
    pub fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let stats: Self = serde_json::from_reader(file)?;
        stats.validate()?;
        Ok(stats)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    fn validate(&self) -> Result<()> {
        if self.mean.len() != self.std.len() {
            return Err(StorageError::Shape(format!(
                "latent stats have {} means but {} deviations",
                self.mean.len(),
                self.std.len()
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(StorageError::Shape(
                "latent deviations must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Maps raw latents to `(z - mean) / std` along the trailing channel axis.
    pub fn standardize(&self, latents: &mut Array3<f32>) -> Result<()> {
        self.check_channels(latents)?;
        for mut lane in latents.lanes_mut(Axis(2)) {
            for (channel, value) in lane.iter_mut().enumerate() {
                *value = (*value - self.mean[channel]) / self.std[channel];
            }
        }
        Ok(())
    }

    /// Inverse of [`LatentStats::standardize`] using the noise-inflated deviation the
    /// generative model was trained against.
    pub fn destandardize(&self, latents: &mut Array3<f32>, noise_level: f64) -> Result<()> {
        self.check_channels(latents)?;
        let inflated = self.inflated_std(noise_level);
        for mut lane in latents.lanes_mut(Axis(2)) {
            for (channel, value) in lane.iter_mut().enumerate() {
                *value = *value * inflated[channel] + self.mean[channel];
            }
        }
        Ok(())
    }

    /// Per-channel variance of a standardized latent observed with `noise_level`:
    /// `(noise / sqrt(std^2 + noise^2))^2`.
    pub fn conditioning_variance(&self, noise_level: f64) -> Vec<f32> {
        self.inflated_std(noise_level)
            .iter()
            .map(|std| {
                let ratio = noise_level / *std as f64;
                (ratio * ratio) as f32
            })
            .collect()
    }

    fn inflated_std(&self, noise_level: f64) -> Vec<f32> {
        self.std
            .iter()
            .map(|s| ((*s as f64).powi(2) + noise_level.powi(2)).sqrt() as f32)
            .collect()
    }

    fn check_channels(&self, latents: &Array3<f32>) -> Result<()> {
        let channels = latents.len_of(Axis(2));
        if channels != self.channels() {
            return Err(StorageError::Shape(format!(
                "latents have {channels} channels, stats describe {}",
                self.channels()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stats() -> LatentStats {
        LatentStats {
            mean: vec![1.0, -2.0],
            std: vec![2.0, 0.5],
        }
    }

    #[test]
    fn standardize_uses_trailing_channel_axis() {
        let mut latents = Array3::from_shape_vec((1, 2, 2), vec![3.0, -1.5, 1.0, -2.0]).unwrap();
        stats().standardize(&mut latents).unwrap();
        assert_eq!(latents.iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn destandardize_without_noise_inverts_standardize() {
        let original = Array3::from_shape_fn((2, 3, 2), |(t, n, c)| (t + n) as f32 - c as f32);
        let mut latents = original.clone();
        let stats = stats();
        stats.standardize(&mut latents).unwrap();
        stats.destandardize(&mut latents, 0.0).unwrap();
        for (a, b) in latents.iter().zip(original.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn conditioning_variance_matches_noise_ratio() {
        let stats = LatentStats {
            mean: vec![0.0],
            std: vec![3.0],
        };
        let variance = stats.conditioning_variance(4.0);
        assert!((variance[0] - 0.64).abs() < 1e-6);
        assert_eq!(stats.conditioning_variance(0.0), vec![0.0]);
    }

    #[test]
    fn rejects_channel_mismatch() {
        let mut latents = Array3::<f32>::zeros((1, 1, 3));
        assert!(stats().standardize(&mut latents).is_err());
    }

    #[test]
    fn load_validates_lengths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        stats().save(&path).unwrap();
        assert_eq!(LatentStats::load(&path).unwrap(), stats());

        fs::write(&path, r#"{"mean":[0.0,1.0],"std":[1.0]}"#).unwrap();
        assert!(LatentStats::load(&path).is_err());
    }
}
