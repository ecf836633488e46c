// Copyright (c) James Kassemi, SC, US. All rights reserved.
use core_types::{config::ComputeConfig, ForecastConfig, Timestamp};

use crate::{
    error::Result,
    sampler::SamplerSpec,
    scheduler::SchedulerSettings,
    schedule::{ForecastHorizon, ScheduleParameters},
};

/// Everything derived from the configuration and the initial condition, resolved before any
/// sampling starts.
#[derive(Clone, Debug, PartialEq)]
pub struct RunPlan {
    pub schedule: ScheduleParameters,
    pub horizon: ForecastHorizon,
    pub spec: SamplerSpec,
    pub compute: ComputeConfig,
    pub initial_condition: Timestamp,
    /// `initial_condition + trajectory_dt`.
    pub first_prediction: Timestamp,
    /// Earliest timestamp of the assimilated observation block.
    pub observation_start: Timestamp,
    pub window_start: Timestamp,
    pub lead_time_hours: u32,
    pub spatial_nodes: usize,
    pub latent_channels: usize,
    pub noise_level: f64,
}

impl RunPlan {
    pub fn from_config(config: &ForecastConfig, initial_condition: Timestamp) -> Result<Self> {
        let schedule = ScheduleParameters::resolve(
            config.model.blanket_size,
            config.past_window_size,
            config.preds_per_step,
        )?;
        let horizon = ForecastHorizon::new(
            config.assimilation_length,
            config.lead_steps(),
            config.model.blanket_dt,
        )?;
        horizon.initial_cond_start_idx(&schedule)?;
        let spec = SamplerSpec::from_config(config)?;

        let dt = config.model.blanket_dt as i64;
        let first_prediction = initial_condition.add_hours(dt);
        let observation_start =
            first_prediction.add_hours(-(horizon.assimilation_length() as i64) * dt);
        let window_start =
            first_prediction.add_hours(-(schedule.past_window_size() as i64) * dt);

        Ok(Self {
            schedule,
            horizon,
            compute: spec.compute(),
            spec,
            initial_condition,
            first_prediction,
            observation_start,
            window_start,
            lead_time_hours: config.lead_time,
            spatial_nodes: config.model.spatial_nodes,
            latent_channels: config.model.latent_channels,
            noise_level: config.model.noise_level,
        })
    }

    pub fn max_traj_size(&self) -> usize {
        self.horizon.max_traj_size()
    }

    pub fn num_steps(&self) -> usize {
        self.horizon.num_steps(&self.schedule)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            schedule: self.schedule,
            horizon: self.horizon,
            start: self.first_prediction,
            spatial_nodes: self.spatial_nodes,
            latent_channels: self.latent_channels,
            spec: self.spec.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ForecastError, SamplerError, ScheduleError};

    const CONFIG: &str = r#"
        lead_time = 24
        assimilation_length = 2
        past_window_size = "auto"
        [model]
        blanket_size = 8
        blanket_dt = 6
        noise_level = 0.1
        latent_channels = 4
        spatial_nodes = 10
        [diffusion]
        [diffusion.sampler]
        type = "pc"
        [paths]
        latent_stats = "stats.json"
    "#;

    fn init() -> Timestamp {
        Timestamp::new(2025, 6, 1, 0).unwrap()
    }

    #[test]
    fn derives_timestamps_and_sizes() {
        let config = ForecastConfig::from_toml_str(CONFIG).unwrap();
        let plan = RunPlan::from_config(&config, init()).unwrap();
        assert_eq!(plan.first_prediction.fields(), [2025, 6, 1, 6]);
        assert_eq!(plan.observation_start.fields(), [2025, 5, 31, 18]);
        assert_eq!(plan.window_start.fields(), [2025, 5, 31, 6]);
        assert_eq!(plan.horizon.lead_time(), 4);
        assert_eq!(plan.max_traj_size(), 6);
        assert_eq!(plan.num_steps(), 1);
        assert_eq!(plan.scheduler_settings().initial_window_start(), plan.window_start);
    }

    #[test]
    fn unknown_sampler_fails_before_any_work() {
        let config =
            ForecastConfig::from_toml_str(&CONFIG.replace("type = \"pc\"", "type = \"xyz\""))
                .unwrap();
        assert!(matches!(
            RunPlan::from_config(&config, init()),
            Err(ForecastError::Sampler(SamplerError::UnknownFamily(_)))
        ));
    }

    #[test]
    fn assimilation_beyond_past_window_is_a_config_error() {
        let config = ForecastConfig::from_toml_str(
            &CONFIG.replace("assimilation_length = 2", "assimilation_length = 5"),
        )
        .unwrap();
        assert!(matches!(
            RunPlan::from_config(&config, init()),
            Err(ForecastError::Schedule(ScheduleError::AssimilationExceedsPast { .. }))
        ));
    }
}
