// Copyright (c) James Kassemi, SC, US. All rights reserved.
use core_types::{types::trajectory_timestamps, Timestamp};
use ndarray::{s, ArrayView3};
use serde::Serialize;

use crate::{
    accumulator::{Trajectory, TrajectoryAccumulator},
    conditioning::ConditioningState,
    error::{ConditioningError, ForecastError, Result},
    persistence::PersistenceSink,
    sampler::{GenerativeSampler, SamplerAdapter, SamplerSpec, WindowRequest},
    schedule::{ForecastHorizon, ScheduleParameters},
};

/// Fixed inputs of one scheduler run.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerSettings {
    pub schedule: ScheduleParameters,
    pub horizon: ForecastHorizon,
    /// Timestamp of the first predicted state.
    pub start: Timestamp,
    pub spatial_nodes: usize,
    pub latent_channels: usize,
    pub spec: SamplerSpec,
}

impl SchedulerSettings {
    /// Start of the first window, `P` steps before the first prediction.
    pub fn initial_window_start(&self) -> Timestamp {
        self.start.add_hours(-self.hours(self.schedule.past_window_size()))
    }

    fn hours(&self, steps: usize) -> i64 {
        steps as i64 * self.horizon.trajectory_dt() as i64
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IterationRecord {
    pub step: usize,
    pub cond_start_idx: usize,
    pub window_start: Timestamp,
    pub appended: usize,
    pub trajectory_len: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub iterations: Vec<IterationRecord>,
    pub trajectory: Trajectory,
    pub sampler_calls: usize,
}

impl RunSummary {
    pub fn trajectory_len(&self) -> usize {
        self.trajectory.len()
    }
}

/// Drives the sliding-window autoregressive loop: one sampler call and one persisted
/// snapshot per iteration, until the trajectory reaches `assimilation_length + lead_time`.
pub struct WindowScheduler<G, K> {
    settings: SchedulerSettings,
    channel_variance: Vec<f32>,
    sampler: SamplerAdapter<G>,
    sink: K,
}

impl<G, K> WindowScheduler<G, K>
where
    G: GenerativeSampler,
    K: PersistenceSink,
{
    pub fn new(
        settings: SchedulerSettings,
        channel_variance: Vec<f32>,
        sampler: G,
        sink: K,
    ) -> Result<Self> {
        settings
            .horizon
            .initial_cond_start_idx(&settings.schedule)?;
        if channel_variance.len() != settings.latent_channels {
            return Err(ConditioningError::ChannelVariance {
                expected: settings.latent_channels,
                actual: channel_variance.len(),
            }
            .into());
        }
        Ok(Self {
            settings,
            channel_variance,
            sampler: SamplerAdapter::new(sampler),
            sink,
        })
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sampler(&self) -> &G {
        self.sampler.inner()
    }

    pub fn into_parts(self) -> (G, K) {
        (self.sampler.into_inner(), self.sink)
    }

    /// Runs the loop from `observation`, the standardized `(assimilation_length, nodes,
    /// channels)` latent block ending at the initial condition.
    pub fn run(&mut self, observation: ArrayView3<'_, f32>) -> Result<RunSummary> {
        let settings = &self.settings;
        let past = settings.schedule.past_window_size();
        let preds = settings.schedule.preds_per_step();
        let blanket = settings.schedule.blanket_size();
        let dt = settings.horizon.trajectory_dt();
        let max_len = settings.horizon.max_traj_size();
        let num_steps = settings.horizon.num_steps(&settings.schedule);

        let expected = (
            settings.horizon.assimilation_length(),
            settings.spatial_nodes,
            settings.latent_channels,
        );
        if observation.dim() != expected {
            return Err(ConditioningError::Shape {
                expected: expected.0 * expected.1 * expected.2,
                actual: observation.len(),
                timesteps: expected.0,
                nodes: expected.1,
                channels: expected.2,
            }
            .into());
        }

        let mut conditioning =
            ConditioningState::from_observation(observation, &self.channel_variance)?;
        let mut accumulator =
            TrajectoryAccumulator::new(settings.spatial_nodes, settings.latent_channels, max_len);
        let mut cond_start = settings.horizon.initial_cond_start_idx(&settings.schedule)?;
        let mut window_start = settings.initial_window_start();
        let mut iterations = Vec::with_capacity(num_steps);
        let calls_before = self.sampler.calls();

        log::info!(
            "[forecast] starting run: {num_steps} windows of {blanket} ({past} past / {preds} predicted), target length {max_len}, first prediction {}",
            settings.start
        );

        let mut trajectory = accumulator.materialize();
        for step in 0..num_steps {
            let timestamps = trajectory_timestamps(window_start, blanket, dt);
            let request = WindowRequest {
                step,
                conditioning: &conditioning,
                timestamps: &timestamps,
                observed: cond_start..past,
                schedule: settings.schedule,
                spatial_nodes: settings.spatial_nodes,
                latent_channels: settings.latent_channels,
                spec: &settings.spec,
            };
            let window = self.sampler.sample(&request)?;

            // The observed part is saved once; later windows only contribute predictions.
            let save_from = if step == 0 { cond_start } else { past };
            accumulator.append(
                window.slice(s![save_from..blanket, .., ..]),
                &timestamps[save_from..blanket],
            )?;

            let keep_from = cond_start.max(blanket - past);
            conditioning.update(
                window.slice(s![keep_from..blanket, .., ..]),
                &self.channel_variance,
            )?;

            let record_cond_start = cond_start;
            cond_start = cond_start.saturating_sub(preds);
            window_start = window_start.add_hours(settings.hours(preds));

            trajectory =
                accumulator
                    .persist(&mut self.sink)
                    .map_err(|source| ForecastError::Persistence {
                        step,
                        source: Box::new(source),
                    })?;

            log::info!(
                "[forecast] step {}/{}: window {} cond_start {} trajectory {}/{}",
                step + 1,
                num_steps,
                timestamps[0],
                record_cond_start,
                trajectory.len(),
                max_len
            );
            iterations.push(IterationRecord {
                step,
                cond_start_idx: record_cond_start,
                window_start: timestamps[0],
                appended: blanket - save_from,
                trajectory_len: trajectory.len(),
            });

            if trajectory.len() == max_len {
                break;
            }
        }

        if trajectory.len() != max_len {
            log::warn!(
                "[forecast] run ended with {} of {max_len} states",
                trajectory.len()
            );
        }
        let sampler_calls = self.sampler.calls() - calls_before;
        log::info!(
            "[forecast] run complete: {} states ({} .. {}) after {sampler_calls} sampler calls",
            trajectory.len(),
            trajectory
                .timestamps()
                .first()
                .map(ToString::to_string)
                .unwrap_or_default(),
            trajectory
                .timestamps()
                .last()
                .map(ToString::to_string)
                .unwrap_or_default()
        );
        Ok(RunSummary {
            iterations,
            trajectory,
            sampler_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{PersistenceSampler, SamplerFamily};
    use ndarray::Array3;
    use std::convert::Infallible;

    #[derive(Default)]
    struct CountingSink {
        lengths: Vec<usize>,
    }

    impl PersistenceSink for CountingSink {
        type Error = Infallible;

        fn persist(&mut self, trajectory: &Trajectory) -> std::result::Result<(), Infallible> {
            self.lengths.push(trajectory.len());
            Ok(())
        }
    }

    fn settings(blanket: usize, past: usize, assimilation: usize, lead: usize) -> SchedulerSettings {
        SchedulerSettings {
            schedule: ScheduleParameters::new(blanket, past, blanket - past).unwrap(),
            horizon: ForecastHorizon::new(assimilation, lead, 6).unwrap(),
            start: Timestamp::new(2025, 1, 1, 6).unwrap(),
            spatial_nodes: 2,
            latent_channels: 1,
            spec: SamplerSpec::new(SamplerFamily::PredictorCorrector, 4).unwrap(),
        }
    }

    #[test]
    fn first_window_ends_conditioning_at_initial_condition() {
        let settings = settings(8, 4, 1, 12);
        assert_eq!(settings.initial_window_start().fields(), [2024, 12, 31, 6]);
    }

    #[test]
    fn persisted_lengths_grow_by_preds_per_step() {
        let mut scheduler = WindowScheduler::new(
            settings(6, 3, 2, 7),
            vec![0.1],
            PersistenceSampler::new(0.0, 0).unwrap(),
            CountingSink::default(),
        )
        .unwrap();
        let observation = Array3::from_elem((2, 2, 1), 0.5f32);
        let summary = scheduler.run(observation.view()).unwrap();
        assert_eq!(scheduler.sink().lengths, vec![5, 8, 9]);
        assert_eq!(summary.sampler_calls, 3);
        assert_eq!(summary.trajectory_len(), 9);
        let cond_starts: Vec<usize> = summary.iterations.iter().map(|r| r.cond_start_idx).collect();
        assert_eq!(cond_starts, vec![1, 0, 0]);
        let hours: Vec<u32> = summary.iterations.iter().map(|r| r.window_start.hour()).collect();
        assert_eq!(hours, vec![12, 6, 0]);
    }

    #[test]
    fn rejects_observation_of_wrong_shape() {
        let mut scheduler = WindowScheduler::new(
            settings(6, 3, 2, 7),
            vec![0.1],
            PersistenceSampler::new(0.0, 0).unwrap(),
            CountingSink::default(),
        )
        .unwrap();
        let observation = Array3::<f32>::zeros((1, 2, 1));
        assert!(matches!(
            scheduler.run(observation.view()),
            Err(ForecastError::Conditioning(ConditioningError::Shape { .. }))
        ));
        assert!(scheduler.sink().lengths.is_empty());
    }

    #[test]
    fn rejects_assimilation_longer_than_past_window() {
        let result = WindowScheduler::new(
            settings(6, 3, 4, 7),
            vec![0.1],
            PersistenceSampler::new(0.0, 0).unwrap(),
            CountingSink::default(),
        );
        assert!(matches!(result, Err(ForecastError::Schedule(_))));
    }
}
