// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::PathBuf;

use chrono::Utc;
use config::ConfigError;
use core_types::{variables, ForecastConfig};
use forecast_engine::{
    ForecastError, ParquetSink, PersistenceSampler, RunPlan, WindowScheduler,
};
use storage::{
    discovery::{file_timestamp, forecast_name, latest_latent_file},
    manifest::{context_variables, variable_entries, ScheduleEntry, DECODER_LATENTS_FILE},
    read_latent_series, write_latent_series, LatentSeries, LatentStats, RunManifest,
    StorageError, TrajectoryArtifacts,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("{what} has {actual} {unit}, configuration expects {expected}")]
    Mismatch {
        what: &'static str,
        unit: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("run finished without persisting a trajectory")]
    NothingPersisted,
}

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub latent_dir: PathBuf,
    pub output_dir: PathBuf,
    pub force: bool,
}

#[derive(Debug)]
pub enum Outcome {
    Skipped { dir: PathBuf },
    Completed { dir: PathBuf, manifest: RunManifest },
}

pub fn run_forecast(config: &ForecastConfig, options: &PipelineOptions) -> Result<Outcome, AppError> {
    let latest = latest_latent_file(&options.latent_dir)?;
    let initial_condition = file_timestamp(&latest)?;
    let plan = RunPlan::from_config(config, initial_condition)?;
    let name = forecast_name(initial_condition, config.lead_time);
    let out_dir = options.output_dir.join(&name);
    if RunManifest::exists(&out_dir) && !options.force {
        log::info!("[forecaster] {name} already exists, skipping");
        return Ok(Outcome::Skipped { dir: out_dir });
    }
    if out_dir.exists() && !RunManifest::exists(&out_dir) {
        log::warn!("[forecaster] {name} has no manifest from a previous run, recomputing");
    }

    log::info!(
        "[forecaster] {name}: input {}, device {:?}, precision {:?}, sampler {} ({} steps, {} mmps iters)",
        latest.display(),
        plan.compute.device,
        plan.compute.precision,
        plan.spec.family(),
        plan.spec.diffusion_steps(),
        plan.spec.mmps_iters()
    );

    let stats = LatentStats::load(&config.paths.latent_stats)?;
    ensure_dims("latent stats", "channels", plan.latent_channels, stats.channels())?;
    let series = read_latent_series(&latest)?;
    ensure_dims("latent series", "nodes", plan.spatial_nodes, series.spatial_nodes())?;
    ensure_dims("latent series", "channels", plan.latent_channels, series.latent_channels())?;

    let (mut observation, _) = series.select(
        plan.observation_start,
        plan.horizon.assimilation_length(),
        plan.horizon.trajectory_dt(),
    )?;
    stats.standardize(&mut observation)?;
    let channel_variance = stats.conditioning_variance(plan.noise_level);

    let sampler = PersistenceSampler::from_spec(&plan.spec).map_err(ForecastError::from)?;
    let sink = ParquetSink::new(TrajectoryArtifacts::new(&out_dir));
    let mut scheduler =
        WindowScheduler::new(plan.scheduler_settings(), channel_variance, sampler, sink)?;
    let summary = scheduler.run(observation.view())?;
    let receipt = scheduler
        .sink()
        .last_receipt()
        .cloned()
        .ok_or(AppError::NothingPersisted)?;

    let mut latents = summary.trajectory.states().clone();
    stats.destandardize(&mut latents, plan.noise_level)?;
    let decoder_input = LatentSeries::new(summary.trajectory.timestamps().to_vec(), latents)?;
    let decoder_latents = write_latent_series(&out_dir.join(DECODER_LATENTS_FILE), &decoder_input)?;

    let manifest = RunManifest {
        name,
        initial_condition,
        first_prediction: plan.first_prediction,
        lead_time_hours: plan.lead_time_hours,
        trajectory_dt: plan.horizon.trajectory_dt(),
        assimilation_length: plan.horizon.assimilation_length(),
        schedule: ScheduleEntry {
            blanket_size: plan.schedule.blanket_size(),
            past_window_size: plan.schedule.past_window_size(),
            preds_per_step: plan.schedule.preds_per_step(),
        },
        sampler: plan.spec.family().to_string(),
        trajectory_len: summary.trajectory_len(),
        artifacts: receipt,
        decoder_latents,
        variables: variable_entries(),
        context_variables: context_variables(),
        levels: variables::PRESSURE_LEVELS.to_vec(),
        created_at: Utc::now(),
    };
    manifest.write(&out_dir)?;
    log::info!(
        "[forecaster] wrote manifest for {} ({} states)",
        manifest.name,
        manifest.trajectory_len
    );
    Ok(Outcome::Completed {
        dir: out_dir,
        manifest,
    })
}

fn ensure_dims(what: &'static str, unit: &'static str, expected: usize, actual: usize) -> Result<(), AppError> {
    if expected != actual {
        return Err(AppError::Mismatch {
            what,
            unit,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{types::trajectory_timestamps, Timestamp};
    use forecast_engine::Trajectory;
    use ndarray::{Array3, Array4};
    use storage::TrajectorySnapshot;
    use tempfile::{tempdir, TempDir};

    fn fixture(stats_path: &std::path::Path) -> ForecastConfig {
        let doc = format!(
            r#"
            lead_time = 12
            assimilation_length = 2
            [model]
            blanket_size = 6
            blanket_dt = 3
            noise_level = 0.5
            latent_channels = 2
            spatial_nodes = 4
            [diffusion]
            [diffusion.sampler]
            type = "pc"
            [paths]
            latent_stats = "{}"
            "#,
            stats_path.display()
        );
        ForecastConfig::from_toml_str(&doc).unwrap()
    }

    fn workspace() -> (TempDir, ForecastConfig, PipelineOptions) {
        let dir = tempdir().unwrap();
        let stats_path = dir.path().join("stats.json");
        LatentStats {
            mean: vec![1.0, -1.0],
            std: vec![2.0, 0.5],
        }
        .save(&stats_path)
        .unwrap();

        let latent_dir = dir.path().join("latents");
        let start = Timestamp::new(2025, 6, 1, 0).unwrap();
        let timestamps = trajectory_timestamps(start, 5, 3);
        let latents = Array3::from_shape_fn((5, 4, 2), |(t, n, c)| (t + n) as f32 + c as f32);
        let series = LatentSeries::new(timestamps, latents).unwrap();
        write_latent_series(&latent_dir.join("2025-06-01T12:00:00Z.parquet"), &series).unwrap();
        write_latent_series(&latent_dir.join("2025-06-01T06:00:00Z.parquet"), &series).unwrap();

        let config = fixture(&stats_path);
        let options = PipelineOptions {
            latent_dir,
            output_dir: dir.path().join("forecasts"),
            force: false,
        };
        (dir, config, options)
    }

    #[test]
    fn runs_latest_input_and_publishes_manifest() {
        let (_dir, config, options) = workspace();
        let Outcome::Completed { dir, manifest } = run_forecast(&config, &options).unwrap() else {
            panic!("expected a completed forecast");
        };
        assert!(dir.ends_with("2025-06-01T12Z_PT12H"));
        assert_eq!(manifest.trajectory_len, 6);
        assert_eq!(manifest.first_prediction.fields(), [2025, 6, 1, 15]);
        assert_eq!(manifest.schedule.past_window_size, 3);
        assert_eq!(RunManifest::read(&dir).unwrap(), manifest);

        let snapshot = TrajectoryArtifacts::new(&dir).read().unwrap();
        let trajectory = Trajectory::from_snapshot(&snapshot).unwrap();
        assert_eq!(trajectory.len(), 6);
        assert_eq!(trajectory.timestamps()[0].fields(), [2025, 6, 1, 9]);
        assert_eq!(trajectory.timestamps()[5].fields(), [2025, 6, 2, 0]);
        // Standardized observation at 12Z: t=4, node 0, channel 0 -> (4 - 1) / 2.
        assert_eq!(trajectory.states()[[1, 0, 0]], 1.5);
    }

    #[test]
    fn decoder_latents_are_destandardized_trajectory() {
        let (_dir, config, options) = workspace();
        let Outcome::Completed { dir, manifest } = run_forecast(&config, &options).unwrap() else {
            panic!("expected a completed forecast");
        };
        assert_eq!(manifest.decoder_latents.path, dir.join(DECODER_LATENTS_FILE));
        assert_eq!(manifest.context_variables, context_variables());

        let decoded = read_latent_series(&manifest.decoder_latents.path).unwrap();
        assert_eq!(decoded.timestamps().len(), manifest.trajectory_len);
        // 12Z node 0: standardized 1.5 and 12.0 mapped back with the noise-inflated std.
        let inflated = [(4.0f32 + 0.25).sqrt(), (0.25f32 + 0.25).sqrt()];
        let expected = [1.5 * inflated[0] + 1.0, 12.0 * inflated[1] - 1.0];
        for (channel, value) in expected.iter().enumerate() {
            assert!((decoded.latents()[[1, 0, channel]] - value).abs() < 1e-4);
        }
    }

    #[test]
    fn output_without_manifest_is_recomputed() {
        let (_dir, config, options) = workspace();
        let out_dir = options.output_dir.join("2025-06-01T12Z_PT12H");
        let partial = TrajectorySnapshot::new(
            Array4::zeros((1, 2, 4, 2)),
            Array3::from_shape_fn((1, 2, 4), |(_, t, f)| [2025, 6, 1, 9 + 3 * t as i32][f]),
        )
        .unwrap();
        TrajectoryArtifacts::new(&out_dir).write(&partial).unwrap();
        assert!(out_dir.exists());

        let outcome = run_forecast(&config, &options).unwrap();
        let Outcome::Completed { manifest, .. } = outcome else {
            panic!("partial output must not count as a finished forecast");
        };
        assert_eq!(manifest.trajectory_len, 6);
        let on_disk = TrajectoryArtifacts::new(&out_dir).read().unwrap();
        assert_eq!(on_disk.steps(), 6);
        assert!(matches!(
            run_forecast(&config, &options).unwrap(),
            Outcome::Skipped { .. }
        ));
    }

    #[test]
    fn existing_output_is_skipped_unless_forced() {
        let (_dir, config, mut options) = workspace();
        run_forecast(&config, &options).unwrap();
        assert!(matches!(
            run_forecast(&config, &options).unwrap(),
            Outcome::Skipped { .. }
        ));
        options.force = true;
        assert!(matches!(
            run_forecast(&config, &options).unwrap(),
            Outcome::Completed { .. }
        ));
    }

    #[test]
    fn observation_gap_is_fatal() {
        let (dir, config, options) = workspace();
        let gappy = LatentSeries::new(
            vec![Timestamp::new(2025, 6, 1, 18).unwrap()],
            Array3::zeros((1, 4, 2)),
        )
        .unwrap();
        write_latent_series(
            &options.latent_dir.join("2025-06-01T18:00:00Z.parquet"),
            &gappy,
        )
        .unwrap();
        assert!(matches!(
            run_forecast(&config, &options),
            Err(AppError::Storage(StorageError::MissingTimestamp { .. }))
        ));
        assert!(!dir.path().join("forecasts/2025-06-01T18Z_PT12H").exists());
    }

    #[test]
    fn stats_with_wrong_channel_count_are_rejected() {
        let (_dir, config, options) = workspace();
        LatentStats {
            mean: vec![0.0],
            std: vec![1.0],
        }
        .save(&config.paths.latent_stats)
        .unwrap();
        assert!(matches!(
            run_forecast(&config, &options),
            Err(AppError::Mismatch { unit: "channels", .. })
        ));
    }
}
