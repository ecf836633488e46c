// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Autoregressive sliding-window forecasting in latent space.
//!
//! A [`WindowScheduler`] repeatedly asks a [`GenerativeSampler`] for a window of
//! `blanket_size` latent states, conditions each window on the tail of the previous one and
//! grows a single trajectory that is handed to a [`PersistenceSink`] after every window.

pub mod accumulator;
pub mod conditioning;
pub mod error;
pub mod persistence;
pub mod plan;
pub mod sampler;
pub mod schedule;
pub mod scheduler;

pub use accumulator::{Trajectory, TrajectoryAccumulator};
pub use conditioning::ConditioningState;
pub use error::{
    ConditioningError, ForecastError, Result, SamplerError, ScheduleError, TrajectoryError,
};
pub use persistence::{ParquetSink, PersistenceSink};
pub use plan::RunPlan;
pub use sampler::{
    GenerativeSampler, PersistenceSampler, SamplerAdapter, SamplerFamily, SamplerSpec,
    WindowRequest,
};
pub use schedule::{ForecastHorizon, ScheduleParameters};
pub use scheduler::{IterationRecord, RunSummary, SchedulerSettings, WindowScheduler};
