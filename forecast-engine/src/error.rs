// Copyright (c) James Kassemi, SC, US. All rights reserved.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Failure raised by an external capability (sampler or persistence sink).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("blanket_size must be at least 2, got {0}")]
    BlanketTooSmall(usize),
    #[error(
        "past_window_size ({past}) + preds_per_step ({preds}) must equal blanket_size ({blanket})"
    )]
    Inconsistent {
        past: usize,
        preds: usize,
        blanket: usize,
    },
    #[error("{name} ({value}) leaves no room in a window of {blanket}")]
    Oversized {
        name: &'static str,
        value: usize,
        blanket: usize,
    },
    #[error("{name} resolves to zero")]
    EmptySplit { name: &'static str },
    #[error("assimilation_length must be at least 1")]
    EmptyAssimilation,
    #[error("lead_time must cover at least one step")]
    EmptyLeadTime,
    #[error("trajectory_dt must be at least 1 hour")]
    ZeroTimestep,
    #[error("assimilation_length ({assimilation}) exceeds past_window_size ({past})")]
    AssimilationExceedsPast { assimilation: usize, past: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    #[error("unknown sampler family '{0}' (expected one of: pc, lms)")]
    UnknownFamily(String),
    #[error("invalid sampler option {name}: {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("diffusion step count must be positive")]
    NoDiffusionSteps,
    #[error("conditioning holds {actual} timesteps but the observed range spans {expected}")]
    ObservedRange { expected: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditioningError {
    #[error("conditioning vector has {vector} values but covariance has {covariance}")]
    LengthMismatch { vector: usize, covariance: usize },
    #[error(
        "observation holds {actual} values, expected {expected} ({timesteps} x {nodes} x {channels})"
    )]
    Shape {
        expected: usize,
        actual: usize,
        timesteps: usize,
        nodes: usize,
        channels: usize,
    },
    #[error("{len} conditioning values do not form whole states of {state_len}")]
    Ragged { len: usize, state_len: usize },
    #[error("channel variance has {actual} entries, expected {expected}")]
    ChannelVariance { expected: usize, actual: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum TrajectoryError {
    #[error("block holds {states} states but {timestamps} timestamps")]
    TimestampCount { states: usize, timestamps: usize },
    #[error("block states shaped {actual:?}, expected {expected:?}")]
    BlockShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("snapshot batch size {0} is not supported (expected 1)")]
    BatchSize(usize),
    #[error("invalid timestamp in snapshot: {0}")]
    Timestamp(#[from] core_types::TimestampError),
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),
    #[error("conditioning error: {0}")]
    Conditioning(#[from] ConditioningError),
    #[error("trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),
    #[error("sampler failed at step {step}: {source}")]
    Sampling {
        step: usize,
        #[source]
        source: BoxError,
    },
    #[error("sample at step {step} shaped {actual:?}, expected {expected:?}")]
    SampleShape {
        step: usize,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[error("sample at step {step} contains non-finite values")]
    NonFiniteSample { step: usize },
    #[error("persisting trajectory at step {step} failed: {source}")]
    Persistence {
        step: usize,
        #[source]
        source: BoxError,
    },
}

impl ForecastError {
    /// Iteration at which the run aborted, when the failure happened inside the loop.
    pub fn step(&self) -> Option<usize> {
        match self {
            ForecastError::Sampling { step, .. }
            | ForecastError::SampleShape { step, .. }
            | ForecastError::NonFiniteSample { step }
            | ForecastError::Persistence { step, .. } => Some(*step),
            _ => None,
        }
    }
}
