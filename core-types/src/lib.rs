// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared timestamps, configuration and variable catalog for the latent forecaster.

pub mod config;
pub mod types;
pub mod variables;

pub use config::ForecastConfig;
pub use types::{Timestamp, TimestampError};
