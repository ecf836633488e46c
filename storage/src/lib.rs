// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Parquet and JSON persistence for latent observations, statistics and forecast artifacts.

pub mod artifacts;
pub mod discovery;
pub mod error;
pub mod latent;
pub mod manifest;
pub mod stats;
pub mod trajectory;

pub use artifacts::ArtifactInfo;
pub use error::{Result, StorageError};
pub use latent::{read_latent_series, write_latent_series, LatentSeries};
pub use manifest::RunManifest;
pub use stats::LatentStats;
pub use trajectory::{SnapshotReceipt, TrajectoryArtifacts, TrajectorySnapshot};
