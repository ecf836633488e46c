// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use core_types::{variables, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{artifacts::ArtifactInfo, error::Result, trajectory::SnapshotReceipt};

pub const MANIFEST_FILE: &str = "manifest.json";
/// Destandardized trajectory in the encoder's latent scale, ready for decoding.
pub const DECODER_LATENTS_FILE: &str = "decoder_latents.parquet";

/// Run description published next to the trajectory artifacts for the decoder and tiler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub name: String,
    pub initial_condition: Timestamp,
    pub first_prediction: Timestamp,
    pub lead_time_hours: u32,
    pub trajectory_dt: u32,
    pub assimilation_length: usize,
    pub schedule: ScheduleEntry,
    pub sampler: String,
    pub trajectory_len: usize,
    pub artifacts: SnapshotReceipt,
    pub decoder_latents: ArtifactInfo,
    pub variables: Vec<VariableEntry>,
    pub context_variables: Vec<String>,
    pub levels: Vec<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub blanket_size: usize,
    pub past_window_size: usize,
    pub preds_per_step: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    pub units: String,
    pub long_name: String,
    pub is_level: bool,
    /// Factor from decoded model units to the published `units`.
    pub scale: f64,
}

impl From<variables::VariableInfo> for VariableEntry {
    fn from(value: variables::VariableInfo) -> Self {
        Self {
            name: value.name.to_string(),
            units: value.units.to_string(),
            long_name: value.long_name.to_string(),
            is_level: value.is_level,
            scale: variables::convert_units(value.name, 1.0),
        }
    }
}

/// Variable entries for every state variable the decoder reconstructs.
pub fn variable_entries() -> Vec<VariableEntry> {
    variables::catalog()
        .into_iter()
        .map(VariableEntry::from)
        .collect()
}

/// Forcing fields the decoder computes itself rather than reconstructing.
pub fn context_variables() -> Vec<String> {
    variables::CONTEXT_VARIABLES
        .iter()
        .map(|name| name.to_string())
        .collect()
}

impl RunManifest {
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let file = fs::File::create(dir.join(MANIFEST_FILE))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// A forecast directory is complete only once its manifest has been written.
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file()
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let file = fs::File::open(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_reader(file)?)
    }
}
