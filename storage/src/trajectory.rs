// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::Int32Array,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};

use crate::{
    artifacts::{
        column, extend_from_vectors, metadata_usize, read_record_batches, vector_array,
        vector_field, write_record_batch, ArtifactInfo,
    },
    error::{Result, StorageError},
};

pub const TRAJECTORY_FILE: &str = "trajectory.parquet";
pub const TIMESTAMPS_FILE: &str = "timestamps.parquet";

const BATCH_KEY: &str = "batch";
const STEPS_KEY: &str = "steps";
const SPATIAL_NODES_KEY: &str = "spatial_nodes";
const LATENT_CHANNELS_KEY: &str = "latent_channels";

/// On-disk trajectory tensors: states `(batch, time, nodes, channels)` and timestamps
/// `(batch, time, 4)` holding `[year, month, day, hour]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySnapshot {
    pub states: Array4<f32>,
    pub timestamps: Array3<i32>,
}

impl TrajectorySnapshot {
    pub fn new(states: Array4<f32>, timestamps: Array3<i32>) -> Result<Self> {
        let (batch, steps, _, _) = states.dim();
        if timestamps.dim() != (batch, steps, 4) {
            return Err(StorageError::Shape(format!(
                "timestamps shaped {:?} do not match states ({batch}, {steps}, ..)",
                timestamps.dim()
            )));
        }
        Ok(Self { states, timestamps })
    }

    pub fn steps(&self) -> usize {
        self.states.dim().1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReceipt {
    pub trajectory: ArtifactInfo,
    pub timestamps: ArtifactInfo,
}

/// The co-located `trajectory.parquet` / `timestamps.parquet` pair of one forecast run.
#[derive(Clone, Debug)]
pub struct TrajectoryArtifacts {
    root: PathBuf,
}

impl TrajectoryArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trajectory_path(&self) -> PathBuf {
        self.root.join(TRAJECTORY_FILE)
    }

    pub fn timestamps_path(&self) -> PathBuf {
        self.root.join(TIMESTAMPS_FILE)
    }

    /// Overwrites both files with the full snapshot.
    pub fn write(&self, snapshot: &TrajectorySnapshot) -> Result<SnapshotReceipt> {
        let trajectory = write_record_batch(&self.trajectory_path(), &states_batch(snapshot)?)?;
        let timestamps =
            write_record_batch(&self.timestamps_path(), &timestamps_batch(snapshot)?)?;
        log::debug!(
            "[storage] wrote {} steps to {} (crc32 {:08x}/{:08x})",
            snapshot.steps(),
            self.root.display(),
            trajectory.checksum,
            timestamps.checksum
        );
        Ok(SnapshotReceipt {
            trajectory,
            timestamps,
        })
    }

    pub fn read(&self) -> Result<TrajectorySnapshot> {
        let states = read_states(&self.trajectory_path())?;
        let timestamps = read_timestamps(&self.timestamps_path())?;
        TrajectorySnapshot::new(states, timestamps)
    }
}

fn states_batch(snapshot: &TrajectorySnapshot) -> Result<RecordBatch> {
    let (batch, steps, nodes, channels) = snapshot.states.dim();
    let metadata = HashMap::from([
        (BATCH_KEY.to_string(), batch.to_string()),
        (STEPS_KEY.to_string(), steps.to_string()),
        (SPATIAL_NODES_KEY.to_string(), nodes.to_string()),
        (LATENT_CHANNELS_KEY.to_string(), channels.to_string()),
    ]);
    let schema = Schema::new_with_metadata(
        vec![
            Field::new("batch", DataType::Int32, false),
            Field::new("step", DataType::Int32, false),
            vector_field("values", nodes * channels)?,
        ],
        metadata,
    );
    let (batch_idx, step_idx) = row_indices(batch, steps);
    let values: Vec<f32> = snapshot.states.iter().copied().collect();
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int32Array::from(batch_idx)),
            Arc::new(Int32Array::from(step_idx)),
            Arc::new(vector_array(values, nodes * channels)?),
        ],
    )?)
}

fn timestamps_batch(snapshot: &TrajectorySnapshot) -> Result<RecordBatch> {
    let (batch, steps, _) = snapshot.timestamps.dim();
    let metadata = HashMap::from([
        (BATCH_KEY.to_string(), batch.to_string()),
        (STEPS_KEY.to_string(), steps.to_string()),
    ]);
    let names = ["year", "month", "day", "hour"];
    let mut fields = vec![
        Field::new("batch", DataType::Int32, false),
        Field::new("step", DataType::Int32, false),
    ];
    fields.extend(names.iter().map(|n| Field::new(*n, DataType::Int32, false)));
    let (batch_idx, step_idx) = row_indices(batch, steps);
    let mut columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(Int32Array::from(batch_idx)),
        Arc::new(Int32Array::from(step_idx)),
    ];
    for field in 0..names.len() {
        let values: Vec<i32> = snapshot
            .timestamps
            .outer_iter()
            .flat_map(|member| member.column(field).to_vec())
            .collect();
        columns.push(Arc::new(Int32Array::from(values)));
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, metadata)),
        columns,
    )?)
}

fn row_indices(batch: usize, steps: usize) -> (Vec<i32>, Vec<i32>) {
    let mut batch_idx = Vec::with_capacity(batch * steps);
    let mut step_idx = Vec::with_capacity(batch * steps);
    for b in 0..batch {
        for s in 0..steps {
            batch_idx.push(b as i32);
            step_idx.push(s as i32);
        }
    }
    (batch_idx, step_idx)
}

fn check_row_order(batch: &RecordBatch, offset: usize, steps: usize) -> Result<()> {
    let batch_col = column::<Int32Array>(batch, "batch")?;
    let step_col = column::<Int32Array>(batch, "step")?;
    for row in 0..batch.num_rows() {
        let global = offset + row;
        let expected = ((global / steps.max(1)) as i32, (global % steps.max(1)) as i32);
        if (batch_col.value(row), step_col.value(row)) != expected {
            return Err(StorageError::Schema(format!(
                "row {global} is out of (batch, step) order"
            )));
        }
    }
    Ok(())
}

fn read_states(path: &Path) -> Result<Array4<f32>> {
    let (batches, metadata) = read_record_batches(path)?;
    let batch = metadata_usize(&metadata, BATCH_KEY)?;
    let steps = metadata_usize(&metadata, STEPS_KEY)?;
    let nodes = metadata_usize(&metadata, SPATIAL_NODES_KEY)?;
    let channels = metadata_usize(&metadata, LATENT_CHANNELS_KEY)?;
    let mut values = Vec::with_capacity(batch * steps * nodes * channels);
    let mut offset = 0;
    for record in &batches {
        check_row_order(record, offset, steps)?;
        extend_from_vectors(record, "values", &mut values)?;
        offset += record.num_rows();
    }
    Ok(Array4::from_shape_vec(
        (batch, steps, nodes, channels),
        values,
    )?)
}

fn read_timestamps(path: &Path) -> Result<Array3<i32>> {
    let (batches, metadata) = read_record_batches(path)?;
    let batch = metadata_usize(&metadata, BATCH_KEY)?;
    let steps = metadata_usize(&metadata, STEPS_KEY)?;
    let mut values = Vec::with_capacity(batch * steps * 4);
    let mut offset = 0;
    for record in &batches {
        check_row_order(record, offset, steps)?;
        let columns = [
            column::<Int32Array>(record, "year")?,
            column::<Int32Array>(record, "month")?,
            column::<Int32Array>(record, "day")?,
            column::<Int32Array>(record, "hour")?,
        ];
        for row in 0..record.num_rows() {
            values.extend(columns.iter().map(|c| c.value(row)));
        }
        offset += record.num_rows();
    }
    Ok(Array3::from_shape_vec((batch, steps, 4), values)?)
}
