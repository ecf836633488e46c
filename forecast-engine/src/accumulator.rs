// Copyright (c) James Kassemi, SC, US. All rights reserved.
use core_types::Timestamp;
use ndarray::{Array3, ArrayView3, Axis};
use storage::TrajectorySnapshot;

use crate::{error::TrajectoryError, persistence::PersistenceSink};

/// Concatenated forecast states with one timestamp per state.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    states: Array3<f32>,
    timestamps: Vec<Timestamp>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn states(&self) -> &Array3<f32> {
        &self.states
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Batch-leading layout written to disk, batch size 1.
    pub fn to_snapshot(&self) -> TrajectorySnapshot {
        let fields: Vec<[i32; 4]> = self.timestamps.iter().map(Timestamp::fields).collect();
        TrajectorySnapshot {
            states: self.states.clone().insert_axis(Axis(0)),
            timestamps: Array3::from_shape_fn((1, fields.len(), 4), |(_, t, f)| fields[t][f]),
        }
    }

    pub fn from_snapshot(snapshot: &TrajectorySnapshot) -> Result<Self, TrajectoryError> {
        let batch = snapshot.states.len_of(Axis(0));
        if batch != 1 || snapshot.timestamps.len_of(Axis(0)) != 1 {
            return Err(TrajectoryError::BatchSize(batch));
        }
        let states = snapshot.states.index_axis(Axis(0), 0).to_owned();
        let timestamps = snapshot
            .timestamps
            .index_axis(Axis(0), 0)
            .outer_iter()
            .map(|row| Timestamp::from_fields([row[0], row[1], row[2], row[3]]))
            .collect::<Result<Vec<_>, _>>()?;
        if timestamps.len() != states.len_of(Axis(0)) {
            return Err(TrajectoryError::TimestampCount {
                states: states.len_of(Axis(0)),
                timestamps: timestamps.len(),
            });
        }
        Ok(Self { states, timestamps })
    }
}

/// Append-only forecast trajectory, truncated to `max_len` when materialized.
#[derive(Clone, Debug)]
pub struct TrajectoryAccumulator {
    values: Vec<f32>,
    timestamps: Vec<Timestamp>,
    blocks: usize,
    spatial_nodes: usize,
    latent_channels: usize,
    max_len: usize,
}

impl TrajectoryAccumulator {
    pub fn new(spatial_nodes: usize, latent_channels: usize, max_len: usize) -> Self {
        Self {
            values: Vec::new(),
            timestamps: Vec::new(),
            blocks: 0,
            spatial_nodes,
            latent_channels,
            max_len,
        }
    }

    pub fn append(
        &mut self,
        states: ArrayView3<'_, f32>,
        timestamps: &[Timestamp],
    ) -> Result<(), TrajectoryError> {
        let (count, nodes, channels) = states.dim();
        if (nodes, channels) != (self.spatial_nodes, self.latent_channels) {
            return Err(TrajectoryError::BlockShape {
                expected: (self.spatial_nodes, self.latent_channels),
                actual: (nodes, channels),
            });
        }
        if count != timestamps.len() {
            return Err(TrajectoryError::TimestampCount {
                states: count,
                timestamps: timestamps.len(),
            });
        }
        self.values.extend(states.iter().copied());
        self.timestamps.extend_from_slice(timestamps);
        self.blocks += 1;
        Ok(())
    }

    /// Entries appended so far, before truncation.
    pub fn appended(&self) -> usize {
        self.timestamps.len()
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Concatenates every block and keeps the earliest `max_len` entries.
    pub fn materialize(&self) -> Trajectory {
        let len = self.timestamps.len().min(self.max_len);
        let (nodes, channels) = (self.spatial_nodes, self.latent_channels);
        let values = &self.values;
        let states = Array3::from_shape_fn((len, nodes, channels), |(t, n, c)| {
            values[(t * nodes + n) * channels + c]
        });
        Trajectory {
            states,
            timestamps: self.timestamps[..len].to_vec(),
        }
    }

    /// Hands the full current snapshot to `sink`, replacing whatever it held before.
    pub fn persist<K: PersistenceSink>(&self, sink: &mut K) -> Result<Trajectory, K::Error> {
        let trajectory = self.materialize();
        sink.persist(&trajectory)?;
        Ok(trajectory)
    }
}
