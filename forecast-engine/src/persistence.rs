// Copyright (c) James Kassemi, SC, US. All rights reserved.
use storage::{SnapshotReceipt, StorageError, TrajectoryArtifacts};

use crate::accumulator::Trajectory;

/// Durable storage for trajectory snapshots.
///
/// Every call receives the complete trajectory so far; implementations overwrite the previous
/// snapshot. The call is the checkpoint boundary of a run and must not return before the data
/// is written.
pub trait PersistenceSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn persist(&mut self, trajectory: &Trajectory) -> Result<(), Self::Error>;
}

/// Writes snapshots to `trajectory.parquet` and `timestamps.parquet` under one directory.
#[derive(Debug)]
pub struct ParquetSink {
    artifacts: TrajectoryArtifacts,
    last_receipt: Option<SnapshotReceipt>,
    writes: usize,
}

impl ParquetSink {
    pub fn new(artifacts: TrajectoryArtifacts) -> Self {
        Self {
            artifacts,
            last_receipt: None,
            writes: 0,
        }
    }

    pub fn artifacts(&self) -> &TrajectoryArtifacts {
        &self.artifacts
    }

    /// Checksums of the most recent snapshot.
    pub fn last_receipt(&self) -> Option<&SnapshotReceipt> {
        self.last_receipt.as_ref()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PersistenceSink for ParquetSink {
    type Error = StorageError;

    fn persist(&mut self, trajectory: &Trajectory) -> Result<(), Self::Error> {
        let receipt = self.artifacts.write(&trajectory.to_snapshot())?;
        self.last_receipt = Some(receipt);
        self.writes += 1;
        Ok(())
    }
}
