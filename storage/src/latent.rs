// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::HashMap, path::Path, sync::Arc};

use arrow::{
    array::Int32Array,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use core_types::Timestamp;
use ndarray::{Array3, Axis};

use crate::{
    artifacts::{
        column, extend_from_vectors, metadata_usize, read_record_batches, vector_array,
        vector_field, write_record_batch, ArtifactInfo,
    },
    error::{Result, StorageError},
};

const SPATIAL_NODES_KEY: &str = "spatial_nodes";
const LATENT_CHANNELS_KEY: &str = "latent_channels";

/// Encoded observations: one `(nodes × channels)` latent state per timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct LatentSeries {
    timestamps: Vec<Timestamp>,
    latents: Array3<f32>,
}

impl LatentSeries {
    pub fn new(timestamps: Vec<Timestamp>, latents: Array3<f32>) -> Result<Self> {
        if timestamps.len() != latents.len_of(Axis(0)) {
            return Err(StorageError::Shape(format!(
                "{} timestamps for {} latent states",
                timestamps.len(),
                latents.len_of(Axis(0))
            )));
        }
        Ok(Self {
            timestamps,
            latents,
        })
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn latents(&self) -> &Array3<f32> {
        &self.latents
    }

    pub fn spatial_nodes(&self) -> usize {
        self.latents.len_of(Axis(1))
    }

    pub fn latent_channels(&self) -> usize {
        self.latents.len_of(Axis(2))
    }

    /// Gathers `count` states starting at `start`, spaced by `stride_hours`.
    ///
    /// Every requested timestamp must be present; the series may be sparser or denser than
    /// the stride.
    pub fn select(
        &self,
        start: Timestamp,
        count: usize,
        stride_hours: u32,
    ) -> Result<(Array3<f32>, Vec<Timestamp>)> {
        let mut indices = Vec::with_capacity(count);
        let mut selected = Vec::with_capacity(count);
        for step in 0..count {
            let timestamp = start.add_hours(step as i64 * stride_hours as i64);
            let idx = self
                .timestamps
                .iter()
                .position(|ts| *ts == timestamp)
                .ok_or(StorageError::MissingTimestamp { timestamp })?;
            indices.push(idx);
            selected.push(timestamp);
        }
        Ok((self.latents.select(Axis(0), &indices), selected))
    }
}

pub fn write_latent_series(path: &Path, series: &LatentSeries) -> Result<ArtifactInfo> {
    let nodes = series.spatial_nodes();
    let channels = series.latent_channels();
    let metadata = HashMap::from([
        (SPATIAL_NODES_KEY.to_string(), nodes.to_string()),
        (LATENT_CHANNELS_KEY.to_string(), channels.to_string()),
    ]);
    let schema = Schema::new_with_metadata(
        vec![
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("hour", DataType::Int32, false),
            vector_field("latents", nodes * channels)?,
        ],
        metadata,
    );
    let fields: Vec<[i32; 4]> = series.timestamps.iter().map(Timestamp::fields).collect();
    let values: Vec<f32> = series.latents.iter().copied().collect();
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int32Array::from_iter_values(fields.iter().map(|f| f[0]))),
            Arc::new(Int32Array::from_iter_values(fields.iter().map(|f| f[1]))),
            Arc::new(Int32Array::from_iter_values(fields.iter().map(|f| f[2]))),
            Arc::new(Int32Array::from_iter_values(fields.iter().map(|f| f[3]))),
            Arc::new(vector_array(values, nodes * channels)?),
        ],
    )?;
    write_record_batch(path, &batch)
}

pub fn read_latent_series(path: &Path) -> Result<LatentSeries> {
    let (batches, metadata) = read_record_batches(path)?;
    let nodes = metadata_usize(&metadata, SPATIAL_NODES_KEY)?;
    let channels = metadata_usize(&metadata, LATENT_CHANNELS_KEY)?;
    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for batch in &batches {
        let years = column::<Int32Array>(batch, "year")?;
        let months = column::<Int32Array>(batch, "month")?;
        let days = column::<Int32Array>(batch, "day")?;
        let hours = column::<Int32Array>(batch, "hour")?;
        for row in 0..batch.num_rows() {
            timestamps.push(Timestamp::from_fields([
                years.value(row),
                months.value(row),
                days.value(row),
                hours.value(row),
            ])?);
        }
        let width = extend_from_vectors(batch, "latents", &mut values)?;
        if width != nodes * channels {
            return Err(StorageError::Schema(format!(
                "latent width {width} does not match {nodes} nodes x {channels} channels"
            )));
        }
    }
    let latents = Array3::from_shape_vec((timestamps.len(), nodes, channels), values)?;
    log::debug!(
        "[storage] read {} latent states from {}",
        timestamps.len(),
        path.display()
    );
    LatentSeries::new(timestamps, latents)
}
