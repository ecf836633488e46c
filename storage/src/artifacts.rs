// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{Array, FixedSizeListArray, Float32Array},
    datatypes::{DataType, Field, FieldRef},
    record_batch::RecordBatch,
};
use crc32fast::Hasher as Crc32;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub checksum: u32,
}

/// Writes `batch` next to `path` and renames it into place, so readers only ever see a
/// complete file.
pub fn write_record_batch(path: &Path, batch: &RecordBatch) -> Result<ArtifactInfo> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    let file = File::create(&staging)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    fs::rename(&staging, path)?;
    let checksum = compute_checksum(path)?;
    Ok(ArtifactInfo {
        path: path.to_path_buf(),
        checksum,
    })
}

/// Reads every batch of a parquet file, returning them with the stored arrow schema metadata.
pub fn read_record_batches(
    path: &Path,
) -> Result<(Vec<RecordBatch>, std::collections::HashMap<String, String>)> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let metadata = builder.schema().metadata().clone();
    let reader = builder.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok((batches, metadata))
}

pub fn compute_checksum(path: &Path) -> Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = Crc32::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub(crate) fn vector_field(name: &str, width: usize) -> Result<Field> {
    let width = i32::try_from(width)
        .map_err(|_| StorageError::Shape(format!("vector width {width} exceeds i32")))?;
    Ok(Field::new(
        name,
        DataType::FixedSizeList(item_field(), width),
        false,
    ))
}

fn item_field() -> FieldRef {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Packs row-major `values` into fixed-width float rows.
pub(crate) fn vector_array(values: Vec<f32>, width: usize) -> Result<FixedSizeListArray> {
    let size = i32::try_from(width)
        .map_err(|_| StorageError::Shape(format!("vector width {width} exceeds i32")))?;
    if width == 0 || values.len() % width != 0 {
        return Err(StorageError::Shape(format!(
            "{} values cannot be split into rows of {width}",
            values.len()
        )));
    }
    let array = FixedSizeListArray::try_new(
        item_field(),
        size,
        Arc::new(Float32Array::from(values)),
        None,
    )?;
    Ok(array)
}

/// Appends every row of a fixed-width float column to `out`, returning the row width.
pub(crate) fn extend_from_vectors(
    batch: &RecordBatch,
    name: &str,
    out: &mut Vec<f32>,
) -> Result<usize> {
    let list = column::<FixedSizeListArray>(batch, name)?;
    let width = list.value_length() as usize;
    for row in 0..list.len() {
        let value = list.value(row);
        let floats = value
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StorageError::Schema(format!("column {name} is not float32")))?;
        out.extend_from_slice(floats.values());
    }
    Ok(width)
}

pub(crate) fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::Schema(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| StorageError::Schema(format!("column {name} has unexpected type")))
}

pub(crate) fn metadata_usize(
    metadata: &std::collections::HashMap<String, String>,
    key: &str,
) -> Result<usize> {
    metadata
        .get(key)
        .ok_or_else(|| StorageError::Schema(format!("missing metadata key {key}")))?
        .parse::<usize>()
        .map_err(|_| StorageError::Schema(format!("metadata key {key} is not a count")))
}
