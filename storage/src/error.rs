// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::path::PathBuf;

use core_types::{Timestamp, TimestampError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("timestamp {timestamp} not found in latent series")]
    MissingTimestamp { timestamp: Timestamp },
    #[error("no latent input files found in {dir}")]
    NoInput { dir: PathBuf },
    #[error("file name does not encode a timestamp: {path}")]
    InvalidFileName { path: PathBuf },
}

impl From<ndarray::ShapeError> for StorageError {
    fn from(value: ndarray::ShapeError) -> Self {
        StorageError::Shape(value.to_string())
    }
}
