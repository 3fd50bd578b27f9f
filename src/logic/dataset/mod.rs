//! Dataset Module - Labeled Reference Data for the Batch Model
//!
//! Loads the reference CSV used by maintenance: legitimate rows form the
//! training pool, and every row (label collapsed to legitimate vs not) forms
//! the fixed evaluation set that old and new models are compared on.

pub mod loader;


use std::path::PathBuf;

use crate::logic::features::FeatureError;

pub use loader::{load_dataset, LabeledDataset};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset not found at {0}")]
    NotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("label column '{0}' missing from header")]
    MissingLabel(String),

    #[error("expected 9 feature columns, found {0}")]
    ColumnCount(usize),

    #[error("row {row}: {reason}")]
    Row { row: usize, reason: String },

    #[error("row {row}: {source}")]
    Feature {
        row: usize,
        #[source]
        source: FeatureError,
    },

    #[error("dataset is empty")]
    Empty,
}
