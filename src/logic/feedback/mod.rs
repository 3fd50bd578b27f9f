//! Feedback Module - Durable Log of User Corrections
//!
//! Every feedback submission lands here as `(timestamp, url, tag)`. The log
//! is consumed by maintenance and emptied once per successful promotion.

pub mod record;
pub mod writer;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use crate::logic::storage::StorageError;

pub use record::FeedbackRecord;
pub use writer::FeedbackLog;

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FeedbackError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        FeedbackError::Io { path: path.to_path_buf(), source }
    }
}
