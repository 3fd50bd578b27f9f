use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::logic::feedback::record::FeedbackRecord;
use crate::logic::feedback::FeedbackError;
use crate::logic::storage;

/// Append-only CSV log of feedback, no header
#[derive(Debug, Clone)]
pub struct FeedbackLog {
    path: PathBuf,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it to disk
    pub fn append(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| FeedbackError::io(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FeedbackError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(record)?;
        writer.flush().map_err(|e| FeedbackError::io(&self.path, e))?;

        if let Ok(file) = writer.into_inner() {
            file.sync_data().map_err(|e| FeedbackError::io(&self.path, e))?;
        }
        Ok(())
    }

    /// Every readable record, oldest first. A missing log reads as empty;
    /// malformed rows are logged and skipped.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FeedbackError::io(&self.path, e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<FeedbackRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Feedback log line {} skipped: {}", line + 1, e),
            }
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, FeedbackError> {
        Ok(self.read_all()?.len())
    }

    /// Replace the log with an empty file; on failure the old log is intact
    pub fn truncate(&self) -> Result<(), FeedbackError> {
        storage::write_atomic(&self.path, b"")?;
        Ok(())
    }

    /// Raw bytes, for before/after comparisons
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>, FeedbackError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FeedbackError::io(&self.path, e)),
        }
    }
}
