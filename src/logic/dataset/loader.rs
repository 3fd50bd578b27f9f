use std::path::Path;

use crate::logic::dataset::DatasetError;
use crate::logic::features::{FeatureVector, FEATURE_COUNT};
use crate::logic::model::AnomalyVerdict;

/// Label value that marks a legitimate row
const LEGITIMATE_LABEL: i64 = 1;

#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    /// Legitimate rows only
    pub training_pool: Vec<FeatureVector>,
    /// Every row with its expected verdict
    pub evaluation: Vec<(FeatureVector, AnomalyVerdict)>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.evaluation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluation.is_empty()
    }
}

/// Read a dataset CSV with a header row. Every column except
/// `label_column` is a feature, in layout order.
pub fn load_dataset(path: &Path, label_column: &str) -> Result<LabeledDataset, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();

    let label_idx = headers
        .iter()
        .position(|h| h == label_column)
        .ok_or_else(|| DatasetError::MissingLabel(label_column.to_string()))?;

    let feature_cols: Vec<usize> = (0..headers.len()).filter(|&i| i != label_idx).collect();
    if feature_cols.len() != FEATURE_COUNT {
        return Err(DatasetError::ColumnCount(feature_cols.len()));
    }

    let mut dataset = LabeledDataset::default();

    for (idx, result) in reader.records().enumerate() {
        let row = idx + 1;
        let record = result?;

        let label = parse_cell(&record, label_idx, row)?;
        let values = feature_cols
            .iter()
            .map(|&col| parse_cell(&record, col, row))
            .collect::<Result<Vec<i64>, _>>()?;
        let vector = FeatureVector::from_slice(&values).map_err(|source| DatasetError::Feature { row, source })?;

        if label == LEGITIMATE_LABEL {
            dataset.training_pool.push(vector);
            dataset.evaluation.push((vector, AnomalyVerdict::Legitimate));
        } else {
            dataset.evaluation.push((vector, AnomalyVerdict::Anomaly));
        }
    }

    if dataset.is_empty() {
        return Err(DatasetError::Empty);
    }

    log::info!(
        "Dataset loaded: {} rows, {} legitimate patterns",
        dataset.evaluation.len(),
        dataset.training_pool.len()
    );
    Ok(dataset)
}

fn parse_cell(record: &csv::StringRecord, col: usize, row: usize) -> Result<i64, DatasetError> {
    let raw = record.get(col).ok_or_else(|| DatasetError::Row {
        row,
        reason: format!("missing column {}", col),
    })?;
    raw.parse::<i64>().map_err(|_| DatasetError::Row {
        row,
        reason: format!("'{}' is not an integer", raw),
    })
}
