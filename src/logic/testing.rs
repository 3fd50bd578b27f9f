//! Shared fixtures for unit tests

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logic::features::{ExtractError, FeatureExtractor, FeatureVector, FEATURE_COUNT};
use crate::logic::model::{AnomalyDetector, AnomalyVerdict, FitError};

/// Distinct vector for every index below 3^9
pub fn nth(mut i: usize) -> FeatureVector {
    let mut values = [0i8; FEATURE_COUNT];
    for slot in values.iter_mut() {
        *slot = (i % 3) as i8 - 1;
        i /= 3;
    }
    FeatureVector::new(values).unwrap()
}

/// Dataset CSV with the canonical header; legitimate rows first
pub fn write_dataset(path: &Path, legit: &[FeatureVector], phish: &[FeatureVector]) {
    let mut text = String::from(
        "SFH,popUpWidnow,SSLfinal_State,Request_URL,URL_of_Anchor,web_traffic,URL_Length,age_of_domain,having_IP_Address,Result\n",
    );
    for (vectors, label) in [(legit, 1), (phish, -1)] {
        for v in vectors {
            for value in v.as_array() {
                write!(text, "{},", value).unwrap();
            }
            writeln!(text, "{}", label).unwrap();
        }
    }
    std::fs::write(path, text).unwrap();
}

/// Detector that calls legitimate exactly what it was trained on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoDetector {
    known: HashSet<FeatureVector>,
}

impl MemoDetector {
    pub fn trained_on(vectors: &[FeatureVector]) -> Self {
        let mut model = Self::default();
        model.fit(vectors).unwrap();
        model
    }
}

impl AnomalyDetector for MemoDetector {
    fn fit(&mut self, training: &[FeatureVector]) -> Result<(), FitError> {
        if training.is_empty() {
            return Err(FitError::EmptyTrainingSet);
        }
        self.known = training.iter().copied().collect();
        Ok(())
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        if self.known.contains(features) {
            0.0
        } else {
            1.0
        }
    }

    fn predict(&self, features: &FeatureVector) -> AnomalyVerdict {
        if self.known.contains(features) {
            AnomalyVerdict::Legitimate
        } else {
            AnomalyVerdict::Anomaly
        }
    }
}

/// Extractor backed by a fixed URL table; unknown URLs fail
#[derive(Debug, Default)]
pub struct MapExtractor {
    table: Mutex<HashMap<String, FeatureVector>>,
}

impl MapExtractor {
    pub fn new(entries: impl IntoIterator<Item = (String, FeatureVector)>) -> Self {
        Self { table: Mutex::new(entries.into_iter().collect()) }
    }

    pub fn insert(&self, url: impl Into<String>, v: FeatureVector) {
        self.table.lock().insert(url.into(), v);
    }
}

impl FeatureExtractor for MapExtractor {
    fn try_extract(&self, url: &str) -> Result<FeatureVector, ExtractError> {
        self.table.lock().get(url).copied().ok_or_else(|| ExtractError::Fetch {
            url: url.to_string(),
            reason: "unreachable".to_string(),
        })
    }
}
