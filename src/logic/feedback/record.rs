use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::labels::Correctness;

/// One user verdict on a shown decision. The vector is not stored; it is
/// re-extracted from the URL at maintenance time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub tag: Correctness,
}

impl FeedbackRecord {
    pub fn new(url: impl Into<String>, tag: Correctness) -> Self {
        Self {
            timestamp: Utc::now(),
            url: url.into(),
            tag,
        }
    }
}
