use serde::{Deserialize, Serialize};

/// One human-readable reason behind a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub feature: String,
    pub value: i8,
    pub severity: f32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Most severe first
    pub risks: Vec<Factor>,
    pub safeguards: Vec<Factor>,
}

impl Explanation {
    pub fn is_empty(&self) -> bool {
        self.risks.is_empty() && self.safeguards.is_empty()
    }

    pub fn risk_messages(&self) -> impl Iterator<Item = &str> {
        self.risks.iter().map(|f| f.message.as_str())
    }

    pub fn safeguard_messages(&self) -> impl Iterator<Item = &str> {
        self.safeguards.iter().map(|f| f.message.as_str())
    }
}
