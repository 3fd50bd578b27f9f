//! Decision Types
//!
//! Labels, verdicts and feedback tags shared by the agent, the router and
//! the maintenance pipeline. No logic beyond conversions.

use serde::{Deserialize, Serialize};

// ============================================================================
// LABEL (agent convention)
// ============================================================================

/// Binary class used by the online agent (Phishing = 1, Legitimate = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Legitimate,
    Phishing,
}

impl Label {
    pub fn complement(self) -> Self {
        match self {
            Label::Legitimate => Label::Phishing,
            Label::Phishing => Label::Legitimate,
        }
    }

    /// Agent class index
    pub fn as_class(self) -> u8 {
        match self {
            Label::Legitimate => 0,
            Label::Phishing => 1,
        }
    }

    /// Signed target for logistic loss
    pub fn as_target(self) -> f64 {
        match self {
            Label::Legitimate => -1.0,
            Label::Phishing => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Legitimate => "legitimate",
            Label::Phishing => "phishing",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// OPINION
// ============================================================================

/// Agent output: a label, or nothing before the first lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opinion {
    NoOpinion,
    Label(Label),
}

impl Opinion {
    pub fn label(self) -> Option<Label> {
        match self {
            Opinion::Label(l) => Some(l),
            Opinion::NoOpinion => None,
        }
    }
}

// ============================================================================
// VERDICT (external decision)
// ============================================================================

/// What the front end shows: threat (-1) or benign (1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Threat,
    Benign,
}

impl Verdict {
    pub fn as_i8(self) -> i8 {
        match self {
            Verdict::Threat => -1,
            Verdict::Benign => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Threat => "threat",
            Verdict::Benign => "benign",
        }
    }
}

impl From<Label> for Verdict {
    fn from(label: Label) -> Self {
        match label {
            Label::Phishing => Verdict::Threat,
            Label::Legitimate => Verdict::Benign,
        }
    }
}

impl From<Verdict> for Label {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Threat => Label::Phishing,
            Verdict::Benign => Label::Legitimate,
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    /// Accepts the names or the front-end codes (-1 threat, 1 benign)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "threat" | "-1" => Ok(Verdict::Threat),
            "benign" | "1" => Ok(Verdict::Benign),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CORRECTNESS
// ============================================================================

/// User feedback on a shown verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correctness {
    Correct,
    Incorrect,
}

impl Correctness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Correctness::Correct => "correct",
            Correctness::Incorrect => "incorrect",
        }
    }

    /// The label the user is actually asserting
    pub fn resolve(self, predicted: Label) -> Label {
        match self {
            Correctness::Correct => predicted,
            Correctness::Incorrect => predicted.complement(),
        }
    }
}

impl std::str::FromStr for Correctness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Ok(Correctness::Correct),
            "incorrect" => Ok(Correctness::Incorrect),
            other => Err(format!("unknown feedback tag '{}'", other)),
        }
    }
}

impl std::fmt::Display for Correctness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(Correctness::Correct.resolve(Label::Phishing), Label::Phishing);
        assert_eq!(Correctness::Incorrect.resolve(Label::Phishing), Label::Legitimate);
        assert_eq!(Correctness::Incorrect.resolve(Label::Legitimate), Label::Phishing);
    }

    #[test]
    fn test_verdict_mapping() {
        assert_eq!(Verdict::from(Label::Phishing), Verdict::Threat);
        assert_eq!(Label::from(Verdict::Benign), Label::Legitimate);
        assert_eq!(Verdict::Threat.as_i8(), -1);
        assert_eq!(Verdict::Benign.as_i8(), 1);
    }

    #[test]
    fn test_parse_correctness() {
        assert_eq!("Correct".parse::<Correctness>(), Ok(Correctness::Correct));
        assert_eq!(" incorrect ".parse::<Correctness>(), Ok(Correctness::Incorrect));
        assert!("maybe".parse::<Correctness>().is_err());
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!("threat".parse::<Verdict>(), Ok(Verdict::Threat));
        assert_eq!("-1".parse::<Verdict>(), Ok(Verdict::Threat));
        assert_eq!("Benign".parse::<Verdict>(), Ok(Verdict::Benign));
        assert!("0".parse::<Verdict>().is_err());
    }
}
