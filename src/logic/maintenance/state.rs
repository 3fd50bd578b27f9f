use serde::{Deserialize, Serialize};

use super::MaintenanceError;

/// Phase of a maintenance run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceState {
    Idle,
    Loading,
    Retraining,
    Evaluating,
    Promoted,
    Rejected,
}

impl MaintenanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceState::Idle => "idle",
            MaintenanceState::Loading => "loading",
            MaintenanceState::Retraining => "retraining",
            MaintenanceState::Evaluating => "evaluating",
            MaintenanceState::Promoted => "promoted",
            MaintenanceState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Promoted | Self::Rejected)
    }

    pub fn can_transition_to(&self, target: MaintenanceState) -> bool {
        use MaintenanceState::*;
        match (self, target) {
            (Idle, Loading) => true,
            // Any working phase may abort
            (Loading, Retraining | Rejected) => true,
            (Retraining, Evaluating | Rejected) => true,
            (Evaluating, Promoted | Rejected) => true,
            (Promoted | Rejected, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MaintenanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one run through the phases, refusing invalid moves
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: MaintenanceState,
    history: Vec<MaintenanceState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self { state: MaintenanceState::Idle, history: vec![MaintenanceState::Idle] }
    }

    pub fn state(&self) -> MaintenanceState {
        self.state
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[MaintenanceState] {
        &self.history
    }

    pub fn advance(&mut self, to: MaintenanceState) -> Result<(), MaintenanceError> {
        if !self.state.can_transition_to(to) {
            return Err(MaintenanceError::InvalidTransition { from: self.state, to });
        }
        log::info!("Maintenance: {} -> {}", self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
