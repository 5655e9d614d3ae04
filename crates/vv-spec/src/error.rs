use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flow::{FlowId, FlowStage};
use crate::store::StoreError;

/// A user-correctable problem with one submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Anchor used by error summaries to link back to the input.
    pub fn href(&self) -> String {
        format!("#{}", self.field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The flow cannot serve the requested step; the caller restarts at species selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("flow '{0}' was not found or has expired")]
    FlowMissing(FlowId),
    #[error("flow '{0}' has no species selected")]
    NoSpeciesSelected(FlowId),
    #[error("flow '{flow_id}' is at {actual} but {expected} is required")]
    OutOfSequence {
        flow_id: FlowId,
        expected: FlowStage,
        actual: FlowStage,
    },
    #[error("flow '{0}' is missing counts for its selected species")]
    Incomplete(FlowId),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("{} field(s) failed validation", .0.len())]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WizardError {
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            WizardError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}
