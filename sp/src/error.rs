//! User-facing error taxonomy
//!
//! Every variant except `StartupConfiguration` aborts only the current action;
//! the shell prints it inline and keeps going.

use thiserror::Error;

use crate::activation::ActivationError;
use crate::llm::LlmError;
use crate::upload::UploadError;
use projectstore::{StoreError, TurnError};

#[derive(Debug, Error)]
pub enum PlanError {
    /// Missing credential or unusable configuration; fatal before any UI
    #[error("Startup configuration error: {0}")]
    StartupConfiguration(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("File processing failed: {0}")]
    ProcessingFailure(#[from] ActivationError),

    #[error("Generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("Could not save or load project: {0}")]
    Persistence(#[from] StoreError),

    #[error("Invalid message: {0}")]
    InvalidTurn(#[from] TurnError),

    #[error("Invalid project name: {0:?}")]
    InvalidProjectName(String),

    #[error("No active plan. Upload a brief or open a project first.")]
    NoActiveSession,

    #[error("Cancelled")]
    Interrupted,
}

impl PlanError {
    /// Whether the process should stop rather than report and continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlanError::StartupConfiguration(_))
    }

    /// Whether a remote call failed because the API key was rejected
    pub fn is_credential_rejected(&self) -> bool {
        match self {
            PlanError::Generation(e) => e.is_auth(),
            PlanError::Upload(UploadError::Remote { source, .. }) => source.is_auth(),
            PlanError::ProcessingFailure(ActivationError::Fetch { source, .. }) => source.is_auth(),
            _ => false,
        }
    }
}
