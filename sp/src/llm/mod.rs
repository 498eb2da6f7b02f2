//! Remote model service module for StudyPlan
//!
//! Provides file upload and text generation against the Gemini API.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod gemini;
mod types;

pub use client::{FileService, ModelClient};
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use types::{FileState, GenerateRequest, GenerateResponse, RemoteFile, TokenUsage};

use crate::config::GeminiConfig;
use crate::error::PlanError;

/// Both halves of the remote API, backed by one client
#[derive(Clone)]
pub struct Remote {
    pub files: Arc<dyn FileService>,
    pub model: Arc<dyn ModelClient>,
}

/// Create the remote clients from config
///
/// Fails with a startup configuration error when the API key is missing.
pub fn create_remote(config: &GeminiConfig) -> Result<Remote, PlanError> {
    debug!(model = %config.model, "create_remote: called");
    let client = Arc::new(GeminiClient::from_config(config)?);
    Ok(Remote {
        files: client.clone(),
        model: client,
    })
}
