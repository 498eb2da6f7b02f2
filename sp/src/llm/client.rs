//! Service traits for the remote model API

use std::path::Path;

use async_trait::async_trait;

use super::{GenerateRequest, GenerateResponse, LlmError, RemoteFile};

/// Remote file storage: upload, inspect and release documents
#[async_trait]
pub trait FileService: Send + Sync {
    /// Upload a local file and return its handle (usually still processing)
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> Result<RemoteFile, LlmError>;

    /// Fetch the current state of an uploaded file
    async fn get(&self, name: &str) -> Result<RemoteFile, LlmError>;

    /// Release an uploaded file
    async fn delete(&self, name: &str) -> Result<(), LlmError>;
}

/// Stateless model client - the caller supplies the whole conversation each call
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one generation request and wait for the full reply
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}
