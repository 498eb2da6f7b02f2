//! Request/response types for the model service
//!
//! These follow the Gemini generative-language API but stay independent of
//! its JSON shapes, which live in the client.

use projectstore::{Part, Turn};
use tracing::debug;

use crate::config::GenerationConfig;

/// Processing state of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Processing,
    Active,
    Failed,
}

impl FileState {
    /// Parse from the Gemini `state` string
    pub fn from_gemini(s: &str) -> Self {
        debug!(%s, "FileState::from_gemini: called");
        match s {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => {
                debug!("FileState::from_gemini: unknown state, treating as Pending");
                FileState::Pending
            }
        }
    }

    /// Still waiting on the service
    pub fn is_processing(&self) -> bool {
        matches!(self, FileState::Pending | FileState::Processing)
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileState::Pending => "pending",
            FileState::Processing => "processing",
            FileState::Active => "active",
            FileState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Handle to a document uploaded to the model service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Opaque resource name, e.g. `files/abc123`
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub display_name: Option<String>,
    pub state: FileState,
}

impl RemoteFile {
    /// The history part that refers to this file
    pub fn to_part(&self) -> Part {
        Part::File {
            name: self.name.clone(),
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            display_name: self.display_name.clone(),
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A generation request - everything needed for one model call
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Fixed instruction describing the assistant's role
    pub system_instruction: String,

    /// Full conversation, oldest first, ending with the new user turn
    pub contents: Vec<Turn>,

    /// Sampling parameters
    pub generation: GenerationConfig,
}

/// Reply from a generation request
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Concatenated text of the first candidate
    pub text: String,

    /// Why the model stopped, as reported by the service
    pub finish_reason: Option<String>,

    pub usage: TokenUsage,
}

/// Token counts reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub candidates_tokens: u64,
    pub total_tokens: u64,
}
