//! Gemini generative-language API client
//!
//! Implements [`FileService`] with the Files API (resumable upload protocol)
//! and [`ModelClient`] with `models/{model}:generateContent`. Remote calls
//! are never retried; each call has one outcome.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use projectstore::{Part, Role, Turn};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{FileService, FileState, GenerateRequest, GenerateResponse, LlmError, ModelClient, RemoteFile, TokenUsage};
use crate::config::{GeminiConfig, GenerationConfig};
use crate::error::PlanError;

const API_VERSION: &str = "v1beta";

/// Gemini API client
pub struct GeminiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, PlanError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key()?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PlanError::StartupConfiguration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Build the generateContent body
    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        debug!(model = %self.model, content_count = request.contents.len(), "build_request_body: called");
        serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": request.system_instruction }],
            },
            "contents": request.contents.iter().map(convert_turn).collect::<Vec<_>>(),
            "generationConfig": convert_generation_config(&request.generation),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "check: API error");
        Err(LlmError::from_status(status.as_u16(), &text))
    }
}

/// Convert a history turn to a Gemini `Content`
fn convert_turn(turn: &Turn) -> serde_json::Value {
    let role = match turn.role() {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<serde_json::Value> = turn
        .parts()
        .iter()
        .map(|part| match part {
            Part::Text { text } => serde_json::json!({ "text": text }),
            Part::File { uri, mime_type, .. } => serde_json::json!({
                "fileData": { "mimeType": mime_type, "fileUri": uri },
            }),
        })
        .collect();

    serde_json::json!({ "role": role, "parts": parts })
}

fn convert_generation_config(config: &GenerationConfig) -> serde_json::Value {
    serde_json::json!({
        "temperature": config.temperature,
        "topP": config.top_p,
        "topK": config.top_k,
        "maxOutputTokens": config.max_output_tokens,
        "responseMimeType": config.response_mime_type,
    })
}

/// Join the text parts of the first candidate
fn parse_response(api_response: GeminiResponse) -> Result<GenerateResponse, LlmError> {
    let usage = api_response
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            candidates_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    let candidate = api_response.candidates.into_iter().next().ok_or_else(|| {
        let reason = api_response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        LlmError::InvalidResponse(format!("Model returned no reply ({})", reason))
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse(format!(
            "Model returned an empty reply (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(GenerateResponse {
        text,
        finish_reason: candidate.finish_reason,
        usage,
    })
}

impl From<GeminiFile> for RemoteFile {
    fn from(file: GeminiFile) -> Self {
        RemoteFile {
            state: FileState::from_gemini(file.state.as_deref().unwrap_or("")),
            name: file.name,
            uri: file.uri.unwrap_or_default(),
            mime_type: file.mime_type.unwrap_or_default(),
            display_name: file.display_name,
        }
    }
}

#[async_trait]
impl FileService for GeminiClient {
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> Result<RemoteFile, LlmError> {
        debug!(?path, %mime_type, %display_name, "upload: called");
        let bytes = tokio::fs::read(path).await.map_err(|source| LlmError::Io {
            path: path.display().to_string(),
            source,
        })?;

        // Start a resumable upload session
        let start_url = format!("{}/upload/{}/files", self.base_url, API_VERSION);
        let start = self
            .http
            .post(start_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = Self::check(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("Upload session returned no upload URL".to_string()))?;

        // Send the bytes and finalize in one request
        let size = bytes.len();
        let finish = self
            .http
            .post(upload_url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Length", size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let finish = Self::check(finish).await?;

        let uploaded: GeminiUploadResponse = finish.json().await?;
        let file = RemoteFile::from(uploaded.file);
        info!(name = %file.name, state = %file.state, size, "Uploaded file");
        Ok(file)
    }

    async fn get(&self, name: &str) -> Result<RemoteFile, LlmError> {
        debug!(%name, "get: called");
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, name);
        let response = self.http.get(url).header("x-goog-api-key", &self.api_key).send().await?;
        let response = Self::check(response).await?;

        let file: GeminiFile = response.json().await?;
        Ok(file.into())
    }

    async fn delete(&self, name: &str) -> Result<(), LlmError> {
        debug!(%name, "delete: called");
        let url = format!("{}/{}/{}", self.base_url, API_VERSION, name);
        let response = self
            .http
            .delete(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        info!(%name, "Deleted remote file");
        Ok(())
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        debug!(model = %self.model, "generate: called");
        let url = format!("{}/{}/{}:generateContent", self.base_url, API_VERSION, self.model_path());
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let api_response: GeminiResponse = response.json().await?;
        let reply = parse_response(api_response)?;
        debug!(
            finish_reason = ?reply.finish_reason,
            total_tokens = reply.usage.total_tokens,
            "generate: success"
        );
        Ok(reply)
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GeminiUploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    display_name: Option<String>,
    mime_type: Option<String>,
    uri: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GeminiClient {
        GeminiClient {
            model: "gemini-1.5-flash".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            http: Client::new(),
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client();
        let request = GenerateRequest {
            system_instruction: "You plan assignments".to_string(),
            contents: vec![
                Turn::new(
                    Role::User,
                    vec![
                        Part::File {
                            name: "files/abc".to_string(),
                            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc".to_string(),
                            mime_type: "application/pdf".to_string(),
                            display_name: Some("brief.pdf".to_string()),
                        },
                        Part::text("Make a plan"),
                    ],
                )
                .unwrap(),
            ],
            generation: GenerationConfig::default(),
        };

        let body = client.build_request_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You plan assignments");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(
            body["contents"][0]["parts"][0]["fileData"]["fileUri"],
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(body["contents"][0]["parts"][1]["text"], "Make a plan");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["responseMimeType"], "text/plain");
    }

    #[test]
    fn test_model_turn_role() {
        let value = convert_turn(&Turn::model("ok").unwrap());
        assert_eq!(value["role"], "model");
    }

    #[test]
    fn test_model_path() {
        let mut client = test_client();
        assert_eq!(client.model_path(), "models/gemini-1.5-flash");
        client.model = "models/gemini-pro".to_string();
        assert_eq!(client.model_path(), "models/gemini-pro");
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "1. Read"}, {"text": " 2. Write"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
        }"#;
        let api_response: GeminiResponse = serde_json::from_str(json).unwrap();

        let reply = parse_response(api_response).unwrap();
        assert_eq!(reply.text, "1. Read 2. Write");
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(reply.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_blocked() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let api_response: GeminiResponse = serde_json::from_str(json).unwrap();

        let err = parse_response(api_response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_response_empty_text() {
        let json = r#"{"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}"#;
        let api_response: GeminiResponse = serde_json::from_str(json).unwrap();

        let err = parse_response(api_response).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_gemini_file_into_remote_file() {
        let json = r#"{
            "name": "files/abc",
            "displayName": "brief.pdf",
            "mimeType": "application/pdf",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc",
            "state": "PROCESSING"
        }"#;
        let file: GeminiFile = serde_json::from_str(json).unwrap();
        let remote: RemoteFile = file.into();

        assert_eq!(remote.name, "files/abc");
        assert_eq!(remote.state, FileState::Processing);
        assert_eq!(remote.label(), "brief.pdf");
    }
}
