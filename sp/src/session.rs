//! Generation session: a conversation history exchanged with the model
//!
//! The session owns the ordered history and the remote files attached during
//! its lifetime. A successful [`GenerationSession::send`] appends exactly two
//! turns (the user message and the model reply); a failed one appends none.

use std::collections::HashMap;
use std::sync::Arc;

use projectstore::{Part, Role, Turn};
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::PlanError;
use crate::llm::{FileService, GenerateRequest, ModelClient, RemoteFile};

/// Conversation with the model over a persistent history
pub struct GenerationSession {
    model: Arc<dyn ModelClient>,
    system_instruction: String,
    generation: GenerationConfig,
    history: Vec<Turn>,
    leases: HashMap<String, RemoteFile>,
}

impl GenerationSession {
    /// Start a session seeded with `history` (empty for a new project)
    pub fn new(
        model: Arc<dyn ModelClient>,
        system_instruction: impl Into<String>,
        generation: GenerationConfig,
        history: Vec<Turn>,
    ) -> Self {
        debug!(turns = history.len(), "GenerationSession::new: called");
        Self {
            model,
            system_instruction: system_instruction.into(),
            generation,
            history,
            leases: HashMap::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    /// Most recent model reply, if any
    pub fn last_reply(&self) -> Option<String> {
        self.history
            .iter()
            .rev()
            .find(|t| t.role() == Role::Model)
            .map(Turn::text)
    }

    /// Remote files this session is responsible for releasing
    pub fn leased_files(&self) -> impl Iterator<Item = &RemoteFile> {
        self.leases.values()
    }

    /// Send a message, with optional attachments, and return the reply
    ///
    /// Attachments come first in the user turn, followed by the text.
    pub async fn send(&mut self, message: &str, attachments: Vec<RemoteFile>) -> Result<String, PlanError> {
        debug!(
            message_len = message.len(),
            attachments = attachments.len(),
            turns = self.history.len(),
            "send: called"
        );

        let mut parts: Vec<Part> = attachments.iter().map(RemoteFile::to_part).collect();
        parts.push(Part::text(message));
        let user_turn = Turn::new(Role::User, parts)?;

        // The session owns attachments from here on, even if the call fails
        for file in attachments {
            self.leases.insert(file.name.clone(), file);
        }

        let mut contents: Vec<Turn> = self.history.iter().map(|t| self.wire_turn(t)).collect();
        contents.push(user_turn.clone());

        let request = GenerateRequest {
            system_instruction: self.system_instruction.clone(),
            contents,
            generation: self.generation.clone(),
        };

        let response = self.model.generate(request).await.map_err(PlanError::Generation)?;
        let model_turn = Turn::model(response.text.clone())?;

        self.history.push(user_turn);
        self.history.push(model_turn);
        info!(
            turns = self.history.len(),
            total_tokens = response.usage.total_tokens,
            "Model replied"
        );
        Ok(response.text)
    }

    /// Turn as sent to the service
    ///
    /// File parts not leased by this session are replaced by a note; the
    /// service rejects references to files it no longer holds.
    fn wire_turn(&self, turn: &Turn) -> Turn {
        let stale = turn
            .files()
            .any(|p| matches!(p, Part::File { name, .. } if !self.leases.contains_key(name)));
        if !stale {
            return turn.clone();
        }

        let parts = turn
            .parts()
            .iter()
            .map(|part| match part {
                Part::File { name, .. } if !self.leases.contains_key(name) => Part::text(format!(
                    "[attached file {} is no longer available]",
                    part.label()
                )),
                other => other.clone(),
            })
            .collect();
        Turn::new(turn.role(), parts).unwrap_or_else(|_| turn.clone())
    }

    /// Release every leased remote file
    ///
    /// Failures are logged; the session is closed regardless.
    pub async fn close(&mut self, files: &dyn FileService) {
        debug!(leases = self.leases.len(), "close: called");
        for (name, _) in self.leases.drain() {
            match files.delete(&name).await {
                Ok(()) => debug!(%name, "close: released remote file"),
                Err(e) => warn!(%name, error = %e, "close: failed to release remote file"),
            }
        }
    }

    pub fn into_history(self) -> Vec<Turn> {
        self.history
    }
}
