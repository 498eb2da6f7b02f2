//! Conversation history types
//!
//! A history is an ordered list of [`Turn`]s. Turns are validated when built
//! and when deserialized, so a record read back from disk carries the same
//! guarantees as one built in memory.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One content fragment of a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text {
        text: String,
    },
    /// Reference to a document held by the remote model service
    File {
        name: String,
        uri: String,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::File { .. } => None,
        }
    }

    /// Label used when a part has to be summarized for display
    pub fn label(&self) -> &str {
        match self {
            Part::Text { text } => text,
            Part::File { name, display_name, .. } => display_name.as_deref().unwrap_or(name),
        }
    }
}

/// Reasons a turn is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("turn has no parts")]
    NoParts,

    #[error("text part {index} is empty")]
    EmptyText { index: usize },
}

/// One message in a conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTurn", into = "RawTurn")]
pub struct Turn {
    role: Role,
    parts: Vec<Part>,
}

impl Turn {
    /// Build a turn, rejecting an empty part list or blank text parts
    pub fn new(role: Role, parts: Vec<Part>) -> Result<Self, TurnError> {
        debug!(%role, part_count = parts.len(), "Turn::new: called");
        if parts.is_empty() {
            return Err(TurnError::NoParts);
        }
        for (index, part) in parts.iter().enumerate() {
            if let Part::Text { text } = part
                && text.trim().is_empty()
            {
                return Err(TurnError::EmptyText { index });
            }
        }
        Ok(Self { role, parts })
    }

    pub fn user(text: impl Into<String>) -> Result<Self, TurnError> {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model(text: impl Into<String>) -> Result<Self, TurnError> {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// All text parts joined by blank lines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn files(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| matches!(p, Part::File { .. }))
    }
}

/// Wire shape of a turn, validated into [`Turn`] on the way in
#[derive(Serialize, Deserialize)]
struct RawTurn {
    role: Role,
    parts: Vec<Part>,
}

impl TryFrom<RawTurn> for Turn {
    type Error = TurnError;

    fn try_from(raw: RawTurn) -> Result<Self, Self::Error> {
        Turn::new(raw.role, raw.parts)
    }
}

impl From<Turn> for RawTurn {
    fn from(turn: Turn) -> Self {
        RawTurn {
            role: turn.role,
            parts: turn.parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_rejects_empty_parts() {
        assert_eq!(Turn::new(Role::User, vec![]), Err(TurnError::NoParts));
    }

    #[test]
    fn test_turn_rejects_blank_text() {
        let parts = vec![
            Part::File {
                name: "files/abc".to_string(),
                uri: "https://example.com/files/abc".to_string(),
                mime_type: "application/pdf".to_string(),
                display_name: None,
            },
            Part::text("   "),
        ];
        assert_eq!(Turn::new(Role::User, parts), Err(TurnError::EmptyText { index: 1 }));
    }

    #[test]
    fn test_turn_serializes_role_and_parts() {
        let turn = Turn::model("Step 1: read the brief").unwrap();
        let json = serde_json::to_value(&turn).unwrap();

        assert_eq!(json["role"], "model");
        assert_eq!(json["parts"][0]["type"], "text");
        assert_eq!(json["parts"][0]["text"], "Step 1: read the brief");
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"role":"user","parts":[]}"#;
        assert!(serde_json::from_str::<Turn>(bad).is_err());

        let unknown_role = r#"{"role":"system","parts":[{"type":"text","text":"hi"}]}"#;
        assert!(serde_json::from_str::<Turn>(unknown_role).is_err());

        let good = r#"{"role":"user","parts":[{"type":"text","text":"hi"}]}"#;
        let turn: Turn = serde_json::from_str(good).unwrap();
        assert_eq!(turn.role(), Role::User);
        assert_eq!(turn.text(), "hi");
    }

    #[test]
    fn test_file_part_label_prefers_display_name() {
        let part = Part::File {
            name: "files/abc".to_string(),
            uri: "u".to_string(),
            mime_type: "application/pdf".to_string(),
            display_name: Some("brief.pdf".to_string()),
        };
        assert_eq!(part.label(), "brief.pdf");
        assert!(part.as_text().is_none());
    }
}
