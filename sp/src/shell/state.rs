//! Session-wide state owned by the front end and passed into every handler

use std::fmt;
use std::str::FromStr;

use projectstore::{DEFAULT_PROJECT_NAME, Turn};

use crate::session::GenerationSession;

/// Top-level views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    UploadBrief,
    SubmitAssignment,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::UploadBrief => "Upload Brief",
            View::SubmitAssignment => "Submit Assignment",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upload" | "brief" | "upload brief" => Ok(View::UploadBrief),
            "submit" | "assignment" | "submit assignment" => Ok(View::SubmitAssignment),
            other => Err(format!("unknown view '{}' (expected 'upload' or 'submit')", other)),
        }
    }
}

/// Active project and its conversation
pub struct ShellState {
    pub active_project: String,
    pub view: View,
    pub(crate) session: Option<GenerationSession>,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            active_project: DEFAULT_PROJECT_NAME.to_string(),
            view: View::default(),
            session: None,
        }
    }
}

impl ShellState {
    pub fn session(&self) -> Option<&GenerationSession> {
        self.session.as_ref()
    }

    /// History of the active project, empty when nothing is loaded
    pub fn history(&self) -> &[Turn] {
        self.session.as_ref().map(|s| s.history()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = ShellState::default();
        assert_eq!(state.active_project, "Untitled Project");
        assert_eq!(state.view, View::UploadBrief);
        assert!(state.session().is_none());
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_view_from_str() {
        assert_eq!("upload".parse::<View>(), Ok(View::UploadBrief));
        assert_eq!("Submit Assignment".parse::<View>(), Ok(View::SubmitAssignment));
        assert!("settings".parse::<View>().is_err());
    }
}
