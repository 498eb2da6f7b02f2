//! StudyPlan - assignment brief to study roadmap
//!
//! Upload an assignment brief as a PDF, wait for the model service to finish
//! processing it, and get back a step-by-step roadmap. Follow-up questions
//! continue the same conversation, and each project's history is saved to
//! disk so it can be reopened later.
//!
//! # Modules
//!
//! - [`llm`] - File service and model client traits, Gemini implementation
//! - [`upload`] - Local PDF checks and staged upload
//! - [`activation`] - Waiting for uploaded files to become usable
//! - [`session`] - Conversation history exchanged with the model
//! - [`shell`] - Action handlers behind the views
//! - [`repl`] - Interactive front end
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod activation;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod session;
pub mod shell;
pub mod upload;

pub use config::Config;
pub use error::PlanError;
pub use session::GenerationSession;
pub use shell::{Receipt, Shell, ShellState, View};
