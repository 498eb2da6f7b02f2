//! ProjectStore - named study-plan conversations on disk
//!
//! Each project is one JSON record holding the project name and its ordered
//! conversation history. The store never deletes records; saving a project
//! replaces its previous record.
//!
//! # Layout
//!
//! ```text
//! projects/
//! ├── Essay1.json
//! ├── Lab Report.json
//! └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use projectstore::{ProjectStore, Turn};
//!
//! let store = ProjectStore::open("projects")?;
//! store.save("Essay1", &[Turn::user("Plan my essay")?])?;
//! let report = store.load_all()?;
//! assert!(report.projects.contains_key("Essay1"));
//! ```

pub mod cli;
pub mod config;
mod store;
mod turn;

pub use store::{LoadReport, ProjectRecord, ProjectStore, ProjectSummary, StoreError, file_stem};
pub use turn::{Part, Role, Turn, TurnError};

/// Name given to a project before the user picks one
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// Default store directory (`~/.local/share/studyplan/projects` on Linux)
pub fn default_store_path() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("studyplan")
        .join("projects")
}
