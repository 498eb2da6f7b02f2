//! Core ProjectStore implementation

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::turn::Turn;

/// Errors raised by the project store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed project record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Invalid project name: {0:?}")]
    InvalidName(String),

    #[error("Project {name:?} would overwrite {existing:?}, which is stored in the same file")]
    NameConflict { name: String, existing: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A persisted project: its name and conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Listing entry for a stored project
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub name: String,
    pub turns: usize,
    pub saved_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// Result of scanning the whole store
///
/// Unreadable records land in `errors`; they never hide the valid ones.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub projects: BTreeMap<String, Vec<Turn>>,
    pub errors: Vec<StoreError>,
}

/// Directory of `<project>.json` records
pub struct ProjectStore {
    base_path: PathBuf,
}

impl ProjectStore {
    /// Open or create a project store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| StoreError::io(&base_path, e))?;
        debug!(?base_path, "Opened project store");
        Ok(Self { base_path })
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// File that holds the record for `name`
    pub fn record_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self.base_path.join(format!("{}.json", file_stem(name)?)))
    }

    /// Write `{name, history}` under `name`, replacing any previous record
    ///
    /// Refuses with `NameConflict` when the target file holds a different
    /// project whose name maps to the same file.
    pub fn save(&self, name: &str, history: &[Turn]) -> Result<PathBuf, StoreError> {
        let path = self.record_path(name)?;
        debug!(%name, turns = history.len(), ?path, "save: called");

        if path.exists() {
            match read_record(&path) {
                Ok(existing) if existing.name != name => {
                    warn!(%name, existing = %existing.name, ?path, "save: name conflict");
                    return Err(StoreError::NameConflict {
                        name: name.to_string(),
                        existing: existing.name,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(?path, error = %e, "save: replacing unreadable record"),
            }
        }

        let record = ProjectRecord {
            name: name.to_string(),
            history: history.to_vec(),
            saved_at: Some(Utc::now()),
        };
        let content = serde_json::to_string_pretty(&record).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;

        // Write beside the target then rename, so readers never see a partial record
        let mut tmp = tempfile::NamedTempFile::new_in(&self.base_path).map_err(|e| StoreError::io(&path, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| StoreError::io(&path, e.error))?;

        info!(%name, ?path, "Saved project");
        Ok(path)
    }

    /// Read a single record
    pub fn load(&self, name: &str) -> Result<ProjectRecord, StoreError> {
        let path = self.record_path(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let record = read_record(&path)?;
        if record.name != name {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(record)
    }

    /// Read every record, skipping and reporting the ones that fail
    pub fn load_all(&self) -> Result<LoadReport, StoreError> {
        debug!(base_path = ?self.base_path, "load_all: called");
        let mut report = LoadReport::default();

        for path in self.record_files()? {
            match read_record(&path) {
                Ok(record) => {
                    if report.projects.insert(record.name.clone(), record.history).is_some() {
                        warn!(?path, name = %record.name, "load_all: duplicate project name, later file wins");
                    }
                }
                Err(e) => {
                    warn!(?path, error = %e, "load_all: skipping unreadable record");
                    report.errors.push(e);
                }
            }
        }

        info!(
            loaded = report.projects.len(),
            failed = report.errors.len(),
            "Loaded projects"
        );
        Ok(report)
    }

    /// Summaries of readable records, sorted by name
    pub fn list(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let mut summaries = Vec::new();
        for path in self.record_files()? {
            match read_record(&path) {
                Ok(record) => summaries.push(ProjectSummary {
                    name: record.name,
                    turns: record.history.len(),
                    saved_at: record.saved_at,
                    path,
                }),
                Err(e) => warn!(?path, error = %e, "list: skipping unreadable record"),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// `*.json` files in the store directory, in name order
    fn record_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StoreError::io(&self.base_path, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.base_path, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_record(path: &Path) -> Result<ProjectRecord, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Map a display name to a file stem safe on every platform
pub fn file_stem(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidName(name.to_string()));
    }

    let stem: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // "." and ".." would escape or alias the directory
    if stem.chars().all(|c| c == '.') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(stem)
}
