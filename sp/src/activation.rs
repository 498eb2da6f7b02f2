//! Waiting for uploaded files to become usable
//!
//! After upload the service processes a file before it can be referenced in
//! a generation request. [`ActivationWaiter`] polls each file until it leaves
//! the processing state, backing off between polls. The wait is bounded by a
//! poll count and an overall timeout, and can be cancelled.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ActivationConfig;
use crate::llm::{FileService, FileState, LlmError, RemoteFile};

/// Errors that abort a wait; no partial results survive them
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("{name} ended in state {state}")]
    ProcessingFailed { name: String, state: FileState },

    #[error("{name} still processing after {polls} polls ({elapsed:?})")]
    TimedOut {
        name: String,
        polls: u32,
        elapsed: Duration,
    },

    #[error("wait for {name} was cancelled")]
    Cancelled { name: String },

    #[error("could not check {name}: {source}")]
    Fetch {
        name: String,
        #[source]
        source: LlmError,
    },
}

/// Bounds and backoff for polling
#[derive(Debug, Clone)]
pub struct ActivationPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_polls: u32,
    pub timeout: Duration,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self::from_config(&ActivationConfig::default())
    }
}

impl ActivationPolicy {
    pub fn from_config(config: &ActivationConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            multiplier: config.multiplier.max(1.0),
            max_polls: config.max_polls,
            timeout: config.timeout(),
        }
    }

    /// Delay before poll number `poll` (0-based)
    pub fn delay_for(&self, poll: u32) -> Duration {
        let factor = self.multiplier.powi(poll.min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64).max(Duration::from_millis(1))
    }
}

/// Progress after each file resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitProgress {
    pub completed: usize,
    pub total: usize,
}

/// Outcome of a successful wait
#[derive(Debug, Clone)]
pub struct WaitReport {
    /// Files in input order, all `Active`
    pub activated: Vec<RemoteFile>,

    /// Wait-then-refetch cycles across all files
    pub polls: u32,
}

/// Polls uploaded files until they are active
pub struct ActivationWaiter {
    files: Arc<dyn FileService>,
    policy: ActivationPolicy,
}

impl ActivationWaiter {
    pub fn new(files: Arc<dyn FileService>, policy: ActivationPolicy) -> Self {
        Self { files, policy }
    }

    /// Block until every file is `Active`
    ///
    /// Files are checked in order. The first file that fails, times out or is
    /// cancelled aborts the whole batch.
    pub async fn wait(
        &self,
        files: &[RemoteFile],
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(WaitProgress),
    ) -> Result<WaitReport, ActivationError> {
        debug!(count = files.len(), "wait: called");
        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        let total = files.len();
        let mut activated = Vec::with_capacity(total);
        let mut polls = 0u32;

        for (idx, file) in files.iter().enumerate() {
            let resolved = self.wait_one(&file.name, cancel, started, deadline, &mut polls).await?;

            if resolved.state != FileState::Active {
                warn!(name = %resolved.name, state = %resolved.state, "wait: file did not activate");
                return Err(ActivationError::ProcessingFailed {
                    name: resolved.name,
                    state: resolved.state,
                });
            }

            info!(name = %resolved.name, completed = idx + 1, total, "File active");
            activated.push(resolved);
            on_progress(WaitProgress {
                completed: idx + 1,
                total,
            });
        }

        Ok(WaitReport { activated, polls })
    }

    /// Poll one file until it leaves the processing state
    async fn wait_one(
        &self,
        name: &str,
        cancel: &CancellationToken,
        started: Instant,
        deadline: Instant,
        total_polls: &mut u32,
    ) -> Result<RemoteFile, ActivationError> {
        let mut current = self.fetch(name, cancel).await?;
        let mut polls = 0u32;

        while current.state.is_processing() {
            let now = Instant::now();
            if polls >= self.policy.max_polls || now >= deadline {
                return Err(ActivationError::TimedOut {
                    name: name.to_string(),
                    polls,
                    elapsed: now - started,
                });
            }

            let delay = self.policy.delay_for(polls).min(deadline - now);
            debug!(%name, polls, ?delay, state = %current.state, "wait_one: still processing");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ActivationError::Cancelled { name: name.to_string() });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            polls += 1;
            *total_polls += 1;
            current = self.fetch(name, cancel).await?;
        }

        Ok(current)
    }

    async fn fetch(&self, name: &str, cancel: &CancellationToken) -> Result<RemoteFile, ActivationError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ActivationError::Cancelled { name: name.to_string() }),
            result = self.files.get(name) => result.map_err(|source| ActivationError::Fetch {
                name: name.to_string(),
                source,
            }),
        }
    }
}
