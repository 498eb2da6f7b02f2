//! Interactive REPL for StudyPlan
//!
//! Readline editing, slash commands for the two views and the project list,
//! and plain text for follow-up questions.

mod session;

pub use session::ReplSession;

use eyre::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::shell::Shell;

/// Run the interactive REPL
///
/// This is the main entry point for `sp repl`.
pub async fn run_interactive(shell: Shell, initial_project: Option<String>) -> Result<()> {
    let mut session = ReplSession::new(shell);
    session.run(initial_project).await
}

/// Cancels its token when Ctrl-C arrives while a remote call is running
///
/// Once tokio has seen a `ctrl_c` listener the default SIGINT exit is gone
/// for the rest of the process, so every remote call takes one of these.
pub struct CtrlCGuard {
    token: CancellationToken,
    watcher: JoinHandle<()>,
}

impl CtrlCGuard {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let watcher = {
            let token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            })
        };
        Self { token, watcher }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for CtrlCGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_token_starts_live_and_watcher_stops_on_drop() {
        let guard = CtrlCGuard::new();
        let token = guard.token().clone();
        assert!(!token.is_cancelled());

        drop(guard);
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }
}
