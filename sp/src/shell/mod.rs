//! Action handlers behind the two views and the project list
//!
//! [`Shell`] holds the services; [`ShellState`] holds what the user is working
//! on. Front ends (REPL, batch CLI) keep one `ShellState` and pass it into
//! each handler. Handlers run one at a time and each one finishes before the
//! next input is read.

mod state;

pub use state::{ShellState, View};

use std::path::{Path, PathBuf};

use projectstore::{LoadReport, ProjectStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activation::{ActivationPolicy, ActivationWaiter, WaitProgress};
use crate::config::{Config, GeminiConfig, GenerationConfig};
use crate::error::PlanError;
use crate::llm::{Remote, create_remote};
use crate::prompts::{SYSTEM_INSTRUCTION, opening_prompt};
use crate::session::GenerationSession;
use crate::upload::{self, read_pdf};

/// Confirmation that a submission was received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub file_name: String,
    pub size: usize,
}

/// Services behind the user actions
pub struct Shell {
    remote: Remote,
    store: ProjectStore,
    waiter: ActivationWaiter,
    generation: GenerationConfig,
    api_key_env: String,
}

impl Shell {
    pub fn new(remote: Remote, store: ProjectStore, policy: ActivationPolicy, generation: GenerationConfig) -> Self {
        let waiter = ActivationWaiter::new(remote.files.clone(), policy);
        Self {
            remote,
            store,
            waiter,
            generation,
            api_key_env: GeminiConfig::default().api_key_env,
        }
    }

    /// Build from config; fails before anything else when the API key is missing
    pub fn from_config(config: &Config) -> Result<Self, PlanError> {
        config.validate()?;
        let remote = create_remote(&config.gemini)?;
        let store = ProjectStore::open(&config.storage.projects_dir)?;
        let mut shell = Self::new(
            remote,
            store,
            ActivationPolicy::from_config(&config.activation),
            config.generation.clone(),
        );
        shell.api_key_env = config.gemini.api_key_env.clone();
        Ok(shell)
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Extra guidance to print after `err`, if any
    pub fn hint(&self, err: &PlanError) -> Option<String> {
        err.is_credential_rejected()
            .then(|| format!("The service rejected the API key. Check the {} environment variable.", self.api_key_env))
    }

    /// Change the active project's name, keeping its history
    pub fn set_project_name(&self, state: &mut ShellState, name: &str) -> Result<(), PlanError> {
        let name = name.trim();
        if projectstore::file_stem(name).is_err() {
            return Err(PlanError::InvalidProjectName(name.to_string()));
        }
        debug!(from = %state.active_project, to = %name, "set_project_name: called");
        state.active_project = name.to_string();
        Ok(())
    }

    /// Upload a brief and produce the first roadmap
    ///
    /// On success the active project gets a fresh conversation whose first
    /// exchange is the opening prompt and the model's roadmap. On failure the
    /// previous conversation is left as it was.
    pub async fn upload_brief(
        &self,
        state: &mut ShellState,
        path: &Path,
        cancel: &CancellationToken,
        on_progress: impl FnMut(WaitProgress),
    ) -> Result<String, PlanError> {
        debug!(?path, project = %state.active_project, "upload_brief: called");
        let files = self.remote.files.as_ref();

        let uploaded = upload::upload_brief(files, path).await?;

        let report = match self.waiter.wait(std::slice::from_ref(&uploaded), cancel, on_progress).await {
            Ok(report) => report,
            Err(e) => {
                if let Err(release) = files.delete(&uploaded.name).await {
                    warn!(name = %uploaded.name, error = %release, "upload_brief: failed to release file");
                }
                return Err(e.into());
            }
        };

        let file_name = uploaded.label().to_string();
        let mut session = GenerationSession::new(
            self.remote.model.clone(),
            SYSTEM_INSTRUCTION,
            self.generation.clone(),
            Vec::new(),
        );
        let prompt = opening_prompt(&state.active_project, &file_name);

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PlanError::Interrupted),
            reply = session.send(&prompt, report.activated.clone()) => reply,
        };
        if matches!(sent, Err(PlanError::Interrupted)) {
            // The send may have stopped before leasing them
            for file in &report.activated {
                if let Err(release) = files.delete(&file.name).await {
                    warn!(name = %file.name, error = %release, "upload_brief: failed to release file");
                }
            }
            return Err(PlanError::Interrupted);
        }

        match sent {
            Ok(reply) => {
                if let Some(mut previous) = state.session.replace(session) {
                    previous.close(files).await;
                }
                info!(project = %state.active_project, file = %file_name, "Roadmap generated");
                Ok(reply)
            }
            Err(e) => {
                session.close(files).await;
                Err(e)
            }
        }
    }

    /// Ask a follow-up question on the active conversation
    ///
    /// Cancelling abandons the request and leaves the history unchanged.
    pub async fn follow_up(
        &self,
        state: &mut ShellState,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, PlanError> {
        debug!(project = %state.active_project, "follow_up: called");
        let session = state.session.as_mut().ok_or(PlanError::NoActiveSession)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PlanError::Interrupted),
            reply = session.send(text, Vec::new()) => reply,
        }
    }

    /// "Step completed": save the active project
    pub fn step_completed(&self, state: &ShellState) -> Result<PathBuf, PlanError> {
        debug!(project = %state.active_project, "step_completed: called");
        let session = state.session.as_ref().ok_or(PlanError::NoActiveSession)?;
        Ok(self.store.save(&state.active_project, session.history())?)
    }

    /// Accept a completed assignment; evaluation is not available
    pub fn submit_assignment(&self, path: &Path) -> Result<Receipt, PlanError> {
        debug!(?path, "submit_assignment: called");
        let bytes = read_pdf(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, size = bytes.len(), "Assignment received");
        Ok(Receipt {
            file_name,
            size: bytes.len(),
        })
    }

    /// Every saved project, with unreadable records reported separately
    pub fn old_projects(&self) -> Result<LoadReport, PlanError> {
        Ok(self.store.load_all()?)
    }

    /// Make a saved project the active one
    ///
    /// Returns the number of turns restored.
    pub async fn open_project(&self, state: &mut ShellState, name: &str) -> Result<usize, PlanError> {
        debug!(%name, "open_project: called");
        let record = self.store.load(name)?;
        let turns = record.history.len();

        let session = GenerationSession::new(
            self.remote.model.clone(),
            SYSTEM_INSTRUCTION,
            self.generation.clone(),
            record.history,
        );
        if let Some(mut previous) = state.session.replace(session) {
            previous.close(self.remote.files.as_ref()).await;
        }
        state.active_project = record.name;

        info!(project = %state.active_project, turns, "Opened project");
        Ok(turns)
    }

    /// Release remote resources held by the active conversation
    pub async fn shutdown(&self, state: &mut ShellState) {
        if let Some(session) = state.session.as_mut() {
            session.close(self.remote.files.as_ref()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::llm::FileState;
    use crate::llm::client::mock::{MockFileService, MockModelClient};
    use crate::upload::tests::write_pdf;
    use projectstore::{Part, Role, StoreError};
    use tempfile::TempDir;

    fn fast_policy() -> ActivationPolicy {
        ActivationPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
            max_polls: 10,
            timeout: Duration::from_secs(5),
        }
    }

    fn shell(files: Arc<MockFileService>, model: Arc<MockModelClient>, dir: &Path) -> Shell {
        let remote = Remote { files, model };
        Shell::new(
            remote,
            ProjectStore::open(dir.join("projects")).unwrap(),
            fast_policy(),
            GenerationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_essay1_upload_save_reopen() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new().script(vec![FileState::Processing, FileState::Active]));
        let model = Arc::new(MockModelClient::replying(&["## Roadmap\n1. Read the rubric\n2. Outline"]));
        let shell = shell(files.clone(), model.clone(), temp.path());
        let mut state = ShellState::default();

        shell.set_project_name(&mut state, "Essay1").unwrap();
        let mut progress = Vec::new();
        let reply = shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |p| progress.push(p))
            .await
            .unwrap();

        assert!(reply.contains("Roadmap"));
        assert_eq!(progress, vec![WaitProgress { completed: 1, total: 1 }]);

        let history = state.history().to_vec();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role(), Role::Model);
        assert!(matches!(history[0].parts()[0], Part::File { .. }));
        assert!(history[0].text().contains("Essay1"));

        let path = shell.step_completed(&state).unwrap();
        assert!(path.ends_with("Essay1.json"));
        let record = shell.store().load("Essay1").unwrap();
        assert_eq!(record.name, "Essay1");
        assert_eq!(record.history, history);

        // Fresh front end, reopen from the project list
        let mut reopened = ShellState::default();
        let report = shell.old_projects().unwrap();
        assert!(report.projects.contains_key("Essay1"));
        let turns = shell.open_project(&mut reopened, "Essay1").await.unwrap();
        assert_eq!(turns, 2);
        assert_eq!(reopened.active_project, "Essay1");
        assert_eq!(reopened.history(), history.as_slice());
    }

    #[tokio::test]
    async fn test_follow_up_extends_conversation() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new());
        let model = Arc::new(MockModelClient::replying(&["roadmap", "Start with the intro"]));
        let shell = shell(files, model.clone(), temp.path());
        let mut state = ShellState::default();

        shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        let answer = shell.follow_up(&mut state, "Where do I start?", &CancellationToken::new()).await.unwrap();

        assert_eq!(answer, "Start with the intro");
        assert_eq!(state.history().len(), 4);
        let requests = model.requests();
        assert_eq!(requests[1].contents.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_follow_up_keeps_history() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let model = Arc::new(MockModelClient::replying(&["roadmap", "never sent"]));
        let shell = shell(Arc::new(MockFileService::new()), model.clone(), temp.path());
        let mut state = ShellState::default();

        shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        let before = state.history().to_vec();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = shell.follow_up(&mut state, "Next?", &cancel).await.unwrap_err();

        assert!(matches!(err, PlanError::Interrupted));
        assert_eq!(state.history(), before.as_slice());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_without_session() {
        let temp = TempDir::new().unwrap();
        let shell = shell(
            Arc::new(MockFileService::new()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        let mut state = ShellState::default();

        assert!(matches!(
            shell.follow_up(&mut state, "hello", &CancellationToken::new()).await,
            Err(PlanError::NoActiveSession)
        ));
        assert!(matches!(shell.step_completed(&state), Err(PlanError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_processing_failure_releases_file_and_keeps_state() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new().script(vec![FileState::Processing, FileState::Failed]));
        let model = Arc::new(MockModelClient::replying(&["never used"]));
        let shell = shell(files.clone(), model.clone(), temp.path());
        let mut state = ShellState::default();

        let err = shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::ProcessingFailure(_)));
        assert_eq!(files.upload_count(), 1);
        assert_eq!(model.call_count(), 0);
        assert_eq!(files.deleted(), vec!["files/mock-1".to_string()]);
        assert!(state.session().is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_is_upload_error() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let shell = shell(
            Arc::new(MockFileService::failing()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        let mut state = ShellState::default();

        let err = shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Upload(_)));
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_previous_conversation() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new());
        let model = Arc::new(MockModelClient::new(vec![Some("first roadmap".to_string()), None]));
        let shell = shell(files.clone(), model, temp.path());
        let mut state = ShellState::default();

        shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        let err = shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, PlanError::Generation(_)));
        assert_eq!(state.session().unwrap().last_reply().as_deref(), Some("first roadmap"));
        // The second upload's file was released, the first is still held
        assert_eq!(files.deleted(), vec!["files/mock-2".to_string()]);
    }

    #[tokio::test]
    async fn test_new_brief_releases_previous_files() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new());
        let model = Arc::new(MockModelClient::replying(&["one", "two"]));
        let shell = shell(files.clone(), model, temp.path());
        let mut state = ShellState::default();

        for _ in 0..2 {
            shell
                .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
                .await
                .unwrap();
        }
        assert_eq!(files.deleted(), vec!["files/mock-1".to_string()]);

        shell.shutdown(&mut state).await;
        assert_eq!(
            files.deleted(),
            vec!["files/mock-1".to_string(), "files/mock-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_open_missing_project_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let shell = shell(
            Arc::new(MockFileService::new()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        let mut state = ShellState::default();

        let err = shell.open_project(&mut state, "Nope").await.unwrap_err();
        assert!(matches!(err, PlanError::Persistence(StoreError::NotFound(_))));
        assert_eq!(state.active_project, "Untitled Project");
    }

    #[tokio::test]
    async fn test_old_projects_skips_malformed_record() {
        let temp = TempDir::new().unwrap();
        let shell = shell(
            Arc::new(MockFileService::new()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        shell
            .store()
            .save("Good", &[projectstore::Turn::user("hi").unwrap()])
            .unwrap();
        std::fs::write(shell.store().path().join("Bad.json"), "{not json").unwrap();

        let report = shell.old_projects().unwrap();
        assert_eq!(report.projects.len(), 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_set_project_name_rejects_blank() {
        let temp = TempDir::new().unwrap();
        let shell = shell(
            Arc::new(MockFileService::new()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        let mut state = ShellState::default();

        assert!(matches!(
            shell.set_project_name(&mut state, "  "),
            Err(PlanError::InvalidProjectName(_))
        ));
        shell.set_project_name(&mut state, "  Lab 2 ").unwrap();
        assert_eq!(state.active_project, "Lab 2");
    }

    #[tokio::test]
    async fn test_rejected_key_gets_hint() {
        let temp = TempDir::new().unwrap();
        let brief = write_pdf(temp.path(), "brief.pdf");
        let files = Arc::new(MockFileService::new());
        let model = Arc::new(MockModelClient::rejecting_key());
        let shell = shell(files, model, temp.path());
        let mut state = ShellState::default();

        let err = shell
            .upload_brief(&mut state, &brief, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        let hint = shell.hint(&err).expect("rejected key should carry a hint");
        assert!(hint.contains("GEMINI_API_KEY"));
        assert_eq!(shell.hint(&PlanError::NoActiveSession), None);
    }

    #[test]
    fn test_submit_assignment_confirms_receipt() {
        let temp = TempDir::new().unwrap();
        let shell = shell(
            Arc::new(MockFileService::new()),
            Arc::new(MockModelClient::replying(&[])),
            temp.path(),
        );
        let pdf = write_pdf(temp.path(), "final.pdf");

        let receipt = shell.submit_assignment(&pdf).unwrap();
        assert_eq!(receipt.file_name, "final.pdf");
        assert!(receipt.size > 0);

        let txt = temp.path().join("final.txt");
        std::fs::write(&txt, "plain").unwrap();
        assert!(matches!(shell.submit_assignment(&txt), Err(PlanError::Upload(_))));
    }
}
