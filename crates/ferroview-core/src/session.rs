//! Shared session record.
//!
//! [`Session`] owns the document being edited and everything the compile
//! machinery reports back about it. Every mutation replaces one field under a
//! lock and is then announced on a broadcast channel, so readers never see a
//! half-applied update and subscribers learn about changes in the order they
//! were made.

use ferroview_build::CompilationResult;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Content of a fresh, unsaved document.
pub const PLACEHOLDER_TEMPLATE: &str = "% Start writing LaTeX here\n\\documentclass{article}\n\\begin{document}\n\nHello, World!\n\n\\end{document}";

const CHANGE_CAPACITY: usize = 64;

/// A field of the session that was just replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Content,
    FilePath,
    ArtifactPath,
    Compiling(bool),
    LastResult,
    AutoCompile(bool),
    ArtifactRevision(u64),
}

/// Identifies one compile attempt. Later attempts compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttemptId(u64);

/// What the status bar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ready,
    Compiling,
    Succeeded,
    Failed,
}

/// A consistent copy of every session field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub content: String,
    pub file_path: Option<PathBuf>,
    pub artifact_path: Option<PathBuf>,
    pub compiling: bool,
    pub last_result: Option<CompilationResult>,
    pub auto_compile: bool,
    pub artifact_revision: u64,
}

#[derive(Debug)]
struct SessionState {
    snapshot: SessionSnapshot,
    latest_attempt: u64,
}

#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    changes: broadcast::Sender<SessionChange>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Session {
    /// Starts a session holding [`PLACEHOLDER_TEMPLATE`] with no file path.
    pub fn new(auto_compile: bool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            state: Mutex::new(SessionState {
                snapshot: SessionSnapshot {
                    content: PLACEHOLDER_TEMPLATE.to_string(),
                    file_path: None,
                    artifact_path: None,
                    compiling: false,
                    last_result: None,
                    auto_compile,
                    artifact_revision: 0,
                },
                latest_attempt: 0,
            }),
            changes,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // Every critical section is a plain field write, so a poisoned lock
        // still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn announce(&self, change: SessionChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    /// Receives every change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot.clone()
    }

    pub fn content(&self) -> String {
        self.state().snapshot.content.clone()
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.state().snapshot.content = content.into();
        self.announce(SessionChange::Content);
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.state().snapshot.file_path.clone()
    }

    pub fn set_file_path(&self, path: Option<PathBuf>) {
        self.state().snapshot.file_path = path;
        self.announce(SessionChange::FilePath);
    }

    /// Replaces the whole document, as when a file is opened.
    pub fn replace_document(&self, path: PathBuf, content: String) {
        {
            let mut state = self.state();
            state.snapshot.file_path = Some(path);
            state.snapshot.content = content;
        }
        self.announce(SessionChange::FilePath);
        self.announce(SessionChange::Content);
    }

    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.state().snapshot.artifact_path.clone()
    }

    pub fn set_artifact_path(&self, path: Option<PathBuf>) {
        self.state().snapshot.artifact_path = path;
        self.announce(SessionChange::ArtifactPath);
    }

    pub fn is_compiling(&self) -> bool {
        self.state().snapshot.compiling
    }

    pub fn set_compiling(&self, compiling: bool) {
        self.state().snapshot.compiling = compiling;
        self.announce(SessionChange::Compiling(compiling));
    }

    pub fn last_result(&self) -> Option<CompilationResult> {
        self.state().snapshot.last_result.clone()
    }

    pub fn set_last_result(&self, result: Option<CompilationResult>) {
        self.state().snapshot.last_result = result;
        self.announce(SessionChange::LastResult);
    }

    pub fn auto_compile(&self) -> bool {
        self.state().snapshot.auto_compile
    }

    pub fn set_auto_compile(&self, enabled: bool) {
        self.state().snapshot.auto_compile = enabled;
        self.announce(SessionChange::AutoCompile(enabled));
    }

    pub fn artifact_revision(&self) -> u64 {
        self.state().snapshot.artifact_revision
    }

    /// Auto-compile is on and there is a file to compile.
    pub fn auto_compile_active(&self) -> bool {
        let state = self.state();
        state.snapshot.auto_compile && state.snapshot.file_path.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        if state.snapshot.compiling {
            return SessionStatus::Compiling;
        }
        match &state.snapshot.last_result {
            Some(result) if result.success => SessionStatus::Succeeded,
            Some(_) => SessionStatus::Failed,
            None => SessionStatus::Ready,
        }
    }

    /// Starts a compile attempt: raises the compiling flag and captures the
    /// path and content the attempt must compile.
    pub fn begin_attempt(&self) -> (AttemptId, Option<PathBuf>, String) {
        let (id, path, content) = {
            let mut state = self.state();
            state.latest_attempt += 1;
            state.snapshot.compiling = true;
            (
                AttemptId(state.latest_attempt),
                state.snapshot.file_path.clone(),
                state.snapshot.content.clone(),
            )
        };
        self.announce(SessionChange::Compiling(true));
        (id, path, content)
    }

    /// Applies the outcome of `attempt`.
    ///
    /// Ignored when a newer attempt has started since. `None` means the
    /// attempt raised an error to its caller: the compiling flag drops but
    /// the previous result stays. A successful result also records its
    /// artifact and bumps the artifact revision.
    ///
    /// Returns whether the outcome was applied.
    pub fn finish_attempt(&self, attempt: AttemptId, result: Option<CompilationResult>) -> bool {
        let mut announced = Vec::with_capacity(4);
        {
            let mut state = self.state();
            if attempt.0 != state.latest_attempt {
                log::debug!(
                    "Discarding outcome of attempt {} (latest is {})",
                    attempt.0,
                    state.latest_attempt
                );
                return false;
            }

            state.snapshot.compiling = false;
            announced.push(SessionChange::Compiling(false));

            if let Some(result) = result {
                if result.success && result.artifact_path.is_some() {
                    state.snapshot.artifact_path = result.artifact_path.clone();
                    state.snapshot.artifact_revision += 1;
                    announced.push(SessionChange::ArtifactPath);
                    announced.push(SessionChange::ArtifactRevision(
                        state.snapshot.artifact_revision,
                    ));
                }
                state.snapshot.last_result = Some(result);
                announced.push(SessionChange::LastResult);
            }
        }
        for change in announced {
            self.announce(change);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(path: &str) -> CompilationResult {
        CompilationResult {
            success: true,
            artifact_path: Some(PathBuf::from(path)),
            raw_output: String::new(),
            log: String::new(),
        }
    }

    #[test]
    fn test_fresh_session() {
        let session = Session::default();
        let snap = session.snapshot();
        assert_eq!(snap.content, PLACEHOLDER_TEMPLATE);
        assert!(snap.file_path.is_none());
        assert_eq!(snap.artifact_revision, 0);
        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(!session.auto_compile_active());
    }

    #[test]
    fn test_changes_are_announced_in_order() {
        let session = Session::default();
        let mut rx = session.subscribe();

        session.set_content("a");
        session.set_file_path(Some(PathBuf::from("/tmp/a.tex")));
        session.set_auto_compile(false);

        assert_eq!(rx.try_recv().unwrap(), SessionChange::Content);
        assert_eq!(rx.try_recv().unwrap(), SessionChange::FilePath);
        assert_eq!(rx.try_recv().unwrap(), SessionChange::AutoCompile(false));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replace_document_swaps_both_fields() {
        let session = Session::default();
        session.replace_document(PathBuf::from("/tmp/b.tex"), "b".into());
        assert_eq!(session.content(), "b");
        assert_eq!(session.file_path(), Some(PathBuf::from("/tmp/b.tex")));
        assert!(session.auto_compile_active());
    }

    #[test]
    fn test_success_bumps_revision_failure_does_not() {
        let session = Session::default();

        let (a, _, _) = session.begin_attempt();
        assert!(session.is_compiling());
        assert!(session.finish_attempt(a, Some(success("/tmp/doc.pdf"))));
        assert_eq!(session.artifact_revision(), 1);
        assert_eq!(session.artifact_path(), Some(PathBuf::from("/tmp/doc.pdf")));
        assert_eq!(session.status(), SessionStatus::Succeeded);

        let (b, _, _) = session.begin_attempt();
        assert_eq!(session.status(), SessionStatus::Compiling);
        session.finish_attempt(b, Some(CompilationResult::synthetic_failure("boom")));
        assert_eq!(session.artifact_revision(), 1);
        assert_eq!(session.artifact_path(), Some(PathBuf::from("/tmp/doc.pdf")));
        assert_eq!(session.status(), SessionStatus::Failed);

        let (c, _, _) = session.begin_attempt();
        session.finish_attempt(c, Some(success("/tmp/doc.pdf")));
        assert_eq!(session.artifact_revision(), 2);
    }

    #[test]
    fn test_stale_attempt_is_discarded() {
        let session = Session::default();
        let (older, _, _) = session.begin_attempt();
        let (newer, _, _) = session.begin_attempt();
        assert!(older < newer);

        assert!(!session.finish_attempt(older, Some(success("/tmp/old.pdf"))));
        assert!(session.is_compiling());
        assert_eq!(session.artifact_revision(), 0);

        assert!(session.finish_attempt(newer, Some(CompilationResult::synthetic_failure("x"))));
        assert!(!session.is_compiling());
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn test_error_outcome_keeps_previous_result() {
        let session = Session::default();
        let (a, _, _) = session.begin_attempt();
        session.finish_attempt(a, Some(success("/tmp/doc.pdf")));

        let (b, _, _) = session.begin_attempt();
        session.finish_attempt(b, None);
        assert!(!session.is_compiling());
        assert_eq!(session.status(), SessionStatus::Succeeded);
    }

    #[test]
    fn test_begin_attempt_captures_content() {
        let session = Session::default();
        session.replace_document(PathBuf::from("/tmp/c.tex"), "before".into());
        let (_, path, content) = session.begin_attempt();
        session.set_content("after");
        assert_eq!(path, Some(PathBuf::from("/tmp/c.tex")));
        assert_eq!(content, "before");
    }
}
