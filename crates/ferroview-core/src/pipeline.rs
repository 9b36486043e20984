//! Save-then-compile.
//!
//! One [`Pipeline::compile`] call persists the session's content and runs the
//! toolchain on it. The pipeline owns a single-permit lock around that step,
//! so two toolchain processes never write the same artifact at once, no
//! matter who calls it.

use crate::document::{DocumentStore, PersistError};
use crate::session::{AttemptId, Session};
use ferroview_build::{CompilationResult, ToolchainError, ToolchainRunner};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error("the compile scheduler has stopped")]
    SchedulerStopped,
}

/// Who asked for a compile. Decides where errors end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The user asked; errors go back to the caller.
    Manual,
    /// The debounce timer fired; errors are stored in the session as a
    /// failed result.
    Auto,
}

/// Path and content captured for one compile attempt.
#[derive(Debug)]
pub struct Snapshot {
    attempt: AttemptId,
    path: Option<PathBuf>,
    content: String,
}

pub struct Pipeline {
    session: Arc<Session>,
    store: Arc<dyn DocumentStore>,
    runner: Arc<dyn ToolchainRunner>,
    in_flight: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        session: Arc<Session>,
        store: Arc<dyn DocumentStore>,
        runner: Arc<dyn ToolchainRunner>,
    ) -> Self {
        Self {
            session,
            store,
            runner,
            in_flight: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Captures the path and content for a new attempt and marks the session
    /// as compiling. Pass the result to [`Pipeline::compile_snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        let (attempt, path, content) = self.session.begin_attempt();
        Snapshot {
            attempt,
            path,
            content,
        }
    }

    /// Persists the current content and compiles it.
    ///
    /// The content compiled is the content captured when this call obtains
    /// the compile permit; later edits do not leak into this attempt.
    pub async fn compile(&self, trigger: Trigger) -> Result<CompilationResult, CompileError> {
        let _permit = self.in_flight.lock().await;
        let snapshot = self.snapshot();
        self.compile_locked(trigger, snapshot).await
    }

    /// Compiles content captured earlier with [`Pipeline::snapshot`].
    pub async fn compile_snapshot(
        &self,
        trigger: Trigger,
        snapshot: Snapshot,
    ) -> Result<CompilationResult, CompileError> {
        let _permit = self.in_flight.lock().await;
        self.compile_locked(trigger, snapshot).await
    }

    async fn compile_locked(
        &self,
        trigger: Trigger,
        snapshot: Snapshot,
    ) -> Result<CompilationResult, CompileError> {
        let Snapshot {
            attempt,
            path,
            content,
        } = snapshot;
        let outcome = self.save_and_run(path, &content).await;

        match &outcome {
            Ok(result) => {
                self.session.finish_attempt(attempt, Some(result.clone()));
            }
            Err(e) => {
                log::error!("Compile ({:?}) failed: {}", trigger, e);
                let recorded = match trigger {
                    Trigger::Auto => Some(CompilationResult::synthetic_failure(e)),
                    Trigger::Manual => None,
                };
                self.session.finish_attempt(attempt, recorded);
            }
        }
        outcome
    }

    async fn save_and_run(
        &self,
        path: Option<PathBuf>,
        content: &str,
    ) -> Result<CompilationResult, CompileError> {
        let path = path.ok_or(PersistError::NoPath)?;
        self.store.persist(&path, content).await?;
        log::debug!("Saved {}, invoking {}", path.display(), self.runner.name());
        Ok(self.runner.run(&path).await?)
    }
}
