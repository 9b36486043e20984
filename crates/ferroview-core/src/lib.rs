//! # FerroView Core
//!
//! Compile orchestration for the FerroView editor: when to compile, how to
//! keep compiles from overlapping, and where the results go.
//!
//! ## Modules
//!
//! - [`session`] - the shared record of the document and its last compile
//! - [`document`] - open/save flows over host-provided storage and dialogs
//! - [`pipeline`] - save-then-compile, one attempt at a time
//! - [`scheduler`] - debounced auto-compile and manual compile requests
//! - [`config`] - `ferroview.json` settings
//!
//! ## Data flow
//!
//! ```text
//! edit ─► Session ─► Scheduler (debounce) ─► Pipeline (save ─► run) ─► Session
//!                                                                        │
//!                                               viewer ◄── revision bump ┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use ferroview_core::{Editor, config::EditorConfig};
//! use std::path::PathBuf;
//!
//! # async fn demo() {
//! let editor = Editor::start(&EditorConfig::default());
//! editor
//!     .session()
//!     .replace_document(PathBuf::from("/tmp/doc.tex"), "\\documentclass{article}".into());
//!
//! // Either wait for the debounce timer, or:
//! match editor.compile_now().await {
//!     Ok(result) if result.success => println!("{:?}", result.artifact_path),
//!     Ok(result) => eprintln!("{}", result.raw_output),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```

pub mod config;
pub mod document;
pub mod pipeline;
pub mod scheduler;
pub mod session;

use config::EditorConfig;
use document::{DocumentStore, FsDocumentStore};
use ferroview_build::ToolchainRunner;
use pipeline::Pipeline;
use scheduler::{ManualOutcome, SchedulerHandle};
use session::Session;
use std::sync::Arc;

pub use ferroview_build::CompilationResult;

/// A session wired to its pipeline and a running scheduler.
pub struct Editor {
    session: Arc<Session>,
    pipeline: Arc<Pipeline>,
    scheduler: SchedulerHandle,
}

impl Editor {
    /// Starts an editor that saves to the local filesystem and compiles with
    /// the engine named in `config`. Must be called inside a tokio runtime.
    pub fn start(config: &EditorConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(FsDocumentStore),
            Arc::new(config.runner()),
        )
    }

    pub fn with_parts(
        config: &EditorConfig,
        store: Arc<dyn DocumentStore>,
        runner: Arc<dyn ToolchainRunner>,
    ) -> Self {
        let session = Arc::new(Session::new(config.auto_compile));
        let pipeline = Arc::new(Pipeline::new(session.clone(), store, runner));
        let scheduler = scheduler::spawn(pipeline.clone(), config.delay());
        log::info!(
            "Editor started (auto-compile: {}, delay: {}ms)",
            config.auto_compile,
            config.delay_ms
        );
        Self {
            session,
            pipeline,
            scheduler,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Manual compile through the scheduler's overlap guard.
    pub async fn compile_now(&self) -> ManualOutcome {
        self.scheduler.compile_now().await
    }
}
