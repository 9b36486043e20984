//! # FerroView Build
//!
//! Runs an external TeX toolchain on a single entry document and turns the
//! process outcome into a [`CompilationResult`].
//!
//! ## Overview
//!
//! A compile is always a full invocation of the engine on one `.tex` file.
//! The engine writes its artifact (`<stem>.pdf`) and log (`<stem>.log`) next
//! to the source; the runner only reads them back.
//!
//! - [`ToolchainRunner`] - the seam between orchestration and the process
//! - [`runner::PdfLatexRunner`] - the default runner, spawning `pdflatex`
//! - [`artifacts`] - artifact/log path conventions and artifact reads
//!
//! ## Examples
//!
//! ```no_run
//! use ferroview_build::{ToolchainRunner, runner::PdfLatexRunner};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), ferroview_build::ToolchainError> {
//! let runner = PdfLatexRunner::new();
//! let result = runner.run(Path::new("/tmp/doc.tex")).await?;
//! if result.success {
//!     println!("artifact at {:?}", result.artifact_path);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod artifacts;
pub mod runner;

pub use artifacts::{
    ArtifactError, artifact_path_for, log_path_for, read_artifact, read_artifact_base64,
};
pub use runner::PdfLatexRunner;

/// The outcome of one toolchain invocation.
///
/// A result is assembled once per compile attempt and never mutated. When
/// `success` is true, `artifact_path` is set and the file existed at the
/// moment the result was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub success: bool,
    pub artifact_path: Option<PathBuf>,
    /// Combined stdout and stderr of the toolchain process.
    pub raw_output: String,
    /// Contents of the toolchain's log file, empty if it was not written.
    pub log: String,
}

impl CompilationResult {
    /// Assembles a result from the observed process outcome.
    ///
    /// Exit status zero alone is not enough: the artifact must also be on
    /// disk, otherwise the toolchain failed silently.
    pub fn assemble(
        exit_ok: bool,
        artifact: &Path,
        raw_output: String,
        log: String,
    ) -> Self {
        let artifact_exists = artifact.is_file();
        Self {
            success: exit_ok && artifact_exists,
            artifact_path: artifact_exists.then(|| artifact.to_path_buf()),
            raw_output,
            log,
        }
    }

    /// A failed result carrying an error description instead of toolchain
    /// output. Used where the caller needs a uniform shape to store.
    pub fn synthetic_failure(message: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            artifact_path: None,
            raw_output: format!("Error: {}", message),
            log: String::new(),
        }
    }
}

/// Errors raised when the toolchain could not be run at all.
///
/// A compile that runs and reports errors is not a `ToolchainError`; it is a
/// [`CompilationResult`] with `success == false`.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("toolchain `{program}` is unavailable: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot resolve source {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs the external compiler for one persisted entry document.
#[async_trait]
pub trait ToolchainRunner: Send + Sync {
    /// Uniquely identifies the engine (e.g. "pdflatex").
    fn name(&self) -> &str;

    /// Compiles `source`, which must already exist on disk.
    async fn run(&self, source: &Path) -> Result<CompilationResult, ToolchainError>;
}
