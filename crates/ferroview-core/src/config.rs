//! Editor configuration.
//!
//! Stored as JSON (`ferroview.json`) next to the document. Every field is
//! optional in the file; missing fields fall back to [`EditorConfig::default`].

use ferroview_build::PdfLatexRunner;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "ferroview.json";

/// Quiescence required after the last edit before an auto-compile fires.
pub const DEFAULT_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Milliseconds of quiescence required before an auto-compile fires.
    pub delay_ms: u64,
    /// Engine executable, resolved on `PATH`.
    pub engine: String,
    /// Extra arguments passed to the engine before the entry file.
    pub extra_args: Vec<String>,
    /// Initial state of the auto-compile switch.
    pub auto_compile: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            engine: ferroview_build::runner::DEFAULT_ENGINE.to_string(),
            extra_args: Vec::new(),
            auto_compile: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EditorConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// The toolchain runner described by this config.
    pub fn runner(&self) -> PdfLatexRunner {
        PdfLatexRunner::with_engine(&self.engine).with_args(self.extra_args.clone())
    }

    /// Config file location for a document: `ferroview.json` in its directory.
    pub fn path_for_document(document: &Path) -> PathBuf {
        document
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_err)
    }
}
