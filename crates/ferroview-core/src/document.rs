//! Reading and writing the source document.
//!
//! The actual I/O and the native file dialogs belong to the host; they are
//! reached through [`DocumentStore`] and [`FilePicker`] so the flows here can
//! be driven by in-memory fakes in tests.

use crate::session::Session;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("the document has no file path; save it first")]
    NoPath,
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persists document content.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn persist(&self, path: &Path, content: &str) -> Result<(), PersistError>;

    async fn load(&self, path: &Path) -> Result<String, PersistError>;
}

/// Native open/save dialogs. `None` means the user cancelled.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_open(&self) -> Option<PathBuf>;

    async fn pick_save(&self) -> Option<PathBuf>;
}

/// [`DocumentStore`] on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDocumentStore;

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn persist(&self, path: &Path, content: &str) -> Result<(), PersistError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|source| PersistError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn load(&self, path: &Path) -> Result<String, PersistError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PersistError::Read {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Asks the user for a file and loads it into the session, replacing the
/// current document. Returns `false` if the dialog was cancelled.
pub async fn open_document(
    session: &Session,
    store: &dyn DocumentStore,
    picker: &dyn FilePicker,
) -> Result<bool, PersistError> {
    let Some(path) = picker.pick_open().await else {
        return Ok(false);
    };
    let content = store.load(&path).await?;
    log::info!("Opened {}", path.display());
    session.replace_document(path, content);
    Ok(true)
}

/// Prompts for a path and writes `content` there.
pub async fn persist_as(
    store: &dyn DocumentStore,
    picker: &dyn FilePicker,
    content: &str,
) -> Result<Option<PathBuf>, PersistError> {
    let Some(path) = picker.pick_save().await else {
        return Ok(None);
    };
    store.persist(&path, content).await?;
    Ok(Some(path))
}

/// Saves the session's document, prompting for a path if it has none yet.
/// A newly chosen path is adopted by the session.
pub async fn save(
    session: &Session,
    store: &dyn DocumentStore,
    picker: &dyn FilePicker,
) -> Result<Option<PathBuf>, PersistError> {
    let snapshot = session.snapshot();
    if let Some(path) = snapshot.file_path {
        store.persist(&path, &snapshot.content).await?;
        return Ok(Some(path));
    }

    let chosen = persist_as(store, picker, &snapshot.content).await?;
    if let Some(path) = &chosen {
        session.set_file_path(Some(path.clone()));
    }
    Ok(chosen)
}
