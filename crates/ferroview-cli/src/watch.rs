//! `ferroview watch`: feeds on-disk edits of one document into a session and
//! lets the scheduler decide when to compile.

use anyhow::{Context, Result};
use ferroview_core::config::EditorConfig;
use ferroview_core::document::{DocumentStore, FsDocumentStore};
use ferroview_core::session::{SessionChange, SessionStatus};
use ferroview_core::Editor;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::{broadcast, mpsc};

pub async fn run(config: EditorConfig, path: &Path) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    let dir = path
        .parent()
        .context("Document has no parent directory")?
        .to_path_buf();

    let editor = Editor::start(&config);
    let session = editor.session().clone();
    session.replace_document(path.clone(), FsDocumentStore.load(&path).await?);

    // notify calls back on its own thread.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })?;
    // Watch the directory: editors often replace the file instead of writing it.
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let mut changes = session.subscribe();
    log::info!(
        "Watching {} (auto-compile after {}ms of quiet)",
        path.display(),
        config.delay_ms
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(Ok(event)) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    if !event.paths.iter().any(|p| p == &path) {
                        continue;
                    }
                    match FsDocumentStore.load(&path).await {
                        // The pipeline writes the file too; only real edits count.
                        Ok(content) if content != session.content() => session.set_content(content),
                        Ok(_) => {}
                        Err(e) => log::warn!("{}", e),
                    }
                }
                Some(Err(e)) => log::error!("watch error: {:?}", e),
                None => break,
            },
            change = changes.recv() => match change {
                Ok(SessionChange::LastResult) => report(&editor),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                log::info!("Stopping");
                break;
            }
        }
    }
    Ok(())
}

fn report(editor: &Editor) {
    let session = editor.session();
    match (session.status(), session.last_result()) {
        (SessionStatus::Succeeded, Some(result)) => {
            if let Some(artifact) = result.artifact_path {
                log::info!(
                    "Compiled successfully: {} (revision {})",
                    artifact.display(),
                    session.artifact_revision()
                );
            }
        }
        (SessionStatus::Failed, Some(result)) => {
            let digest = ferroview_log::digest(&result.log);
            match digest.first_error() {
                Some(err) => log::error!(
                    "Compilation failed: {}{}",
                    err.message,
                    err.line.map(|l| format!(" (line {})", l)).unwrap_or_default()
                ),
                None => log::error!("Compilation failed:\n{}", result.raw_output),
            }
        }
        _ => {}
    }
}
