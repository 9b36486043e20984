#![allow(dead_code)]

use async_trait::async_trait;
use ferroview_build::{CompilationResult, ToolchainError, ToolchainRunner};
use ferroview_core::Editor;
use ferroview_core::config::EditorConfig;
use ferroview_core::document::{DocumentStore, PersistError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOC: &str = "/mem/doc.tex";
pub const DELAY_MS: u64 = 2000;

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, String>>,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn get(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn persist(&self, path: &Path, content: &str) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Write {
                path: path.to_path_buf(),
                source: std::io::ErrorKind::PermissionDenied.into(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<String, PersistError> {
        self.get(path).ok_or_else(|| PersistError::Read {
            path: path.to_path_buf(),
            source: std::io::ErrorKind::NotFound.into(),
        })
    }
}

/// Toolchain stand-in. Records the content it was asked to compile and how
/// many runs overlapped.
pub struct MockRunner {
    store: Arc<MemoryStore>,
    compile_time: Duration,
    runs: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockRunner {
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolchainRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, source: &Path) -> Result<CompilationResult, ToolchainError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.runs
            .lock()
            .unwrap()
            .push(self.store.get(source).unwrap_or_default());

        tokio::time::sleep(self.compile_time).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CompilationResult {
            success: true,
            artifact_path: Some(source.with_extension("pdf")),
            raw_output: "Output written on doc.pdf".into(),
            log: String::new(),
        })
    }
}

pub struct Harness {
    pub editor: Arc<Editor>,
    pub store: Arc<MemoryStore>,
    pub runner: Arc<MockRunner>,
}

pub fn harness(compile_time_ms: u64) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let runner = Arc::new(MockRunner {
        store: store.clone(),
        compile_time: Duration::from_millis(compile_time_ms),
        runs: Mutex::new(Vec::new()),
        active: AtomicUsize::new(0),
        max_active: AtomicUsize::new(0),
    });
    let config = EditorConfig {
        delay_ms: DELAY_MS,
        ..Default::default()
    };
    let editor = Arc::new(Editor::with_parts(&config, store.clone(), runner.clone()));
    Harness {
        editor,
        store,
        runner,
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
