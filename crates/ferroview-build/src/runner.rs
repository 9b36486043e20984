use crate::artifacts::{artifact_path_for, read_log};
use crate::{CompilationResult, ToolchainError, ToolchainRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Default engine when none is configured.
pub const DEFAULT_ENGINE: &str = "pdflatex";

/// Runs a pdfTeX-compatible engine (`pdflatex`, `xelatex`, `lualatex`) in
/// batch mode, writing outputs next to the source.
#[derive(Debug, Clone)]
pub struct PdfLatexRunner {
    program: String,
    extra_args: Vec<String>,
}

impl Default for PdfLatexRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfLatexRunner {
    pub fn new() -> Self {
        Self::with_engine(DEFAULT_ENGINE)
    }

    pub fn with_engine(program: &str) -> Self {
        Self {
            program: program.to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments placed before the batch-mode flags and the entry file.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn resolve_program(&self) -> Result<PathBuf, ToolchainError> {
        which::which(&self.program).map_err(|e| ToolchainError::Unavailable {
            program: self.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
    }
}

#[async_trait]
impl ToolchainRunner for PdfLatexRunner {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, source: &Path) -> Result<CompilationResult, ToolchainError> {
        let program = self.resolve_program()?;

        // The engine runs inside the source's directory, so a relative
        // output directory would be resolved a second time from there.
        let absolute = std::path::absolute(source).map_err(|e| ToolchainError::Source {
            path: source.to_path_buf(),
            source: e,
        })?;
        let source = absolute.as_path();
        let work_dir = match source.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = source.file_name().unwrap_or(source.as_os_str());

        // <engine> [extra..] -interaction=nonstopmode -output-directory=<dir> <file>
        let mut child = Command::new(&program)
            .args(&self.extra_args)
            .arg("-interaction=nonstopmode")
            .arg(format!("-output-directory={}", work_dir.to_string_lossy()))
            .arg(file_name)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolchainError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        log::debug!("Spawned {} for {}", self.program, source.display());

        let mut combined = Vec::new();
        if let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) {
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            let (mut out_open, mut err_open) = (true, true);

            // Chunks are appended in arrival order; each stream stays ordered.
            while out_open || err_open {
                tokio::select! {
                    read = stdout.read(&mut out_buf), if out_open => match read {
                        Ok(0) => out_open = false,
                        Err(e) => {
                            log::warn!("Reading stdout of {} failed: {}", self.program, e);
                            out_open = false;
                        }
                        Ok(n) => combined.extend_from_slice(&out_buf[..n]),
                    },
                    read = stderr.read(&mut err_buf), if err_open => match read {
                        Ok(0) => err_open = false,
                        Err(e) => {
                            log::warn!("Reading stderr of {} failed: {}", self.program, e);
                            err_open = false;
                        }
                        Ok(n) => combined.extend_from_slice(&err_buf[..n]),
                    },
                }
            }
        }

        let status = child.wait().await.map_err(|source| ToolchainError::Wait {
            program: self.program.clone(),
            source,
        })?;

        let artifact = artifact_path_for(source);
        let log = read_log(source).await;
        let raw_output = String::from_utf8_lossy(&combined).into_owned();

        let result = CompilationResult::assemble(status.success(), &artifact, raw_output, log);
        if status.success() && !result.success {
            log::warn!(
                "{} exited cleanly but produced no {}",
                self.program,
                artifact.display()
            );
        }
        log::info!(
            "{} finished for {} (exit: {:?}, success: {})",
            self.program,
            source.display(),
            status.code(),
            result.success
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_defaults() {
        let runner = PdfLatexRunner::new();
        assert_eq!(runner.name(), "pdflatex");
        assert!(runner.extra_args.is_empty());

        let runner = PdfLatexRunner::with_engine("xelatex").with_args(vec!["-shell-escape".into()]);
        assert_eq!(runner.name(), "xelatex");
        assert_eq!(runner.extra_args, vec!["-shell-escape".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_engine_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.tex");
        std::fs::write(&source, "\\documentclass{article}").unwrap();

        let runner = PdfLatexRunner::with_engine("ferroview-no-such-engine");
        let err = runner.run(&source).await.unwrap_err();
        assert!(matches!(err, ToolchainError::Unavailable { .. }));
        assert!(!dir.path().join("doc.pdf").exists());
    }
}
