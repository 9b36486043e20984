use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of the rendered artifact.
pub const ARTIFACT_EXTENSION: &str = "pdf";
/// Extension of the toolchain's log file.
pub const LOG_EXTENSION: &str = "log";

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Nothing to show yet; viewers should treat this as recoverable.
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The artifact the toolchain writes for `source`: same directory and stem,
/// extension swapped.
pub fn artifact_path_for(source: &Path) -> PathBuf {
    source.with_extension(ARTIFACT_EXTENSION)
}

pub fn log_path_for(source: &Path) -> PathBuf {
    source.with_extension(LOG_EXTENSION)
}

/// Reads the raw bytes of an artifact.
pub async fn read_artifact(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ArtifactError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads an artifact and encodes it for embedding in a viewer.
pub async fn read_artifact_base64(path: &Path) -> Result<String, ArtifactError> {
    let bytes = read_artifact(path).await?;
    Ok(BASE64_ENGINE.encode(bytes))
}

/// Reads the log file next to `source`. A missing log is not an error.
pub(crate) async fn read_log(source: &Path) -> String {
    let log_path = log_path_for(source);
    match tokio::fs::read(&log_path).await {
        // TeX logs are not guaranteed to be UTF-8 (8-bit input encodings).
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not read log {}: {}", log_path.display(), e);
            }
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_swap_extension() {
        let source = PathBuf::from("/work/thesis/main.tex");
        assert_eq!(artifact_path_for(&source), PathBuf::from("/work/thesis/main.pdf"));
        assert_eq!(log_path_for(&source), PathBuf::from("/work/thesis/main.log"));
    }

    #[test]
    fn test_paths_only_touch_final_extension() {
        // A `.tex` inside a directory name must survive.
        let source = PathBuf::from("/work/notes.tex.d/chapter.tex");
        assert_eq!(
            artifact_path_for(&source),
            PathBuf::from("/work/notes.tex.d/chapter.pdf")
        );
    }

    #[tokio::test]
    async fn test_read_artifact_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact(&dir.path().join("none.pdf")).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_artifact_base64() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        assert_eq!(read_artifact(&pdf).await.unwrap(), b"%PDF".to_vec());
        assert_eq!(read_artifact_base64(&pdf).await.unwrap(), "JVBERg==");
    }

    #[tokio::test]
    async fn test_read_log_absent_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.tex");
        assert_eq!(read_log(&source).await, "");

        std::fs::write(dir.path().join("doc.log"), "This is pdfTeX").unwrap();
        assert_eq!(read_log(&source).await, "This is pdfTeX");
    }
}
