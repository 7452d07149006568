//! Output staging so a failed conversion never leaves a partial file behind.
//!
//! Engines write into a temporary file next to the destination and only
//! rename it into place once the backend reported success. Dropping the
//! staged path removes the temporary file.

use std::path::Path;
use tempfile::TempPath;

use super::error::EngineError;

/// Creates the parent directory of `output` if needed.
pub(crate) async fn ensure_parent_dir(output: &Path) -> Result<(), EngineError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|_| EngineError::OutputDirectoryFailed {
                path: parent.to_path_buf(),
            })?;
    }
    Ok(())
}

/// Reserves a temporary path in the destination directory.
///
/// The temporary file keeps the destination's extension, since several
/// backends pick the output container from it.
pub(crate) fn stage(output: &Path) -> Result<TempPath, EngineError> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = output
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let file = tempfile::Builder::new()
        .prefix(".multiconvert-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

/// Runs blocking `work` against a staged file on the blocking pool.
///
/// The staged file moves into the blocking task and comes back with the
/// result. An abandoned call can't stop the thread, but the file is still
/// removed once `work` returns.
pub(crate) async fn run_staged<T, F>(
    staged: TempPath,
    work: F,
) -> Result<(TempPath, T), EngineError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let value = work(&staged)?;
        Ok((staged, value))
    })
    .await
    .map_err(|e| EngineError::conversion_failed(format!("Blocking task failed: {}", e), None))?
}

/// Moves a staged file to its destination and returns the final size.
pub(crate) async fn commit(staged: TempPath, output: &Path) -> Result<u64, EngineError> {
    let size = tokio::fs::metadata(&staged).await?.len();
    if size == 0 {
        return Err(EngineError::conversion_failed("Output file is empty", None));
    }
    staged.persist(output).map_err(|e| EngineError::Io(e.error))?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_parent_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("a/b/c/out.pdf");
        ensure_parent_dir(&output).await.unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn test_stage_and_commit() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");

        let staged = stage(&output).unwrap();
        assert_eq!(staged.extension().unwrap(), "txt");
        tokio::fs::write(&staged, b"hello").await.unwrap();

        let size = commit(staged, &output).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");

        let staged = stage(&output).unwrap();
        let staged_path = staged.to_path_buf();
        assert!(staged_path.exists());
        drop(staged);

        assert!(!staged_path.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_run_staged_returns_path_for_commit() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");

        let (staged, written) = run_staged(stage(&output).unwrap(), |path| {
            std::fs::write(path, b"converted")?;
            Ok(9)
        })
        .await
        .unwrap();
        assert_eq!(written, 9);

        commit(staged, &output).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "converted");
    }

    #[tokio::test]
    async fn test_run_staged_error_removes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");
        let staged = stage(&output).unwrap();
        let staged_path = staged.to_path_buf();

        let result: Result<(TempPath, ()), _> = run_staged(staged, |path| {
            std::fs::write(path, b"half")?;
            Err(EngineError::conversion_failed("encoder gave up", None))
        })
        .await;

        assert!(result.is_err());
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_abandoned_work_removes_file_when_done() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.bmp");
        let staged = stage(&output).unwrap();
        let staged_path = staged.to_path_buf();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            run_staged(staged, move |path| {
                std::fs::write(path, b"partial pixels")?;
                let _ = release_rx.recv();
                Ok(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(staged_path.exists());

        // The blocking thread outlives the caller; once it returns the file goes
        release_tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while staged_path.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!staged_path.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_commit_rejects_empty_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");
        let staged = stage(&output).unwrap();

        let result = commit(staged, &output).await;
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
