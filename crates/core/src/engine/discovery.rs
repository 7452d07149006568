//! Locating external executables.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Finds an executable.
///
/// An explicit path wins when it points to a file or resolves on `PATH`.
/// Otherwise each candidate is tried in order, first as a literal path and
/// then as a command name looked up on `PATH`.
pub fn locate_executable(explicit: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    explicit
        .into_iter()
        .chain(candidates.iter().map(PathBuf::as_path))
        .find_map(resolve)
}

fn resolve(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    match which::which(candidate) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("Executable {:?} not found: {}", candidate, e);
            None
        }
    }
}

/// Runs `<executable> --version` and returns the first non-empty line.
pub async fn probe_version(executable: &Path, arg: &str) -> Option<String> {
    let output = tokio::time::timeout(
        VERSION_PROBE_TIMEOUT,
        Command::new(executable)
            .arg(arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Default LibreOffice locations for the current platform, then `PATH` names.
pub fn libreoffice_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(windows) {
        paths.push(PathBuf::from(r"C:\Program Files\LibreOffice\program\soffice.exe"));
        paths.push(PathBuf::from(
            r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
        ));
        paths.push(PathBuf::from(
            r"LibreOfficePortable\App\libreoffice\program\soffice.exe",
        ));
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        ));
    }
    paths.push(PathBuf::from("soffice"));
    paths.push(PathBuf::from("libreoffice"));
    paths
}

/// Default OnlyOffice DocumentBuilder locations, then `PATH` names.
pub fn docbuilder_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(windows) {
        paths.push(PathBuf::from(
            r"C:\Program Files\ONLYOFFICE\DocumentBuilder\docbuilder.exe",
        ));
        paths.push(PathBuf::from(
            r"C:\Program Files (x86)\ONLYOFFICE\DocumentBuilder\docbuilder.exe",
        ));
    } else {
        paths.push(PathBuf::from("/opt/onlyoffice/documentbuilder/docbuilder"));
    }
    paths.push(PathBuf::from("docbuilder"));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_file_wins() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("my-tool");
        std::fs::write(&tool, b"").unwrap();

        let found = locate_executable(Some(&tool), &[PathBuf::from("definitely-not-a-tool")]);
        assert_eq!(found, Some(tool));
    }

    #[test]
    fn test_falls_through_to_candidates() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("second");
        std::fs::write(&tool, b"").unwrap();

        let found = locate_executable(
            Some(Path::new("/nonexistent/first")),
            &[PathBuf::from("/nonexistent/other"), tool.clone()],
        );
        assert_eq!(found, Some(tool));
    }

    #[test]
    fn test_nothing_found() {
        let found = locate_executable(
            None,
            &[PathBuf::from("multiconvert-no-such-binary-1b2c3d")],
        );
        assert!(found.is_none());
    }

    #[test]
    fn test_candidates_end_with_path_names() {
        let lo = libreoffice_candidates();
        assert_eq!(lo.last().unwrap(), &PathBuf::from("libreoffice"));
        let db = docbuilder_candidates();
        assert_eq!(db.last().unwrap(), &PathBuf::from("docbuilder"));
    }
}
