//! Optional background screen recorder/indexer
//!
//! If a `screenpipe` binary is installed it can record the screen in the
//! background and answer text searches over what it has seen. None of the
//! chat pipeline depends on it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::CaptureError;

/// Default install locations, checked in order after any configured path
pub const DEFAULT_LOCATIONS: [&str; 2] = [
    "/usr/local/bin/screenpipe",
    "/opt/homebrew/bin/screenpipe",
];

/// Arguments for a low-rate, video-only background recording
const RECORD_ARGS: [&str; 3] = ["--fps", "0.5", "--audio-disabled"];

/// A located recorder binary. The path is fixed once found; only the
/// background recording process is guarded.
pub struct Recorder {
    path: PathBuf,
    child: Mutex<Option<Child>>,
}

impl Recorder {
    /// Find the first existing binary among `candidates` and make sure it
    /// is executable.
    pub fn locate<I, P>(candidates: I) -> Option<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let path = candidates
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .find(|p| p.is_file())?;

        if let Err(e) = make_executable(&path) {
            tracing::warn!("Could not mark {} executable: {}", path.display(), e);
        }

        tracing::info!("Found recorder at {}", path.display());
        Some(Self {
            path,
            child: Mutex::new(None),
        })
    }

    /// Probe the configured location (if any) and then the defaults
    pub fn probe(configured: Option<&Path>) -> Option<Self> {
        let candidates = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(DEFAULT_LOCATIONS.iter().map(PathBuf::from));
        Self::locate(candidates)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Launch the recorder in the background. A no-op if already running.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let mut slot = self.child.lock().await;
        if alive(&mut slot) {
            return Ok(());
        }

        let child = Command::new(&self.path)
            .args(RECORD_ARGS)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!("Recorder {} started (pid {:?})", self.path().display(), child.id());
        *slot = Some(child);
        Ok(())
    }

    /// Stop the background recording, if one was started
    pub async fn stop(&self) -> Result<(), CaptureError> {
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            if matches!(child.try_wait(), Ok(None)) {
                child.kill().await?;
            }
            tracing::info!("Recorder stopped");
        }
        Ok(())
    }

    /// Query the recorder's index and return its raw stdout
    pub async fn search(&self, query: &str) -> Result<String, CaptureError> {
        let output = Command::new(&self.path)
            .args(["search", "--query", query, "--limit", "1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CaptureError::ExitStatus {
                program: self.path.display().to_string(),
                code: output.status.code(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn alive(child: &mut Option<Child>) -> bool {
    match child.as_mut() {
        Some(child) => matches!(child.try_wait(), Ok(None)),
        None => false,
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = perms.mode();
    if mode & 0o111 != 0o111 {
        perms.set_mode(mode | 0o111);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    async fn running(recorder: &Recorder) -> bool {
        alive(&mut *recorder.child.lock().await)
    }

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("screenpipe");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        path
    }

    #[test]
    fn test_locate_skips_missing_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");

        let recorder =
            Recorder::locate([dir.path().join("missing"), script.clone()]).expect("found");
        assert_eq!(recorder.path(), script.as_path());
    }

    #[test]
    fn test_locate_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Recorder::locate([dir.path().join("a"), dir.path().join("b")]).is_none());
    }

    #[test]
    fn test_locate_marks_executable() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");

        Recorder::locate([&script]).expect("found");
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn test_search_returns_stdout() {
        let recorder = Recorder::locate(["/bin/echo", "/usr/bin/echo"]).expect("echo");
        let output = recorder.search("invoice").await.unwrap();
        assert_eq!(output.trim(), "search --query invoice --limit 1");
    }

    #[tokio::test]
    async fn test_search_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 2");

        let recorder = Recorder::locate([&script]).expect("found");
        let err = recorder.search("anything").await.unwrap_err();
        assert!(matches!(err, CaptureError::ExitStatus { code: Some(2), .. }));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exec sleep 30");

        let recorder = Recorder::locate([&script]).expect("found");
        tokio_test::assert_ok!(recorder.start().await);
        assert!(running(&recorder).await);

        tokio_test::assert_ok!(recorder.stop().await);
        assert!(!running(&recorder).await);
    }
}
