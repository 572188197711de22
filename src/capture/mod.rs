//! Screen capture
//!
//! Capturing is best-effort. The capability is probed once at startup and
//! every call reports one of three outcomes: the screenshot path, a failure
//! for this call, or "no capture capability on this machine". Callers that
//! only care about the image collapse that to `Option<PathBuf>`.

pub mod recorder;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

pub use recorder::Recorder;

/// Flags for a silent, PNG, full-screen `screencapture` run
const SCREENCAPTURE_ARGS: [&str; 3] = ["-x", "-t", "png"];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with status {code:?}")]
    ExitStatus { program: String, code: Option<i32> },

    #[error("No {0} is installed")]
    NotInstalled(&'static str),
}

/// Something that can write a still image of the screen to a path
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> String;

    async fn capture_to(&self, dest: &Path) -> Result<(), CaptureError>;
}

/// An external program invoked as `<program> <args..> <dest>`
#[derive(Debug, Clone)]
pub struct CaptureCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl CaptureCommand {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The macOS `screencapture` utility at `program`
    pub fn screencapture(program: impl Into<PathBuf>) -> Self {
        Self::new(program, SCREENCAPTURE_ARGS)
    }

    /// Whether the program can be found. Bare names are left to `PATH`
    /// resolution at spawn time.
    pub fn is_available(&self) -> bool {
        if self.program.components().count() > 1 {
            self.program.is_file()
        } else {
            true
        }
    }
}

#[async_trait]
impl CaptureBackend for CaptureCommand {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    async fn capture_to(&self, dest: &Path) -> Result<(), CaptureError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(CaptureError::ExitStatus {
                program: self.name(),
                code: status.code(),
            })
        }
    }
}

/// Result of one capture attempt
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(PathBuf),
    Failed(CaptureError),
    /// No capture capability was found at startup
    Unavailable,
}

impl CaptureOutcome {
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            CaptureOutcome::Captured(path) => Some(path),
            CaptureOutcome::Failed(_) | CaptureOutcome::Unavailable => None,
        }
    }
}

/// Capture capability plus the scratch directory screenshots go to
pub struct CaptureService {
    backend: Option<Arc<dyn CaptureBackend>>,
    scratch_dir: PathBuf,
}

impl CaptureService {
    /// Check once whether `command` is usable and keep it if so
    pub fn probe(command: CaptureCommand, scratch_dir: impl Into<PathBuf>) -> Self {
        let scratch_dir = scratch_dir.into();
        if command.is_available() {
            tracing::info!("Screen capture via {}", command.name());
            Self::with_backend(Arc::new(command), scratch_dir)
        } else {
            tracing::warn!(
                "Screen capture program {} not found; messages will be sent without screenshots",
                command.name()
            );
            Self::unavailable(scratch_dir)
        }
    }

    pub fn with_backend(backend: Arc<dyn CaptureBackend>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Some(backend),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn unavailable(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: None,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// A fresh, timestamped file name in the scratch directory
    fn next_path(&self) -> PathBuf {
        let suffix = Uuid::new_v4().simple().to_string();
        self.scratch_dir.join(format!(
            "screenshot_{}_{}.png",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    /// Take a screenshot. Never fails: problems are reported in the outcome.
    pub async fn capture(&self) -> CaptureOutcome {
        let Some(backend) = &self.backend else {
            return CaptureOutcome::Unavailable;
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.scratch_dir).await {
            return CaptureOutcome::Failed(e.into());
        }

        let path = self.next_path();
        match backend.capture_to(&path).await {
            Ok(()) => {
                tracing::debug!("Screenshot saved to {}", path.display());
                CaptureOutcome::Captured(path)
            }
            Err(e) => CaptureOutcome::Failed(e),
        }
    }
}
