//! Chat session
//!
//! The ChatSession drives one user turn end to end:
//! 1. Appends the user's text to the log
//! 2. Takes a screenshot (best-effort)
//! 3. Sends the text, plus the screenshot if there is one, for completion
//! 4. Appends exactly one assistant turn: the reply, or `Error: ...`
//!
//! Turns are serialized through a FIFO lock so a second message sent while
//! one is in flight waits its turn instead of interleaving with it. The
//! busy flag is only a hint for the UI. Shutdown waits for turns still in
//! flight so every user turn gets its reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::capture::{CaptureError, CaptureOutcome, CaptureService, Recorder};
use crate::config::PromptSettings;
use crate::conversation::{ConversationLog, Turn};
use crate::providers::CompletionBackend;

/// How many undelivered turn events a slow subscriber may lag behind
const EVENT_BUFFER: usize = 64;

/// Upper bound on how long shutdown waits for in-flight turns
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

struct SessionInner {
    log: ConversationLog,
    capture: CaptureService,
    completion: Arc<dyn CompletionBackend>,
    prompts: PromptSettings,
    recorder: Option<Recorder>,
    turn_lock: Mutex<()>,
    in_flight: AtomicUsize,
    idle: Notify,
    events: broadcast::Sender<Turn>,
}

/// One long-lived chat context per running application
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

/// Marks a turn as in flight until dropped
struct BusyGuard {
    inner: Arc<SessionInner>,
}

impl BusyGuard {
    fn new(inner: &Arc<SessionInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl ChatSession {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        capture: CaptureService,
        prompts: PromptSettings,
        recorder: Option<Recorder>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(SessionInner {
                log: ConversationLog::new(),
                capture,
                completion,
                prompts,
                recorder,
                turn_lock: Mutex::new(()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                events,
            }),
        }
    }

    /// Start a turn in the background. Blank input is ignored and returns
    /// `None`; otherwise the handle resolves to the assistant turn.
    pub fn submit(&self, text: &str) -> Option<JoinHandle<Turn>> {
        let text = normalize(text)?;
        let guard = BusyGuard::new(&self.inner);
        let session = self.clone();

        Some(tokio::spawn(async move {
            let turn = session.run_turn(text).await;
            drop(guard);
            turn
        }))
    }

    /// Run a turn to completion on the current task
    pub async fn send(&self, text: &str) -> Option<Turn> {
        let text = normalize(text)?;
        let _guard = BusyGuard::new(&self.inner);
        Some(self.run_turn(text).await)
    }

    async fn run_turn(&self, text: String) -> Turn {
        let _turn = self.inner.turn_lock.lock().await;

        self.append(Turn::user(text.clone())).await;

        let outcome = self.inner.capture.capture().await;
        if let CaptureOutcome::Failed(e) = &outcome {
            tracing::warn!("Sending without screenshot: {}", e);
        }
        let screenshot = outcome.into_path();

        let reply = match self
            .inner
            .completion
            .complete(&text, screenshot.as_deref())
            .await
        {
            Ok(content) => {
                tracing::debug!("Completion succeeded ({} chars)", content.len());
                Turn::assistant(content, screenshot)
            }
            Err(e) => {
                tracing::warn!("Completion failed: {}", e);
                Turn::assistant(format!("Error: {}", e), screenshot)
            }
        };

        self.append(reply).await
    }

    async fn append(&self, turn: Turn) -> Turn {
        let turn = self.inner.log.append(turn).await;
        // No subscribers is fine
        let _ = self.inner.events.send(turn.clone());
        turn
    }

    /// Snapshot of the conversation so far
    pub async fn turns(&self) -> Vec<Turn> {
        self.inner.log.snapshot().await
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Receive every turn appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Turn> {
        self.inner.events.subscribe()
    }

    pub fn prompts(&self) -> &PromptSettings {
        &self.inner.prompts
    }

    pub fn capture_available(&self) -> bool {
        self.inner.capture.is_available()
    }

    pub fn recorder_available(&self) -> bool {
        self.inner.recorder.is_some()
    }

    fn recorder(&self) -> Result<&Recorder, CaptureError> {
        self.inner
            .recorder
            .as_ref()
            .ok_or(CaptureError::NotInstalled("recorder"))
    }

    /// Launch the background recorder if one was found
    pub async fn start_recorder(&self) -> Result<(), CaptureError> {
        self.recorder()?.start().await
    }

    /// Search the recorder's index
    pub async fn search_recorder(&self, query: &str) -> Result<String, CaptureError> {
        self.recorder()?.search(query).await
    }

    /// Resolves once no turn is in flight
    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_busy() {
                return;
            }
            notified.await;
        }
    }

    /// Finish in-flight turns and release background resources. Call once
    /// at application exit, after new submissions have stopped.
    pub async fn shutdown(&self) {
        if self.is_busy() {
            tracing::info!("Waiting for in-flight turns");
            if tokio::time::timeout(DRAIN_TIMEOUT, self.wait_idle()).await.is_err() {
                tracing::warn!("Turns still in flight after {:?}; abandoning them", DRAIN_TIMEOUT);
            }
        }

        if let Some(recorder) = &self.inner.recorder {
            if let Err(e) = recorder.stop().await {
                tracing::warn!("Failed to stop recorder: {}", e);
            }
        }
        tracing::info!("Chat session closed");
    }
}

fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
