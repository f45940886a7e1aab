//! Generation session state machine.
//!
//! One `GenerationSession` tracks one live run at a time. Each `start` bumps
//! a request token; every write to the shared state checks the token under
//! the state lock, so output from a superseded or canceled run is discarded
//! even when the abort signal loses the race.

use async_trait::async_trait;
use futures_util::future::{AbortHandle, Abortable};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::events::{advance_stage, Lifecycle, Message, MessageKind, Stage, StreamEvent};
use super::frames::{FrameDecoder, DONE_SENTINEL};

/// Receives a run's last state when a newer run or a reset replaces it.
type Handoff = Arc<Mutex<Option<Session>>>;

/// Raw byte chunks of a generation response.
pub type ByteStream = BoxStream<'static, anyhow::Result<Vec<u8>>>;

/// Opens a generation run and yields its event stream.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    async fn open(&self, prompt: &str) -> anyhow::Result<ByteStream>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("Nothing to retry: no prompt has been submitted yet")]
    NothingToRetry,
}

/// Snapshot of a generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub lifecycle: Lifecycle,
    pub stage: Stage,
    pub sandbox_id: Option<String>,
    pub preview_url: Option<String>,
    pub messages: Vec<Message>,
    pub last_progress: Option<String>,
    pub error: Option<String>,
    pub parse_warnings: u64,
}

/// What the event loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameOutcome {
    Continue,
    Done,
    Stop,
}

impl Session {
    fn requesting() -> Self {
        Self {
            lifecycle: Lifecycle::Requesting,
            ..Self::default()
        }
    }

    fn push(&mut self, kind: MessageKind) {
        self.messages.push(Message::new(kind));
    }

    fn fail(&mut self, message: String) {
        self.push(MessageKind::Error {
            message: message.clone(),
        });
        self.error = Some(message);
        self.lifecycle = Lifecycle::Failed;
    }

    fn apply_event(&mut self, event: StreamEvent) -> FrameOutcome {
        match event {
            StreamEvent::Error { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Generation failed".to_string());
                self.fail(message);
                FrameOutcome::Stop
            }
            StreamEvent::Complete {
                preview_url,
                sandbox_id,
            } => {
                if preview_url.is_some() {
                    self.preview_url = preview_url.clone();
                }
                if sandbox_id.is_some() {
                    self.sandbox_id = sandbox_id.clone();
                }
                self.lifecycle = Lifecycle::ProvisioningPreview;
                self.stage = self.stage.max(Stage::StartingPreview);
                self.push(MessageKind::Complete {
                    preview_url,
                    sandbox_id,
                });
                FrameOutcome::Continue
            }
            StreamEvent::Progress {
                message,
                sandbox_id,
            } => {
                if sandbox_id.is_some() {
                    self.sandbox_id = sandbox_id;
                }
                if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
                    self.stage = advance_stage(self.stage, &message);
                    self.last_progress = Some(message.clone());
                    self.push(MessageKind::Progress { message });
                }
                FrameOutcome::Continue
            }
            StreamEvent::AssistantText { text } => {
                self.push(MessageKind::AssistantText { text });
                FrameOutcome::Continue
            }
            StreamEvent::ToolUse { name, input } => {
                self.push(MessageKind::ToolUse { name, input });
                FrameOutcome::Continue
            }
        }
    }

    fn finish(&mut self, saw_done: bool) {
        if matches!(self.lifecycle, Lifecycle::Failed | Lifecycle::Canceled) {
            return;
        }
        if self.preview_url.is_some() {
            self.lifecycle = Lifecycle::Ready;
            self.stage = Stage::Ready;
        } else if saw_done {
            self.fail("Generation finished but no preview URL was returned".to_string());
        } else {
            self.fail("Stream ended before generation completed".to_string());
        }
    }
}

/// Drives generation runs and owns the live `Session`.
pub struct GenerationSession {
    transport: Arc<dyn GenerationTransport>,
    state: RwLock<Session>,
    request_token: AtomicU64,
    inflight: Mutex<Option<AbortHandle>>,
    last_prompt: Mutex<Option<String>>,
    owner: Mutex<Option<Handoff>>,
}

impl GenerationSession {
    pub fn new(transport: Arc<dyn GenerationTransport>) -> Self {
        Self {
            transport,
            state: RwLock::new(Session::default()),
            request_token: AtomicU64::new(0),
            inflight: Mutex::new(None),
            last_prompt: Mutex::new(None),
            owner: Mutex::new(None),
        }
    }

    /// Current state of the session.
    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    /// Start a new run, superseding any in-flight one, and drive it until the
    /// stream ends, fails, or the run is canceled.
    ///
    /// Returns the last state this run owned, even if a newer run or a reset
    /// has replaced it since.
    pub async fn start(&self, prompt: &str) -> Result<Session, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }

        let (handle, registration) = AbortHandle::new_pair();
        let handoff = Handoff::default();
        let token = {
            let mut inflight = self.inflight.lock().await;
            if let Some(previous) = inflight.replace(handle) {
                debug!("Aborting in-flight generation run");
                previous.abort();
            }
            *self.last_prompt.lock().await = Some(prompt.to_string());

            let mut state = self.state.write().await;
            let token = self.request_token.fetch_add(1, Ordering::SeqCst) + 1;
            let outgoing = std::mem::replace(&mut *state, Session::requesting());
            self.hand_off(outgoing, Some(handoff.clone())).await;
            token
        };

        info!("Starting generation run {}", token);
        let run = Abortable::new(self.drive(token, prompt.to_string()), registration);
        if run.await.is_err() {
            debug!("Generation run {} aborted", token);
        }

        let state = self.state.read().await;
        let replaced = handoff.lock().await.take();
        match replaced {
            Some(last) => {
                debug!("Generation run {} was replaced", token);
                Ok(last)
            }
            None => Ok(state.clone()),
        }
    }

    /// Replay the last submitted prompt.
    pub async fn retry(&self) -> Result<Session, SessionError> {
        let prompt = self
            .last_prompt
            .lock()
            .await
            .clone()
            .ok_or(SessionError::NothingToRetry)?;
        self.start(&prompt).await
    }

    /// Abort the in-flight run and mark it canceled. Messages are preserved
    /// and the stage stays where it was.
    pub async fn cancel(&self) {
        if let Some(handle) = self.inflight.lock().await.take() {
            handle.abort();
        }

        let mut state = self.state.write().await;
        self.request_token.fetch_add(1, Ordering::SeqCst);
        if state.lifecycle != Lifecycle::Idle && !state.lifecycle.is_terminal() {
            info!("Generation canceled at stage {:?}", state.stage);
            state.lifecycle = Lifecycle::Canceled;
        }
    }

    /// Drop the current run entirely and return to `Idle`.
    pub async fn reset(&self) {
        if let Some(handle) = self.inflight.lock().await.take() {
            handle.abort();
        }
        let mut state = self.state.write().await;
        self.request_token.fetch_add(1, Ordering::SeqCst);
        let outgoing = std::mem::take(&mut *state);
        self.hand_off(outgoing, None).await;
    }

    /// Give the state being replaced to the run that owned it. Called with
    /// the state write lock held.
    async fn hand_off(&self, outgoing: Session, next: Option<Handoff>) {
        let previous = std::mem::replace(&mut *self.owner.lock().await, next);
        if let Some(previous) = previous {
            *previous.lock().await = Some(outgoing);
        }
    }

    /// Append a note to the message log, e.g. the outcome of an edit apply.
    pub async fn push_note(&self, text: impl Into<String>) {
        self.state
            .write()
            .await
            .push(MessageKind::AssistantText { text: text.into() });
    }

    fn is_current(&self, token: u64) -> bool {
        self.request_token.load(Ordering::SeqCst) == token
    }

    /// Apply `f` to the state only if `token` still owns the session.
    async fn update<R>(&self, token: u64, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut state = self.state.write().await;
        if !self.is_current(token) {
            debug!("Discarding write from superseded run {}", token);
            return None;
        }
        Some(f(&mut state))
    }

    async fn drive(&self, token: u64, prompt: String) {
        let mut stream = match self.transport.open(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to open generation stream: {:#}", e);
                self.update(token, |s| s.fail(format!("Could not start generation: {}", e)))
                    .await;
                return;
            }
        };

        let mut decoder = FrameDecoder::new();
        let mut streaming = false;
        let mut saw_done = false;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Generation stream read failed: {:#}", e);
                    self.update(token, |s| s.fail(format!("Connection lost: {}", e)))
                        .await;
                    return;
                }
            };

            if !streaming {
                streaming = true;
                let moved = self
                    .update(token, |s| s.lifecycle = Lifecycle::Streaming)
                    .await;
                if moved.is_none() {
                    return;
                }
            }

            for frame in decoder.feed_bytes(&chunk) {
                match self.handle_frame(token, &frame).await {
                    FrameOutcome::Continue => {}
                    FrameOutcome::Done => {
                        saw_done = true;
                        break 'read;
                    }
                    FrameOutcome::Stop => return,
                }
            }
        }

        if !saw_done {
            for frame in decoder.flush() {
                match self.handle_frame(token, &frame).await {
                    FrameOutcome::Continue => {}
                    FrameOutcome::Done => saw_done = true,
                    FrameOutcome::Stop => return,
                }
            }
        }

        let finished = self
            .update(token, |s| {
                s.finish(saw_done);
                s.lifecycle
            })
            .await;
        if let Some(lifecycle) = finished {
            info!("Generation run {} finished: {:?}", token, lifecycle);
        }
    }

    async fn handle_frame(&self, token: u64, frame: &str) -> FrameOutcome {
        if frame.trim() == DONE_SENTINEL {
            return FrameOutcome::Done;
        }

        match StreamEvent::parse(frame) {
            Ok(event) => self
                .update(token, |s| s.apply_event(event))
                .await
                .unwrap_or(FrameOutcome::Stop),
            Err(e) => {
                warn!("Ignoring unparsable frame: {}", e);
                self.update(token, |s| s.parse_warnings += 1)
                    .await
                    .map_or(FrameOutcome::Stop, |_| FrameOutcome::Continue)
            }
        }
    }
}
