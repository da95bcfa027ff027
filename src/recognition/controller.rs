//! Recognition session lifecycle
//!
//! `Idle → Initializing → Listening → Stopping → Idle`, with failures returning
//! straight to `Idle`. Only one session is open at a time; it is owned here and
//! consumed by [`RecognitionController::stop`].

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    CancellationReason, EventSink, RecognitionEvent, RecognitionRequest, RecognitionSession,
    SessionEvent, SpeechRecognizer,
};
use crate::translation::Translator;
use crate::{Error, Result};

/// Alert shown when starting without credentials
pub const MISSING_CREDENTIALS: &str = "Please enter your Azure Subscription Key and Region.";

/// Transcript line appended when an utterance had no recognizable speech
pub const NO_MATCH_MARKER: &str = "No speech could be recognized...";

const LINE_END: &str = "\r\n";

/// Lifecycle state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Listening,
    Stopping,
}

/// Status line shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Initializing,
    Listening,
    Stopping,
    /// Free-text error, shown verbatim
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Initializing => f.write_str("Initializing..."),
            Self::Listening => f.write_str("Listening..."),
            Self::Stopping => f.write_str("Stopping..."),
            Self::Error(message) => f.write_str(message),
        }
    }
}

/// Enabled state of the start/stop controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    /// Start available, stop unavailable
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
        }
    }

    /// Stop available, start unavailable
    #[must_use]
    pub const fn active() -> Self {
        Self {
            start_enabled: false,
            stop_enabled: true,
        }
    }
}

/// Whether and how recognized text is forwarded for translation
#[derive(Debug)]
pub struct TranslationSettings {
    pub enabled: bool,
    pub api_key: SecretString,
    pub prompt: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: SecretString::from(String::new()),
            prompt: String::new(),
        }
    }
}

/// A visible change produced while handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The in-progress text was replaced
    Interim(String),
    /// A line was committed to the transcript
    Final(String),
    /// The no-match marker was committed to the transcript
    NoMatch,
    /// A translation was appended
    Translated(String),
    /// A blocking alert for the user
    Alert(String),
    /// An error was surfaced in the status line
    Error(String),
    /// The session ended and the controller is idle again
    Stopped,
}

struct ActiveSession {
    id: Uuid,
    handle: Box<dyn RecognitionSession>,
}

/// Owns the lifecycle of a recognition session
pub struct RecognitionController {
    recognizer: Arc<dyn SpeechRecognizer>,
    translator: Arc<dyn Translator>,
    translation: TranslationSettings,
    state: SessionState,
    status: Status,
    controls: Controls,
    transcript: String,
    in_progress: String,
    translations: String,
    current: Option<ActiveSession>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl RecognitionController {
    /// Create an idle controller
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        translator: Arc<dyn Translator>,
        translation: TranslationSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            recognizer,
            translator,
            translation,
            state: SessionState::Idle,
            status: Status::Ready,
            controls: Controls::idle(),
            transcript: String::new(),
            in_progress: String::new(),
            translations: String::new(),
            current: None,
            events_tx,
            events_rx,
        }
    }

    /// Open a session
    ///
    /// # Errors
    ///
    /// `Error::SessionActive` if a session is already open, `Error::MissingInput`
    /// without credentials, or the recognizer's error if it fails to start
    pub async fn start(&mut self, request: RecognitionRequest) -> Result<()> {
        if self.state != SessionState::Idle {
            tracing::warn!(state = ?self.state, "start rejected, session already active");
            return Err(Error::SessionActive);
        }

        self.controls = Controls::active();
        self.transcript.clear();
        self.in_progress.clear();
        self.status = Status::Initializing;

        if request.subscription_key.expose_secret().trim().is_empty()
            || request.region.trim().is_empty()
        {
            self.controls = Controls::idle();
            self.status = Status::Ready;
            return Err(Error::MissingInput(MISSING_CREDENTIALS.to_string()));
        }

        self.state = SessionState::Initializing;
        let id = Uuid::new_v4();
        let sink = EventSink::new(id, self.events_tx.clone());

        match self.recognizer.start_session(&request, sink).await {
            Ok(handle) => {
                self.current = Some(ActiveSession { id, handle });
                self.state = SessionState::Listening;
                self.status = Status::Listening;
                tracing::info!(
                    session = %id,
                    region = %request.region,
                    language = %request.language,
                    microphone = %request.microphone,
                    "recognition session started"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "error initializing speech recognition");
                self.state = SessionState::Idle;
                self.status = Status::Error(format!("Error: {e}"));
                self.controls = Controls::idle();
                Err(e)
            }
        }
    }

    /// Stop the open session, if any, and return to idle
    ///
    /// Results the session delivered while stopping are still applied.
    pub async fn stop(&mut self) -> Vec<Update> {
        self.controls = Controls::idle();

        let Some(mut active) = self.current.take() else {
            self.state = SessionState::Idle;
            self.status = Status::Ready;
            return Vec::new();
        };

        self.state = SessionState::Stopping;
        self.status = Status::Stopping;

        if let Err(e) = active.handle.stop_session().await {
            tracing::error!(session = %active.id, error = %e, "error stopping speech recognition");
        }

        let mut updates = Vec::new();
        while let Ok(pending) = self.events_rx.try_recv() {
            if pending.session != active.id {
                continue;
            }
            match pending.event {
                RecognitionEvent::Canceled { reason, details } => {
                    updates.extend(self.cancel_error(reason, &details));
                }
                event => updates.extend(self.apply_result(event).await),
            }
        }

        drop(active);
        self.state = SessionState::Idle;
        self.status = Status::Ready;
        updates.push(Update::Stopped);
        tracing::info!("recognition session stopped");
        updates
    }

    /// Wait for the next event from any session
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Apply one event
    pub async fn handle_event(&mut self, event: SessionEvent) -> Vec<Update> {
        let current = self.current.as_ref().map(|a| a.id);
        if self.state == SessionState::Idle || current != Some(event.session) {
            tracing::debug!(session = %event.session, "discarding event for inactive session");
            return Vec::new();
        }

        match event.event {
            RecognitionEvent::SessionStopped => {
                tracing::debug!("session stopped event");
                self.stop().await
            }
            RecognitionEvent::Canceled { reason, details } => {
                let mut updates: Vec<Update> =
                    self.cancel_error(reason, &details).into_iter().collect();
                updates.extend(self.stop().await);
                updates
            }
            other => self.apply_result(other).await,
        }
    }

    /// Apply every event that is already queued
    pub async fn process_pending(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.extend(self.handle_event(event).await);
        }
        updates
    }

    /// Surface an error cancellation in the status line
    fn cancel_error(&mut self, reason: CancellationReason, details: &str) -> Option<Update> {
        if reason != CancellationReason::Error {
            tracing::info!(?reason, details = %details, "recognition canceled");
            return None;
        }
        tracing::error!(details = %details, "recognition canceled with error");
        let message = format!("ERROR: {details}");
        self.status = Status::Error(message.clone());
        Some(Update::Error(message))
    }

    async fn apply_result(&mut self, event: RecognitionEvent) -> Vec<Update> {
        match event {
            RecognitionEvent::Recognizing(text) => {
                self.in_progress.clone_from(&text);
                vec![Update::Interim(text)]
            }
            RecognitionEvent::Recognized(text) => {
                self.transcript.push_str(&text);
                self.transcript.push_str(LINE_END);
                let mut updates = vec![Update::Final(text.clone())];
                if self.translation.enabled {
                    updates.extend(self.translate(&text).await);
                }
                updates
            }
            RecognitionEvent::NoMatch => {
                self.transcript.push_str(NO_MATCH_MARKER);
                self.transcript.push_str(LINE_END);
                vec![Update::NoMatch]
            }
            RecognitionEvent::SessionStopped | RecognitionEvent::Canceled { .. } => Vec::new(),
        }
    }

    async fn translate(&mut self, text: &str) -> Option<Update> {
        let result = self
            .translator
            .translate(&self.translation.api_key, &self.translation.prompt, text)
            .await;

        match result {
            Ok(reply) => {
                self.translations.push_str(&reply);
                self.translations.push_str(LINE_END);
                Some(Update::Translated(reply))
            }
            Err(e) if e.is_alert() => {
                tracing::warn!(error = %e, "translation skipped");
                Some(Update::Alert(e.to_string()))
            }
            Err(e) => {
                tracing::error!(error = %e, "translation failed");
                None
            }
        }
    }

    /// Replace the translation settings
    pub fn set_translation(&mut self, translation: TranslationSettings) {
        self.translation = translation;
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Current status line
    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// Current control enablement
    #[must_use]
    pub const fn controls(&self) -> Controls {
        self.controls
    }

    /// Committed transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Text of the utterance in progress
    #[must_use]
    pub fn in_progress(&self) -> &str {
        &self.in_progress
    }

    /// Translated lines
    #[must_use]
    pub fn translations(&self) -> &str {
        &self.translations
    }

    /// Whether a session is open
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
