//! Continuous speech recognition
//!
//! The controller only talks to a [`SpeechRecognizer`]; results come back as
//! [`RecognitionEvent`]s through an [`EventSink`], tagged with the session they
//! belong to.

mod azure;
mod controller;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::Result;

pub use azure::{AzureRecognizer, ShortAudioClient, ShortAudioResponse};
pub use controller::{
    Controls, NO_MATCH_MARKER, RecognitionController, SessionState, Status,
    TranslationSettings, Update, MISSING_CREDENTIALS,
};

/// Why a session was canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The service reported an error
    Error,
    /// The audio source ran out
    EndOfStream,
}

/// A notification from an open recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Provisional text for the utterance in progress
    Recognizing(String),
    /// Committed text for a finished utterance
    Recognized(String),
    /// An utterance ended without recognizable speech
    NoMatch,
    /// The session ended
    SessionStopped,
    /// The session was canceled
    Canceled {
        reason: CancellationReason,
        details: String,
    },
}

/// An event tagged with its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: Uuid,
    pub event: RecognitionEvent,
}

/// Delivers events for one session to the controller
#[derive(Debug, Clone)]
pub struct EventSink {
    session: Uuid,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Create a sink for `session`
    #[must_use]
    pub const fn new(session: Uuid, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    /// Send an event; returns false once the controller is gone
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }

    /// The session this sink belongs to
    #[must_use]
    pub const fn session(&self) -> Uuid {
        self.session
    }
}

/// Parameters for opening a session
#[derive(Debug)]
pub struct RecognitionRequest {
    /// Speech service subscription key
    pub subscription_key: SecretString,
    /// Speech service region
    pub region: String,
    /// Recognition language tag
    pub language: String,
    /// Microphone device id
    pub microphone: String,
}

/// A speech recognition service
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Open a continuous session; results are delivered through `sink`
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be opened
    async fn start_session(
        &self,
        request: &RecognitionRequest,
        sink: EventSink,
    ) -> Result<Box<dyn RecognitionSession>>;
}

/// An open recognition session; dropping it releases its resources
#[async_trait]
pub trait RecognitionSession: Send {
    /// Ask the session to stop and wait until it has
    ///
    /// # Errors
    ///
    /// Returns error if the session did not stop cleanly
    async fn stop_session(&mut self) -> Result<()>;
}
