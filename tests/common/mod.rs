//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use secrecy::SecretString;
use speechdesk::db::{self, SettingsStore};
use speechdesk::recognition::{
    CancellationReason, EventSink, RecognitionEvent, RecognitionRequest, RecognitionSession, SpeechRecognizer,
};
use speechdesk::translation::Translator;
use speechdesk::{Error, Result};

/// Set up a settings store over an in-memory database
#[must_use]
pub fn setup_test_store() -> SettingsStore {
    SettingsStore::new(db::init_memory().expect("failed to init test db"))
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    format!("http://{addr}")
}

/// Request recorded by a fake HTTP endpoint
#[derive(Debug, Clone)]
pub struct Recorded {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// Requests seen by a fake endpoint
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Recorded>>>);

impl RequestLog {
    pub fn push(&self, headers: &axum::http::HeaderMap, body: String) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        self.0.lock().unwrap().push(Recorded {
            authorization: header("authorization"),
            content_type: header("content-type"),
            body,
        });
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.0.lock().unwrap().last().cloned()
    }
}

/// Recognizer whose sessions are driven by the test through the captured sink
#[derive(Default)]
pub struct ScriptedRecognizer {
    sinks: Mutex<Vec<EventSink>>,
    stops: Arc<AtomicUsize>,
    stop_error: Option<String>,
}

impl ScriptedRecognizer {
    /// Recognizer whose sessions report a canceling error while stopping,
    /// as when the final utterance fails to transcribe
    pub fn failing_on_stop(details: &str) -> Self {
        Self {
            stop_error: Some(details.to_string()),
            ..Self::default()
        }
    }

    /// Sink of the most recently started session
    pub fn sink(&self) -> EventSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session was started")
    }

    /// Number of sessions started
    pub fn started(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    /// Number of sessions stopped
    pub fn stopped(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start_session(
        &self,
        _request: &RecognitionRequest,
        sink: EventSink,
    ) -> Result<Box<dyn RecognitionSession>> {
        self.sinks.lock().unwrap().push(sink.clone());
        Ok(Box::new(ScriptedSession {
            sink,
            stops: Arc::clone(&self.stops),
            stop_error: self.stop_error.clone(),
        }))
    }
}

struct ScriptedSession {
    sink: EventSink,
    stops: Arc<AtomicUsize>,
    stop_error: Option<String>,
}

#[async_trait]
impl RecognitionSession for ScriptedSession {
    async fn stop_session(&mut self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(details) = self.stop_error.take() {
            self.sink.emit(RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                details,
            });
            return Ok(());
        }
        self.sink.emit(RecognitionEvent::SessionStopped);
        Ok(())
    }
}

/// Translator that records calls and answers with a fixed reply
pub struct CountingTranslator {
    pub calls: AtomicUsize,
    pub reply: std::result::Result<String, String>,
}

impl CountingTranslator {
    pub fn replying(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: Err(message.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for CountingTranslator {
    async fn translate(&self, _api_key: &SecretString, _prompt: &str, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(Error::Translation)
    }
}

/// A request with usable credentials and default preferences
pub fn request() -> RecognitionRequest {
    RecognitionRequest {
        subscription_key: SecretString::from("test-key"),
        region: "eastasia".to_string(),
        language: "en-US".to_string(),
        microphone: "default".to_string(),
    }
}
