//! Azure speech recognition over the short-audio REST endpoint
//!
//! Microphone audio is segmented locally into utterances; each utterance is
//! posted as a 16kHz WAV and the reply is turned into a [`RecognitionEvent`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{
    CancellationReason, EventSink, RecognitionEvent, RecognitionRequest, RecognitionSession,
    SpeechRecognizer,
};
use crate::config::{RecognitionConfig, region_url};
use crate::voice::{AudioCapture, SAMPLE_RATE, Segment, UtteranceSegmenter, samples_to_wav};
use crate::{Error, Result};

/// Reply from the short-audio endpoint (`format=simple`)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ShortAudioResponse {
    pub recognition_status: String,
    #[serde(default)]
    pub display_text: Option<String>,
}

impl ShortAudioResponse {
    /// Map the reply onto a session event
    #[must_use]
    pub fn into_event(self) -> RecognitionEvent {
        match self.recognition_status.as_str() {
            "Success" => match self.display_text {
                Some(text) if !text.trim().is_empty() => RecognitionEvent::Recognized(text),
                _ => RecognitionEvent::NoMatch,
            },
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => RecognitionEvent::NoMatch,
            other => RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                details: format!("recognition status {other}"),
            },
        }
    }
}

/// Posts single utterances to the short-audio endpoint
pub struct ShortAudioClient {
    client: reqwest::Client,
    url: String,
    subscription_key: SecretString,
    language: String,
}

impl ShortAudioClient {
    /// Create a client for one region and language
    #[must_use]
    pub fn new(
        endpoint_template: &str,
        region: &str,
        subscription_key: SecretString,
        language: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: region_url(endpoint_template, region),
            subscription_key,
            language: language.to_string(),
        }
    }

    /// Transcribe one utterance
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    pub async fn transcribe(&self, samples: &[f32]) -> Result<ShortAudioResponse> {
        let wav = samples_to_wav(samples, SAMPLE_RATE)?;
        self.transcribe_wav(wav).await
    }

    /// Transcribe an already-encoded 16kHz mono WAV
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    pub async fn transcribe_wav(&self, wav: Vec<u8>) -> Result<ShortAudioResponse> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let response = self
            .client
            .post(&self.url)
            .query(&[("language", self.language.as_str()), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", self.subscription_key.expose_secret())
            .header(
                "Content-Type",
                format!("audio/wav; codecs=audio/pcm; samplerate={SAMPLE_RATE}"),
            )
            .header("Accept", "application/json")
            .body(wav)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "recognition request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "recognition API error");
            return Err(Error::Recognition(format!("API error {status}: {body}")));
        }

        let result: ShortAudioResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse recognition response");
            e
        })?;

        tracing::debug!(status = %result.recognition_status, "transcription complete");
        Ok(result)
    }
}

/// Microphone-backed recognizer using the Azure short-audio endpoint
pub struct AzureRecognizer {
    config: RecognitionConfig,
}

impl AzureRecognizer {
    /// Create a new recognizer
    #[must_use]
    pub const fn new(config: RecognitionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SpeechRecognizer for AzureRecognizer {
    async fn start_session(
        &self,
        request: &RecognitionRequest,
        sink: EventSink,
    ) -> Result<Box<dyn RecognitionSession>> {
        let client = ShortAudioClient::new(
            &self.config.endpoint,
            &request.region,
            SecretString::from(request.subscription_key.expose_secret().to_string()),
            &request.language,
        );
        let segmenter = UtteranceSegmenter::new(
            self.config.energy_threshold,
            self.config.silence,
            self.config.interim_interval,
        );

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let capture = AudioCapture::start(&request.microphone, chunk_tx)?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(chunk_rx, segmenter, client, sink, stop_rx));

        Ok(Box::new(AzureSession {
            capture: Some(capture),
            stop_tx: Some(stop_tx),
            task: Some(task),
        }))
    }
}

struct AzureSession {
    capture: Option<AudioCapture>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl RecognitionSession for AzureSession {
    async fn stop_session(&mut self) -> Result<()> {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| Error::Recognition(format!("session task failed: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for AzureSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_session(
    mut chunks: mpsc::UnboundedReceiver<Vec<f32>>,
    mut segmenter: UtteranceSegmenter,
    client: ShortAudioClient,
    sink: EventSink,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let chunk = tokio::select! {
            chunk = chunks.recv() => chunk,
            _ = &mut stop => None,
        };
        let Some(chunk) = chunk else { break };

        match segmenter.push(&chunk) {
            Segment::Pending => {}
            Segment::Interim(partial) => match client.transcribe(&partial).await {
                Ok(reply) => {
                    if let RecognitionEvent::Recognized(text) = reply.into_event() {
                        sink.emit(RecognitionEvent::Recognizing(text));
                    }
                }
                Err(e) => tracing::debug!(error = %e, "interim transcription failed"),
            },
            Segment::Complete(utterance) => {
                if !emit_transcription(&client, &sink, &utterance).await {
                    return;
                }
            }
        }
    }

    // Drain what the device delivered before it closed, then flush
    while let Ok(chunk) = chunks.try_recv() {
        if let Segment::Complete(utterance) = segmenter.push(&chunk)
            && !emit_transcription(&client, &sink, &utterance).await
        {
            return;
        }
    }
    if let Some(utterance) = segmenter.flush()
        && !emit_transcription(&client, &sink, &utterance).await
    {
        return;
    }

    sink.emit(RecognitionEvent::SessionStopped);
}

/// Transcribe one utterance and emit the result; false when the session was canceled
async fn emit_transcription(client: &ShortAudioClient, sink: &EventSink, utterance: &[f32]) -> bool {
    let event = match client.transcribe(utterance).await {
        Ok(reply) => reply.into_event(),
        Err(e) => RecognitionEvent::Canceled {
            reason: CancellationReason::Error,
            details: e.to_string(),
        },
    };
    let canceled = matches!(event, RecognitionEvent::Canceled { .. });
    sink.emit(event);
    !canceled
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use uuid::Uuid;

    use super::*;
    use crate::recognition::SessionEvent;

    /// Serve a fixed status and body for every utterance; returns the endpoint template
    async fn endpoint(status: StatusCode, body: &'static str) -> String {
        let router =
            Router::new().route("/{region}/stt", post(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/{{region}}/stt")
    }

    fn one_second() -> usize {
        usize::try_from(SAMPLE_RATE).unwrap()
    }

    fn tone() -> Vec<f32> {
        std::iter::successors(Some(0.0_f32), |phase| Some(phase + 0.17))
            .take(one_second())
            .map(|phase| 0.5 * phase.sin())
            .collect()
    }

    /// Feed `audio` into a session that is then closed, and collect its events
    async fn run_to_end(endpoint: &str, audio: Vec<f32>) -> Vec<RecognitionEvent> {
        let client =
            ShortAudioClient::new(endpoint, "eastasia", SecretString::from("k"), "en-US");
        let segmenter = UtteranceSegmenter::new(0.03, Duration::from_millis(700), None);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();
        let sink = EventSink::new(Uuid::new_v4(), events_tx);

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        for chunk in audio.chunks(1600) {
            chunk_tx.send(chunk.to_vec()).unwrap();
        }
        drop(chunk_tx);
        let (_stop_tx, stop_rx) = oneshot::channel();

        run_session(chunk_rx, segmenter, client, sink, stop_rx).await;

        let mut events = Vec::new();
        while let Ok(e) = events_rx.try_recv() {
            events.push(e.event);
        }
        events
    }

    #[tokio::test]
    async fn test_unfinished_utterance_flushed_before_stop() {
        let url = endpoint(
            StatusCode::OK,
            r#"{"RecognitionStatus":"Success","DisplayText":"Last words."}"#,
        )
        .await;

        let events = run_to_end(&url, tone()).await;
        assert_eq!(
            events,
            vec![
                RecognitionEvent::Recognized("Last words.".to_string()),
                RecognitionEvent::SessionStopped,
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_upload_cancels_session() {
        let url = endpoint(StatusCode::UNAUTHORIZED, "").await;

        let events = run_to_end(&url, tone()).await;
        assert_eq!(events.len(), 1);
        let RecognitionEvent::Canceled { reason, details } = &events[0] else {
            panic!("expected a cancellation, got {events:?}");
        };
        assert_eq!(*reason, CancellationReason::Error);
        assert!(details.contains("401"));
    }

    #[tokio::test]
    async fn test_silent_session_only_stops() {
        let url = endpoint(StatusCode::OK, r#"{"RecognitionStatus":"NoMatch"}"#).await;

        let events = run_to_end(&url, vec![0.0; one_second()]).await;
        assert_eq!(events, vec![RecognitionEvent::SessionStopped]);
    }

    fn reply(json: &str) -> ShortAudioResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_success_maps_to_recognized() {
        let event = reply(r#"{"RecognitionStatus":"Success","DisplayText":"Hello world.","Offset":100,"Duration":900}"#)
            .into_event();
        assert_eq!(event, RecognitionEvent::Recognized("Hello world.".to_string()));
    }

    #[test]
    fn test_silence_maps_to_no_match() {
        assert_eq!(
            reply(r#"{"RecognitionStatus":"InitialSilenceTimeout"}"#).into_event(),
            RecognitionEvent::NoMatch
        );
        assert_eq!(
            reply(r#"{"RecognitionStatus":"Success","DisplayText":""}"#).into_event(),
            RecognitionEvent::NoMatch
        );
    }

    #[test]
    fn test_error_status_cancels() {
        let event = reply(r#"{"RecognitionStatus":"Error"}"#).into_event();
        assert!(matches!(
            event,
            RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                ..
            }
        ));
    }
}
