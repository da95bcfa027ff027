//! Play/stop state machine for synthesized speech

use std::sync::Arc;

use super::{AudioDestination, Playback, SpeechSynthesizer};
use crate::Result;

/// Whether audio is currently playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Drives one synthesis at a time into an audio destination
pub struct SynthesisController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    destination: Arc<dyn AudioDestination>,
    retry_message: String,
    state: PlaybackState,
    status: String,
    player: Option<Box<dyn Playback>>,
}

impl SynthesisController {
    /// Create an idle controller
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        destination: Arc<dyn AudioDestination>,
        retry_message: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            destination,
            retry_message: retry_message.into(),
            state: PlaybackState::Idle,
            status: String::new(),
            player: None,
        }
    }

    /// Synthesize `ssml` and start playing it
    ///
    /// Any earlier playback is stopped first. On failure the controller is back
    /// to idle with the retry message in the status line.
    ///
    /// # Errors
    ///
    /// Returns the synthesis or playback error
    pub async fn play(&mut self, ssml: &str) -> Result<()> {
        if self.player.is_some() {
            self.stop();
        }
        self.state = PlaybackState::Playing;
        self.status.clear();

        let started = match self.synthesizer.speak_ssml(ssml).await {
            Ok(audio) => self.destination.start(audio),
            Err(e) => Err(e),
        };

        match started {
            Ok(player) => {
                tracing::info!("playback started");
                self.player = Some(player);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "synthesis failed");
                self.status = format!("{} {e}", self.retry_message);
                self.state = PlaybackState::Idle;
                Err(e)
            }
        }
    }

    /// Pause and discard the player; idle immediately
    pub fn stop(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.pause();
            tracing::debug!("playback stopped");
        }
        self.state = PlaybackState::Idle;
    }

    /// Wait until the current audio ends, then go idle
    pub async fn wait_for_end(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.finished().await;
        }
        self.on_audio_end();
    }

    /// Go idle if the current audio has ended; returns true when it has
    pub fn poll_end(&mut self) -> bool {
        if self.player.as_ref().is_some_and(|p| p.is_finished()) {
            self.on_audio_end();
            return true;
        }
        false
    }

    fn on_audio_end(&mut self) {
        self.player = None;
        self.state = PlaybackState::Idle;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Status line; empty unless the last synthesis failed
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the play control is shown
    #[must_use]
    pub fn play_visible(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    /// Whether the stop control is shown
    #[must_use]
    pub fn stop_visible(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::Error;

    struct FakeSynthesizer {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn speak_ssml(&self, ssml: &str) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(ssml.to_string());
            if self.fail {
                Err(Error::Tts("401 Unauthorized".to_string()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    struct FakePlayback {
        paused: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Playback for FakePlayback {
        fn pause(&mut self) {
            self.paused.store(true, Ordering::SeqCst);
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }

        async fn finished(&mut self) {}
    }

    #[derive(Default)]
    struct FakeDestination {
        paused: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    impl AudioDestination for FakeDestination {
        fn start(&self, _audio: Vec<u8>) -> Result<Box<dyn Playback>> {
            Ok(Box::new(FakePlayback {
                paused: Arc::clone(&self.paused),
                finished: Arc::clone(&self.finished),
            }))
        }
    }

    fn controller(fail: bool) -> (SynthesisController, Arc<FakeDestination>) {
        let destination = Arc::new(FakeDestination::default());
        let synthesizer = Arc::new(FakeSynthesizer {
            fail,
            calls: Mutex::new(Vec::new()),
        });
        let controller =
            SynthesisController::new(synthesizer, destination.clone(), "Please try again.");
        (controller, destination)
    }

    #[tokio::test]
    async fn test_play_then_end() {
        let (mut c, dest) = controller(false);
        assert!(c.play_visible());

        c.play("<speak/>").await.unwrap();
        assert_eq!(c.state(), PlaybackState::Playing);
        assert!(c.stop_visible());
        assert!(!c.poll_end());

        dest.finished.store(true, Ordering::SeqCst);
        assert!(c.poll_end());
        assert_eq!(c.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_stop_pauses_player() {
        let (mut c, dest) = controller(false);
        c.play("<speak/>").await.unwrap();
        c.stop();
        assert!(dest.paused.load(Ordering::SeqCst));
        assert!(c.play_visible());
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let (mut c, _) = controller(false);
        c.stop();
        assert_eq!(c.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_failure_sets_retry_status() {
        let (mut c, _) = controller(true);
        assert!(c.play("<speak/>").await.is_err());
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(c.status().starts_with("Please try again."));
    }

    #[tokio::test]
    async fn test_wait_for_end() {
        let (mut c, _) = controller(false);
        c.play("<speak/>").await.unwrap();
        c.wait_for_end().await;
        assert!(c.play_visible());
    }
}
