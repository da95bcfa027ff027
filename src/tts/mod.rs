//! Text-to-speech: voice catalog, SSML construction and playback control
//!
//! The controller only sees a [`SpeechSynthesizer`] producing encoded audio and an
//! [`AudioDestination`] that plays it.

mod azure;
pub mod catalog;
mod form;
pub mod ssml;
mod synthesis;

use async_trait::async_trait;

use crate::Result;

pub use azure::{AzureSynthesizer, SynthesisAuth};
pub use catalog::{
    CatalogClient, VoiceCatalog, VoiceEntry, VoiceOption, default_text_for, is_right_to_left,
    style_label,
};
pub use form::{PITCH_RANGE, SPEED_RANGE, SelectOption, TtsForm, slider_value};
pub use ssml::{SsmlNode, SsmlSelection, build_ssml, escape_xml};
pub use synthesis::{PlaybackState, SynthesisController};

/// A speech synthesis service
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render an SSML document to encoded audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails or is canceled
    async fn speak_ssml(&self, ssml: &str) -> Result<Vec<u8>>;
}

/// Somewhere synthesized audio can be played
pub trait AudioDestination: Send + Sync {
    /// Start playing encoded audio
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or the device cannot be opened
    fn start(&self, audio: Vec<u8>) -> Result<Box<dyn Playback>>;
}

/// Handle to audio that is playing
#[async_trait]
pub trait Playback: Send {
    /// Pause output; the handle is discarded afterwards
    fn pause(&mut self);

    /// Whether the audio has ended
    fn is_finished(&self) -> bool;

    /// Resolve once the audio has ended or was paused
    async fn finished(&mut self);
}
