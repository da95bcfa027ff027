//! Voice processing module
//!
//! Handles input device enumeration, audio capture, utterance segmentation
//! and playback.

mod capture;
mod devices;
mod playback;
mod utterance;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use devices::{AudioInput, list_audio_inputs, open_input_device};
pub use playback::{DecodedAudio, SpeakerDestination, SpeakerPlayback, decode_mp3};
pub use utterance::{Segment, SegmenterState, UtteranceSegmenter};
