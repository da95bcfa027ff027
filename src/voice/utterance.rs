//! Utterance segmentation
//!
//! Splits a continuous sample stream into utterances: speech followed by a
//! run of silence. Energy based, no model involved.

use std::time::Duration;

use super::capture::SAMPLE_RATE;

/// Minimum duration of speech to count as an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Accumulating an utterance
    Speaking,
}

/// Outcome of feeding one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Nothing to report
    Pending,
    /// The utterance in progress crossed an interim boundary; carries a snapshot
    Interim(Vec<f32>),
    /// An utterance ended
    Complete(Vec<f32>),
}

/// Splits audio into utterances
pub struct UtteranceSegmenter {
    energy_threshold: f32,
    silence_samples: usize,
    interim_samples: Option<usize>,
    state: SegmenterState,
    buffer: Vec<f32>,
    silence_counter: usize,
    next_interim: usize,
}

impl UtteranceSegmenter {
    /// Create a new segmenter
    #[must_use]
    pub fn new(energy_threshold: f32, silence: Duration, interim: Option<Duration>) -> Self {
        Self {
            energy_threshold,
            silence_samples: duration_to_samples(silence),
            interim_samples: interim.map(duration_to_samples).filter(|n| *n > 0),
            state: SegmenterState::Idle,
            buffer: Vec::new(),
            silence_counter: 0,
            next_interim: 0,
        }
    }

    /// Feed a chunk of samples
    pub fn push(&mut self, samples: &[f32]) -> Segment {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    self.next_interim = self.interim_samples.unwrap_or(usize::MAX);
                    tracing::trace!(energy, "speech detected");
                }
                Segment::Pending
            }
            SegmenterState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > self.silence_samples {
                    let speech = self.buffer.len() - self.silence_counter;
                    if speech > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.buffer.len(), "utterance complete");
                        let utterance = std::mem::take(&mut self.buffer);
                        self.reset();
                        return Segment::Complete(utterance);
                    }
                    tracing::trace!("too short - resetting");
                    self.reset();
                    return Segment::Pending;
                }

                if let Some(step) = self.interim_samples
                    && self.buffer.len() >= self.next_interim
                {
                    self.next_interim = self.buffer.len() + step;
                    return Segment::Interim(self.buffer.clone());
                }

                Segment::Pending
            }
        }
    }

    /// Take whatever utterance is in progress, if it is long enough
    pub fn flush(&mut self) -> Option<Vec<f32>> {
        let utterance = std::mem::take(&mut self.buffer);
        let long_enough = self.state == SegmenterState::Speaking
            && utterance.len().saturating_sub(self.silence_counter) > MIN_SPEECH_SAMPLES;
        self.reset();
        long_enough.then_some(utterance)
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_to_samples(d: Duration) -> usize {
    (d.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_short_blip_is_discarded() {
        let mut seg = UtteranceSegmenter::new(0.03, Duration::from_millis(500), None);
        assert_eq!(seg.push(&[0.5; 800]), Segment::Pending);
        assert_eq!(seg.state(), SegmenterState::Speaking);
        assert_eq!(seg.push(&[0.0; 9000]), Segment::Pending);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_flush_requires_speech() {
        let mut seg = UtteranceSegmenter::new(0.03, Duration::from_millis(500), None);
        assert!(seg.flush().is_none());

        seg.push(&[0.5; 8000]);
        let flushed = seg.flush().unwrap();
        assert_eq!(flushed.len(), 8000);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }
}
