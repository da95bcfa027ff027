//! Audio playback to speakers
//!
//! Decoded audio plays on a dedicated thread that owns the `cpal` stream, so the
//! returned handle can be paused from async code.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::oneshot;

use crate::tts::{AudioDestination, Playback};
use crate::{Error, Result};

/// Decoded PCM audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Plays MP3 audio on the default output device
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerDestination;

impl SpeakerDestination {
    /// Create a new speaker destination
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AudioDestination for SpeakerDestination {
    fn start(&self, audio: Vec<u8>) -> Result<Box<dyn Playback>> {
        let decoded = decode_mp3(&audio)?;
        let playback = SpeakerPlayback::spawn(decoded)?;
        Ok(Box::new(playback))
    }
}

/// Handle to audio playing on the speakers
pub struct SpeakerPlayback {
    paused: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    done: Option<oneshot::Receiver<()>>,
}

impl SpeakerPlayback {
    fn spawn(audio: DecodedAudio) -> Result<Self> {
        let paused = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        let paused_flag = Arc::clone(&paused);
        let finished_flag = Arc::clone(&finished);
        std::thread::Builder::new()
            .name("speechdesk-playback".to_string())
            .spawn(move || {
                let sample_count = audio.samples.len();
                let position = Arc::new(AtomicUsize::new(0));
                let stream = match build_stream(audio, Arc::clone(&position)) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(Error::Audio(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while !paused_flag.load(Ordering::Relaxed)
                    && position.load(Ordering::Relaxed) < sample_count
                {
                    std::thread::sleep(Duration::from_millis(50));
                }

                // Let the device drain its last buffer
                if !paused_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(100));
                }

                drop(stream);
                finished_flag.store(true, Ordering::Relaxed);
                let _ = done_tx.send(());
                tracing::debug!(samples = sample_count, "playback complete");
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("playback thread exited".to_string()))??;

        Ok(Self {
            paused,
            finished,
            done: Some(done_rx),
        })
    }
}

#[async_trait]
impl Playback for SpeakerPlayback {
    fn pause(&mut self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    async fn finished(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.await;
        }
    }
}

fn build_stream(audio: DecodedAudio, position: Arc<AtomicUsize>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(audio.sample_rate);
    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = audio.sample_rate,
        channels,
        "audio playback initialized"
    );

    let samples = audio.samples;
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(pos).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if pos < samples.len() {
                        pos += 1;
                    }
                }
                position.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut audio = DecodedAudio::default();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if audio.sample_rate == 0 {
                    audio.sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                if frame.channels == 2 {
                    audio.samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    audio
                        .samples
                        .extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if audio.samples.is_empty() {
        return Err(Error::Audio("no audio frames decoded".to_string()));
    }

    Ok(audio)
}
