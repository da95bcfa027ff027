//! Audio capture from a microphone
//!
//! The `cpal` stream is not `Send`, so it lives on its own thread and forwards
//! mono sample chunks over a channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::mpsc;

use super::devices::open_input_device;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Captures audio from an input device until stopped
pub struct AudioCapture {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AudioCapture {
    /// Open the device and start forwarding 16kHz mono chunks to `chunks`
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the stream cannot start
    pub fn start(device_id: &str, chunks: mpsc::UnboundedSender<Vec<f32>>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        let device_id = device_id.to_string();
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("speechdesk-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(&device_id, chunks) {
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

                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                tracing::debug!("audio capture stopped");
            })?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("capture thread exited".to_string()))??;

        tracing::debug!("audio capture started");
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop capturing and release the device
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("capture thread panicked");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(
    device_id: &str,
    chunks: mpsc::UnboundedSender<Vec<f32>>,
) -> Result<cpal::Stream> {
    let device = open_input_device(device_id)?;

    // Prefer mono; otherwise take any layout at 16kHz and mix down
    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| {
            c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels,
        "audio capture initialized"
    );

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = chunks.send(downmix(data, channels));
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

/// Average interleaved frames into mono
#[allow(clippy::cast_precision_loss)]
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Convert f32 samples to 16-bit PCM WAV bytes for the recognition endpoint
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
