//! Voice pipeline integration tests
//!
//! Tests audio components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use speechdesk::voice::{SAMPLE_RATE, Segment, SegmenterState, UtteranceSegmenter, samples_to_wav};

mod common;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in 100ms chunks, collecting everything that is not pending
fn feed(segmenter: &mut UtteranceSegmenter, audio: &[f32]) -> Vec<Segment> {
    audio
        .chunks(1600)
        .map(|chunk| segmenter.push(chunk))
        .filter(|s| *s != Segment::Pending)
        .collect()
}

fn segmenter(interim: Option<Duration>) -> UtteranceSegmenter {
    UtteranceSegmenter::new(0.03, Duration::from_millis(700), interim)
}

#[test]
fn test_speech_then_silence_completes_utterance() {
    let mut seg = segmenter(None);
    let mut audio = generate_sine_samples(440.0, 1.0, 0.5);
    audio.extend(generate_silence(1.0));

    let segments = feed(&mut seg, &audio);
    assert_eq!(segments.len(), 1);
    let Segment::Complete(utterance) = &segments[0] else {
        panic!("expected a complete utterance, got {segments:?}");
    };
    assert!(utterance.len() >= SAMPLE_RATE as usize);
    assert_eq!(seg.state(), SegmenterState::Idle);
}

#[test]
fn test_silence_alone_produces_nothing() {
    let mut seg = segmenter(None);
    assert!(feed(&mut seg, &generate_silence(2.0)).is_empty());
    assert_eq!(seg.state(), SegmenterState::Idle);
}

#[test]
fn test_short_blip_is_discarded() {
    let mut seg = segmenter(None);
    let mut audio = generate_sine_samples(440.0, 0.1, 0.5);
    audio.extend(generate_silence(1.0));

    assert!(feed(&mut seg, &audio).is_empty());
}

#[test]
fn test_two_utterances() {
    let mut seg = segmenter(None);
    let mut audio = Vec::new();
    for _ in 0..2 {
        audio.extend(generate_sine_samples(300.0, 0.8, 0.4));
        audio.extend(generate_silence(1.0));
    }

    let completes = feed(&mut seg, &audio)
        .into_iter()
        .filter(|s| matches!(s, Segment::Complete(_)))
        .count();
    assert_eq!(completes, 2);
}

#[test]
fn test_interim_snapshots_while_speaking() {
    let mut seg = segmenter(Some(Duration::from_millis(500)));
    let mut audio = generate_sine_samples(440.0, 2.0, 0.5);
    audio.extend(generate_silence(1.0));

    let segments = feed(&mut seg, &audio);
    let interims: Vec<usize> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Interim(snapshot) => Some(snapshot.len()),
            _ => None,
        })
        .collect();

    assert!(interims.len() >= 2);
    assert!(interims.windows(2).all(|w| w[0] < w[1]));
    assert!(matches!(segments.last(), Some(Segment::Complete(_))));
}

#[test]
fn test_flush_returns_utterance_in_progress() {
    let mut seg = segmenter(None);
    feed(&mut seg, &generate_sine_samples(440.0, 1.0, 0.5));
    assert_eq!(seg.state(), SegmenterState::Speaking);

    assert!(seg.flush().is_some());
    assert_eq!(seg.state(), SegmenterState::Idle);
    assert!(seg.flush().is_none());
}

#[test]
fn test_utterance_encodes_as_16khz_wav() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(reader.len() as usize, samples.len());
}
