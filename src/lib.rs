//! Speechdesk - Speech recognition with LLM translation, and a text-to-speech workbench
//!
//! This library provides:
//! - Persistent preferences (credentials, region, language, microphone, translation)
//! - Continuous microphone recognition with a transcript and optional translation
//! - A voice catalog, typed SSML construction and synthesized playback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        CLI                            │
//! │   settings  │  devices  │  listen  │  voices │ speak  │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │                  Controllers                          │
//! │   RecognitionController   │   TtsForm + Synthesis     │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │               External services                       │
//! │   Speech REST (STT/TTS)  │  Chat completions  │ cpal  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod recognition;
pub mod translation;
pub mod tts;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
