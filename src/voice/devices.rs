//! Audio input device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::db::DEFAULT_MICROPHONE;
use crate::{Error, Result};

/// A selectable microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    /// Identifier stored in settings
    pub id: String,
    /// Human-readable label
    pub label: String,
}

/// List the host's audio input devices
///
/// Enumeration failures are logged and produce an empty list.
#[must_use]
pub fn list_audio_inputs() -> Vec<AudioInput> {
    let host = cpal::default_host();

    match host.input_devices() {
        Ok(devices) => {
            let inputs = label_inputs(devices.map(|d| d.name().ok()));
            tracing::debug!(count = inputs.len(), "audio input devices");
            inputs
        }
        Err(e) => {
            tracing::error!(error = %e, "error getting input devices");
            Vec::new()
        }
    }
}

/// Build selectable entries from device names, labelling unnamed devices by position
fn label_inputs(names: impl Iterator<Item = Option<String>>) -> Vec<AudioInput> {
    names
        .enumerate()
        .map(|(i, name)| {
            let label = name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Microphone {}", i + 1));
            AudioInput {
                id: label.clone(),
                label,
            }
        })
        .collect()
}

/// Open an input device by id; `default` selects the host default
///
/// # Errors
///
/// Returns error if no matching device exists
pub fn open_input_device(id: &str) -> Result<Device> {
    let host = cpal::default_host();

    if id.is_empty() || id == DEFAULT_MICROPHONE {
        return host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()));
    }

    host.input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|d| d.name().is_ok_and(|n| n == id))
        .ok_or_else(|| Error::Audio(format!("input device not found: {id}")))
}
