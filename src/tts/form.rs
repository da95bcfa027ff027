//! Selection state of the synthesis form
//!
//! Every change recomputes the SSML document. Index 0 of the style, role-play and
//! secondary-locale lists is always the default entry.

use std::collections::BTreeMap;

use super::catalog::{VoiceCatalog, VoiceOption, default_text_for, is_right_to_left, style_label};
use super::ssml::{SsmlSelection, build_ssml};
use crate::{Error, Result};

/// Pitch slider bounds, in percent
pub const PITCH_RANGE: (i32, i32) = (-50, 50);

/// Speed slider bounds, in percent
pub const SPEED_RANGE: (i32, i32) = (-100, 200);

/// Language preselected when the catalog offers it
const PREFERRED_LANGUAGE: &str = "en-US";

/// An entry of a selector: what is shown and what is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Form state feeding the SSML builder
#[derive(Debug, Clone)]
pub struct TtsForm {
    catalog: VoiceCatalog,
    default_texts: BTreeMap<String, String>,
    language: String,
    voice: usize,
    styles: Vec<SelectOption>,
    style: usize,
    role_plays: Vec<SelectOption>,
    role_play: usize,
    secondary_locales: Vec<SelectOption>,
    secondary_locale: usize,
    pitch: i32,
    speed: i32,
    prosody_enabled: bool,
    text: String,
    ssml: String,
}

impl TtsForm {
    /// Build the form over a catalog, preselecting `en-US` when available
    #[must_use]
    pub fn new(catalog: VoiceCatalog, default_texts: BTreeMap<String, String>) -> Self {
        let language = if catalog.voices_for(PREFERRED_LANGUAGE).is_empty() {
            catalog
                .locales()
                .next()
                .unwrap_or(PREFERRED_LANGUAGE)
                .to_string()
        } else {
            PREFERRED_LANGUAGE.to_string()
        };

        let mut form = Self {
            catalog,
            default_texts,
            language: String::new(),
            voice: 0,
            styles: Vec::new(),
            style: 0,
            role_plays: Vec::new(),
            role_play: 0,
            secondary_locales: Vec::new(),
            secondary_locale: 0,
            pitch: 0,
            speed: 0,
            prosody_enabled: true,
            text: String::new(),
            ssml: String::new(),
        };
        form.apply_language(language);
        form
    }

    /// Switch language: resets the text and selects the first voice
    ///
    /// # Errors
    ///
    /// Returns error if the catalog has no voices for `locale`
    pub fn select_language(&mut self, locale: &str) -> Result<()> {
        if self.catalog.voices_for(locale).is_empty() {
            return Err(Error::Catalog(format!("no voices for {locale}")));
        }
        self.apply_language(locale.to_string());
        Ok(())
    }

    /// Select a voice of the current language by position
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range
    pub fn select_voice(&mut self, index: usize) -> Result<()> {
        check_index(index, self.voices().len(), "voice")?;
        self.voice = index;
        self.refresh_voice();
        Ok(())
    }

    /// Select a voice of the current language by short name
    ///
    /// # Errors
    ///
    /// Returns error if the voice is not offered for the current language
    pub fn select_voice_named(&mut self, short_name: &str) -> Result<()> {
        let index = self
            .voices()
            .iter()
            .position(|v| v.short_name == short_name)
            .ok_or_else(|| Error::Catalog(format!("voice {short_name} not offered for {}", self.language)))?;
        self.select_voice(index)
    }

    /// Select an expressive style
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range
    pub fn select_style(&mut self, index: usize) -> Result<()> {
        check_index(index, self.styles.len(), "style")?;
        self.style = index;
        self.rebuild();
        Ok(())
    }

    /// Select a role-play persona
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range or the voice has no role plays
    pub fn select_role_play(&mut self, index: usize) -> Result<()> {
        check_index(index, self.role_plays.len(), "role play")?;
        self.role_play = index;
        self.rebuild();
        Ok(())
    }

    /// Select a secondary locale
    ///
    /// A non-default locale disables pitch and speed and swaps in that locale's
    /// sample text.
    ///
    /// # Errors
    ///
    /// Returns error if `index` is out of range or the voice has no secondary locales
    pub fn select_secondary_locale(&mut self, index: usize) -> Result<()> {
        check_index(index, self.secondary_locales.len(), "secondary locale")?;
        self.secondary_locale = index;
        self.prosody_enabled = index == 0;
        self.text = default_text_for(&self.default_texts, &self.secondary_locales[index].value);
        self.rebuild();
        Ok(())
    }

    /// Set pitch offset in percent, clamped to [`PITCH_RANGE`]
    pub fn set_pitch(&mut self, pitch: i32) {
        self.pitch = pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        self.rebuild();
    }

    /// Set speed offset in percent, clamped to [`SPEED_RANGE`]
    pub fn set_speed(&mut self, speed: i32) {
        self.speed = speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        self.rebuild();
    }

    /// Replace the utterance text
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.rebuild();
    }

    /// Overwrite the SSML document directly; kept until the next control change
    pub fn set_ssml(&mut self, ssml: impl Into<String>) {
        self.ssml = ssml.into();
    }

    /// Current selection as builder input
    #[must_use]
    pub fn selection(&self) -> SsmlSelection {
        let role = (self.role_play > 0)
            .then(|| self.role_plays.get(self.role_play))
            .flatten()
            .map(|o| o.value.clone());
        let secondary_locale = (self.secondary_locale > 0)
            .then(|| self.secondary_locales.get(self.secondary_locale))
            .flatten()
            .map(|o| o.value.clone());
        let style = (self.style > 0)
            .then(|| self.styles.get(self.style))
            .flatten()
            .map(|o| o.value.clone());

        SsmlSelection {
            voice: self.voice_name().unwrap_or_default().to_string(),
            style,
            role,
            secondary_locale,
            pitch: self.pitch,
            speed: self.speed,
            text: self.text.clone(),
        }
    }

    /// Current SSML document
    #[must_use]
    pub fn ssml(&self) -> &str {
        &self.ssml
    }

    /// Current language
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Voices of the current language
    #[must_use]
    pub fn voices(&self) -> &[VoiceOption] {
        self.catalog.voices_for(&self.language)
    }

    /// Short name of the selected voice
    #[must_use]
    pub fn voice_name(&self) -> Option<&str> {
        self.voices().get(self.voice).map(|v| v.short_name.as_str())
    }

    /// Style entries; the first is `General`
    #[must_use]
    pub fn styles(&self) -> &[SelectOption] {
        &self.styles
    }

    /// Whether the voice offers any style beyond `General`
    #[must_use]
    pub fn style_enabled(&self) -> bool {
        self.styles.len() > 1
    }

    /// Role-play entries, empty when the selector is hidden
    #[must_use]
    pub fn role_plays(&self) -> &[SelectOption] {
        &self.role_plays
    }

    /// Secondary-locale entries, empty when the selector is hidden
    #[must_use]
    pub fn secondary_locales(&self) -> &[SelectOption] {
        &self.secondary_locales
    }

    /// Whether pitch and speed can be changed
    #[must_use]
    pub const fn prosody_enabled(&self) -> bool {
        self.prosody_enabled
    }

    /// Utterance text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the utterance should be shown right to left
    #[must_use]
    pub fn right_to_left(&self) -> bool {
        is_right_to_left(&self.language)
    }

    /// Pitch slider caption, e.g. `Pitch: 1.00`
    #[must_use]
    pub fn pitch_label(&self) -> String {
        format!("Pitch: {}", slider_value(self.pitch, PITCH_RANGE, 2.0))
    }

    /// Speed slider caption, e.g. `Speed: 1.00`
    #[must_use]
    pub fn speed_label(&self) -> String {
        format!("Speed: {}", slider_value(self.speed, SPEED_RANGE, 3.0))
    }

    fn apply_language(&mut self, locale: String) {
        self.text = default_text_for(&self.default_texts, &locale);
        self.language = locale;
        self.voice = 0;
        self.refresh_voice();
    }

    fn refresh_voice(&mut self) {
        let voice = self.voice_name().unwrap_or_default().to_string();

        self.styles = vec![SelectOption::new("General", "general")];
        if let Some(styles) = self.catalog.styles_for(&voice) {
            self.styles
                .extend(styles.iter().map(|s| SelectOption::new(style_label(s), s.as_str())));
        }
        self.style = 0;

        self.role_plays = self
            .catalog
            .role_plays_for(&voice)
            .map(|roles| {
                std::iter::once(SelectOption::new("Default", "Default"))
                    .chain(roles.iter().map(|r| SelectOption::new(r.as_str(), r.as_str())))
                    .collect()
            })
            .unwrap_or_default();
        self.role_play = 0;

        self.secondary_locales = self
            .catalog
            .secondary_locales_for(&voice)
            .map(|locales| {
                let primary = SelectOption::new(
                    format!("{} - Default", self.catalog.locale_name(&self.language)),
                    self.language.as_str(),
                );
                std::iter::once(primary)
                    .chain(locales.iter().map(|l| {
                        SelectOption::new(self.catalog.locale_name(l), l.as_str())
                    }))
                    .collect()
            })
            .unwrap_or_default();
        self.secondary_locale = 0;
        self.prosody_enabled = true;

        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.ssml = build_ssml(&self.selection());
    }
}

fn check_index(index: usize, len: usize, what: &str) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::Catalog(format!("{what} index {index} out of range ({len} entries)")))
    }
}

/// Normalized slider position, 2 significant digits below 1, otherwise 3
#[must_use]
pub fn slider_value(value: i32, (min, max): (i32, i32), scale: f64) -> String {
    let normalized = f64::from(value - min) / f64::from(max - min) * scale;
    let digits = if normalized.abs() < 1.0 { 2 } else { 3 };
    to_precision(normalized, digits)
}

/// Format with a fixed number of significant digits
fn to_precision(value: f64, digits: i32) -> String {
    if value.abs() < f64::EPSILON {
        return format!("{:.*}", usize::try_from(digits - 1).unwrap_or(0), 0.0);
    }
    // Value is bounded by the slider scale, so the magnitude fits easily
    #[allow(clippy::cast_possible_truncation)]
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = usize::try_from(digits - 1 - magnitude).unwrap_or(0);
    format!("{value:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::catalog::VoiceEntry;

    fn entry(short_name: &str, locale: &str) -> VoiceEntry {
        VoiceEntry {
            display_name: short_name.to_string(),
            short_name: short_name.to_string(),
            locale: locale.to_string(),
            locale_name: Some(format!("Lang {locale}")),
            voice_type: "Neural".to_string(),
            status: "GA".to_string(),
            ..VoiceEntry::default()
        }
    }

    fn form() -> TtsForm {
        let mut jenny = entry("en-US-JennyNeural", "en-US");
        jenny.style_list = Some(vec!["cheerful".to_string(), "customerservice".to_string()]);
        let guy = entry("en-US-GuyNeural", "en-US");
        let mut xiaomo = entry("zh-CN-XiaomoNeural", "zh-CN");
        xiaomo.role_play_list = Some(vec!["Girl".to_string()]);
        xiaomo.secondary_locale_list = Some(vec!["en-US".to_string()]);

        let mut texts = BTreeMap::new();
        texts.insert("default".to_string(), "Hello".to_string());
        texts.insert("zh".to_string(), "你好".to_string());

        TtsForm::new(
            VoiceCatalog::from_entries(vec![jenny, guy, xiaomo], "Preview"),
            texts,
        )
    }

    #[test]
    fn test_initial_state() {
        let form = form();
        assert_eq!(form.language(), "en-US");
        assert_eq!(form.voice_name(), Some("en-US-JennyNeural"));
        assert_eq!(form.text(), "Hello");
        assert_eq!(form.styles()[0], SelectOption::new("General", "general"));
        assert_eq!(form.styles()[2].label, "Customer Service");
        assert!(form.role_plays().is_empty());
        assert!(form.ssml().contains(r#"<voice name="en-US-JennyNeural">"#));
    }

    #[test]
    fn test_style_change_rebuilds() {
        let mut form = form();
        form.select_style(1).unwrap();
        assert!(form.ssml().contains(r#"<mstts:express-as style="cheerful">"#));

        form.select_voice(1).unwrap();
        assert!(!form.style_enabled());
        assert!(!form.ssml().contains("express-as"));
    }

    #[test]
    fn test_language_change() {
        let mut form = form();
        form.select_language("zh-CN").unwrap();
        assert_eq!(form.text(), "你好");
        assert_eq!(form.role_plays().len(), 2);
        assert_eq!(form.secondary_locales()[0].label, "Lang zh-CN - Default");
        assert!(form.select_language("xx-XX").is_err());
    }

    #[test]
    fn test_role_play_only() {
        let mut form = form();
        form.select_language("zh-CN").unwrap();
        form.select_role_play(1).unwrap();
        assert!(form.ssml().contains(r#"<mstts:express-as role="Girl">"#));
        assert!(!form.ssml().contains("style="));
    }

    #[test]
    fn test_secondary_locale_disables_prosody() {
        let mut form = form();
        form.select_language("zh-CN").unwrap();
        form.select_secondary_locale(1).unwrap();
        assert!(!form.prosody_enabled());
        assert_eq!(form.text(), "Hello");
        assert!(form.ssml().contains(r#"<lang xml:lang="en-US">Hello</lang>"#));

        form.select_secondary_locale(0).unwrap();
        assert!(form.prosody_enabled());
        assert!(!form.ssml().contains("<lang"));
    }

    #[test]
    fn test_secondary_locale_keeps_prosody_values() {
        let mut form = form();
        form.select_language("zh-CN").unwrap();
        form.set_pitch(20);
        form.set_speed(-40);
        form.select_secondary_locale(1).unwrap();

        assert!(!form.prosody_enabled());
        assert!(form
            .ssml()
            .contains(r#"<prosody rate="-40%" pitch="20%"><lang xml:lang="en-US">"#));
    }

    #[test]
    fn test_manual_ssml_kept_until_next_change() {
        let mut form = form();
        form.set_ssml("<speak>custom</speak>");
        assert_eq!(form.ssml(), "<speak>custom</speak>");
        form.set_pitch(10);
        assert!(form.ssml().contains(r#"pitch="10%""#));
    }

    #[test]
    fn test_slider_labels() {
        let mut form = form();
        assert_eq!(form.pitch_label(), "Pitch: 1.00");
        assert_eq!(form.speed_label(), "Speed: 1.00");

        form.set_pitch(-50);
        assert_eq!(form.pitch_label(), "Pitch: 0.0");
        form.set_pitch(-25);
        assert_eq!(form.pitch_label(), "Pitch: 0.50");
        form.set_speed(200);
        assert_eq!(form.speed_label(), "Speed: 3.00");
        form.set_speed(500);
        assert_eq!(form.speed_label(), "Speed: 3.00");
    }

    #[test]
    fn test_out_of_range_selection() {
        let mut form = form();
        assert!(form.select_voice(9).is_err());
        assert!(form.select_role_play(1).is_err());
    }
}
