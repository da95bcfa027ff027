//! SSML document construction
//!
//! The document is assembled as a small tree of typed nodes and serialized once,
//! so user text can never collide with template placeholders.

use std::fmt::{self, Write as _};

/// Default namespace of an SSML document
pub const SYNTHESIS_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";

/// Namespace of the `mstts` extensions
pub const MSTTS_NAMESPACE: &str = "http://www.w3.org/2001/mstts";

/// Namespace of `EmotionML`
pub const EMOTIONML_NAMESPACE: &str = "http://www.w3.org/2009/10/emotionml";

/// Document language of the envelope
pub const DOCUMENT_LANG: &str = "en-US";

/// One SSML element or text run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsmlNode {
    /// `<speak>` envelope
    Speak { lang: String, child: Box<Self> },
    /// `<voice name="…">`
    Voice { name: String, child: Box<Self> },
    /// `<mstts:express-as>` with whichever attributes apply
    ExpressAs {
        style: Option<String>,
        role: Option<String>,
        child: Box<Self>,
    },
    /// `<lang xml:lang="…">`
    Lang { locale: String, child: Box<Self> },
    /// `<prosody rate="…" pitch="…">`
    Prosody {
        rate: String,
        pitch: String,
        child: Box<Self>,
    },
    /// Literal text, escaped on output
    Text(String),
}

impl SsmlNode {
    fn write_to(&self, out: &mut String) {
        match self {
            Self::Speak { lang, child } => {
                let _ = write!(
                    out,
                    r#"<speak xmlns="{SYNTHESIS_NAMESPACE}" xmlns:mstts="{MSTTS_NAMESPACE}" xmlns:emo="{EMOTIONML_NAMESPACE}" version="1.0" xml:lang="{}">"#,
                    escape_xml(lang)
                );
                child.write_to(out);
                out.push_str("</speak>");
            }
            Self::Voice { name, child } => {
                let _ = write!(out, r#"<voice name="{}">"#, escape_xml(name));
                child.write_to(out);
                out.push_str("</voice>");
            }
            Self::ExpressAs { style, role, child } => {
                out.push_str("<mstts:express-as");
                if let Some(style) = style {
                    let _ = write!(out, r#" style="{}""#, escape_xml(style));
                }
                if let Some(role) = role {
                    let _ = write!(out, r#" role="{}""#, escape_xml(role));
                }
                out.push('>');
                child.write_to(out);
                out.push_str("</mstts:express-as>");
            }
            Self::Lang { locale, child } => {
                let _ = write!(out, r#"<lang xml:lang="{}">"#, escape_xml(locale));
                child.write_to(out);
                out.push_str("</lang>");
            }
            Self::Prosody { rate, pitch, child } => {
                let _ = write!(
                    out,
                    r#"<prosody rate="{}" pitch="{}">"#,
                    escape_xml(rate),
                    escape_xml(pitch)
                );
                child.write_to(out);
                out.push_str("</prosody>");
            }
            Self::Text(text) => out.push_str(&escape_xml(text)),
        }
    }
}

impl fmt::Display for SsmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

/// Everything the document depends on
///
/// `None` means the selector is at its default entry (or hidden).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SsmlSelection {
    /// Voice short name
    pub voice: String,
    /// Expressive style
    pub style: Option<String>,
    /// Role-play persona
    pub role: Option<String>,
    /// Secondary locale for the utterance
    pub secondary_locale: Option<String>,
    /// Pitch offset in percent
    pub pitch: i32,
    /// Rate offset in percent
    pub speed: i32,
    /// Utterance text, unescaped
    pub text: String,
}

/// Build the node tree for a selection
#[must_use]
pub fn build_document(selection: &SsmlSelection) -> SsmlNode {
    let mut content = SsmlNode::Text(selection.text.clone());
    if let Some(locale) = &selection.secondary_locale {
        content = SsmlNode::Lang {
            locale: locale.clone(),
            child: Box::new(content),
        };
    }

    let mut body = SsmlNode::Prosody {
        rate: format!("{}%", selection.speed),
        pitch: format!("{}%", selection.pitch),
        child: Box::new(content),
    };

    if selection.style.is_some() || selection.role.is_some() {
        body = SsmlNode::ExpressAs {
            style: selection.style.clone(),
            role: selection.role.clone(),
            child: Box::new(body),
        };
    }

    SsmlNode::Speak {
        lang: DOCUMENT_LANG.to_string(),
        child: Box::new(SsmlNode::Voice {
            name: selection.voice.clone(),
            child: Box::new(body),
        }),
    }
}

/// Build the SSML string for a selection
#[must_use]
pub fn build_ssml(selection: &SsmlSelection) -> String {
    build_document(selection).to_string()
}

/// Escape the five XML special characters
///
/// Each character is replaced exactly once, so `&` in the input never turns into
/// `&amp;amp;` and entities produced here are never re-escaped.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
