//! Host speech capabilities.
//!
//! The channel never talks to a recognizer or a speech device directly; it
//! goes through a [`SpeechHost`], which tests replace with fakes that emit
//! recognition events on demand.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("{0} is not supported on this host")]
    Unavailable(String),

    #[error("Failed to start recognition: {0}")]
    Start(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),
}

/// Error classes reported by a recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorClass {
    /// The stream heard nothing before its silence timeout.
    NoSpeech,
    Aborted,
    AudioCapture,
    NotAllowed,
    Network,
    Other(String),
}

impl RecognitionErrorClass {
    pub fn is_transient(&self) -> bool {
        matches!(self, RecognitionErrorClass::NoSpeech)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecognitionErrorClass::NoSpeech => "no-speech",
            RecognitionErrorClass::Aborted => "aborted",
            RecognitionErrorClass::AudioCapture => "audio-capture",
            RecognitionErrorClass::NotAllowed => "not-allowed",
            RecognitionErrorClass::Network => "network",
            RecognitionErrorClass::Other(class) => class,
        }
    }
}

/// Lifecycle and result events of a continuous recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Transcript { text: String, is_final: bool },
    Error(RecognitionErrorClass),
    Ended,
}

#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
}

/// Start/stop handle for a recognition stream. Results arrive on the
/// stream's event receiver, never as return values.
pub trait RecognitionControl: Send {
    fn start(&mut self) -> Result<(), SpeechError>;
    fn stop(&mut self);
}

pub struct RecognitionStream {
    pub control: Box<dyn RecognitionControl>,
    pub events: mpsc::UnboundedReceiver<RecognitionEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Turn-based speech output.
pub trait Synthesizer: Send + Sync {
    /// Voices known so far. May be empty until the device has loaded them.
    fn voices(&self) -> Vec<Voice>;
    fn speak(&self, request: SpeechRequest);
    /// Stops the current utterance immediately without letting it finish.
    fn cancel(&self);
    fn is_speaking(&self) -> bool;
}

pub trait SpeechHost: Send + Sync {
    fn recognition(&self, settings: &RecognitionSettings) -> Result<RecognitionStream, SpeechError>;
    fn synthesizer(&self) -> Result<Arc<dyn Synthesizer>, SpeechError>;
}

/// Picks the best voice for `locale`: exact locale, then the same language,
/// then whatever comes first.
pub fn select_voice(voices: &[Voice], locale: &str) -> Option<Voice> {
    let language = locale.split('-').next().unwrap_or(locale);
    voices
        .iter()
        .find(|voice| voice.lang.eq_ignore_ascii_case(locale))
        .or_else(|| {
            voices.iter().find(|voice| {
                voice
                    .lang
                    .split('-')
                    .next()
                    .is_some_and(|lang| lang.eq_ignore_ascii_case(language))
            })
        })
        .or_else(|| voices.first())
        .cloned()
}

/// Maps an unsupported locale onto the host default.
pub fn resolve_locale<'a>(requested: &'a str, supported: &[&'a str], default: &'a str) -> &'a str {
    if supported.iter().any(|locale| locale.eq_ignore_ascii_case(requested)) {
        requested
    } else {
        log::warn!("Locale {} is not supported, falling back to {}", requested, default);
        default
    }
}
