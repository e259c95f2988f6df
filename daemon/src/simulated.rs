//! A speech host without a microphone: phrases are fed in over IPC and
//! recognized as if spoken, including the silence timeout real recognizers
//! have.

use log::{debug, info, warn};
use shared::SpeechConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::host::{
    resolve_locale, RecognitionControl, RecognitionErrorClass, RecognitionEvent,
    RecognitionSettings, RecognitionStream, SpeechError, SpeechHost, Synthesizer,
};

pub const SUPPORTED_LOCALES: &[&str] = &["en-IN", "en-US", "en-GB", "mr-IN", "hi-IN"];
pub const DEFAULT_LOCALE: &str = "en-US";

type Microphone = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

pub struct SimulatedHost {
    microphone: Microphone,
    silence_timeout: Duration,
    synthesizer: Arc<dyn Synthesizer>,
}

impl SimulatedHost {
    pub fn new(silence_timeout: Duration, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            microphone: Arc::new(Mutex::new(None)),
            silence_timeout,
            synthesizer,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(
            Duration::from_secs(config.silence_timeout_seconds),
            crate::synth::from_config(config),
        )
    }

    /// Delivers `phrase` to the running recognizer. Returns false when nothing
    /// is listening.
    pub fn hear(&self, phrase: &str) -> bool {
        let Ok(microphone) = self.microphone.lock() else {
            return false;
        };
        match microphone.as_ref() {
            Some(sink) => sink.send(phrase.to_string()).is_ok(),
            None => {
                warn!("Dropping phrase, recognizer is not listening: {}", phrase);
                false
            }
        }
    }
}

impl SpeechHost for SimulatedHost {
    fn recognition(&self, settings: &RecognitionSettings) -> Result<RecognitionStream, SpeechError> {
        let locale = resolve_locale(&settings.locale, SUPPORTED_LOCALES, DEFAULT_LOCALE);
        info!("Simulated recognition using locale {}", locale);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let control = SimulatedRecognition {
            microphone: Arc::clone(&self.microphone),
            events: events_tx,
            silence_timeout: self.silence_timeout,
            interim_results: settings.interim_results,
            running: Arc::new(AtomicBool::new(false)),
            stop: None,
        };

        Ok(RecognitionStream {
            control: Box::new(control),
            events: events_rx,
        })
    }

    fn synthesizer(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        Ok(Arc::clone(&self.synthesizer))
    }
}

struct SimulatedRecognition {
    microphone: Microphone,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    silence_timeout: Duration,
    interim_results: bool,
    running: Arc<AtomicBool>,
    stop: Option<oneshot::Sender<()>>,
}

impl RecognitionControl for SimulatedRecognition {
    fn start(&mut self) -> Result<(), SpeechError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SpeechError::Start("recognition has already started".to_string()));
        }

        let (phrase_tx, mut phrase_rx) = mpsc::unbounded_channel();
        match self.microphone.lock() {
            Ok(mut microphone) => *microphone = Some(phrase_tx),
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(SpeechError::Start("microphone state is poisoned".to_string()));
            }
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop = Some(stop_tx);

        let events = self.events.clone();
        let microphone = Arc::clone(&self.microphone);
        let running = Arc::clone(&self.running);
        let silence_timeout = self.silence_timeout;
        let interim_results = self.interim_results;

        tokio::spawn(async move {
            let _ = events.send(RecognitionEvent::Started);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    heard = tokio::time::timeout(silence_timeout, phrase_rx.recv()) => match heard {
                        Ok(Some(phrase)) => {
                            if interim_results {
                                if let Some(partial) = interim_of(&phrase) {
                                    let _ = events.send(RecognitionEvent::Transcript {
                                        text: partial,
                                        is_final: false,
                                    });
                                }
                            }
                            let _ = events.send(RecognitionEvent::Transcript {
                                text: phrase,
                                is_final: true,
                            });
                        }
                        Ok(None) => break,
                        Err(_) => {
                            debug!("No speech within {:?}", silence_timeout);
                            let _ = events.send(RecognitionEvent::Error(RecognitionErrorClass::NoSpeech));
                            break;
                        }
                    }
                }
            }

            drop(phrase_rx);
            if let Ok(mut microphone) = microphone.lock() {
                if microphone.as_ref().is_some_and(|sink| sink.is_closed()) {
                    *microphone = None;
                }
            }
            running.store(false, Ordering::SeqCst);
            let _ = events.send(RecognitionEvent::Ended);
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// First half of the phrase, as a recognizer would hypothesize mid-sentence.
fn interim_of(phrase: &str) -> Option<String> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    Some(words[..words.len() / 2].join(" "))
}
