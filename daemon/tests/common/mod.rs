#![allow(dead_code)]

use intake_daemon::channel::{ChannelEvent, ChannelEventKind};
use intake_daemon::host::{
    RecognitionControl, RecognitionEvent, RecognitionSettings, RecognitionStream, SpeechError,
    SpeechHost, SpeechRequest, Synthesizer, Voice,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    Start,
    Stop,
}

/// Recognition that starts and stops instantly and lets tests push any
/// other event.
struct FakeControl {
    calls: Arc<Mutex<Vec<ControlCall>>>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
}

impl RecognitionControl for FakeControl {
    fn start(&mut self) -> Result<(), SpeechError> {
        self.calls.lock().unwrap().push(ControlCall::Start);
        let _ = self.events.send(RecognitionEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push(ControlCall::Stop);
        let _ = self.events.send(RecognitionEvent::Ended);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthCall {
    Speak(String),
    Cancel,
}

#[derive(Default)]
pub struct FakeSynth {
    pub voices: Mutex<Vec<Voice>>,
    pub calls: Mutex<Vec<SynthCall>>,
    pub requests: Mutex<Vec<SpeechRequest>>,
    playing: Mutex<Option<String>>,
    pub completed: Mutex<Vec<String>>,
}

impl FakeSynth {
    /// Lets the current utterance play to the end.
    pub fn finish(&self) {
        if let Some(text) = self.playing.lock().unwrap().take() {
            self.completed.lock().unwrap().push(text);
        }
    }

    pub fn playing(&self) -> Option<String> {
        self.playing.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                SynthCall::Speak(text) => Some(text.clone()),
                SynthCall::Cancel => None,
            })
            .collect()
    }
}

impl Synthesizer for FakeSynth {
    fn voices(&self) -> Vec<Voice> {
        self.voices.lock().unwrap().clone()
    }

    fn speak(&self, request: SpeechRequest) {
        self.calls.lock().unwrap().push(SynthCall::Speak(request.text.clone()));
        *self.playing.lock().unwrap() = Some(request.text.clone());
        self.requests.lock().unwrap().push(request);
    }

    fn cancel(&self) {
        self.calls.lock().unwrap().push(SynthCall::Cancel);
        self.playing.lock().unwrap().take();
    }

    fn is_speaking(&self) -> bool {
        self.playing.lock().unwrap().is_some()
    }
}

pub struct FakeHost {
    pub recognition_available: bool,
    pub synthesis_available: bool,
    pub calls: Arc<Mutex<Vec<ControlCall>>>,
    pub synth: Arc<FakeSynth>,
    events: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            recognition_available: true,
            synthesis_available: true,
            calls: Arc::new(Mutex::new(Vec::new())),
            synth: Arc::new(FakeSynth::default()),
            events: Mutex::new(None),
        }
    }

    pub fn without_recognition() -> Self {
        Self {
            recognition_available: false,
            ..Self::new()
        }
    }

    /// Pushes an event into the most recently opened stream.
    pub fn emit(&self, event: RecognitionEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }

    pub fn say(&self, text: &str) {
        self.emit(RecognitionEvent::Transcript {
            text: text.to_string(),
            is_final: true,
        });
    }

    pub fn starts(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == ControlCall::Start)
            .count()
    }
}

impl SpeechHost for FakeHost {
    fn recognition(&self, _settings: &RecognitionSettings) -> Result<RecognitionStream, SpeechError> {
        if !self.recognition_available {
            return Err(SpeechError::Unavailable("Speech recognition".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx.clone());
        Ok(RecognitionStream {
            control: Box::new(FakeControl {
                calls: Arc::clone(&self.calls),
                events: tx,
            }),
            events: rx,
        })
    }

    fn synthesizer(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        if !self.synthesis_available {
            return Err(SpeechError::Unavailable("Speech synthesis".to_string()));
        }
        Ok(self.synth.clone())
    }
}

/// Lets spawned tasks run without reaching any real timer.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> Vec<ChannelEventKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    kinds
}

pub fn lifecycle(kinds: &[ChannelEventKind]) -> Vec<bool> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            ChannelEventKind::ListeningChanged(state) => Some(*state),
            _ => None,
        })
        .collect()
}
