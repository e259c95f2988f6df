//! Duplex speech channel: continuous recognition in, turn-based synthesis out.
//!
//! One session task owns the recognition stream and folds its lifecycle
//! events into three outbound kinds (utterance, error, listening state).
//! The caller only flips `desired_active`; `actually_active` follows the
//! stream.

use log::{debug, error, info, warn};
use shared::SpeechConfig;
use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use uuid::Uuid;

use crate::host::{
    select_voice, RecognitionControl, RecognitionErrorClass, RecognitionEvent,
    RecognitionSettings, SpeechError, SpeechHost, SpeechRequest, Synthesizer, Voice,
};

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub locale: String,
    pub restart_delay: Duration,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub suppress_while_speaking: bool,
}

impl From<&SpeechConfig> for ChannelSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
            suppress_while_speaking: config.suppress_while_speaking,
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    Utterance(String),
    Error(String),
    ListeningChanged(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub session: Uuid,
    pub kind: ChannelEventKind,
}

struct Session {
    id: Uuid,
    desired_active: Arc<AtomicBool>,
    actually_active: Arc<AtomicBool>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Session {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }
}

pub struct SpeechChannel {
    host: Arc<dyn SpeechHost>,
    settings: ChannelSettings,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    voice: Option<Voice>,
    session: Option<Session>,
}

impl SpeechChannel {
    pub fn new(host: Arc<dyn SpeechHost>, settings: ChannelSettings) -> Self {
        Self {
            host,
            settings,
            synthesizer: None,
            voice: None,
            session: None,
        }
    }

    /// Opens a listening session. Failures are reported on `events` and
    /// leave the channel inactive; the return value is the live session id.
    pub fn activate(&mut self, events: mpsc::UnboundedSender<ChannelEvent>) -> Option<Uuid> {
        if let Some(session) = &self.session {
            if session.is_alive() {
                warn!("Speech channel already active (session {}), ignoring activate", session.id);
                return Some(session.id);
            }
            self.session = None;
        }

        let id = Uuid::new_v4();
        let report = |message: String| {
            error!("{}", message);
            let _ = events.send(ChannelEvent {
                session: id,
                kind: ChannelEventKind::Error(message),
            });
        };

        let synthesizer = match self.ensure_synthesizer() {
            Ok(synthesizer) => synthesizer,
            Err(e) => {
                report(e.to_string());
                return None;
            }
        };

        let settings = RecognitionSettings {
            locale: self.settings.locale.clone(),
            continuous: true,
            interim_results: true,
        };
        let mut stream = match self.host.recognition(&settings) {
            Ok(stream) => stream,
            Err(e) => {
                report(e.to_string());
                return None;
            }
        };

        if let Err(e) = stream.control.start() {
            report(e.to_string());
            return None;
        }

        info!("Speech channel session {} activated", id);

        let desired_active = Arc::new(AtomicBool::new(true));
        let actually_active = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = SessionTask {
            id,
            control: stream.control,
            out: events,
            desired_active: Arc::clone(&desired_active),
            actually_active: Arc::clone(&actually_active),
            synthesizer,
            restart_delay: self.settings.restart_delay,
            suppress_while_speaking: self.settings.suppress_while_speaking,
            stream_running: true,
            reported_listening: false,
        };
        let task = tokio::spawn(task.run(stream.events, stop_rx));

        self.session = Some(Session {
            id,
            desired_active,
            actually_active,
            stop_tx,
            task,
        });
        Some(id)
    }

    /// Tears the session down: no restart, no further utterances, and any
    /// in-flight speech is cut off. A no-op when nothing is active.
    pub fn deactivate(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        info!("Deactivating speech channel session {}", session.id);
        session.desired_active.store(false, Ordering::SeqCst);
        let _ = session.stop_tx.send(());

        if let Some(synthesizer) = &self.synthesizer {
            synthesizer.cancel();
        }
    }

    /// Speaks `text`, cutting off whatever is currently playing.
    pub fn speak(&mut self, text: &str) {
        let synthesizer = match self.ensure_synthesizer() {
            Ok(synthesizer) => synthesizer,
            Err(e) => {
                warn!("Cannot speak: {}", e);
                return;
            }
        };

        if self.voice.is_none() {
            self.voice = select_voice(&synthesizer.voices(), &self.settings.locale);
            if let Some(voice) = &self.voice {
                debug!("Resolved synthesis voice {} ({})", voice.name, voice.lang);
            }
        }

        synthesizer.cancel();
        synthesizer.speak(SpeechRequest {
            text: text.to_string(),
            voice: self.voice.clone(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
        });
    }

    /// Whether events tagged with `session` should still be acted on. Only
    /// `activate` and `deactivate` change the answer; a session that ended on
    /// its own still owns whatever it delivered before ending.
    pub fn is_current(&self, session: Uuid) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.id == session && s.desired_active.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.is_alive() && s.desired_active.load(Ordering::SeqCst))
    }

    pub fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.actually_active.load(Ordering::SeqCst))
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    fn ensure_synthesizer(&mut self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        if let Some(synthesizer) = &self.synthesizer {
            return Ok(Arc::clone(synthesizer));
        }
        let synthesizer = self.host.synthesizer()?;
        self.synthesizer = Some(Arc::clone(&synthesizer));
        Ok(synthesizer)
    }
}

impl Drop for SpeechChannel {
    fn drop(&mut self) {
        self.deactivate();
    }
}

enum Flow {
    Continue,
    Terminate,
}

struct SessionTask {
    id: Uuid,
    control: Box<dyn RecognitionControl>,
    out: mpsc::UnboundedSender<ChannelEvent>,
    desired_active: Arc<AtomicBool>,
    actually_active: Arc<AtomicBool>,
    synthesizer: Arc<dyn Synthesizer>,
    restart_delay: Duration,
    suppress_while_speaking: bool,
    /// A start request is outstanding or the stream is live.
    stream_running: bool,
    reported_listening: bool,
}

async fn restart_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

impl SessionTask {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<RecognitionEvent>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let mut restart: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    self.shutdown();
                    break;
                }
                _ = restart_elapsed(&mut restart) => {
                    restart = None;
                    if let Flow::Terminate = self.restart() {
                        break;
                    }
                }
                event = events.recv() => {
                    let flow = match event {
                        Some(event) => self.handle(event, &mut restart),
                        None => {
                            warn!("Recognition stream for session {} closed", self.id);
                            self.stream_running = false;
                            self.actually_active.store(false, Ordering::SeqCst);
                            self.report_stopped();
                            Flow::Terminate
                        }
                    };
                    if let Flow::Terminate = flow {
                        break;
                    }
                }
            }
        }

        debug!("Speech channel session {} finished", self.id);
    }

    fn handle(&mut self, event: RecognitionEvent, restart: &mut Option<Pin<Box<Sleep>>>) -> Flow {
        match event {
            RecognitionEvent::Started => {
                self.actually_active.store(true, Ordering::SeqCst);
                if self.wanted() && !self.reported_listening {
                    self.reported_listening = true;
                    self.emit(ChannelEventKind::ListeningChanged(true));
                }
                Flow::Continue
            }
            RecognitionEvent::Transcript { text, is_final: false } => {
                debug!("Interim hypothesis: {}", text);
                Flow::Continue
            }
            RecognitionEvent::Transcript { text, is_final: true } => {
                let text = text.trim();
                if text.is_empty() || !self.wanted() {
                    return Flow::Continue;
                }
                if self.suppress_while_speaking && self.synthesizer.is_speaking() {
                    debug!("Dropping phrase heard while speaking: {}", text);
                    return Flow::Continue;
                }
                debug!("Final phrase: {}", text);
                self.emit(ChannelEventKind::Utterance(text.to_string()));
                Flow::Continue
            }
            RecognitionEvent::Error(class) if class.is_transient() => {
                debug!("Recognition reported {}, ignoring", class.as_str());
                Flow::Continue
            }
            RecognitionEvent::Error(class) => self.fail(&class),
            RecognitionEvent::Ended => {
                self.stream_running = false;
                self.actually_active.store(false, Ordering::SeqCst);
                if !self.wanted() {
                    self.report_stopped();
                    return Flow::Terminate;
                }
                if restart.is_none() {
                    info!(
                        "Recognition ended unexpectedly, restarting in {:?}",
                        self.restart_delay
                    );
                    *restart = Some(Box::pin(sleep(self.restart_delay)));
                }
                Flow::Continue
            }
        }
    }

    fn restart(&mut self) -> Flow {
        // deactivate() may have landed while the timer was pending
        if !self.wanted() {
            return Flow::Continue;
        }
        match self.control.start() {
            Ok(()) => {
                self.stream_running = true;
                debug!("Recognition restarted for session {}", self.id);
                Flow::Continue
            }
            Err(e) => {
                error!("{}", e);
                self.emit(ChannelEventKind::Error(e.to_string()));
                self.report_stopped();
                Flow::Terminate
            }
        }
    }

    fn fail(&mut self, class: &RecognitionErrorClass) -> Flow {
        let message = format!("Speech recognition error: {}", class.as_str());
        error!("{}", message);
        self.emit(ChannelEventKind::Error(message));
        self.actually_active.store(false, Ordering::SeqCst);
        self.stream_running = false;
        self.control.stop();
        self.report_stopped();
        Flow::Terminate
    }

    fn shutdown(&mut self) {
        self.actually_active.store(false, Ordering::SeqCst);
        if self.stream_running {
            self.stream_running = false;
            self.control.stop();
        }
        self.report_stopped();
    }

    fn report_stopped(&mut self) {
        if self.reported_listening {
            self.reported_listening = false;
            self.emit(ChannelEventKind::ListeningChanged(false));
        }
    }

    fn wanted(&self) -> bool {
        self.desired_active.load(Ordering::SeqCst)
    }

    fn emit(&self, kind: ChannelEventKind) {
        let _ = self.out.send(ChannelEvent {
            session: self.id,
            kind,
        });
    }
}
