//! Wires the speech channel to the dialogue engine.
//!
//! A single task owns both. Commands and channel events are handled one at a
//! time, so a turn always sees the state left by the previous one.

use log::{debug, error, info, warn};
use shared::{Cursor, FinalizedComplaint, TranscriptEntry};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::channel::{ChannelEvent, ChannelEventKind, SpeechChannel};
use crate::dialogue::DialogueEngine;

const COMMAND_QUEUE_SIZE: usize = 32;

/// Append-only consumer of the conversation, plus user-facing notices.
pub trait TranscriptSink: Send + Sync {
    fn append(&self, entry: &TranscriptEntry);

    fn notify(&self, _message: &str) {}
}

/// Receives finalized complaints. Delivery is best effort.
pub trait CaseSink: Send + Sync {
    fn submit(&self, complaint: &FinalizedComplaint);
}

#[derive(Debug)]
pub enum AssistantCommand {
    Activate,
    Deactivate,
    Text(String),
    Restart,
    Status(oneshot::Sender<AssistantStatus>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantStatus {
    pub active: bool,
    pub listening: bool,
    pub cursor: Cursor,
    pub transcript_len: usize,
    pub cases_submitted: usize,
}

pub struct Assistant {
    channel: SpeechChannel,
    engine: DialogueEngine,
    transcript: Vec<TranscriptEntry>,
    cases_submitted: usize,
    transcript_sink: Arc<dyn TranscriptSink>,
    case_sink: Arc<dyn CaseSink>,
    listening: watch::Sender<bool>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Assistant {
    pub fn new(
        channel: SpeechChannel,
        transcript_sink: Arc<dyn TranscriptSink>,
        case_sink: Arc<dyn CaseSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (listening, _) = watch::channel(false);

        Self {
            channel,
            engine: DialogueEngine::new(),
            transcript: Vec::new(),
            cases_submitted: 0,
            transcript_sink,
            case_sink,
            listening,
            events_tx,
            events_rx,
        }
    }

    /// Listening state as last reported by the channel.
    pub fn listening(&self) -> watch::Receiver<bool> {
        self.listening.subscribe()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn spawn(self) -> (AssistantHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let task = tokio::spawn(self.run(rx));
        (AssistantHandle { tx }, task)
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<AssistantCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(AssistantCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        info!("Assistant shutting down");
        self.channel.deactivate();
        self.listening.send_replace(false);
    }

    pub fn handle_command(&mut self, command: AssistantCommand) {
        debug!("Assistant command: {:?}", command);

        match command {
            AssistantCommand::Activate => self.activate(),
            AssistantCommand::Deactivate => self.channel.deactivate(),
            AssistantCommand::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                self.take_turn(text.to_string());
            }
            AssistantCommand::Restart => {
                let prompt = self.engine.restart();
                self.respond(prompt);
            }
            AssistantCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            AssistantCommand::Shutdown => self.channel.deactivate(),
        }
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event.kind {
            ChannelEventKind::Utterance(text) => {
                if self.channel.is_current(event.session) {
                    self.take_turn(text);
                } else {
                    debug!("Discarding utterance from stale session {}", event.session);
                }
            }
            ChannelEventKind::ListeningChanged(true) => {
                if self.channel.is_current(event.session) {
                    self.listening.send_replace(true);
                }
            }
            ChannelEventKind::ListeningChanged(false) => {
                if self.channel.is_current(event.session) || !self.channel.is_active() {
                    self.listening.send_replace(false);
                }
            }
            ChannelEventKind::Error(message) => {
                error!("Speech channel: {}", message);
                self.transcript_sink.notify(&message);
            }
        }
    }

    pub fn status(&self) -> AssistantStatus {
        AssistantStatus {
            active: self.channel.is_active(),
            listening: *self.listening.borrow(),
            cursor: self.engine.cursor(),
            transcript_len: self.transcript.len(),
            cases_submitted: self.cases_submitted,
        }
    }

    fn activate(&mut self) {
        if self.channel.is_active() {
            warn!("Assistant is already active");
            return;
        }
        let greeting = self.engine.restart();
        if self.channel.activate(self.events_tx.clone()).is_some() {
            self.respond(greeting);
        }
    }

    fn take_turn(&mut self, utterance: String) {
        self.record(TranscriptEntry::user(utterance.clone()));
        let turn = self.engine.advance(&utterance);

        if let Some(complaint) = &turn.submitted {
            self.cases_submitted += 1;
            self.case_sink.submit(complaint);
        }
        self.respond(turn.reply);
    }

    fn respond(&mut self, reply: String) {
        self.record(TranscriptEntry::assistant(reply.clone()));
        if self.channel.is_active() {
            self.channel.speak(&reply);
        }
    }

    fn record(&mut self, entry: TranscriptEntry) {
        self.transcript_sink.append(&entry);
        self.transcript.push(entry);
    }
}

#[derive(Clone)]
pub struct AssistantHandle {
    tx: mpsc::Sender<AssistantCommand>,
}

impl AssistantHandle {
    pub async fn send(&self, command: AssistantCommand) -> anyhow::Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Assistant is not running"))
    }

    pub async fn status(&self) -> anyhow::Result<AssistantStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(AssistantCommand::Status(reply)).await?;
        Ok(rx.await?)
    }
}
