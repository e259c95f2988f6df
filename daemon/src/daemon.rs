use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use shared::{
    protocol, ClientMessage, Config, DaemonMessage, DaemonStatus, FinalizedComplaint,
    TranscriptEntry,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Notify};

use crate::assistant::{Assistant, AssistantCommand, AssistantHandle, CaseSink, TranscriptSink};
use crate::channel::{ChannelSettings, SpeechChannel};
use crate::simulated::SimulatedHost;

const UPDATE_BROADCAST_CAPACITY: usize = 256;

/// Fans assistant output out to every subscribed client.
struct BroadcastSink {
    updates: broadcast::Sender<DaemonMessage>,
}

impl TranscriptSink for BroadcastSink {
    fn append(&self, entry: &TranscriptEntry) {
        let _ = self.updates.send(DaemonMessage::Transcript(entry.clone()));
    }

    fn notify(&self, message: &str) {
        let _ = self.updates.send(DaemonMessage::Error(message.to_string()));
    }
}

impl CaseSink for BroadcastSink {
    fn submit(&self, complaint: &FinalizedComplaint) {
        info!(
            "Case {} submitted: {} at {} ({} urgency)",
            complaint.case_id, complaint.issue_type, complaint.location, complaint.urgency
        );
        let _ = self.updates.send(DaemonMessage::CaseSubmitted(complaint.clone()));
    }
}

pub struct Daemon {
    config: Config,
    host: Arc<SimulatedHost>,
    assistant: AssistantHandle,
    updates: broadcast::Sender<DaemonMessage>,
    shutdown: Notify,
    start_time: Instant,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let host = Arc::new(SimulatedHost::from_config(&config.speech));
        let channel = SpeechChannel::new(host.clone(), ChannelSettings::from(&config.speech));

        let (updates, _) = broadcast::channel(UPDATE_BROADCAST_CAPACITY);
        let sink = Arc::new(BroadcastSink {
            updates: updates.clone(),
        });
        let assistant = Assistant::new(channel, sink.clone(), sink);

        let mut listening = assistant.listening();
        let listening_updates = updates.clone();
        tokio::spawn(async move {
            while listening.changed().await.is_ok() {
                let state = *listening.borrow_and_update();
                let _ = listening_updates.send(DaemonMessage::ListeningChanged(state));
            }
        });

        let (assistant, _task) = assistant.spawn();

        Self {
            config,
            host,
            assistant,
            updates,
            shutdown: Notify::new(),
            start_time: Instant::now(),
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> DaemonMessage {
        debug!("Handling client message: {:?}", message);

        let result = match message {
            ClientMessage::Activate => self.assistant.send(AssistantCommand::Activate).await,
            ClientMessage::Deactivate => self.assistant.send(AssistantCommand::Deactivate).await,
            ClientMessage::Say(phrase) => {
                if self.host.hear(&phrase) {
                    Ok(())
                } else {
                    return DaemonMessage::Error("The assistant is not listening".to_string());
                }
            }
            ClientMessage::Type(text) => self.assistant.send(AssistantCommand::Text(text)).await,
            ClientMessage::RestartConversation => {
                self.assistant.send(AssistantCommand::Restart).await
            }
            ClientMessage::GetStatus => return self.get_status().await,
            ClientMessage::Subscribe => Ok(()),
            ClientMessage::Shutdown => {
                info!("Received shutdown command");
                let _ = self.assistant.send(AssistantCommand::Shutdown).await;
                self.shutdown.notify_one();
                Ok(())
            }
        };

        match result {
            Ok(()) => DaemonMessage::Ack,
            Err(e) => DaemonMessage::Error(e.to_string()),
        }
    }

    async fn get_status(&self) -> DaemonMessage {
        match self.assistant.status().await {
            Ok(status) => DaemonMessage::Status(DaemonStatus {
                listening: status.listening,
                cursor: status.cursor,
                transcript_len: status.transcript_len,
                cases_submitted: status.cases_submitted,
                uptime: self.start_time.elapsed(),
            }),
            Err(e) => DaemonMessage::Error(e.to_string()),
        }
    }

    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let socket_path = &self.config.ipc.socket_path;
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove stale socket {:?}", socket_path))?;
        }
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind {:?}", socket_path))?;
        info!("Listening on {:?}", socket_path);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let daemon = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = daemon.handle_connection(stream).await {
                                debug!("Client connection closed: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = self.shutdown.notified() => break,
            }
        }

        let _ = std::fs::remove_file(socket_path);
        Ok(())
    }

    async fn handle_connection(&self, mut stream: UnixStream) -> Result<()> {
        loop {
            let message = protocol::receive_message::<_, ClientMessage>(&mut stream).await?;
            let subscribe = matches!(message, ClientMessage::Subscribe);
            // subscribe before acknowledging so nothing slips between the two
            let updates = subscribe.then(|| self.updates.subscribe());

            let response = self.handle_message(message).await;
            protocol::send_message(&mut stream, &response).await?;

            if let Some(updates) = updates {
                return self.stream_updates(stream, updates).await;
            }
        }
    }

    async fn stream_updates(
        &self,
        mut stream: UnixStream,
        mut updates: broadcast::Receiver<DaemonMessage>,
    ) -> Result<()> {
        loop {
            match updates.recv().await {
                Ok(update) => protocol::send_message(&mut stream, &update).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}
