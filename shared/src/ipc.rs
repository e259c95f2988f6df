use serde::{Deserialize, Serialize};
use crate::types::{Cursor, FinalizedComplaint, TranscriptEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    Activate,
    Deactivate,
    /// Feeds a phrase into the simulated microphone.
    Say(String),
    /// Typed chat input, processed as a turn without recognition.
    Type(String),
    RestartConversation,
    GetStatus,
    Subscribe,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonMessage {
    Ack,
    ListeningChanged(bool),
    Transcript(TranscriptEntry),
    CaseSubmitted(FinalizedComplaint),
    Error(String),
    Status(DaemonStatus),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub listening: bool,
    pub cursor: Cursor,
    pub transcript_len: usize,
    pub cases_submitted: usize,
    pub uptime: std::time::Duration,
}

pub mod protocol {
    use super::*;
    use anyhow::Result;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// Upper bound on a single frame; anything larger is treated as a corrupt stream.
    pub const MAX_FRAME_LEN: usize = 1024 * 1024;

    pub async fn send_message<W, T>(stream: &mut W, message: &T) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        T: Serialize,
    {
        let serialized = rmp_serde::to_vec(message)?;
        let len = serialized.len() as u32;

        stream.write_all(&len.to_le_bytes()).await?;
        stream.write_all(&serialized).await?;
        stream.flush().await?;

        Ok(())
    }

    pub async fn receive_message<R, T>(stream: &mut R) -> Result<T>
    where
        R: AsyncRead + Unpin,
        T: for<'de> Deserialize<'de>,
    {
        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes).await?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            anyhow::bail!("Frame of {} bytes exceeds limit", len);
        }

        let mut buffer = vec![0u8; len];
        stream.read_exact(&mut buffer).await?;

        let message = rmp_serde::from_slice(&buffer)?;
        Ok(message)
    }
}
