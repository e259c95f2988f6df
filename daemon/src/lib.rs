pub mod assistant;
pub mod channel;
pub mod daemon;
pub mod dialogue;
pub mod host;
pub mod keywords;
pub mod simulated;
pub mod synth;

pub use assistant::{
    Assistant, AssistantCommand, AssistantHandle, AssistantStatus, CaseSink, TranscriptSink,
};
pub use channel::{ChannelEvent, ChannelEventKind, ChannelSettings, SpeechChannel};
pub use daemon::Daemon;
pub use dialogue::{DialogueEngine, Turn, TurnOutcome};
pub use host::{SpeechError, SpeechHost, Synthesizer};
