use log::{debug, info, warn};
use shared::{SpeechConfig, SynthesizerKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::host::{SpeechRequest, Synthesizer, Voice};

/// Words per minute at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 160.0;

/// Holds the one utterance that may be playing at a time.
#[derive(Default)]
struct Playback {
    current: Mutex<Option<JoinHandle<()>>>,
}

impl Playback {
    fn replace(&self, handle: JoinHandle<()>) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(handle) {
                previous.abort();
            }
        }
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(handle) = current.take() {
                if !handle.is_finished() {
                    debug!("Cancelling speech output");
                }
                handle.abort();
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.current
            .lock()
            .map(|current| current.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }
}

pub fn playback_duration(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count().max(1) as f32;
    let rate = if rate > 0.0 { rate } else { 1.0 };
    Duration::from_secs_f32(words * 60.0 / (BASE_WORDS_PER_MINUTE * rate))
}

fn voices_from_config(config: &SpeechConfig) -> Vec<Voice> {
    config
        .voices
        .iter()
        .map(|voice| Voice {
            name: voice.name.clone(),
            lang: voice.lang.clone(),
        })
        .collect()
}

/// Writes spoken text to the log and holds the output for as long as it
/// would take to say it.
pub struct LogSynthesizer {
    voices: Vec<Voice>,
    playback: Playback,
}

impl LogSynthesizer {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            playback: Playback::default(),
        }
    }
}

impl Synthesizer for LogSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, request: SpeechRequest) {
        let duration = playback_duration(&request.text, request.rate);
        let handle = tokio::spawn(async move {
            let voice = request.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default");
            info!("Speaking [{}]: {}", voice, request.text);
            tokio::time::sleep(duration).await;
            debug!("Finished speaking after {:?}", duration);
        });
        self.playback.replace(handle);
    }

    fn cancel(&self) {
        self.playback.cancel();
    }

    fn is_speaking(&self) -> bool {
        self.playback.is_playing()
    }
}

/// Runs an external TTS program (espeak-ng compatible flags) per utterance.
/// Cancelling kills the child process.
pub struct CommandSynthesizer {
    program: String,
    voices: Vec<Voice>,
    playback: Playback,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, voices: Vec<Voice>) -> Self {
        Self {
            program: program.into(),
            voices,
            playback: Playback::default(),
        }
    }
}

impl Synthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&self, request: SpeechRequest) {
        let mut command = Command::new(&self.program);
        command.args(command_args(&request)).kill_on_drop(true);

        let program = self.program.clone();
        let handle = tokio::spawn(async move {
            match command.status().await {
                Ok(status) if status.success() => debug!("{} finished speaking", program),
                Ok(status) => warn!("{} exited with {}", program, status),
                Err(e) => warn!("Failed to run {}: {}", program, e),
            }
        });
        self.playback.replace(handle);
    }

    fn cancel(&self) {
        self.playback.cancel();
    }

    fn is_speaking(&self) -> bool {
        self.playback.is_playing()
    }
}

/// espeak-ng arguments for one utterance. The text always follows `--`, so
/// a reply starting with `-` is spoken rather than parsed as a flag.
fn command_args(request: &SpeechRequest) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(voice) = &request.voice {
        args.push("-v".to_string());
        args.push(voice.name.clone());
    }
    args.extend([
        "-s".to_string(),
        ((BASE_WORDS_PER_MINUTE * request.rate).round() as u32).to_string(),
        "-p".to_string(),
        ((50.0 * request.pitch).round().clamp(0.0, 99.0) as u32).to_string(),
        "-a".to_string(),
        ((100.0 * request.volume).round().clamp(0.0, 200.0) as u32).to_string(),
        "--".to_string(),
        request.text.clone(),
    ]);
    args
}

pub fn from_config(config: &SpeechConfig) -> Arc<dyn Synthesizer> {
    let voices = voices_from_config(config);
    match config.synthesizer {
        SynthesizerKind::Log => Arc::new(LogSynthesizer::new(voices)),
        SynthesizerKind::Command => Arc::new(CommandSynthesizer::new(config.command.clone(), voices)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.to_string(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn duration_scales_with_words_and_rate() {
        let slow = playback_duration("one two three four", 1.0);
        let fast = playback_duration("one two three four", 2.0);
        assert!(fast < slow);
        assert_eq!(playback_duration("", 1.0), playback_duration("word", 1.0));
    }

    #[test]
    fn command_text_is_never_read_as_a_flag() {
        let mut speech = request("-v something odd");
        speech.voice = Some(Voice {
            name: "mr".to_string(),
            lang: "mr-IN".to_string(),
        });

        let args = command_args(&speech);
        assert_eq!(&args[..2], ["-v", "mr"]);
        assert_eq!(&args[args.len() - 2..], ["--", "-v something odd"]);
        assert_eq!(args[3], "160");
    }

    #[tokio::test(start_paused = true)]
    async fn new_utterance_cuts_off_the_previous_one() {
        let synth = LogSynthesizer::new(Vec::new());
        synth.speak(request("a fairly long sentence that takes a while to say"));
        tokio::task::yield_now().await;
        assert!(synth.is_speaking());

        synth.cancel();
        tokio::task::yield_now().await;
        assert!(!synth.is_speaking());

        synth.speak(request("short"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!synth.is_speaking());
    }
}
