use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub ipc: IpcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Requested recognition and synthesis locale.
    pub locale: String,
    pub restart_delay_ms: u64,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Drop recognized phrases while the assistant is speaking.
    pub suppress_while_speaking: bool,
    pub silence_timeout_seconds: u64,
    pub synthesizer: SynthesizerKind,
    pub command: String,
    pub voices: Vec<VoiceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesizerKind {
    Log,
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    pub socket_path: PathBuf,
    pub timeout_seconds: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            locale: "en-IN".to_string(),
            restart_delay_ms: 100,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            suppress_while_speaking: false,
            silence_timeout_seconds: 8,
            synthesizer: SynthesizerKind::Log,
            command: "espeak-ng".to_string(),
            voices: vec![
                VoiceConfig {
                    name: "en-us".to_string(),
                    lang: "en-US".to_string(),
                },
                VoiceConfig {
                    name: "en-gb".to_string(),
                    lang: "en-GB".to_string(),
                },
                VoiceConfig {
                    name: "mr".to_string(),
                    lang: "mr-IN".to_string(),
                },
            ],
        }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/civic-intake.sock"),
            timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("civic-intake").join("config.toml"))
    }

    /// Loads the config from the default location, falling back to defaults
    /// when no file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().context("Could not find home directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).with_context(|| format!("Failed to write config {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [speech]
            locale = "mr-IN"
            restart_delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.speech.locale, "mr-IN");
        assert_eq!(config.speech.restart_delay_ms, 250);
        assert_eq!(config.speech.synthesizer, SynthesizerKind::Log);
        assert_eq!(config.ipc.socket_path, PathBuf::from("/tmp/civic-intake.sock"));
    }

    #[test]
    fn save_then_load_from_explicit_path() {
        let dir = std::env::temp_dir().join(format!("civic-intake-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.speech.synthesizer = SynthesizerKind::Command;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.speech.synthesizer, SynthesizerKind::Command);
        assert_eq!(loaded.speech.voices.len(), 3);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("civic-intake-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "speech = 12").unwrap();

        assert!(Config::load_from(&path).is_err());

        let _ = fs::remove_dir_all(dir);
    }
}
