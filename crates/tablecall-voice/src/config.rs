use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

fn default_elevenlabs_url() -> String {
    DEFAULT_ELEVENLABS_URL.to_string()
}

fn default_openai_url() -> String {
    DEFAULT_OPENAI_URL.to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_piper_sample_rate() -> u32 {
    22_050
}

/// Which text-to-speech backend renders replies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SynthesisConfig {
    /// ElevenLabs hosted TTS.
    Elevenlabs(ElevenLabsConfig),
    /// Local Piper binary.
    Piper(PiperConfig),
    /// No synthesis; every reply uses the spoken-text directive.
    #[default]
    Disabled,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_elevenlabs_url")]
    pub base_url: String,
    /// Optional model override, e.g. `eleven_turbo_v2`.
    #[serde(default)]
    pub model_id: Option<String>,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: String::new(),
            base_url: default_elevenlabs_url(),
            model_id: None,
        }
    }
}

impl fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiperConfig {
    pub binary: PathBuf,
    pub model_path: PathBuf,
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub speaker_id: Option<u32>,
    /// Sample rate of the model's raw output, used for the WAV header.
    #[serde(default = "default_piper_sample_rate")]
    pub sample_rate: u32,
}

/// Which speech-to-text backend transcribes recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum TranscriptionConfig {
    /// OpenAI Whisper API.
    Openai(OpenAiTranscriptionConfig),
    /// Local whisper.cpp binary.
    WhisperCpp(WhisperCppConfig),
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self::Openai(OpenAiTranscriptionConfig::default())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiTranscriptionConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
}

impl Default for OpenAiTranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_url(),
            model: default_whisper_model(),
        }
    }
}

impl fmt::Debug for OpenAiTranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiTranscriptionConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppConfig {
    pub binary: PathBuf,
    pub model_path: PathBuf,
}

/// Credentials for downloading recordings that require basic auth.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RecordingAuth {
    pub account_sid: String,
    #[serde(skip_serializing, default)]
    pub auth_token: String,
}

impl fmt::Debug for RecordingAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingAuth")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}
