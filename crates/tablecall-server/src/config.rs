//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tablecall_intent::LlmConfig;
use tablecall_types::voice::{VoiceSettings, DEFAULT_SAY_VOICE};
use tablecall_voice::{ElevenLabsConfig, RecordingAuth, SynthesisConfig, TranscriptionConfig};
use thiserror::Error;

use crate::pipeline::PipelineSettings;
use crate::twiml::RecordParams;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, used for audio links in markup.
    /// Empty means links are relative.
    #[serde(default)]
    pub public_url: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// Optional TOML file of restaurants upserted at startup.
    #[serde(default)]
    pub seed_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tablecall_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Speech settings and engine selection.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// Voice for the provider's built-in speech fallback.
    #[serde(default = "default_say_voice")]
    pub say_voice: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub recordings: Option<RecordingAuth>,
}

impl VoiceConfig {
    pub fn settings(&self) -> VoiceSettings {
        VoiceSettings {
            say_voice: self.say_voice.clone(),
            stability: self.stability,
            similarity_boost: self.similarity_boost,
            speed: self.speed,
        }
    }
}

/// Call pipeline deadlines and recording parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_synthesis_timeout_ms")]
    pub synthesis_timeout_ms: u64,
    #[serde(default = "default_transcription_timeout_ms")]
    pub transcription_timeout_ms: u64,
    #[serde(default = "default_classification_timeout_ms")]
    pub classification_timeout_ms: u64,
    #[serde(default = "default_answer_timeout_ms")]
    pub answer_timeout_ms: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Ceiling for deciding a webhook turn: the restaurant lookup,
    /// transcription, the transcript insert and classification must fit in
    /// it. Branch writes run to completion after it; the reply is rendered
    /// from what is left and said without synthesis once it is spent.
    #[serde(default = "default_call_turn_timeout_ms")]
    pub call_turn_timeout_ms: u64,
    /// Reprompts allowed before the call is ended.
    #[serde(default = "default_max_reprompts")]
    pub max_reprompts: u32,
    #[serde(default = "default_record_max_length_secs")]
    pub record_max_length_secs: u32,
    #[serde(default = "default_record_timeout_secs")]
    pub record_timeout_secs: u32,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl PipelineConfig {
    /// Checks that the turn deadline covers the stages that decide a turn.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming both sides of the shortfall.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let deciding = self
            .store_timeout_ms
            .saturating_mul(2)
            .saturating_add(self.transcription_timeout_ms)
            .saturating_add(self.classification_timeout_ms);
        if self.call_turn_timeout_ms < deciding {
            return Err(ConfigError::Invalid(format!(
                "pipeline.call_turn_timeout_ms ({}) is shorter than two store accesses, \
                 transcription and classification ({} ms)",
                self.call_turn_timeout_ms, deciding
            )));
        }
        Ok(())
    }

    pub fn settings(&self, public_url: &str) -> PipelineSettings {
        PipelineSettings {
            synthesis_timeout: Duration::from_millis(self.synthesis_timeout_ms),
            transcription_timeout: Duration::from_millis(self.transcription_timeout_ms),
            classification_timeout: Duration::from_millis(self.classification_timeout_ms),
            answer_timeout: Duration::from_millis(self.answer_timeout_ms),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            call_turn_timeout: Duration::from_millis(self.call_turn_timeout_ms),
            max_reprompts: self.max_reprompts,
            record: RecordParams {
                max_length_secs: self.record_max_length_secs,
                timeout_secs: self.record_timeout_secs,
                action: self.webhook_path.clone(),
            },
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Synthesized audio retention.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_audio_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_audio_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Webhook requests allowed per caller number per minute.
    #[serde(default = "default_webhook_per_minute")]
    pub webhook_per_minute: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "tablecall.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_say_voice() -> String {
    DEFAULT_SAY_VOICE.to_string()
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity_boost() -> f32 {
    0.75
}

fn default_speed() -> f32 {
    1.0
}

fn default_synthesis_timeout_ms() -> u64 {
    4_000
}

fn default_transcription_timeout_ms() -> u64 {
    6_000
}

fn default_classification_timeout_ms() -> u64 {
    5_000
}

fn default_answer_timeout_ms() -> u64 {
    6_000
}

fn default_store_timeout_ms() -> u64 {
    1_000
}

fn default_call_turn_timeout_ms() -> u64 {
    14_000
}

fn default_max_reprompts() -> u32 {
    2
}

fn default_record_max_length_secs() -> u32 {
    30
}

fn default_record_timeout_secs() -> u32 {
    3
}

fn default_webhook_path() -> String {
    "/voice/webhook".to_string()
}

fn default_audio_ttl_secs() -> u64 {
    300
}

fn default_audio_max_entries() -> usize {
    512
}

fn default_audio_sweep_interval_secs() -> u64 {
    30
}

fn default_webhook_per_minute() -> u32 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            seed_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            say_voice: default_say_voice(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            speed: default_speed(),
            synthesis: SynthesisConfig::default(),
            transcription: TranscriptionConfig::default(),
            recordings: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            synthesis_timeout_ms: default_synthesis_timeout_ms(),
            transcription_timeout_ms: default_transcription_timeout_ms(),
            classification_timeout_ms: default_classification_timeout_ms(),
            answer_timeout_ms: default_answer_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            call_turn_timeout_ms: default_call_turn_timeout_ms(),
            max_reprompts: default_max_reprompts(),
            record_max_length_secs: default_record_max_length_secs(),
            record_timeout_secs: default_record_timeout_secs(),
            webhook_path: default_webhook_path(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_audio_ttl_secs(),
            max_entries: default_audio_max_entries(),
            sweep_interval_secs: default_audio_sweep_interval_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            webhook_per_minute: default_webhook_per_minute(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `TABLECALL_HOST` overrides `server.host`
/// - `TABLECALL_PORT` overrides `server.port`
/// - `TABLECALL_PUBLIC_URL` overrides `server.public_url`
/// - `TABLECALL_DB_PATH` overrides `database.path`
/// - `TABLECALL_LOG_LEVEL` overrides `logging.level`
/// - `TABLECALL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `TABLECALL_LLM_API_KEY`, else `OPENAI_API_KEY`, sets `llm.api_key`
/// - `TABLECALL_ELEVENLABS_API_KEY` / `TABLECALL_ELEVENLABS_VOICE_ID` fill the
///   ElevenLabs engine, enabling it when synthesis is otherwise disabled
///
/// An OpenAI transcription engine without its own key reuses `llm.api_key`.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting pipeline deadlines are inconsistent.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    config.pipeline.validate()?;
    Ok(config)
}

fn apply_env_overrides(mut config: Config, env: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = env("TABLECALL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("TABLECALL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = env("TABLECALL_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Some(db_path) = env("TABLECALL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = env("TABLECALL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("TABLECALL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(key) = env("TABLECALL_LLM_API_KEY").or_else(|| env("OPENAI_API_KEY")) {
        config.llm.api_key = key;
    }

    let eleven_key = env("TABLECALL_ELEVENLABS_API_KEY");
    let eleven_voice = env("TABLECALL_ELEVENLABS_VOICE_ID");
    if eleven_key.is_some() || eleven_voice.is_some() {
        if matches!(config.voice.synthesis, SynthesisConfig::Disabled) {
            config.voice.synthesis = SynthesisConfig::Elevenlabs(ElevenLabsConfig::default());
        }
        if let SynthesisConfig::Elevenlabs(eleven) = &mut config.voice.synthesis {
            if let Some(key) = eleven_key {
                eleven.api_key = key;
            }
            if let Some(voice_id) = eleven_voice {
                eleven.voice_id = voice_id;
            }
        }
    }

    if let TranscriptionConfig::Openai(openai) = &mut config.voice.transcription {
        if openai.api_key.is_empty() {
            openai.api_key = config.llm.api_key.clone();
        }
    }

    config
}
