use crate::audio::{wrap_pcm_as_wav, AudioClip};
use crate::config::{ElevenLabsConfig, PiperConfig};
use crate::error::VoiceError;
use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tablecall_types::voice::VoiceSettings;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for a local TTS process. The call pipeline applies its own,
/// usually much shorter, stage deadline on top.
const TTS_PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Speech synthesizer gateway: text in, playable audio out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<AudioClip, VoiceError>;
}

fn check_input(text: &str) -> Result<(), VoiceError> {
    if text.trim().is_empty() {
        return Err(VoiceError::Synthesis("text is empty".to_string()));
    }
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::Synthesis(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    Ok(())
}

/// ElevenLabs text-to-speech client. Returns MP3 audio.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsSynthesizer {
    /// Creates a client. Fails if the API key or voice id is missing.
    pub fn new(client: reqwest::Client, config: ElevenLabsConfig) -> Result<Self, VoiceError> {
        if config.api_key.is_empty() {
            return Err(VoiceError::Config("ElevenLabs api_key is not set".to_string()));
        }
        if config.voice_id.is_empty() {
            return Err(VoiceError::Config("ElevenLabs voice_id is not set".to_string()));
        }
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<AudioClip, VoiceError> {
        check_input(text)?;

        let mut payload = json!({
            "text": text,
            "voice_settings": {
                "stability": voice.stability,
                "similarity_boost": voice.similarity_boost,
            }
        });
        if let Some(model_id) = &self.config.model_id {
            payload["model_id"] = json!(model_id);
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VoiceError::Synthesis(format!(
                "ElevenLabs returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Synthesis(format!("failed to read audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(VoiceError::Synthesis("ElevenLabs returned no audio".to_string()));
        }

        tracing::debug!(bytes = bytes.len(), "ElevenLabs synthesis completed");
        Ok(AudioClip::mpeg(bytes.to_vec()))
    }
}

/// Local Piper engine. Raw PCM from the binary is wrapped as WAV.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    config: PiperConfig,
}

impl PiperSynthesizer {
    pub fn new(config: PiperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Synthesizer for PiperSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<AudioClip, VoiceError> {
        check_input(text)?;

        if !self.config.model_path.exists() {
            return Err(VoiceError::Synthesis(format!(
                "Model file not found: {:?}",
                self.config.model_path
            )));
        }
        if voice.speed < 0.1 || voice.speed > 10.0 {
            return Err(VoiceError::Config(
                "Speed must be between 0.1 and 10.0".to_string(),
            ));
        }

        let mut command = Command::new(&self.config.binary);
        command
            .arg("--model")
            .arg(&self.config.model_path)
            .arg("--output_raw")
            // Length scale is the inverse of speed.
            .arg("--length_scale")
            .arg((1.0 / voice.speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(config_path) = &self.config.config_path {
            command.arg("--config").arg(config_path);
        }
        if let Some(speaker) = self.config.speaker_id {
            command.arg("--speaker").arg(speaker.to_string());
        }

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Synthesis(format!("Failed to spawn piper: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Synthesis("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();

        // Write on a separate task so a full stdout pipe cannot deadlock us.
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(TTS_PROCESS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Synthesis(format!(
                    "piper timed out after {} seconds",
                    TTS_PROCESS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Synthesis(format!("Failed to wait for piper: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Synthesis(format!(
                    "Failed to write to piper stdin: {}",
                    e
                )))
            }
            Err(e) => return Err(VoiceError::Synthesis(format!("Stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Synthesis(format!("Piper failed: {}", stderr)));
        }
        if output.stdout.is_empty() {
            return Err(VoiceError::Synthesis("Piper produced no audio".to_string()));
        }

        Ok(AudioClip::wav(wrap_pcm_as_wav(
            &output.stdout,
            self.config.sample_rate,
        )))
    }
}

/// Synthesizer used when no engine is configured. Always fails, so every
/// reply falls back to the telephony provider's own speech.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSynthesizer;

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &VoiceSettings) -> Result<AudioClip, VoiceError> {
        Err(VoiceError::Synthesis("synthesis is disabled".to_string()))
    }
}
