use crate::config::{OpenAiTranscriptionConfig, WhisperCppConfig};
use crate::error::VoiceError;
use crate::recording::RecordingFetcher;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for STT process execution.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// Speech recognizer gateway: recording URL in, transcript text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording_url: &str) -> Result<String, VoiceError>;
}

fn check_audio(audio: &[u8]) -> Result<(), VoiceError> {
    if audio.len() > MAX_STT_INPUT_BYTES {
        return Err(VoiceError::Transcription(format!(
            "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
            audio.len(),
            MAX_STT_INPUT_BYTES
        )));
    }
    Ok(())
}

/// OpenAI Whisper API transcriber.
#[derive(Debug, Clone)]
pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    fetcher: RecordingFetcher,
    config: OpenAiTranscriptionConfig,
}

impl WhisperApiTranscriber {
    pub fn new(
        client: reqwest::Client,
        fetcher: RecordingFetcher,
        config: OpenAiTranscriptionConfig,
    ) -> Result<Self, VoiceError> {
        if config.api_key.is_empty() {
            return Err(VoiceError::Config(
                "transcription api_key is not set".to_string(),
            ));
        }
        Ok(Self {
            client,
            fetcher,
            config,
        })
    }

    /// Sends already-downloaded audio to the transcription endpoint.
    pub async fn transcribe_audio(&self, audio: Vec<u8>) -> Result<String, VoiceError> {
        check_audio(&audio)?;

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Transcription(format!("invalid mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Transcription(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VoiceError::Transcription(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(VoiceError::Transcription(format!(
                "transcription returned {}: {}",
                status, body
            )));
        }

        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String, VoiceError> {
        let audio = self.fetcher.fetch(recording_url).await?;
        self.transcribe_audio(audio).await
    }
}

/// Local whisper.cpp transcriber. Audio is piped to the binary on stdin.
#[derive(Debug, Clone)]
pub struct WhisperCppTranscriber {
    fetcher: RecordingFetcher,
    config: WhisperCppConfig,
}

impl WhisperCppTranscriber {
    pub fn new(fetcher: RecordingFetcher, config: WhisperCppConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn transcribe_audio(&self, audio_data: &[u8]) -> Result<String, VoiceError> {
        check_audio(audio_data)?;

        // -m <model>: GGML model path; -f -: read audio from stdin; -nt: no timestamps.
        let mut child = Command::new(&self.config.binary)
            .arg("-m")
            .arg(&self.config.model_path)
            .arg("-nt")
            .arg("-f")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Transcription(format!("Failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Transcription("Failed to open stdin".to_string()))?;
        stdin
            .write_all(audio_data)
            .await
            .map_err(|e| VoiceError::Transcription(format!("Failed to write to stdin: {}", e)))?;
        drop(stdin); // EOF

        let output = tokio::time::timeout(STT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Transcription(format!(
                    "STT process timed out after {} seconds",
                    STT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Transcription(format!("Failed to read stdout: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Transcription(format!(
                "STT binary failed: {}",
                stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String, VoiceError> {
        let audio = self.fetcher.fetch(recording_url).await?;
        self.transcribe_audio(&audio).await
    }
}
