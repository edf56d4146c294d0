use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    /// The caller's recording could not be downloaded.
    #[error("recording download error: {0}")]
    Recording(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("audio store error: {0}")]
    AudioStore(String),
}
