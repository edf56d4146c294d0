//! Speech gateways for the call pipeline.
//!
//! [`Synthesizer`] turns reply text into playable audio and [`Transcriber`]
//! turns a call recording into text. Hosted (ElevenLabs, OpenAI Whisper) and
//! local (Piper, whisper.cpp) engines sit behind the same traits so the
//! server can swap them by configuration. Synthesized clips are parked in an
//! [`AudioCache`] until the telephony provider fetches them.

pub mod audio;
pub mod config;
pub mod error;
pub mod recording;
pub mod stt;
pub mod tts;

pub use audio::{wrap_pcm_as_wav, AudioCache, AudioClip, AudioLease};
pub use config::{
    ElevenLabsConfig, OpenAiTranscriptionConfig, PiperConfig, RecordingAuth, SynthesisConfig,
    TranscriptionConfig, WhisperCppConfig,
};
pub use error::VoiceError;
pub use recording::{RecordingFetcher, MAX_RECORDING_BYTES};
pub use stt::{Transcriber, WhisperApiTranscriber, WhisperCppTranscriber};
pub use tts::{DisabledSynthesizer, ElevenLabsSynthesizer, PiperSynthesizer, Synthesizer};
