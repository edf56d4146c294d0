//! Voice rendering settings.
//!
//! This module defines the parameters used when turning reply text into
//! caller-facing audio, both for the synthesis vendor and for the spoken-text
//! directive the telephony provider renders when synthesis is unavailable.

use serde::{Deserialize, Serialize};

/// Voice used by the telephony provider's built-in speech when no
/// synthesized audio is available.
pub const DEFAULT_SAY_VOICE: &str = "alice";

/// Parameters for synthesizing a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice name for the spoken-text fallback directive.
    pub say_voice: String,
    /// Vendor stability setting (0.0..=1.0).
    pub stability: f32,
    /// Vendor similarity boost setting (0.0..=1.0).
    pub similarity_boost: f32,
    /// Speech speed multiplier for local engines (1.0 is normal).
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            say_voice: DEFAULT_SAY_VOICE.to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            speed: 1.0,
        }
    }
}
