//! Inbound call events and their classification into call stages.

use serde::Deserialize;
use uuid::Uuid;

/// Form fields posted by the telephony provider on each call event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "CallStatus", default)]
    pub call_status: Option<String>,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    /// The restaurant number that was dialed.
    #[serde(rename = "To", default)]
    pub to: Option<String>,
    /// The caller's number.
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

/// Query parameters carried on the record action URL.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TurnQuery {
    #[serde(default)]
    pub reprompts: u32,
}

/// Which branch of the pipeline a call event drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStage {
    Greeting,
    Recorded { recording_url: String },
    NoAudio,
}

impl CallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStage::Greeting => "greeting",
            CallStage::Recorded { .. } => "recorded",
            CallStage::NoAudio => "no_audio",
        }
    }
}

/// Classifies a call event. A ringing status wins over a recording; a blank
/// recording URL counts as absent.
pub fn classify_stage(call_status: Option<&str>, recording_url: Option<&str>) -> CallStage {
    if call_status.is_some_and(|status| status.trim().eq_ignore_ascii_case("ringing")) {
        return CallStage::Greeting;
    }
    match recording_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => CallStage::Recorded {
            recording_url: url.to_string(),
        },
        None => CallStage::NoAudio,
    }
}

/// Transient state for one call turn.
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Unique per webhook request; keys every temporary resource of the turn.
    pub request_id: Uuid,
    pub caller: String,
    pub dialed: String,
    pub call_sid: Option<String>,
    pub stage: CallStage,
    /// Reprompts already issued on this call.
    pub reprompts: u32,
}

impl CallSession {
    pub fn from_event(form: &WebhookForm, query: TurnQuery) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller: form.from.clone().unwrap_or_default().trim().to_string(),
            dialed: form.to.clone().unwrap_or_default().trim().to_string(),
            call_sid: form.call_sid.clone(),
            stage: classify_stage(form.call_status.as_deref(), form.recording_url.as_deref()),
            reprompts: query.reprompts,
        }
    }

    /// Identity the webhook rate limit counts against: the caller's number,
    /// else the call sid. `None` when the event carries neither.
    pub fn rate_limit_key(&self) -> Option<&str> {
        Some(self.caller.as_str())
            .filter(|caller| !caller.is_empty())
            .or_else(|| self.call_sid.as_deref().filter(|sid| !sid.trim().is_empty()))
    }

    /// Audio store key for a piece of this turn's speech.
    pub fn audio_key(&self, purpose: &str) -> String {
        format!("{}-{}", self.request_id.simple(), purpose)
    }
}
