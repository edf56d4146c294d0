#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablecall_db::{create_pool, upsert_restaurant, DbPool, DbRuntimeSettings, NewRestaurant};
use tablecall_intent::{CompletionClient, IntentClassifier, LlmError, QuestionAnswerer};
use tablecall_server::config::PipelineConfig;
use tablecall_server::{app, rate_limit::RateLimiter, AppState};
use tablecall_types::voice::VoiceSettings;
use tablecall_types::{MenuItem, Restaurant};
use tablecall_voice::{AudioCache, AudioClip, Synthesizer, Transcriber, VoiceError};
use tower::ServiceExt;

pub const RESTAURANT_PHONE: &str = "+15550001111";
pub const CALLER_PHONE: &str = "+15551234567";
pub const RECORDING_URL: &str = "https://api.twilio.com/recordings/RE123";

#[derive(Debug, Clone)]
pub enum SynthMode {
    Ok,
    Fail,
    Slow(Duration),
}

pub struct FakeSynthesizer {
    mode: SynthMode,
    pub texts: Mutex<Vec<String>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &VoiceSettings) -> Result<AudioClip, VoiceError> {
        self.texts.lock().unwrap().push(text.to_string());
        match &self.mode {
            SynthMode::Ok => Ok(AudioClip::mpeg(format!("mp3:{}", text).into_bytes())),
            SynthMode::Fail => Err(VoiceError::Synthesis("vendor down".to_string())),
            SynthMode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(AudioClip::mpeg(b"late".to_vec()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum TranscriptMode {
    Text(String),
    Fail,
    Slow(Duration),
}

pub struct FakeTranscriber {
    mode: TranscriptMode,
    pub urls: Mutex<Vec<String>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String, VoiceError> {
        self.urls.lock().unwrap().push(recording_url.to_string());
        match &self.mode {
            TranscriptMode::Text(text) => Ok(text.clone()),
            TranscriptMode::Fail => Err(VoiceError::Transcription("vendor down".to_string())),
            TranscriptMode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("too late".to_string())
            }
        }
    }
}

/// Replies to classification prompts and answer prompts separately, after
/// an optional delay.
pub struct ScriptedCompletion {
    classification: Result<String, String>,
    answer: Result<String, String>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = if prompt.starts_with("Caller said:") {
            &self.classification
        } else {
            &self.answer
        };
        reply.clone().map_err(LlmError::ApiRequestFailed)
    }
}

pub struct Fakes {
    pub synth: SynthMode,
    pub transcript: TranscriptMode,
    pub classification: Result<String, String>,
    pub answer: Result<String, String>,
    pub completion_delay: Option<Duration>,
    pub max_reprompts: u32,
    pub webhook_rate_limit: u32,
    pub pool_max_size: u32,
    pub synthesis_timeout_ms: u64,
    pub transcription_timeout_ms: u64,
    pub classification_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub call_turn_timeout_ms: u64,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            synth: SynthMode::Ok,
            transcript: TranscriptMode::Text("I'd like two pizzas please".to_string()),
            classification: Ok(
                r#"{"intent":"order","items":[{"item":"pizza","quantity":2}]}"#.to_string(),
            ),
            answer: Ok("We are open until eleven tonight.".to_string()),
            completion_delay: None,
            max_reprompts: 2,
            webhook_rate_limit: 120,
            pool_max_size: 8,
            synthesis_timeout_ms: 200,
            transcription_timeout_ms: 200,
            classification_timeout_ms: 500,
            store_timeout_ms: 2_000,
            call_turn_timeout_ms: 5_000,
        }
    }
}

pub struct Harness {
    pub app: Router,
    pub pool: DbPool,
    pub audio_cache: AudioCache,
    pub restaurant: Restaurant,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub transcriber: Arc<FakeTranscriber>,
    pub completion: Arc<ScriptedCompletion>,
    _db: tempfile::NamedTempFile,
}

pub fn harness(fakes: Fakes) -> Harness {
    // File-backed so every pooled connection sees the same data.
    let db = tempfile::NamedTempFile::new().unwrap();
    let settings = DbRuntimeSettings {
        pool_max_size: fakes.pool_max_size,
        ..DbRuntimeSettings::default()
    };
    let pool = create_pool(db.path().to_str().unwrap(), settings).unwrap();
    let restaurant = {
        let conn = pool.get().unwrap();
        tablecall_db::run_migrations(&conn).unwrap();
        upsert_restaurant(
            &conn,
            &NewRestaurant {
                name: "Luigi's".to_string(),
                phone: "+1 (555) 000-1111".to_string(),
                address: Some("1 Main St".to_string()),
                menu: vec![
                    MenuItem {
                        name: "Pizza".to_string(),
                        price_cents: 1299,
                        category: Some("mains".to_string()),
                        description: None,
                        available: true,
                    },
                    MenuItem {
                        name: "Garlic Bread".to_string(),
                        price_cents: 450,
                        category: Some("sides".to_string()),
                        description: None,
                        available: true,
                    },
                ],
                ..NewRestaurant::default()
            },
        )
        .unwrap()
    };

    let synthesizer = Arc::new(FakeSynthesizer {
        mode: fakes.synth,
        texts: Mutex::new(Vec::new()),
    });
    let transcriber = Arc::new(FakeTranscriber {
        mode: fakes.transcript,
        urls: Mutex::new(Vec::new()),
    });
    let completion = Arc::new(ScriptedCompletion {
        classification: fakes.classification,
        answer: fakes.answer,
        delay: fakes.completion_delay,
        prompts: Mutex::new(Vec::new()),
    });

    let pipeline = PipelineConfig {
        synthesis_timeout_ms: fakes.synthesis_timeout_ms,
        transcription_timeout_ms: fakes.transcription_timeout_ms,
        classification_timeout_ms: fakes.classification_timeout_ms,
        answer_timeout_ms: 500,
        store_timeout_ms: fakes.store_timeout_ms,
        call_turn_timeout_ms: fakes.call_turn_timeout_ms,
        max_reprompts: fakes.max_reprompts,
        ..PipelineConfig::default()
    };

    let audio_cache = AudioCache::new(Duration::from_secs(60), 64);
    let state = AppState {
        pool: pool.clone(),
        pipeline: pipeline.settings("https://calls.test"),
        voice: VoiceSettings::default(),
        synthesizer: synthesizer.clone(),
        transcriber: transcriber.clone(),
        classifier: IntentClassifier::new(completion.clone()),
        answerer: QuestionAnswerer::new(completion.clone()),
        audio_cache: audio_cache.clone(),
        rate_limiter: RateLimiter::new(),
        webhook_rate_limit: fakes.webhook_rate_limit,
    };

    Harness {
        app: app(state),
        pool,
        audio_cache,
        restaurant,
        synthesizer,
        transcriber,
        completion,
        _db: db,
    }
}

/// URL-encodes webhook form fields the way the provider posts them.
pub fn form_body(fields: &[(&str, &str)]) -> Vec<u8> {
    let request = reqwest::Client::new()
        .post("http://provider.test/")
        .form(fields)
        .build()
        .unwrap();
    request.body().and_then(|body| body.as_bytes()).unwrap().to_vec()
}

pub fn webhook_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form_body(fields)))
        .unwrap()
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

pub async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    Reply {
        status,
        content_type,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn post_webhook(app: &Router, uri: &str, fields: &[(&str, &str)]) -> Reply {
    send(app, webhook_request(uri, fields)).await
}

/// A ringing event to the seeded restaurant.
pub fn ringing() -> Vec<(&'static str, &'static str)> {
    vec![
        ("CallSid", "CA123"),
        ("CallStatus", "ringing"),
        ("From", CALLER_PHONE),
        ("To", RESTAURANT_PHONE),
    ]
}

/// A completed recording event to the seeded restaurant.
pub fn recorded() -> Vec<(&'static str, &'static str)> {
    vec![
        ("CallSid", "CA123"),
        ("CallStatus", "in-progress"),
        ("From", CALLER_PHONE),
        ("To", RESTAURANT_PHONE),
        ("RecordingUrl", RECORDING_URL),
    ]
}

/// Extracts every `<Play>` URL from markup.
pub fn play_urls(xml: &str) -> Vec<String> {
    xml.split("<Play>")
        .skip(1)
        .filter_map(|rest| rest.split("</Play>").next())
        .map(str::to_string)
        .collect()
}
