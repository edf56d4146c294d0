//! Tablecall server binary.
//!
//! Loads configuration, prepares the restaurant store, builds the speech and
//! completion clients once, and serves the call webhook until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tablecall_db::{DbPool, DbRuntimeSettings};
use tablecall_intent::{IntentClassifier, OpenAiChatClient, QuestionAnswerer};
use tablecall_server::config::{self, Config, LoggingConfig};
use tablecall_server::{app, background, rate_limit::RateLimiter, seed, AppState};
use tablecall_voice::{
    AudioCache, DisabledSynthesizer, ElevenLabsSynthesizer, PiperSynthesizer, RecordingFetcher,
    SynthesisConfig, Synthesizer, Transcriber, TranscriptionConfig, WhisperApiTranscriber,
    WhisperCppTranscriber,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// First CLI argument, then `TABLECALL_CONFIG_PATH`, then `config.toml`.
fn config_path() -> (String, &'static str) {
    let from_arg = std::env::args().nth(1).filter(|arg| !arg.trim().is_empty());
    if let Some(path) = from_arg {
        return (path, "cli-arg");
    }
    match std::env::var("TABLECALL_CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => (path, "env-var"),
        _ => ("config.toml".to_string(), "default"),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_store(config: &Config) -> DbPool {
    let settings = DbRuntimeSettings {
        busy_timeout_ms: config.database.busy_timeout_ms,
        pool_max_size: config.database.pool_max_size,
        ..DbRuntimeSettings::default()
    };
    let pool = tablecall_db::create_pool(&config.database.path, settings)
        .expect("cannot open the restaurant store; check database.path");

    let conn = pool.get().expect("no store connection for startup");
    let applied = tablecall_db::run_migrations(&conn).expect("store migrations failed");
    tracing::info!(applied, path = %config.database.path, "restaurant store ready");

    if let Some(seed_path) = &config.database.seed_path {
        let seeded =
            seed::apply_seed_file(&conn, seed_path).expect("cannot apply database.seed_path");
        tracing::info!(restaurants = seeded, path = %seed_path, "seeded restaurants");
    }
    drop(conn);
    pool
}

fn synthesizer(http: &reqwest::Client, synthesis: &SynthesisConfig) -> Arc<dyn Synthesizer> {
    match synthesis {
        SynthesisConfig::Elevenlabs(eleven) => {
            match ElevenLabsSynthesizer::new(http.clone(), eleven.clone()) {
                Ok(engine) => Arc::new(engine),
                Err(e) => {
                    tracing::warn!(error = %e, "ElevenLabs unavailable, replies will use say");
                    Arc::new(DisabledSynthesizer)
                }
            }
        }
        SynthesisConfig::Piper(piper) => Arc::new(PiperSynthesizer::new(piper.clone())),
        SynthesisConfig::Disabled => {
            tracing::info!("speech synthesis disabled, replies will use say");
            Arc::new(DisabledSynthesizer)
        }
    }
}

fn transcriber(http: &reqwest::Client, config: &Config) -> Arc<dyn Transcriber> {
    let fetcher = RecordingFetcher::new(http.clone(), config.voice.recordings.clone());
    match &config.voice.transcription {
        TranscriptionConfig::Openai(openai) => Arc::new(
            WhisperApiTranscriber::new(http.clone(), fetcher, openai.clone()).expect(
                "transcription needs voice.transcription.api_key or TABLECALL_LLM_API_KEY",
            ),
        ),
        TranscriptionConfig::WhisperCpp(whisper) => {
            Arc::new(WhisperCppTranscriber::new(fetcher, whisper.clone()))
        }
    }
}

#[tokio::main]
async fn main() {
    let (path, source) = config_path();
    let config = config::load_config(Some(path.as_str())).expect("invalid configuration");
    init_tracing(&config.logging);
    tracing::info!(source, path = %path, "configuration loaded");

    let pool = open_store(&config);

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("cannot build HTTP client");
    let completion = Arc::new(
        OpenAiChatClient::new(http.clone(), config.llm.clone())
            .expect("completions need llm.api_key or TABLECALL_LLM_API_KEY"),
    );

    if config.server.public_url.is_empty() {
        tracing::warn!("server.public_url is not set; audio links in markup will be relative");
    }

    let audio_cache = AudioCache::new(
        Duration::from_secs(config.audio.ttl_secs),
        config.audio.max_entries,
    );
    tokio::spawn(background::start_audio_sweep_task(
        audio_cache.clone(),
        config.audio.sweep_interval_secs,
    ));

    let state = AppState {
        pool,
        pipeline: config.pipeline.settings(&config.server.public_url),
        voice: config.voice.settings(),
        synthesizer: synthesizer(&http, &config.voice.synthesis),
        transcriber: transcriber(&http, &config),
        classifier: IntentClassifier::new(completion.clone()),
        answerer: QuestionAnswerer::new(completion),
        audio_cache,
        rate_limiter: RateLimiter::new(),
        webhook_rate_limit: config.rate_limit.webhook_per_minute,
    };

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .expect("cannot bind the listen address; is the port in use?");
    tracing::info!(%addr, webhook = %config.pipeline.webhook_path, "tablecall server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("tablecall server stopped");
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("cannot install SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.expect("cannot listen for Ctrl+C");
                tracing::info!("SIGINT received, draining in-flight calls");
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received, draining in-flight calls");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("cannot listen for Ctrl+C");
        tracing::info!("SIGINT received, draining in-flight calls");
    }
}
