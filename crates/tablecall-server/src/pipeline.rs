//! The staged call-turn pipeline.
//!
//! A call turn runs in three phases. Deciding (restaurant lookup,
//! transcription, transcript insert, classification) runs under the overall
//! turn deadline. The chosen branch then runs; its store writes are never
//! abandoned, so the reply always matches what was committed. Finally the
//! reply is rendered from whatever budget is left, said without synthesis
//! once the budget is spent.
//!
//! Each external step carries its own deadline, and every failure is mapped
//! to the nearest recoverable reply:
//!
//! | failure | reply |
//! |---|---|
//! | synthesis error / timeout | same text via `<Say>` |
//! | transcription error / timeout / empty | reprompt + re-record (bounded) |
//! | classification error / timeout | clarification + hangup |
//! | store, answer, overall deadline | apology + hangup |
//!
//! The webhook therefore always answers with markup.

use rusqlite::Connection;
use std::future::Future;
use std::time::{Duration, Instant};
use tablecall_db::{find_restaurant_by_phone, insert_transcript, DbPool, NewTranscript, StoreError};
use tablecall_intent::{Intent, LlmError};
use tablecall_types::{Restaurant, Transcript};
use tablecall_voice::AudioLease;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::call::{CallSession, CallStage};
use crate::intent_router;
use crate::replies;
use crate::twiml::{RecordParams, VoiceResponse};
use crate::AppState;

/// Runtime deadlines and recording parameters for call turns.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub synthesis_timeout: Duration,
    pub transcription_timeout: Duration,
    pub classification_timeout: Duration,
    pub answer_timeout: Duration,
    pub store_timeout: Duration,
    pub call_turn_timeout: Duration,
    pub max_reprompts: u32,
    /// `action` is the bare webhook path; the reprompt count is appended per turn.
    pub record: RecordParams,
    /// Base for audio URLs, without trailing slash. Empty yields relative URLs.
    pub public_url: String,
}

/// Failures that end a call turn with an apology.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("restaurant not found: {0}")]
    RestaurantNotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
    #[error("{0} stage timed out")]
    StageTimeout(&'static str),
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Store(e.to_string())
    }
}

/// Wall-clock budget shared by every stage of one call turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnBudget {
    deadline: tokio::time::Instant,
}

impl TurnBudget {
    pub fn starting_now(limit: Duration) -> Self {
        Self {
            deadline: tokio::time::Instant::now() + limit,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline
            .saturating_duration_since(tokio::time::Instant::now())
    }

    /// `limit`, shortened to what is left of the turn.
    pub fn cap(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }
}

/// Awaits `fut` for at most `limit`.
pub(crate) async fn with_deadline<F: Future>(
    stage: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(
            stage,
            timeout_ms = limit.as_millis() as u64,
            "stage deadline expired"
        );
        PipelineError::StageTimeout(stage)
    })
}

fn spawn_store<T, F>(pool: DbPool, op: F) -> JoinHandle<Result<T, PipelineError>>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| PipelineError::Store(format!("pool error: {}", e)))?;
        op(&conn)
    })
}

/// Runs a blocking store operation on a pooled connection under the store
/// deadline. An expired deadline abandons the result; the statement itself
/// runs to completion on the blocking pool.
pub(crate) async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, PipelineError> + Send + 'static,
{
    let task = spawn_store(state.pool.clone(), op);
    with_deadline("store", state.pipeline.store_timeout, task)
        .await?
        .map_err(|e| PipelineError::Store(format!("store task failed: {}", e)))?
}

/// Runs a store write to completion and reports its real outcome. Pool
/// checkout and the connection busy timeout bound the wait.
pub(crate) async fn commit_to_store<T, F>(state: &AppState, op: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, PipelineError> + Send + 'static,
{
    spawn_store(state.pool.clone(), op)
        .await
        .map_err(|e| PipelineError::Store(format!("store task failed: {}", e)))?
}

/// Markup under construction plus the audio leases it references.
///
/// Leases are published only by [`TurnReply::into_xml`]; dropping the reply
/// on any other path releases its audio.
#[derive(Debug, Default)]
pub struct TurnReply {
    response: VoiceResponse,
    leases: Vec<AudioLease>,
}

impl TurnReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_xml(self) -> String {
        let xml = self.response.to_xml();
        for lease in self.leases {
            lease.publish();
        }
        xml
    }

    /// Synthesizes `text` and plays it, or says the same text if synthesis
    /// fails, outlasts the turn budget or cannot be stored.
    async fn speak(
        &mut self,
        state: &AppState,
        session: &CallSession,
        budget: TurnBudget,
        purpose: &str,
        text: &str,
    ) {
        let limit = budget.cap(state.pipeline.synthesis_timeout);
        if limit.is_zero() {
            tracing::warn!(purpose, "turn budget spent, saying reply without synthesis");
            self.response.say(text, &state.voice.say_voice);
            return;
        }

        let synthesized = with_deadline(
            "synthesis",
            limit,
            state.synthesizer.synthesize(text, &state.voice),
        )
        .await;

        let clip = match synthesized {
            Ok(Ok(clip)) => clip,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, purpose, "synthesis failed, falling back to say");
                self.response.say(text, &state.voice.say_voice);
                return;
            }
            Err(_) => {
                self.response.say(text, &state.voice.say_voice);
                return;
            }
        };

        match state.audio_cache.lease(session.audio_key(purpose), clip) {
            Ok(lease) => {
                self.response
                    .play(audio_url(&state.pipeline.public_url, lease.key()));
                self.leases.push(lease);
            }
            Err(e) => {
                tracing::warn!(error = %e, purpose, "audio store rejected clip, falling back to say");
                self.response.say(text, &state.voice.say_voice);
            }
        }
    }
}

/// Speech a turn has settled on, rendered after every decision is made.
enum Script {
    /// Say-only markup that needs no synthesis.
    Ready(TurnReply),
    /// Greeting followed by the first recording.
    Greet(String),
    /// Speak and hang up.
    Farewell { purpose: &'static str, text: String },
}

enum TurnPlan {
    Speak(Script),
    /// A classified utterance awaiting its branch.
    Dispatch {
        restaurant: Restaurant,
        transcript: Transcript,
        intent: Intent,
    },
}

impl TurnPlan {
    fn farewell(purpose: &'static str, text: impl Into<String>) -> Self {
        TurnPlan::Speak(Script::Farewell {
            purpose,
            text: text.into(),
        })
    }
}

pub fn audio_url(public_url: &str, key: &str) -> String {
    format!("{}/voice/audio/{}", public_url, key)
}

/// Record action URL carrying the reprompt count forward.
pub fn record_action(base: &str, reprompts: u32) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}reprompts={}", base, separator, reprompts)
}

fn record_params(state: &AppState, reprompts: u32) -> RecordParams {
    RecordParams {
        action: record_action(&state.pipeline.record.action, reprompts),
        ..state.pipeline.record.clone()
    }
}

/// Says `text` and hangs up, without synthesis.
pub fn say_and_hang_up(state: &AppState, text: &str) -> String {
    let mut response = VoiceResponse::new();
    response.say(text, &state.voice.say_voice).hangup();
    response.to_xml()
}

/// Apology and hangup, without synthesis.
pub fn apology_xml(state: &AppState) -> String {
    say_and_hang_up(state, replies::APOLOGY)
}

/// Runs one call turn and returns the markup to send back.
pub async fn run_call_turn(state: &AppState, session: &CallSession) -> String {
    let started = Instant::now();
    let xml = turn_xml(state, session).await;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "call turn complete"
    );
    xml
}

async fn turn_xml(state: &AppState, session: &CallSession) -> String {
    let budget = TurnBudget::starting_now(state.pipeline.call_turn_timeout);

    let plan = match tokio::time::timeout_at(budget.deadline, plan_turn(state, session)).await {
        Ok(Ok(plan)) => plan,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "call turn failed, apologizing");
            return apology_xml(state);
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = state.pipeline.call_turn_timeout.as_millis() as u64,
                "call turn deadline expired, apologizing"
            );
            return apology_xml(state);
        }
    };

    let script = match plan {
        TurnPlan::Speak(script) => script,
        TurnPlan::Dispatch {
            restaurant,
            transcript,
            intent,
        } => {
            let routed =
                intent_router::route(state, session, budget, &restaurant, &transcript, intent)
                    .await;
            match routed {
                Ok(outcome) => Script::Farewell {
                    purpose: "reply",
                    text: outcome.reply_text(),
                },
                Err(PipelineError::RestaurantNotFound(id)) => {
                    tracing::warn!(restaurant_id = %id, "restaurant vanished mid-turn");
                    Script::Farewell {
                        purpose: "error",
                        text: replies::RESTAURANT_NOT_FOUND.to_string(),
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "intent branch failed, apologizing");
                    return apology_xml(state);
                }
            }
        }
    };

    render(state, session, budget, script).await.into_xml()
}

async fn render(
    state: &AppState,
    session: &CallSession,
    budget: TurnBudget,
    script: Script,
) -> TurnReply {
    match script {
        Script::Ready(reply) => reply,
        Script::Greet(text) => {
            let mut reply = TurnReply::new();
            reply.speak(state, session, budget, "greeting", &text).await;
            reply.response.record(record_params(state, 0));
            reply
        }
        Script::Farewell { purpose, text } => {
            let mut reply = TurnReply::new();
            reply.speak(state, session, budget, purpose, &text).await;
            reply.response.hangup();
            reply
        }
    }
}

async fn plan_turn(state: &AppState, session: &CallSession) -> Result<TurnPlan, PipelineError> {
    match &session.stage {
        CallStage::Greeting => Ok(greet(state, session).await),
        CallStage::Recorded { recording_url } => {
            handle_recording(state, session, recording_url).await
        }
        CallStage::NoAudio => Ok(TurnPlan::Speak(Script::Ready(reprompt_or_goodbye(
            state, session,
        )))),
    }
}

/// Lookup failures fall back to the generic greeting; this stage never
/// hangs up.
async fn greet(state: &AppState, session: &CallSession) -> TurnPlan {
    let dialed = session.dialed.clone();
    let name = match with_store(state, move |conn| {
        Ok(find_restaurant_by_phone(conn, &dialed)?.map(|r| r.name))
    })
    .await
    {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(error = %e, "restaurant lookup failed, using generic greeting");
            None
        }
    };
    TurnPlan::Speak(Script::Greet(replies::greeting(name.as_deref())))
}

/// Asks the caller to repeat while reprompts remain, otherwise says goodbye.
fn reprompt_or_goodbye(state: &AppState, session: &CallSession) -> TurnReply {
    let mut reply = TurnReply::new();
    if session.reprompts < state.pipeline.max_reprompts {
        reply
            .response
            .say(replies::NO_AUDIO_REPROMPT, &state.voice.say_voice)
            .record(record_params(state, session.reprompts + 1));
    } else {
        tracing::info!(reprompts = session.reprompts, "reprompts exhausted, hanging up");
        reply
            .response
            .say(replies::REPROMPTS_EXHAUSTED, &state.voice.say_voice)
            .hangup();
    }
    reply
}

async fn handle_recording(
    state: &AppState,
    session: &CallSession,
    recording_url: &str,
) -> Result<TurnPlan, PipelineError> {
    let dialed = session.dialed.clone();
    let restaurant =
        with_store(state, move |conn| Ok(find_restaurant_by_phone(conn, &dialed)?)).await?;
    let Some(restaurant) = restaurant else {
        tracing::info!(dialed = %session.dialed, "no restaurant for dialed number");
        return Ok(TurnPlan::farewell("error", replies::RESTAURANT_NOT_FOUND));
    };
    tracing::debug!(restaurant_id = %restaurant.id, "restaurant resolved");

    let reprompt = || TurnPlan::Speak(Script::Ready(reprompt_or_goodbye(state, session)));
    let transcribed = with_deadline(
        "transcription",
        state.pipeline.transcription_timeout,
        state.transcriber.transcribe(recording_url),
    )
    .await;
    let text = match transcribed {
        Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(Ok(_)) => {
            tracing::warn!("empty transcript, reprompting");
            return Ok(reprompt());
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "transcription failed, reprompting");
            return Ok(reprompt());
        }
        Err(_) => return Ok(reprompt()),
    };

    let new_transcript = NewTranscript {
        restaurant_id: restaurant.id.clone(),
        caller_id: session.caller.clone(),
        call_text: text.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    let transcript =
        with_store(state, move |conn| Ok(insert_transcript(conn, &new_transcript)?)).await?;

    let classified = with_deadline(
        "classification",
        state.pipeline.classification_timeout,
        state.classifier.classify(&text),
    )
    .await;
    match classified {
        Ok(Ok(intent)) => Ok(TurnPlan::Dispatch {
            restaurant,
            transcript,
            intent,
        }),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, transcript_id = %transcript.id, "intent unrecognized");
            Ok(TurnPlan::farewell("reply", replies::INTENT_UNRECOGNIZED))
        }
        Err(_) => Ok(TurnPlan::farewell("reply", replies::INTENT_UNRECOGNIZED)),
    }
}
