//! Dispatches a classified intent to its branch.
//!
//! Only the order branch touches the transcript, and only when an order is
//! actually created. Branch writes run to completion; the question branch is
//! bounded by what is left of the turn.

use tablecall_db::{insert_booking, NewBooking};
use tablecall_intent::{BookingIntent, Intent, QuestionIntent};
use tablecall_types::{Booking, Order, Restaurant, Transcript};

use crate::call::CallSession;
use crate::order_builder::{build_order, OrderOutcome};
use crate::pipeline::{commit_to_store, with_deadline, PipelineError, TurnBudget};
use crate::replies;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    OrderCreated(Order),
    OrderNeedsClarification { skipped: usize },
    BookingConfirmed(Booking),
    /// Date, time or party size missing; nothing persisted.
    BookingIncomplete,
    Answered(String),
}

impl RouteOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            RouteOutcome::OrderCreated(order) => replies::order_confirmed(order),
            RouteOutcome::OrderNeedsClarification { .. } => replies::ORDER_CLARIFICATION.to_string(),
            RouteOutcome::BookingConfirmed(booking) => replies::booking_confirmed(booking),
            RouteOutcome::BookingIncomplete => replies::BOOKING_INCOMPLETE.to_string(),
            RouteOutcome::Answered(answer) => answer.clone(),
        }
    }
}

pub async fn route(
    state: &AppState,
    session: &CallSession,
    budget: TurnBudget,
    restaurant: &Restaurant,
    transcript: &Transcript,
    intent: Intent,
) -> Result<RouteOutcome, PipelineError> {
    tracing::info!(intent = intent.kind(), transcript_id = %transcript.id, "routing intent");
    match intent {
        Intent::Order(order) => {
            match build_order(state, &restaurant.id, &order, &session.caller, &transcript.id).await? {
                OrderOutcome::Created(order) => Ok(RouteOutcome::OrderCreated(order)),
                OrderOutcome::NeedsClarification { skipped, .. } => {
                    Ok(RouteOutcome::OrderNeedsClarification { skipped })
                }
            }
        }
        Intent::Booking(booking) => book_table(state, session, restaurant, booking).await,
        Intent::Question(question) => {
            answer_question(state, budget, restaurant, transcript, question).await
        }
    }
}

async fn book_table(
    state: &AppState,
    session: &CallSession,
    restaurant: &Restaurant,
    booking: BookingIntent,
) -> Result<RouteOutcome, PipelineError> {
    let (Some(date), Some(time), Some(party_size)) = (booking.date, booking.time, booking.party_size)
    else {
        tracing::info!("booking details incomplete, nothing persisted");
        return Ok(RouteOutcome::BookingIncomplete);
    };

    let new_booking = NewBooking {
        restaurant_id: restaurant.id.clone(),
        date,
        time,
        party_size,
        customer_phone: Some(session.caller.clone()).filter(|phone| !phone.is_empty()),
    };
    let booking =
        commit_to_store(state, move |conn| Ok(insert_booking(conn, &new_booking)?)).await?;
    tracing::info!(booking_id = %booking.id, party_size = booking.party_size, "booking confirmed");
    Ok(RouteOutcome::BookingConfirmed(booking))
}

async fn answer_question(
    state: &AppState,
    budget: TurnBudget,
    restaurant: &Restaurant,
    transcript: &Transcript,
    question: QuestionIntent,
) -> Result<RouteOutcome, PipelineError> {
    let text = question
        .question
        .unwrap_or_else(|| transcript.call_text.clone());
    let answer = with_deadline(
        "answer",
        budget.cap(state.pipeline.answer_timeout),
        state.answerer.answer(restaurant, &text),
    )
    .await??;
    Ok(RouteOutcome::Answered(answer))
}
