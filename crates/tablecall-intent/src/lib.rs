//! Understanding what a caller said.
//!
//! A transcript is classified into a typed [`Intent`] with one completion
//! call; order intents are then checked against a [`MenuSnapshot`] and
//! questions are answered from restaurant data by the [`QuestionAnswerer`].
//! The completion vendor sits behind [`CompletionClient`] so it can be
//! swapped or faked.

pub mod answer;
pub mod classifier;
pub mod error;
pub mod intent;
pub mod llm;
pub mod order;

pub use answer::{grounding_prompt, QuestionAnswerer};
pub use classifier::IntentClassifier;
pub use error::{ClassifyError, LlmError};
pub use intent::{parse_intent, BookingIntent, Intent, LineRequest, OrderIntent, QuestionIntent};
pub use llm::{CompletionClient, LlmConfig, OpenAiChatClient};
pub use order::{validate_order, MenuSnapshot, OrderValidation, ValidatedOrder};
