use std::sync::Arc;

use crate::error::ClassifyError;
use crate::intent::{parse_intent, Intent};
use crate::llm::CompletionClient;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are a restaurant phone assistant analyzing what a caller said.
Classify the utterance as exactly one intent: order, booking, or question.
Reply with a single JSON object and nothing else, using one of these shapes:
{\"intent\": \"order\", \"items\": [{\"item\": \"<menu item>\", \"quantity\": <integer>}], \"special_instructions\": \"<text or null>\"}
{\"intent\": \"booking\", \"date\": \"<YYYY-MM-DD or as spoken>\", \"time\": \"<HH:MM or as spoken>\", \"party_size\": <integer>}
{\"intent\": \"question\", \"question\": \"<the caller's question>\", \"topic\": \"<short topic>\"}
Use null for anything the caller did not say.";

/// Turns transcript text into a typed [`Intent`] with one completion.
#[derive(Clone)]
pub struct IntentClassifier {
    client: Arc<dyn CompletionClient>,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// [`ClassifyError::Completion`] if the vendor call fails,
    /// [`ClassifyError::Unrecognized`] if the reply is not a known intent.
    pub async fn classify(&self, transcript: &str) -> Result<Intent, ClassifyError> {
        let prompt = format!("Caller said: {}", transcript.trim());
        let completion = self
            .client
            .complete(CLASSIFIER_SYSTEM_PROMPT, &prompt)
            .await?;

        let intent = parse_intent(&completion).inspect_err(|e| {
            tracing::warn!(error = %e, "completion did not parse as an intent");
        })?;
        tracing::debug!(intent = intent.kind(), "transcript classified");
        Ok(intent)
    }
}
