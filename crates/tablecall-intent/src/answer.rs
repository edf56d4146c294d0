use std::sync::Arc;
use tablecall_types::{format_cents, Restaurant};

use crate::error::LlmError;
use crate::llm::CompletionClient;

const ANSWER_SYSTEM_PROMPT: &str = "\
You are a helpful restaurant assistant answering a caller on the phone.
Answer in one or two short spoken sentences using only the restaurant information provided.
If the information does not contain the answer, say you are not sure and suggest calling back later.";

/// Builds the prompt that grounds an answer in the restaurant's profile.
pub fn grounding_prompt(restaurant: &Restaurant, question: &str) -> String {
    let mut prompt = String::from("Restaurant information:\n");
    prompt.push_str(&format!("Name: {}\n", restaurant.name));
    if let Some(address) = &restaurant.address {
        prompt.push_str(&format!("Address: {}\n", address));
    }

    if restaurant.hours.is_empty() {
        prompt.push_str("Hours: not listed\n");
    } else {
        prompt.push_str("Hours:\n");
        for (day, hours) in &restaurant.hours {
            prompt.push_str(&format!("- {}: {}\n", day, hours));
        }
    }

    prompt.push_str("Menu:\n");
    for item in restaurant.menu.iter().filter(|item| item.available) {
        prompt.push_str(&format!("- {} (${})", item.name, format_cents(item.price_cents)));
        if let Some(description) = &item.description {
            prompt.push_str(&format!(": {}", description));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nQuestion: {}", question.trim()));
    prompt
}

/// Answers caller questions with a completion grounded in restaurant data.
#[derive(Clone)]
pub struct QuestionAnswerer {
    client: Arc<dyn CompletionClient>,
}

impl QuestionAnswerer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub async fn answer(&self, restaurant: &Restaurant, question: &str) -> Result<String, LlmError> {
        let prompt = grounding_prompt(restaurant, question);
        let answer = self.client.complete(ANSWER_SYSTEM_PROMPT, &prompt).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(LlmError::InvalidResponse("empty answer".to_string()));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tablecall_types::MenuItem;

    fn restaurant() -> Restaurant {
        let mut hours = BTreeMap::new();
        hours.insert("fri".to_string(), "11:00-23:00".to_string());
        Restaurant {
            id: "r1".to_string(),
            name: "Luigi's".to_string(),
            phone: "+15550001111".to_string(),
            address: Some("1 Main St".to_string()),
            hours,
            menu: vec![
                MenuItem {
                    name: "Pizza".to_string(),
                    price_cents: 1299,
                    category: None,
                    description: Some("wood fired".to_string()),
                    available: true,
                },
                MenuItem {
                    name: "Seasonal Soup".to_string(),
                    price_cents: 700,
                    category: None,
                    description: None,
                    available: false,
                },
            ],
        }
    }

    #[test]
    fn prompt_lists_profile_and_available_menu() {
        let prompt = grounding_prompt(&restaurant(), " Are you open late on Friday? ");
        assert!(prompt.contains("Name: Luigi's"));
        assert!(prompt.contains("Address: 1 Main St"));
        assert!(prompt.contains("- fri: 11:00-23:00"));
        assert!(prompt.contains("- Pizza ($12.99): wood fired"));
        assert!(!prompt.contains("Seasonal Soup"));
        assert!(prompt.ends_with("Question: Are you open late on Friday?"));
    }

    struct Echo(&'static str);

    #[async_trait::async_trait]
    impl CompletionClient for Echo {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn answer_is_trimmed_and_must_be_non_empty() {
        let answerer = QuestionAnswerer::new(Arc::new(Echo("  We close at 11pm.\n")));
        assert_eq!(
            answerer.answer(&restaurant(), "closing?").await.unwrap(),
            "We close at 11pm."
        );

        let blank = QuestionAnswerer::new(Arc::new(Echo("   ")));
        assert!(matches!(
            blank.answer(&restaurant(), "closing?").await,
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
