//! The typed intent union and its parser.
//!
//! Completion text is untrusted: the model may wrap its JSON in prose or
//! code fences, change the case of the tag, send numbers as strings, or omit
//! fields. [`parse_intent`] accepts those variations and otherwise fails
//! with [`ClassifyError::Unrecognized`]; it never guesses a branch.
//!
//! Entity fields are deliberately lenient at the *field* level (a malformed
//! party size becomes `None`, a malformed order line becomes
//! [`LineRequest::Malformed`]) so that the downstream branch can ask the
//! caller to clarify instead of the whole turn failing to parse.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ClassifyError;

/// A classified caller utterance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum Intent {
    Order(OrderIntent),
    Booking(BookingIntent),
    Question(QuestionIntent),
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Order(_) => "order",
            Intent::Booking(_) => "booking",
            Intent::Question(_) => "question",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderIntent {
    #[serde(default, deserialize_with = "line_requests")]
    pub items: Vec<LineRequest>,
    #[serde(
        default,
        alias = "instructions",
        alias = "notes",
        deserialize_with = "optional_text"
    )]
    pub special_instructions: Option<String>,
}

/// One requested order line as extracted by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRequest {
    Line { item: String, quantity: u32 },
    /// Missing or non-string name, or a quantity that is not a positive integer.
    Malformed,
}

impl LineRequest {
    fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return LineRequest::Malformed;
        };
        let name = obj
            .get("item")
            .or_else(|| obj.get("name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let Some(name) = name else {
            return LineRequest::Malformed;
        };

        let quantity = match obj.get("quantity").or_else(|| obj.get("qty")) {
            None | Some(Value::Null) => Some(1),
            Some(raw) => positive_count(raw),
        };
        match quantity {
            Some(quantity) => LineRequest::Line {
                item: name.to_string(),
                quantity,
            },
            None => LineRequest::Malformed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BookingIntent {
    #[serde(default, deserialize_with = "optional_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub time: Option<String>,
    #[serde(
        default,
        alias = "guests",
        alias = "people",
        deserialize_with = "optional_count"
    )]
    pub party_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuestionIntent {
    #[serde(default, deserialize_with = "optional_text")]
    pub question: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub topic: Option<String>,
}

/// A positive integer given as a JSON number or numeric string.
fn positive_count(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}

fn line_requests<'de, D>(deserializer: D) -> Result<Vec<LineRequest>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(values) => values.iter().map(LineRequest::from_value).collect(),
        // A single object or anything else still has to be clarified.
        _ => vec![LineRequest::Malformed],
    })
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(positive_count(&Value::deserialize(deserializer)?))
}

/// Slices the outermost JSON object out of free-form completion text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses completion text into an [`Intent`].
///
/// # Errors
///
/// Returns [`ClassifyError::Unrecognized`] if no JSON object is present, the
/// `intent` tag is missing or unknown, or the entities cannot be read.
pub fn parse_intent(text: &str) -> Result<Intent, ClassifyError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ClassifyError::Unrecognized("no JSON object in completion".to_string()))?;
    let mut value: Value = serde_json::from_str(json)
        .map_err(|e| ClassifyError::Unrecognized(format!("malformed JSON: {}", e)))?;

    let obj = value
        .as_object_mut()
        .ok_or_else(|| ClassifyError::Unrecognized("completion is not an object".to_string()))?;
    let tag = obj
        .get("intent")
        .and_then(Value::as_str)
        .map(|tag| tag.trim().to_ascii_lowercase())
        .ok_or_else(|| ClassifyError::Unrecognized("missing intent tag".to_string()))?;
    obj.insert("intent".to_string(), Value::String(tag));

    serde_json::from_value(value).map_err(|e| ClassifyError::Unrecognized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_with_code_fence_and_mixed_case_tag() {
        let text = "Sure!\n```json\n{\"intent\": \"Order\", \"items\": [{\"item\": \"pizza\", \"quantity\": 2}], \"special_instructions\": \"extra cheese\"}\n```";
        let intent = parse_intent(text).unwrap();
        assert_eq!(
            intent,
            Intent::Order(OrderIntent {
                items: vec![LineRequest::Line {
                    item: "pizza".to_string(),
                    quantity: 2
                }],
                special_instructions: Some("extra cheese".to_string()),
            })
        );
        assert_eq!(intent.kind(), "order");
    }

    #[test]
    fn quantity_defaults_to_one_and_bad_lines_are_malformed() {
        let intent = parse_intent(
            r#"{"intent":"order","items":[
                {"item":"pizza"},
                {"item":"soda","quantity":"3"},
                {"item":"salad","quantity":0},
                {"item":"wings","quantity":1.5},
                {"quantity":2},
                {"item":42},
                "garlic bread"
            ]}"#,
        )
        .unwrap();
        let Intent::Order(order) = intent else {
            panic!("expected order intent");
        };
        assert_eq!(
            order.items,
            vec![
                LineRequest::Line {
                    item: "pizza".to_string(),
                    quantity: 1
                },
                LineRequest::Line {
                    item: "soda".to_string(),
                    quantity: 3
                },
                LineRequest::Malformed,
                LineRequest::Malformed,
                LineRequest::Malformed,
                LineRequest::Malformed,
                LineRequest::Malformed,
            ]
        );
    }

    #[test]
    fn notes_alias_maps_to_special_instructions() {
        let Intent::Order(order) =
            parse_intent(r#"{"intent":"order","items":[],"notes":"no onions"}"#).unwrap()
        else {
            panic!("expected order intent");
        };
        assert!(order.items.is_empty());
        assert_eq!(order.special_instructions.as_deref(), Some("no onions"));
    }

    #[test]
    fn booking_party_size_is_lenient() {
        let intent =
            parse_intent(r#"{"intent":"BOOKING","date":"2026-10-20","time":"19:30","party_size":"4"}"#)
                .unwrap();
        assert_eq!(
            intent,
            Intent::Booking(BookingIntent {
                date: Some("2026-10-20".to_string()),
                time: Some("19:30".to_string()),
                party_size: Some(4),
            })
        );

        let Intent::Booking(missing) =
            parse_intent(r#"{"intent":"booking","date":"tomorrow","party_size":"a few"}"#).unwrap()
        else {
            panic!("expected booking intent");
        };
        assert_eq!(missing.time, None);
        assert_eq!(missing.party_size, None);
    }

    #[test]
    fn question_fields_are_optional() {
        let intent = parse_intent(r#"{"intent":"question","topic":"hours"}"#).unwrap();
        assert_eq!(
            intent,
            Intent::Question(QuestionIntent {
                question: None,
                topic: Some("hours".to_string()),
            })
        );
    }

    #[test]
    fn unknown_or_missing_tag_is_unrecognized() {
        for text in [
            "I am not sure what the caller wants.",
            r#"{"items":[{"item":"pizza"}]}"#,
            r#"{"intent":"complaint"}"#,
            r#"{"intent":7}"#,
            r#"["order"]"#,
            "{not json}",
        ] {
            assert!(
                matches!(parse_intent(text), Err(ClassifyError::Unrecognized(_))),
                "should be unrecognized: {}",
                text
            );
        }
    }
}
