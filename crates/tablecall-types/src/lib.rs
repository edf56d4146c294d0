//! Shared types for the tablecall platform.
//!
//! This crate holds the records that flow between the call pipeline and the
//! data store: restaurants and their menus, orders created from phone calls,
//! call transcripts, and table bookings. It also carries the small helpers
//! every crate needs to agree on, such as how prices are represented
//! (integer cents) and how phone numbers are compared.
//!
//! No crate in the workspace depends on anything *except* `tablecall-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

pub mod voice;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Generates a new document identifier for a persisted record.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Normalizes a phone number for comparison.
///
/// Keeps a leading `+` and every ASCII digit, dropping spaces, dashes,
/// parentheses and any other punctuation. `"+1 (555) 000-1111"` and
/// `"+15550001111"` normalize to the same value.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

/// Formats an amount of cents as a plain decimal string (`2598` -> `"25.98"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// A single item on a restaurant's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Display name, also the key callers order by.
    pub name: String,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Optional menu section ("Pizza", "Drinks", ...).
    #[serde(default)]
    pub category: Option<String>,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the item can currently be ordered.
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// A restaurant reachable through its dialed phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    /// Normalized phone number callers dial (see [`normalize_phone`]).
    pub phone: String,
    pub address: Option<String>,
    /// Opening hours keyed by day label, e.g. `{"mon": "11:00-22:00"}`.
    pub hours: BTreeMap<String, String>,
    pub menu: Vec<MenuItem>,
}

/// One validated line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Menu name of the item (canonical casing from the menu).
    pub item: String,
    pub qty: u32,
    /// Unit price in cents at the time of ordering.
    pub price_cents: i64,
    /// `price_cents * qty`.
    pub total_cents: i64,
}

/// An order persisted for a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderLine>,
    pub customer_phone: Option<String>,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
    pub notes: Option<String>,
    /// Sum of every line's `total_cents`.
    pub total_cents: i64,
}

/// The text of one recorded caller utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub restaurant_id: String,
    /// Set at most once, when the call turn produced an order.
    pub order_id: Option<String>,
    pub caller_id: String,
    pub call_text: String,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
}

/// Lifecycle state of a table booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Returns the storage label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a booking status label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown booking status: {0}")]
pub struct ParseBookingStatusError(pub String);

impl FromStr for BookingStatus {
    type Err = ParseBookingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseBookingStatusError(other.to_string())),
        }
    }
}

/// A table booking taken over the phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub restaurant_id: String,
    /// Requested date as spoken by the caller (usually `YYYY-MM-DD`).
    pub date: String,
    /// Requested time as spoken by the caller (usually `HH:MM`).
    pub time: String,
    pub party_size: u32,
    pub customer_phone: Option<String>,
    pub status: BookingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_strips_punctuation() {
        assert_eq!(normalize_phone("+1 (555) 000-1111"), "+15550001111");
        assert_eq!(normalize_phone(" 555.000.1111 "), "5550001111");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn normalize_phone_only_keeps_leading_plus() {
        assert_eq!(normalize_phone("+44+20"), "+4420");
    }

    #[test]
    fn format_cents_pads_fraction() {
        assert_eq!(format_cents(2598), "25.98");
        assert_eq!(format_cents(1205), "12.05");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(-150), "-1.50");
    }

    #[test]
    fn booking_status_round_trips_through_labels() {
        for status in [BookingStatus::Confirmed, BookingStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert_eq!(
            "pending".parse::<BookingStatus>(),
            Err(ParseBookingStatusError("pending".to_string()))
        );
    }

    #[test]
    fn menu_item_defaults_to_available() {
        let item: MenuItem =
            serde_json::from_str(r#"{"name":"Pizza","price_cents":1299}"#).unwrap();
        assert!(item.available);
        assert_eq!(item.category, None);
    }
}
