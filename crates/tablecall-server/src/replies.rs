//! Caller-facing reply texts.

use tablecall_types::{format_cents, Booking, Order};

pub const GENERIC_GREETING: &str =
    "Hello! Welcome to our AI ordering system. How may I help you today?";
pub const RESTAURANT_NOT_FOUND: &str = "Sorry, this restaurant is not registered in our system.";
pub const NO_AUDIO_REPROMPT: &str = "I'm sorry, I couldn't hear that. Could you please repeat?";
pub const REPROMPTS_EXHAUSTED: &str =
    "I'm sorry, I still couldn't hear you. Please call back when you're ready. Goodbye.";
pub const ORDER_CLARIFICATION: &str =
    "I didn't catch some of your order details. Could you please repeat or clarify the items you want?";
pub const BOOKING_INCOMPLETE: &str =
    "I couldn't get all of the booking details. Please call back with the date and time you'd like and the number of guests.";
pub const INTENT_UNRECOGNIZED: &str =
    "I'm sorry, I didn't quite understand. Please call again and tell me whether you'd like to place an order, book a table, or ask a question.";
pub const RATE_LIMITED: &str =
    "We are receiving too many calls from your number. Please try again in a minute. Goodbye.";
pub const APOLOGY: &str =
    "We're sorry, something went wrong on our end. Please try calling again later. Goodbye.";

pub fn greeting(restaurant_name: Option<&str>) -> String {
    match restaurant_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Hello! Welcome to {}. How may I help you today?", name),
        None => GENERIC_GREETING.to_string(),
    }
}

pub fn order_confirmed(order: &Order) -> String {
    let items = order
        .items
        .iter()
        .map(|line| format!("{} {}", line.qty, line.item))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Thank you! Your order of {} has been placed. Your total is ${}.",
        items,
        format_cents(order.total_cents)
    )
}

pub fn booking_confirmed(booking: &Booking) -> String {
    let guests = if booking.party_size == 1 {
        "1 guest".to_string()
    } else {
        format!("{} guests", booking.party_size)
    };
    format!(
        "Your table for {} on {} at {} is confirmed. Thank you!",
        guests, booking.date, booking.time
    )
}
