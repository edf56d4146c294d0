//! Menu-aware order validation.
//!
//! Validation is all-or-nothing: a single unmatched or malformed line turns
//! the whole request into a clarification, so a partially understood order
//! is never persisted.

use std::collections::HashMap;
use tablecall_types::{MenuItem, OrderLine};

use crate::intent::{LineRequest, OrderIntent};

#[derive(Debug, Clone, PartialEq, Eq)]
struct MenuEntry {
    name: String,
    price_cents: i64,
}

/// Case-insensitive name -> price projection of a restaurant's available menu.
#[derive(Debug, Clone, Default)]
pub struct MenuSnapshot {
    entries: HashMap<String, MenuEntry>,
}

fn menu_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl MenuSnapshot {
    /// Unavailable items are left out. On duplicate names the first wins.
    pub fn from_items(items: &[MenuItem]) -> Self {
        let mut entries = HashMap::with_capacity(items.len());
        for item in items.iter().filter(|item| item.available) {
            entries.entry(menu_key(&item.name)).or_insert_with(|| MenuEntry {
                name: item.name.clone(),
                price_cents: item.price_cents,
            });
        }
        Self { entries }
    }

    /// Returns the canonical menu name and unit price.
    pub fn lookup(&self, name: &str) -> Option<(&str, i64)> {
        self.entries
            .get(&menu_key(name))
            .map(|entry| (entry.name.as_str(), entry.price_cents))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderValidation {
    Valid(ValidatedOrder),
    /// Nothing may be persisted; the caller is asked to clarify.
    NeedsClarification { skipped: usize, matched: usize },
}

/// Validates every requested line against `menu`.
pub fn validate_order(menu: &MenuSnapshot, intent: &OrderIntent) -> OrderValidation {
    let mut lines = Vec::with_capacity(intent.items.len());
    let mut skipped = 0usize;
    let mut total_cents = 0i64;

    for request in &intent.items {
        let LineRequest::Line { item, quantity } = request else {
            skipped += 1;
            continue;
        };
        let Some((name, price_cents)) = menu.lookup(item) else {
            skipped += 1;
            continue;
        };
        let line_total = price_cents
            .checked_mul(i64::from(*quantity))
            .and_then(|line| total_cents.checked_add(line).map(|sum| (line, sum)));
        let Some((line_total, running)) = line_total else {
            skipped += 1;
            continue;
        };

        total_cents = running;
        lines.push(OrderLine {
            item: name.to_string(),
            qty: *quantity,
            price_cents,
            total_cents: line_total,
        });
    }

    if skipped > 0 || lines.is_empty() {
        return OrderValidation::NeedsClarification {
            skipped,
            matched: lines.len(),
        };
    }

    OrderValidation::Valid(ValidatedOrder {
        lines,
        total_cents,
        notes: intent.special_instructions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, price_cents: i64, available: bool) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            price_cents,
            category: None,
            description: None,
            available,
        }
    }

    fn line(item: &str, quantity: u32) -> LineRequest {
        LineRequest::Line {
            item: item.to_string(),
            quantity,
        }
    }

    fn menu() -> MenuSnapshot {
        MenuSnapshot::from_items(&[
            item("Pizza", 1299, true),
            item("Garlic Bread", 450, true),
            item("Truffle Risotto", 2400, false),
        ])
    }

    #[test]
    fn two_pizzas_total_is_exact() {
        let intent = OrderIntent {
            items: vec![line("pizza", 2)],
            special_instructions: Some("extra cheese".to_string()),
        };
        let OrderValidation::Valid(order) = validate_order(&menu(), &intent) else {
            panic!("order should validate");
        };
        assert_eq!(
            order.lines,
            vec![OrderLine {
                item: "Pizza".to_string(),
                qty: 2,
                price_cents: 1299,
                total_cents: 2598,
            }]
        );
        assert_eq!(order.total_cents, 2598);
        assert_eq!(order.notes.as_deref(), Some("extra cheese"));
    }

    #[test]
    fn total_sums_every_line() {
        let intent = OrderIntent {
            items: vec![line("  GARLIC bread ", 3), line("Pizza", 1)],
            special_instructions: None,
        };
        let OrderValidation::Valid(order) = validate_order(&menu(), &intent) else {
            panic!("order should validate");
        };
        assert_eq!(order.total_cents, 450 * 3 + 1299);
        assert_eq!(
            order.total_cents,
            order.lines.iter().map(|l| l.total_cents).sum::<i64>()
        );
    }

    #[test]
    fn unknown_item_skips_whole_order() {
        let intent = OrderIntent {
            items: vec![line("unicorn steak", 1)],
            special_instructions: None,
        };
        assert_eq!(
            validate_order(&menu(), &intent),
            OrderValidation::NeedsClarification {
                skipped: 1,
                matched: 0
            }
        );
    }

    #[test]
    fn one_bad_line_spoils_valid_ones() {
        let intent = OrderIntent {
            items: vec![line("pizza", 1), LineRequest::Malformed],
            special_instructions: None,
        };
        assert_eq!(
            validate_order(&menu(), &intent),
            OrderValidation::NeedsClarification {
                skipped: 1,
                matched: 1
            }
        );
    }

    #[test]
    fn unavailable_items_do_not_match() {
        let intent = OrderIntent {
            items: vec![line("truffle risotto", 1)],
            special_instructions: None,
        };
        assert!(matches!(
            validate_order(&menu(), &intent),
            OrderValidation::NeedsClarification { skipped: 1, .. }
        ));
        assert_eq!(menu().len(), 2);
    }

    #[test]
    fn empty_order_needs_clarification() {
        assert_eq!(
            validate_order(&menu(), &OrderIntent::default()),
            OrderValidation::NeedsClarification {
                skipped: 0,
                matched: 0
            }
        );
    }

    #[test]
    fn overflowing_line_is_skipped() {
        let menu = MenuSnapshot::from_items(&[item("Gold Leaf", i64::MAX / 2, true)]);
        let intent = OrderIntent {
            items: vec![line("gold leaf", 3)],
            special_instructions: None,
        };
        assert!(matches!(
            validate_order(&menu, &intent),
            OrderValidation::NeedsClarification { skipped: 1, .. }
        ));
    }
}
