//! Builds and persists orders from classified order intents.

use tablecall_db::{get_restaurant, insert_order, link_order, NewOrder, StoreError};
use tablecall_intent::{validate_order, MenuSnapshot, OrderIntent, OrderValidation};
use tablecall_types::Order;

use crate::pipeline::{commit_to_store, PipelineError};
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Created(Order),
    /// Nothing was persisted.
    NeedsClarification { skipped: usize, matched: usize },
}

/// Validates `intent` against the restaurant's current menu and, only if
/// every line matched, persists the order and links it to the transcript.
///
/// The menu read, the insert and the transcript link share one transaction,
/// so the link is written exactly once and only for an order that exists.
/// The transaction is never abandoned: a created order is always reported
/// as created.
///
/// # Errors
///
/// `PipelineError::RestaurantNotFound` if the restaurant vanished since the
/// turn resolved it, `Store` if the transaction fails. Nothing is committed
/// on any error.
pub async fn build_order(
    state: &AppState,
    restaurant_id: &str,
    intent: &OrderIntent,
    caller: &str,
    transcript_id: &str,
) -> Result<OrderOutcome, PipelineError> {
    let restaurant_id = restaurant_id.to_string();
    let intent = intent.clone();
    let customer_phone = Some(caller.to_string()).filter(|phone| !phone.is_empty());
    let transcript_id = transcript_id.to_string();

    let outcome = commit_to_store(state, move |conn| {
        let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
        let restaurant = get_restaurant(&tx, &restaurant_id)?
            .ok_or(PipelineError::RestaurantNotFound(restaurant_id))?;

        let menu = MenuSnapshot::from_items(&restaurant.menu);
        let validated = match validate_order(&menu, &intent) {
            OrderValidation::Valid(validated) => validated,
            OrderValidation::NeedsClarification { skipped, matched } => {
                return Ok(OrderOutcome::NeedsClarification { skipped, matched });
            }
        };

        let new_order = NewOrder {
            restaurant_id: restaurant.id,
            items: validated.lines,
            customer_phone,
            notes: validated.notes,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let order = insert_order(&tx, &new_order)?;
        link_order(&tx, &transcript_id, &order.id)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(OrderOutcome::Created(order))
    })
    .await?;

    let order = match outcome {
        OrderOutcome::Created(order) => order,
        OrderOutcome::NeedsClarification { skipped, matched } => {
            tracing::info!(skipped, matched, "order needs clarification, nothing persisted");
            return Ok(OrderOutcome::NeedsClarification { skipped, matched });
        }
    };

    tracing::info!(
        order_id = %order.id,
        restaurant_id = %order.restaurant_id,
        total_cents = order.total_cents,
        "order created"
    );
    Ok(OrderOutcome::Created(order))
}
