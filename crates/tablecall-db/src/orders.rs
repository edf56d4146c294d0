//! Order persistence.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tablecall_types::{new_document_id, Order, OrderLine};

use crate::error::StoreError;

/// Parameters for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub restaurant_id: String,
    pub items: Vec<OrderLine>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
}

fn map_row_to_order(row: &Row) -> rusqlite::Result<(Order, String)> {
    let items_json: String = row.get(2)?;
    Ok((
        Order {
            id: row.get(0)?,
            restaurant_id: row.get(1)?,
            items: Vec::new(),
            customer_phone: row.get(3)?,
            notes: row.get(4)?,
            total_cents: row.get(5)?,
            timestamp: row.get(6)?,
        },
        items_json,
    ))
}

fn decode(pair: (Order, String)) -> Result<Order, StoreError> {
    let (mut order, items_json) = pair;
    order.items = serde_json::from_str(&items_json)?;
    Ok(order)
}

/// Inserts an order and returns it with its generated id.
///
/// The stored total is always the sum of the line totals.
pub fn insert_order(conn: &Connection, order: &NewOrder) -> Result<Order, StoreError> {
    let id = new_document_id();
    let total_cents: i64 = order.items.iter().map(|line| line.total_cents).sum();
    let items_json = serde_json::to_string(&order.items)?;

    conn.execute(
        "INSERT INTO orders (id, restaurant_id, items_json, customer_phone, notes, total_cents, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            order.restaurant_id,
            items_json,
            order.customer_phone,
            order.notes,
            total_cents,
            order.timestamp,
        ],
    )?;

    Ok(Order {
        id,
        restaurant_id: order.restaurant_id.clone(),
        items: order.items.clone(),
        customer_phone: order.customer_phone.clone(),
        timestamp: order.timestamp.clone(),
        notes: order.notes.clone(),
        total_cents,
    })
}

/// Loads an order by id.
pub fn get_order(conn: &Connection, id: &str) -> Result<Option<Order>, StoreError> {
    conn.query_row(
        "SELECT id, restaurant_id, items_json, customer_phone, notes, total_cents, timestamp
         FROM orders WHERE id = ?1",
        [id],
        map_row_to_order,
    )
    .optional()?
    .map(decode)
    .transpose()
}

/// Lists a restaurant's orders, oldest first.
pub fn list_orders(conn: &Connection, restaurant_id: &str) -> Result<Vec<Order>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, restaurant_id, items_json, customer_phone, notes, total_cents, timestamp
         FROM orders WHERE restaurant_id = ?1 ORDER BY timestamp ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([restaurant_id], map_row_to_order)?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(decode(row?)?);
    }
    Ok(orders)
}
