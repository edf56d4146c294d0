//! Restaurant and menu persistence.
//!
//! Restaurants are looked up by the number a caller dialed. Phones are stored
//! normalized (see [`tablecall_types::normalize_phone`]) and lookups normalize
//! their input the same way.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use tablecall_types::{new_document_id, normalize_phone, MenuItem, Restaurant};

use crate::error::StoreError;

/// Parameters for creating or replacing a restaurant.
#[derive(Debug, Clone, Default)]
pub struct NewRestaurant {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub hours: BTreeMap<String, String>,
    pub menu: Vec<MenuItem>,
}

struct RestaurantRow {
    id: String,
    name: String,
    phone: String,
    address: Option<String>,
    hours_json: String,
}

fn map_restaurant_row(row: &Row) -> rusqlite::Result<RestaurantRow> {
    Ok(RestaurantRow {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        address: row.get(3)?,
        hours_json: row.get(4)?,
    })
}

fn load_menu(conn: &Connection, restaurant_id: &str) -> Result<Vec<MenuItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, price_cents, category, description, available
         FROM menu_items WHERE restaurant_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map([restaurant_id], |row| {
        Ok(MenuItem {
            name: row.get(0)?,
            price_cents: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            available: row.get(4)?,
        })
    })?;

    let mut menu = Vec::new();
    for item in rows {
        menu.push(item?);
    }
    Ok(menu)
}

fn hydrate(conn: &Connection, row: RestaurantRow) -> Result<Restaurant, StoreError> {
    let hours: BTreeMap<String, String> = serde_json::from_str(&row.hours_json)?;
    let menu = load_menu(conn, &row.id)?;
    Ok(Restaurant {
        id: row.id,
        name: row.name,
        phone: row.phone,
        address: row.address,
        hours,
        menu,
    })
}

/// Finds the restaurant reachable at `phone`, with its full menu.
///
/// Returns `Ok(None)` when no restaurant owns the number.
pub fn find_restaurant_by_phone(
    conn: &Connection,
    phone: &str,
) -> Result<Option<Restaurant>, StoreError> {
    let normalized = normalize_phone(phone);
    if normalized.is_empty() {
        return Ok(None);
    }

    let row = conn
        .query_row(
            "SELECT id, name, phone, address, hours_json FROM restaurants WHERE phone = ?1",
            [&normalized],
            map_restaurant_row,
        )
        .optional()?;

    row.map(|row| hydrate(conn, row)).transpose()
}

/// Loads a restaurant by id, with its full menu.
pub fn get_restaurant(conn: &Connection, id: &str) -> Result<Option<Restaurant>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, phone, address, hours_json FROM restaurants WHERE id = ?1",
            [id],
            map_restaurant_row,
        )
        .optional()?;

    row.map(|row| hydrate(conn, row)).transpose()
}

/// Creates a restaurant, or replaces the profile and menu of the restaurant
/// already registered under the same (normalized) phone number.
///
/// The restaurant keeps its id across upserts so existing orders and
/// transcripts stay attached.
pub fn upsert_restaurant(
    conn: &Connection,
    restaurant: &NewRestaurant,
) -> Result<Restaurant, StoreError> {
    let phone = normalize_phone(&restaurant.phone);
    if phone.is_empty() {
        return Err(StoreError::Corrupt(format!(
            "restaurant '{}' has no usable phone number",
            restaurant.name
        )));
    }
    let hours_json = serde_json::to_string(&restaurant.hours)?;

    let tx = conn.unchecked_transaction()?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM restaurants WHERE phone = ?1",
            [&phone],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE restaurants SET name = ?1, address = ?2, hours_json = ?3 WHERE id = ?4",
                params![restaurant.name, restaurant.address, hours_json, id],
            )?;
            tx.execute("DELETE FROM menu_items WHERE restaurant_id = ?1", [&id])?;
            id
        }
        None => {
            let id = new_document_id();
            tx.execute(
                "INSERT INTO restaurants (id, name, phone, address, hours_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, restaurant.name, phone, restaurant.address, hours_json],
            )?;
            id
        }
    };

    {
        let mut stmt = tx.prepare(
            "INSERT INTO menu_items
                (restaurant_id, position, name, price_cents, category, description, available)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (position, item) in restaurant.menu.iter().enumerate() {
            stmt.execute(params![
                id,
                position as i64,
                item.name,
                item.price_cents,
                item.category,
                item.description,
                item.available,
            ])?;
        }
    }

    tx.commit()?;

    tracing::debug!(restaurant_id = %id, %phone, items = restaurant.menu.len(), "upserted restaurant");

    get_restaurant(conn, &id)?
        .ok_or_else(|| StoreError::Corrupt(format!("restaurant {} vanished after upsert", id)))
}
