//! Startup seeding of restaurants and menus from a TOML file.
//!
//! ```toml
//! [[restaurants]]
//! name = "Luigi's"
//! phone = "+1 (555) 000-1111"
//! address = "1 Main St"
//! hours = { mon = "11:00-22:00" }
//!
//! [[restaurants.menu]]
//! name = "Pizza"
//! price = 12.99
//! ```
//!
//! Restaurants are upserted by normalized phone, so reseeding replaces menus
//! but keeps restaurant ids stable.

use rusqlite::Connection;
use serde::Deserialize;
use std::collections::BTreeMap;
use tablecall_db::{upsert_restaurant, NewRestaurant, StoreError};
use tablecall_types::MenuItem;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid price {price} for menu item {item:?}")]
    InvalidPrice { item: String, price: f64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    restaurants: Vec<SeedRestaurant>,
}

#[derive(Debug, Deserialize)]
struct SeedRestaurant {
    name: String,
    phone: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    hours: BTreeMap<String, String>,
    #[serde(default)]
    menu: Vec<SeedMenuItem>,
}

#[derive(Debug, Deserialize)]
struct SeedMenuItem {
    name: String,
    /// Price in currency units, e.g. `12.99`.
    price: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_available")]
    available: bool,
}

fn default_available() -> bool {
    true
}

fn to_cents(item: &str, price: f64) -> Result<i64, SeedError> {
    let cents = (price * 100.0).round();
    if !cents.is_finite() || cents < 0.0 || cents > i64::MAX as f64 {
        return Err(SeedError::InvalidPrice {
            item: item.to_string(),
            price,
        });
    }
    Ok(cents as i64)
}

/// Parses seed TOML into restaurants ready for upsert.
pub fn parse_seed(contents: &str) -> Result<Vec<NewRestaurant>, SeedError> {
    let file: SeedFile = toml::from_str(contents)?;
    file.restaurants
        .into_iter()
        .map(|restaurant| {
            let menu = restaurant
                .menu
                .into_iter()
                .map(|item| {
                    Ok(MenuItem {
                        price_cents: to_cents(&item.name, item.price)?,
                        name: item.name,
                        category: item.category,
                        description: item.description,
                        available: item.available,
                    })
                })
                .collect::<Result<Vec<_>, SeedError>>()?;
            Ok(NewRestaurant {
                name: restaurant.name,
                phone: restaurant.phone,
                address: restaurant.address,
                hours: restaurant.hours,
                menu,
            })
        })
        .collect()
}

/// Reads the seed file at `path` and upserts every restaurant in it.
///
/// Returns the number of restaurants written.
pub fn apply_seed_file(conn: &Connection, path: &str) -> Result<usize, SeedError> {
    let contents = std::fs::read_to_string(path)?;
    let restaurants = parse_seed(&contents)?;
    for restaurant in &restaurants {
        let stored = upsert_restaurant(conn, restaurant)?;
        tracing::debug!(
            restaurant_id = %stored.id,
            phone = %stored.phone,
            menu_items = stored.menu.len(),
            "seeded restaurant"
        );
    }
    Ok(restaurants.len())
}
