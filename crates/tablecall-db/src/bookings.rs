//! Table booking persistence.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tablecall_types::{new_document_id, Booking, BookingStatus};

use crate::error::StoreError;

/// Parameters for inserting a booking. New bookings are always confirmed.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub restaurant_id: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub customer_phone: Option<String>,
}

fn map_row_to_booking(row: &Row) -> rusqlite::Result<(Booking, String)> {
    let status: String = row.get(6)?;
    Ok((
        Booking {
            id: row.get(0)?,
            restaurant_id: row.get(1)?,
            date: row.get(2)?,
            time: row.get(3)?,
            party_size: row.get(4)?,
            customer_phone: row.get(5)?,
            status: BookingStatus::Confirmed,
        },
        status,
    ))
}

fn decode(pair: (Booking, String)) -> Result<Booking, StoreError> {
    let (mut booking, status) = pair;
    booking.status = status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("booking {}: {}", booking.id, e)))?;
    Ok(booking)
}

/// Inserts a confirmed booking and returns it with its generated id.
pub fn insert_booking(conn: &Connection, booking: &NewBooking) -> Result<Booking, StoreError> {
    let id = new_document_id();
    let status = BookingStatus::Confirmed;

    conn.execute(
        "INSERT INTO bookings (id, restaurant_id, date, time, party_size, customer_phone, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            booking.restaurant_id,
            booking.date,
            booking.time,
            booking.party_size,
            booking.customer_phone,
            status.as_str(),
        ],
    )?;

    Ok(Booking {
        id,
        restaurant_id: booking.restaurant_id.clone(),
        date: booking.date.clone(),
        time: booking.time.clone(),
        party_size: booking.party_size,
        customer_phone: booking.customer_phone.clone(),
        status,
    })
}

/// Loads a booking by id.
pub fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, StoreError> {
    conn.query_row(
        "SELECT id, restaurant_id, date, time, party_size, customer_phone, status
         FROM bookings WHERE id = ?1",
        [id],
        map_row_to_booking,
    )
    .optional()?
    .map(decode)
    .transpose()
}

/// Lists a restaurant's bookings ordered by date and time.
pub fn list_bookings(conn: &Connection, restaurant_id: &str) -> Result<Vec<Booking>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, restaurant_id, date, time, party_size, customer_phone, status
         FROM bookings WHERE restaurant_id = ?1 ORDER BY date ASC, time ASC",
    )?;
    let rows = stmt.query_map([restaurant_id], map_row_to_booking)?;

    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(decode(row?)?);
    }
    Ok(bookings)
}
