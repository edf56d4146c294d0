//! Data store for the tablecall platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the narrow set of queries the call pipeline
//! needs: resolve a restaurant by its dialed number or id, insert orders,
//! transcripts and bookings, and link a transcript to the order it produced.
//!
//! Every write is scoped to one generated document id, so concurrent call
//! turns never contend on the same row and no cross-call locking is needed.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer, which
//!   matches a webhook service doing short single-row writes.
//! - **`r2d2` connection pool**: bounded connection reuse; callers run the
//!   synchronous queries on `tokio::task::spawn_blocking`.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so migrations ship with the server.

mod bookings;
mod error;
mod migrations;
mod orders;
mod pool;
mod restaurants;
mod transcripts;

pub use bookings::{get_booking, insert_booking, list_bookings, NewBooking};
pub use error::StoreError;
pub use migrations::{run_migrations, MigrationError};
pub use orders::{get_order, insert_order, list_orders, NewOrder};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use restaurants::{
    find_restaurant_by_phone, get_restaurant, upsert_restaurant, NewRestaurant,
};
pub use transcripts::{
    get_transcript, insert_transcript, link_order, list_transcripts, NewTranscript,
};
