//! SQLite persistence for accounts, locally tracked bookings, and chat
//! sessions. Local booking rows are a convenience index into the provider's
//! records; the provider stays authoritative for booking state.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
