pub mod booking;
pub mod chat;
pub mod customer;
pub mod user;

pub use booking::{BookingRecord, BookingStatus, CancellationReason};
pub use chat::{ChatHistory, ChatTurn, TurnRole};
pub use customer::CustomerDetails;
pub use user::{User, UserId};
