use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One slot from an availability search. `time` arrives as `HH:MM:SS`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: NaiveTime,
    pub available: bool,
    pub max_party_size: u32,
    pub current_bookings: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub restaurant: String,
    pub restaurant_id: i64,
    pub visit_date: NaiveDate,
    pub party_size: u32,
    pub channel_code: String,
    pub available_slots: Vec<TimeSlot>,
    pub total_slots: u32,
}

impl AvailabilityReport {
    pub fn open_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.available_slots.iter().filter(|slot| slot.available)
    }
}

/// Customer echo in provider responses; distinct from our stored details.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub first_name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub booking_reference: String,
    pub booking_id: i64,
    pub restaurant: String,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub status: String,
    pub customer: Option<CustomerSummary>,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub booking_reference: String,
    pub booking_id: i64,
    pub restaurant: String,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub status: String,
    pub special_requests: Option<String>,
    pub customer: Option<CustomerSummary>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingAmendment {
    pub booking_reference: String,
    pub booking_id: i64,
    pub restaurant: String,
    pub updates: serde_json::Value,
    pub status: String,
    pub updated_at: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CancellationNotice {
    pub booking_reference: String,
    pub booking_id: i64,
    pub restaurant: String,
    pub cancellation_reason_id: u8,
    pub cancellation_reason: String,
    pub status: String,
    pub cancelled_at: String,
    pub message: String,
}
