use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerDetails;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Updated,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Updated => "updated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// The provider's fixed cancellation taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    CustomerRequest,
    RestaurantClosure,
    Weather,
    Emergency,
    NoShow,
}

impl CancellationReason {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::CustomerRequest),
            2 => Some(Self::RestaurantClosure),
            3 => Some(Self::Weather),
            4 => Some(Self::Emergency),
            5 => Some(Self::NoShow),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::CustomerRequest => 1,
            Self::RestaurantClosure => 2,
            Self::Weather => 3,
            Self::Emergency => 4,
            Self::NoShow => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomerRequest => "Customer Request",
            Self::RestaurantClosure => "Restaurant Closure",
            Self::Weather => "Weather",
            Self::Emergency => "Emergency",
            Self::NoShow => "No Show",
        }
    }
}

/// A locally persisted booking. The reference is provider-assigned and
/// opaque; the owning user never changes after creation. Local status is
/// advisory only - the reconciler treats the provider as authoritative at
/// read time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub reference: String,
    pub owner: UserId,
    pub restaurant: String,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub status: BookingStatus,
    pub special_requests: Option<String>,
    pub customer_snapshot: CustomerDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
