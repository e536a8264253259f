//! Typed request/response contracts for the five booking operations.
//!
//! Requests can only be built through validating constructors, so every
//! load-bearing business rule (party size, operating hours, reference
//! format, ...) is enforced before the gateway is ever reached.

mod requests;
mod responses;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub use requests::{
    AvailabilityRequest, BookingRequest, BookingRequestParts, BookingUpdateRequest, CancelRequest,
};
pub use responses::{
    AvailabilityReport, BookingAmendment, BookingConfirmation, BookingDetails,
    CancellationNotice, CustomerSummary, TimeSlot,
};

pub const MIN_PARTY_SIZE: u32 = 1;
pub const MAX_PARTY_SIZE: u32 = 20;

/// Restaurant operating hours, inclusive on both ends.
pub const OPENING_TIME: NaiveTime = match NaiveTime::from_hms_opt(11, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};
pub const CLOSING_TIME: NaiveTime = match NaiveTime::from_hms_opt(23, 0, 0) {
    Some(t) => t,
    None => unreachable!(),
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelCode {
    #[default]
    Online,
    Phone,
    WalkIn,
    Partner,
}

impl ChannelCode {
    /// Case-normalizing parse; the provider only understands upper case.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(Self::Online),
            "PHONE" => Ok(Self::Phone),
            "WALK_IN" => Ok(Self::WalkIn),
            "PARTNER" => Ok(Self::Partner),
            _ => Err(ValidationError::new(
                "channel_code",
                "must be one of: ONLINE, PHONE, WALK_IN, PARTNER",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Phone => "PHONE",
            Self::WalkIn => "WALK_IN",
            Self::Partner => "PARTNER",
        }
    }
}

pub(crate) fn validate_party_size(party_size: u32) -> Result<(), ValidationError> {
    if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
        return Err(ValidationError::new(
            "party_size",
            format!("must be between {MIN_PARTY_SIZE} and {MAX_PARTY_SIZE}"),
        ));
    }
    Ok(())
}

/// The visit date must not be before today, evaluated at call time.
pub(crate) fn validate_visit_date(
    visit_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if visit_date < today {
        return Err(ValidationError::new("visit_date", "cannot be in the past"));
    }
    Ok(())
}

pub(crate) fn validate_visit_time(visit_time: NaiveTime) -> Result<(), ValidationError> {
    if !(OPENING_TIME..=CLOSING_TIME).contains(&visit_time) {
        return Err(ValidationError::new(
            "visit_time",
            "must be within operating hours (11:00-23:00)",
        ));
    }
    Ok(())
}

pub(crate) fn validate_booking_reference(reference: &str) -> Result<(), ValidationError> {
    let well_formed = (3..=20).contains(&reference.len())
        && reference.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !well_formed {
        return Err(ValidationError::new(
            "booking_reference",
            "must be 3-20 uppercase letters and digits",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ChannelCode;

    #[test]
    fn channel_code_normalizes_case() {
        assert_eq!(ChannelCode::parse("online").expect("lower"), ChannelCode::Online);
        assert_eq!(ChannelCode::parse("Walk_In").expect("mixed"), ChannelCode::WalkIn);
    }

    #[test]
    fn channel_code_rejects_unknown_channels() {
        let error = ChannelCode::parse("CARRIER_PIGEON").expect_err("unknown channel");
        assert_eq!(error.field, "channel_code");
    }

    #[test]
    fn channel_code_defaults_to_online() {
        assert_eq!(ChannelCode::default(), ChannelCode::Online);
    }
}
