use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::booking::CancellationReason;
use crate::domain::customer::CustomerDetails;
use crate::errors::ValidationError;

use super::{
    validate_booking_reference, validate_party_size, validate_visit_date, validate_visit_time,
    ChannelCode,
};

const MAX_SPECIAL_REQUESTS_LEN: usize = 500;
const MAX_ROOM_NUMBER_LEN: usize = 10;

/// Availability check for one date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub visit_date: NaiveDate,
    pub party_size: u32,
    pub channel_code: ChannelCode,
}

impl AvailabilityRequest {
    pub fn new(
        visit_date: NaiveDate,
        party_size: u32,
        channel_code: ChannelCode,
    ) -> Result<Self, ValidationError> {
        Self::with_today(visit_date, party_size, channel_code, Local::now().date_naive())
    }

    pub(crate) fn with_today(
        visit_date: NaiveDate,
        party_size: u32,
        channel_code: ChannelCode,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        validate_visit_date(visit_date, today)?;
        validate_party_size(party_size)?;
        Ok(Self { visit_date, party_size, channel_code })
    }
}

/// A fully specified booking creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub channel_code: ChannelCode,
    pub special_requests: Option<String>,
    pub leave_time_confirmed: Option<bool>,
    pub room_number: Option<String>,
    pub customer: Option<CustomerDetails>,
}

pub struct BookingRequestParts {
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub party_size: u32,
    pub channel_code: ChannelCode,
    pub special_requests: Option<String>,
    pub leave_time_confirmed: Option<bool>,
    pub room_number: Option<String>,
    pub customer: Option<CustomerDetails>,
}

impl BookingRequest {
    pub fn new(parts: BookingRequestParts) -> Result<Self, ValidationError> {
        Self::with_today(parts, Local::now().date_naive())
    }

    pub(crate) fn with_today(
        parts: BookingRequestParts,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        validate_visit_date(parts.visit_date, today)?;
        validate_visit_time(parts.visit_time)?;
        validate_party_size(parts.party_size)?;
        validate_text_len("special_requests", &parts.special_requests, MAX_SPECIAL_REQUESTS_LEN)?;
        validate_text_len("room_number", &parts.room_number, MAX_ROOM_NUMBER_LEN)?;
        if let Some(customer) = &parts.customer {
            customer.validate()?;
        }

        Ok(Self {
            visit_date: parts.visit_date,
            visit_time: parts.visit_time,
            party_size: parts.party_size,
            channel_code: parts.channel_code,
            special_requests: parts.special_requests,
            leave_time_confirmed: parts.leave_time_confirmed,
            room_number: parts.room_number,
            customer: parts.customer,
        })
    }
}

/// Partial amendment of an existing booking; only supplied fields are
/// validated and sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingUpdateRequest {
    pub visit_date: Option<NaiveDate>,
    pub visit_time: Option<NaiveTime>,
    pub party_size: Option<u32>,
    pub special_requests: Option<String>,
    pub leave_time_confirmed: Option<bool>,
}

impl BookingUpdateRequest {
    pub fn new(
        visit_date: Option<NaiveDate>,
        visit_time: Option<NaiveTime>,
        party_size: Option<u32>,
        special_requests: Option<String>,
        leave_time_confirmed: Option<bool>,
    ) -> Result<Self, ValidationError> {
        Self::with_today(
            visit_date,
            visit_time,
            party_size,
            special_requests,
            leave_time_confirmed,
            Local::now().date_naive(),
        )
    }

    pub(crate) fn with_today(
        visit_date: Option<NaiveDate>,
        visit_time: Option<NaiveTime>,
        party_size: Option<u32>,
        special_requests: Option<String>,
        leave_time_confirmed: Option<bool>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        if let Some(date) = visit_date {
            validate_visit_date(date, today)?;
        }
        if let Some(time) = visit_time {
            validate_visit_time(time)?;
        }
        if let Some(size) = party_size {
            validate_party_size(size)?;
        }
        validate_text_len("special_requests", &special_requests, MAX_SPECIAL_REQUESTS_LEN)?;

        Ok(Self { visit_date, visit_time, party_size, special_requests, leave_time_confirmed })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Cancellation of a booking by reference.
///
/// Out-of-range reason ids fall back to reason 1 (customer request) unless
/// `reject_unknown_reason` is set; the fallback is recorded so callers can
/// log or surface it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub microsite_name: String,
    pub booking_reference: String,
    pub reason: CancellationReason,
    pub reason_fell_back: bool,
}

impl CancelRequest {
    pub fn new(
        microsite_name: impl Into<String>,
        booking_reference: impl Into<String>,
        reason_id: i64,
        reject_unknown_reason: bool,
    ) -> Result<Self, ValidationError> {
        let microsite_name = microsite_name.into();
        if microsite_name.is_empty() {
            return Err(ValidationError::new("microsite_name", "must not be empty"));
        }
        let booking_reference = booking_reference.into();
        validate_booking_reference(&booking_reference)?;

        let (reason, reason_fell_back) = match CancellationReason::from_id(reason_id) {
            Some(reason) => (reason, false),
            None if reject_unknown_reason => {
                return Err(ValidationError::new(
                    "cancellation_reason_id",
                    "must be between 1 and 5",
                ));
            }
            None => (CancellationReason::CustomerRequest, true),
        };

        Ok(Self { microsite_name, booking_reference, reason, reason_fell_back })
    }
}

fn validate_text_len(
    field: &'static str,
    value: &Option<String>,
    max_len: usize,
) -> Result<(), ValidationError> {
    if let Some(text) = value {
        if text.len() > max_len {
            return Err(ValidationError::new(
                field,
                format!("must be at most {max_len} characters"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use crate::domain::booking::CancellationReason;
    use crate::domain::customer::CustomerDetails;
    use crate::operations::ChannelCode;

    use super::{
        AvailabilityRequest, BookingRequest, BookingRequestParts, BookingUpdateRequest,
        CancelRequest,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    fn parts(visit_time: NaiveTime, party_size: u32) -> BookingRequestParts {
        BookingRequestParts {
            visit_date: day(2030, 6, 15),
            visit_time,
            party_size,
            channel_code: ChannelCode::Online,
            special_requests: None,
            leave_time_confirmed: None,
            room_number: None,
            customer: None,
        }
    }

    const TODAY: fn() -> NaiveDate = || day(2030, 6, 1);

    #[test]
    fn party_size_bounds_are_inclusive() {
        for size in [1, 20] {
            assert!(
                AvailabilityRequest::with_today(day(2030, 6, 15), size, ChannelCode::Online, TODAY())
                    .is_ok(),
                "party of {size} should pass"
            );
        }
        for size in [0, 21] {
            let error = AvailabilityRequest::with_today(
                day(2030, 6, 15),
                size,
                ChannelCode::Online,
                TODAY(),
            )
            .expect_err("out of range");
            assert_eq!(error.field, "party_size");
        }
    }

    #[test]
    fn visit_date_may_be_today_but_not_yesterday() {
        assert!(
            AvailabilityRequest::with_today(TODAY(), 2, ChannelCode::Online, TODAY()).is_ok()
        );
        let error =
            AvailabilityRequest::with_today(day(2030, 5, 31), 2, ChannelCode::Online, TODAY())
                .expect_err("yesterday");
        assert_eq!(error.field, "visit_date");
    }

    #[test]
    fn visit_time_window_edges() {
        assert!(BookingRequest::with_today(parts(time(11, 0, 0), 2), TODAY()).is_ok());
        assert!(BookingRequest::with_today(parts(time(23, 0, 0), 2), TODAY()).is_ok());

        for out_of_hours in [time(10, 59, 59), time(23, 0, 1)] {
            let error = BookingRequest::with_today(parts(out_of_hours, 2), TODAY())
                .expect_err("outside operating hours");
            assert_eq!(error.field, "visit_time");
        }
    }

    #[test]
    fn booking_request_validates_customer_details() {
        let mut request = parts(time(19, 0, 0), 2);
        request.customer = Some(CustomerDetails {
            title: Some("Overlord".to_string()),
            ..CustomerDetails::default()
        });
        let error = BookingRequest::with_today(request, TODAY()).expect_err("bad title");
        assert_eq!(error.field, "title");
    }

    #[test]
    fn update_request_validates_only_supplied_fields() {
        let update = BookingUpdateRequest::with_today(None, None, Some(4), None, None, TODAY())
            .expect("party only");
        assert_eq!(update.party_size, Some(4));

        let error =
            BookingUpdateRequest::with_today(None, Some(time(9, 0, 0)), None, None, None, TODAY())
                .expect_err("early time");
        assert_eq!(error.field, "visit_time");
    }

    #[test]
    fn cancel_reference_format_is_enforced() {
        assert!(CancelRequest::new("TheHungryUnicorn", "ABC1234", 1, false).is_ok());
        for reference in ["ab", "lowercase", "WAY-TOO-LONG-REFERENCE-X", "AB"] {
            let error = CancelRequest::new("TheHungryUnicorn", reference, 1, false)
                .expect_err("malformed reference");
            assert_eq!(error.field, "booking_reference");
        }
    }

    #[test]
    fn unknown_cancellation_reason_falls_back_to_customer_request() {
        let request =
            CancelRequest::new("TheHungryUnicorn", "ABC1234", 9, false).expect("lenient mode");
        assert_eq!(request.reason, CancellationReason::CustomerRequest);
        assert!(request.reason_fell_back);

        let request = CancelRequest::new("TheHungryUnicorn", "ABC1234", 3, false).expect("known");
        assert_eq!(request.reason, CancellationReason::Weather);
        assert!(!request.reason_fell_back);
    }

    #[test]
    fn unknown_cancellation_reason_is_rejected_in_strict_mode() {
        let error = CancelRequest::new("TheHungryUnicorn", "ABC1234", 9, true)
            .expect_err("strict mode");
        assert_eq!(error.field, "cancellation_reason_id");
    }
}
