use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;

use maitred_core::operations::{
    AvailabilityReport, AvailabilityRequest, BookingAmendment, BookingConfirmation,
    BookingDetails, BookingRequest, BookingUpdateRequest, CancelRequest, CancellationNotice,
    TimeSlot,
};

use crate::{BookingProvider, GatewayError};

const FIXED_TIMESTAMP: &str = "2030-01-01T00:00:00Z";

/// In-memory stand-in for the external provider, used by agent and server
/// tests. Bookings live in a map keyed by reference; individual references
/// and whole operations can be scripted to fail, and call counts are
/// recorded so tests can assert which provider operations actually ran.
#[derive(Default)]
pub struct FakeBookingProvider {
    state: RwLock<FakeState>,
}

#[derive(Default)]
struct FakeState {
    bookings: HashMap<String, BookingDetails>,
    fetch_failures: HashMap<String, GatewayError>,
    availability: HashMap<NaiveDate, Vec<TimeSlot>>,
    availability_failure: Option<GatewayError>,
    create_failure: Option<GatewayError>,
    next_booking_id: i64,
    calls: CallCounts,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub availability: u32,
    pub create: u32,
    pub fetch: u32,
    pub amend: u32,
    pub cancel: u32,
}

impl FakeBookingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_booking(&self, details: BookingDetails) {
        let mut state = self.state.write().await;
        state.bookings.insert(details.booking_reference.clone(), details);
    }

    /// Script a per-reference fetch failure (reconciliation partial-failure
    /// paths).
    pub async fn fail_fetch(&self, reference: &str, error: GatewayError) {
        let mut state = self.state.write().await;
        state.fetch_failures.insert(reference.to_string(), error);
    }

    pub async fn fail_availability(&self, error: GatewayError) {
        self.state.write().await.availability_failure = Some(error);
    }

    pub async fn fail_create(&self, error: GatewayError) {
        self.state.write().await.create_failure = Some(error);
    }

    pub async fn set_availability(&self, date: NaiveDate, slots: Vec<TimeSlot>) {
        let mut state = self.state.write().await;
        state.availability.insert(date, slots);
    }

    pub async fn mark_cancelled(&self, reference: &str) {
        let mut state = self.state.write().await;
        if let Some(details) = state.bookings.get_mut(reference) {
            details.status = "cancelled".to_string();
        }
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.read().await.calls
    }

    pub fn open_slot(time: &str) -> TimeSlot {
        TimeSlot {
            time: time.parse::<NaiveTime>().unwrap_or_else(|_| {
                NaiveTime::from_hms_opt(12, 0, 0).expect("fallback slot time")
            }),
            available: true,
            max_party_size: 8,
            current_bookings: 0,
        }
    }
}

#[async_trait]
impl BookingProvider for FakeBookingProvider {
    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<AvailabilityReport, GatewayError> {
        let mut state = self.state.write().await;
        state.calls.availability += 1;
        if let Some(error) = &state.availability_failure {
            return Err(error.clone());
        }
        let slots = state.availability.get(&request.visit_date).cloned().unwrap_or_default();
        Ok(AvailabilityReport {
            restaurant: "TheHungryUnicorn".to_string(),
            restaurant_id: 1,
            visit_date: request.visit_date,
            party_size: request.party_size,
            channel_code: request.channel_code.as_str().to_string(),
            total_slots: slots.len() as u32,
            available_slots: slots,
        })
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, GatewayError> {
        let mut state = self.state.write().await;
        state.calls.create += 1;
        if let Some(error) = &state.create_failure {
            return Err(error.clone());
        }

        state.next_booking_id += 1;
        let booking_id = state.next_booking_id;
        let reference = format!("REF{booking_id:04}");

        let customer = request.customer.as_ref().map(|customer| {
            maitred_core::operations::CustomerSummary {
                id: booking_id,
                first_name: customer.first_name.clone(),
                surname: customer.surname.clone(),
                email: customer.email.clone(),
            }
        });

        state.bookings.insert(
            reference.clone(),
            BookingDetails {
                booking_reference: reference.clone(),
                booking_id,
                restaurant: "TheHungryUnicorn".to_string(),
                visit_date: request.visit_date,
                visit_time: request.visit_time,
                party_size: request.party_size,
                status: "confirmed".to_string(),
                special_requests: request.special_requests.clone(),
                customer: customer.clone(),
                created_at: FIXED_TIMESTAMP.to_string(),
                updated_at: FIXED_TIMESTAMP.to_string(),
            },
        );

        Ok(BookingConfirmation {
            booking_reference: reference,
            booking_id,
            restaurant: "TheHungryUnicorn".to_string(),
            visit_date: request.visit_date,
            visit_time: request.visit_time,
            party_size: request.party_size,
            status: "confirmed".to_string(),
            customer,
            created_at: FIXED_TIMESTAMP.to_string(),
        })
    }

    async fn fetch_booking(&self, reference: &str) -> Result<BookingDetails, GatewayError> {
        let mut state = self.state.write().await;
        state.calls.fetch += 1;
        if let Some(error) = state.fetch_failures.get(reference) {
            return Err(error.clone());
        }
        state
            .bookings
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::new(404, format!("Booking {reference} not found")))
    }

    async fn amend_booking(
        &self,
        reference: &str,
        request: &BookingUpdateRequest,
    ) -> Result<BookingAmendment, GatewayError> {
        let mut state = self.state.write().await;
        state.calls.amend += 1;

        let details = state
            .bookings
            .get_mut(reference)
            .ok_or_else(|| GatewayError::new(404, format!("Booking {reference} not found")))?;

        let mut updates = serde_json::Map::new();
        if let Some(date) = request.visit_date {
            details.visit_date = date;
            updates.insert("VisitDate".to_string(), date.to_string().into());
        }
        if let Some(time) = request.visit_time {
            details.visit_time = time;
            updates.insert("VisitTime".to_string(), time.to_string().into());
        }
        if let Some(size) = request.party_size {
            details.party_size = size;
            updates.insert("PartySize".to_string(), size.into());
        }
        if let Some(special_requests) = &request.special_requests {
            details.special_requests = Some(special_requests.clone());
            updates.insert("SpecialRequests".to_string(), special_requests.clone().into());
        }
        details.status = "updated".to_string();

        Ok(BookingAmendment {
            booking_reference: reference.to_string(),
            booking_id: details.booking_id,
            restaurant: details.restaurant.clone(),
            updates: updates.into(),
            status: details.status.clone(),
            updated_at: FIXED_TIMESTAMP.to_string(),
            message: "Booking updated".to_string(),
        })
    }

    async fn cancel_booking(
        &self,
        request: &CancelRequest,
    ) -> Result<CancellationNotice, GatewayError> {
        let mut state = self.state.write().await;
        state.calls.cancel += 1;

        let details = state.bookings.get_mut(&request.booking_reference).ok_or_else(|| {
            GatewayError::new(404, format!("Booking {} not found", request.booking_reference))
        })?;
        details.status = "cancelled".to_string();

        Ok(CancellationNotice {
            booking_reference: request.booking_reference.clone(),
            booking_id: details.booking_id,
            restaurant: details.restaurant.clone(),
            cancellation_reason_id: request.reason.id(),
            cancellation_reason: request.reason.label().to_string(),
            status: "cancelled".to_string(),
            cancelled_at: FIXED_TIMESTAMP.to_string(),
            message: "Booking cancelled".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use maitred_core::operations::{
        AvailabilityRequest, BookingRequest, CancelRequest, ChannelCode,
    };

    use crate::BookingProvider;

    use super::FakeBookingProvider;

    fn booking_request() -> BookingRequest {
        BookingRequest {
            visit_date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("date"),
            visit_time: "19:00:00".parse().expect("time"),
            party_size: 2,
            channel_code: ChannelCode::Online,
            special_requests: None,
            leave_time_confirmed: None,
            room_number: None,
            customer: None,
        }
    }

    #[tokio::test]
    async fn created_bookings_are_fetchable_and_cancellable() {
        let provider = FakeBookingProvider::new();
        let confirmation =
            provider.create_booking(&booking_request()).await.expect("create");

        let details =
            provider.fetch_booking(&confirmation.booking_reference).await.expect("fetch");
        assert_eq!(details.status, "confirmed");

        let cancel = CancelRequest::new(
            "TheHungryUnicorn",
            confirmation.booking_reference.clone(),
            1,
            false,
        )
        .expect("cancel request");
        provider.cancel_booking(&cancel).await.expect("cancel");

        let details =
            provider.fetch_booking(&confirmation.booking_reference).await.expect("refetch");
        assert_eq!(details.status, "cancelled");

        let calls = provider.calls().await;
        assert_eq!(calls.create, 1);
        assert_eq!(calls.fetch, 2);
        assert_eq!(calls.cancel, 1);
    }

    #[tokio::test]
    async fn availability_reports_scripted_slots() {
        let provider = FakeBookingProvider::new();
        let date = NaiveDate::from_ymd_opt(2030, 6, 15).expect("date");
        provider
            .set_availability(date, vec![FakeBookingProvider::open_slot("12:00:00")])
            .await;

        let request = AvailabilityRequest::new(date, 2, ChannelCode::Online).expect("request");
        let report = provider.check_availability(&request).await.expect("report");
        assert_eq!(report.total_slots, 1);
        assert!(report.available_slots[0].available);
    }
}
