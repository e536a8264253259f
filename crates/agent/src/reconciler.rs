//! Provider-authoritative view of a user's bookings.
//!
//! Local booking rows are an index, not the truth. Before the agent lists
//! bookings or authorizes a cancellation, every locally known reference is
//! re-fetched from the provider: cancellations discovered remotely drop out
//! of the active list, and references the provider cannot confirm right now
//! are kept but flagged as unvalidated. A single bad reference never aborts
//! the pass.

use chrono::Utc;
use tracing::warn;

use maitred_core::domain::booking::{BookingRecord, BookingStatus};
use maitred_db::repositories::BookingRepository;
use maitred_gateway::BookingProvider;

#[derive(Clone, Debug, PartialEq)]
pub struct ReconciledBooking {
    pub record: BookingRecord,
    pub validated: bool,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconciledBookings {
    pub active: Vec<ReconciledBooking>,
    pub cancelled_references: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelRefusal {
    /// The reference is not among the user's active, reconciled bookings.
    NotActive { reference: String },
}

impl CancelRefusal {
    pub fn message(&self) -> String {
        match self {
            Self::NotActive { reference } => format!(
                "Booking {reference} is not among your active bookings, so it cannot be cancelled."
            ),
        }
    }
}

/// Re-fetch each locally known booking and build the active view.
///
/// `local` must already be scoped to one user; this function preserves that
/// scoping and persists any status drift it discovers.
pub async fn reconcile(
    provider: &dyn BookingProvider,
    bookings: &dyn BookingRepository,
    local: Vec<BookingRecord>,
) -> ReconciledBookings {
    let mut reconciled = ReconciledBookings::default();

    for mut record in local {
        match provider.fetch_booking(&record.reference).await {
            Ok(details) => {
                let remote_status = BookingStatus::parse(&details.status);
                if remote_status == Some(BookingStatus::Cancelled) {
                    if record.status != BookingStatus::Cancelled {
                        if let Err(error) = bookings
                            .set_status(&record.reference, BookingStatus::Cancelled, Utc::now())
                            .await
                        {
                            warn!(reference = %record.reference, %error, "failed to persist discovered cancellation");
                        }
                    }
                    reconciled.warnings.push(format!(
                        "Booking {} was cancelled at the restaurant and is no longer active.",
                        record.reference
                    ));
                    reconciled.cancelled_references.push(record.reference);
                    continue;
                }

                record.visit_date = details.visit_date;
                record.visit_time = details.visit_time;
                record.party_size = details.party_size;
                record.special_requests = details.special_requests.clone();
                if let Some(status) = remote_status {
                    record.status = status;
                }
                if let Err(error) = bookings.save(record.clone()).await {
                    warn!(reference = %record.reference, %error, "failed to persist reconciled booking");
                }
                reconciled
                    .active
                    .push(ReconciledBooking { record, validated: true, note: None });
            }
            Err(error) => {
                warn!(reference = %record.reference, %error, "could not confirm booking with provider");
                let note = format!(
                    "Booking {} could not be confirmed with the restaurant right now ({}).",
                    record.reference, error.detail
                );
                reconciled.warnings.push(note.clone());
                reconciled.active.push(ReconciledBooking {
                    record,
                    validated: false,
                    note: Some(note),
                });
            }
        }
    }

    reconciled
}

/// A cancellation may only target a booking that survived reconciliation.
/// This check runs before the user is asked for a reason and before any
/// provider cancel call.
pub fn authorize_cancel<'a>(
    reconciled: &'a ReconciledBookings,
    reference: &str,
) -> Result<&'a ReconciledBooking, CancelRefusal> {
    reconciled
        .active
        .iter()
        .find(|booking| booking.record.reference == reference)
        .ok_or_else(|| CancelRefusal::NotActive { reference: reference.to_string() })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use maitred_core::domain::booking::{BookingRecord, BookingStatus};
    use maitred_core::domain::customer::CustomerDetails;
    use maitred_core::domain::user::UserId;
    use maitred_core::operations::BookingDetails;
    use maitred_db::repositories::{BookingRepository, InMemoryBookingRepository};
    use maitred_gateway::{FakeBookingProvider, GatewayError};

    use super::{authorize_cancel, reconcile, CancelRefusal};

    fn local_booking(reference: &str) -> BookingRecord {
        let now = Utc::now();
        BookingRecord {
            reference: reference.to_string(),
            owner: UserId(1),
            restaurant: "TheHungryUnicorn".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("date"),
            visit_time: NaiveTime::from_hms_opt(19, 0, 0).expect("time"),
            party_size: 2,
            status: BookingStatus::Confirmed,
            special_requests: None,
            customer_snapshot: CustomerDetails::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn remote_details(reference: &str, status: &str) -> BookingDetails {
        BookingDetails {
            booking_reference: reference.to_string(),
            booking_id: 1,
            restaurant: "TheHungryUnicorn".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("date"),
            visit_time: NaiveTime::from_hms_opt(19, 0, 0).expect("time"),
            party_size: 2,
            status: status.to_string(),
            special_requests: None,
            customer: None,
            created_at: "2030-01-01T00:00:00Z".to_string(),
            updated_at: "2030-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn remotely_cancelled_bookings_drop_out_and_are_persisted() {
        let provider = FakeBookingProvider::new();
        provider.insert_booking(remote_details("GONE111", "cancelled")).await;
        provider.insert_booking(remote_details("KEEP222", "confirmed")).await;

        let repo = InMemoryBookingRepository::default();
        repo.save(local_booking("GONE111")).await.expect("seed");
        repo.save(local_booking("KEEP222")).await.expect("seed");

        let reconciled = reconcile(
            &provider,
            &repo,
            vec![local_booking("GONE111"), local_booking("KEEP222")],
        )
        .await;

        assert_eq!(reconciled.cancelled_references, vec!["GONE111".to_string()]);
        assert_eq!(reconciled.active.len(), 1);
        assert_eq!(reconciled.active[0].record.reference, "KEEP222");
        assert!(reconciled.active[0].validated);

        let stored = repo.find_by_reference("GONE111").await.expect("find").expect("present");
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn fetch_failures_keep_the_booking_but_flag_it() {
        let provider = FakeBookingProvider::new();
        provider.insert_booking(remote_details("GOOD111", "confirmed")).await;
        provider.fail_fetch("FLAKY22", GatewayError::connectivity("timeout")).await;

        let repo = InMemoryBookingRepository::default();
        let reconciled = reconcile(
            &provider,
            &repo,
            vec![local_booking("FLAKY22"), local_booking("GOOD111")],
        )
        .await;

        assert_eq!(reconciled.active.len(), 2, "one failure must not abort the pass");
        let flaky = reconciled
            .active
            .iter()
            .find(|booking| booking.record.reference == "FLAKY22")
            .expect("flaky booking retained");
        assert!(!flaky.validated);
        assert!(flaky.note.is_some());
        assert_eq!(reconciled.warnings.len(), 1);
    }

    #[tokio::test]
    async fn reconciliation_adopts_provider_side_amendments() {
        let provider = FakeBookingProvider::new();
        let mut remote = remote_details("MOVED11", "updated");
        remote.party_size = 6;
        remote.visit_time = NaiveTime::from_hms_opt(20, 30, 0).expect("time");
        provider.insert_booking(remote).await;

        let repo = InMemoryBookingRepository::default();
        let reconciled = reconcile(&provider, &repo, vec![local_booking("MOVED11")]).await;

        let booking = &reconciled.active[0];
        assert_eq!(booking.record.party_size, 6);
        assert_eq!(booking.record.status, BookingStatus::Updated);
    }

    #[tokio::test]
    async fn cancel_authorization_requires_an_active_reconciled_booking() {
        let provider = FakeBookingProvider::new();
        provider.insert_booking(remote_details("MINE111", "confirmed")).await;

        let repo = InMemoryBookingRepository::default();
        let reconciled = reconcile(&provider, &repo, vec![local_booking("MINE111")]).await;

        assert!(authorize_cancel(&reconciled, "MINE111").is_ok());
        let refusal = authorize_cancel(&reconciled, "THEIRS9").expect_err("foreign reference");
        assert_eq!(refusal, CancelRefusal::NotActive { reference: "THEIRS9".to_string() });
    }
}
