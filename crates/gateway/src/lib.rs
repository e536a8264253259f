//! Booking Gateway - the anti-corruption layer in front of the external
//! booking provider.
//!
//! This is the only crate permitted to talk to the provider's API. It
//! translates the typed operation contracts into the provider's flat
//! form-encoded wire format and normalizes every transport or HTTP failure
//! into one [`GatewayError`] taxonomy. Calls are bounded by a short fixed
//! timeout and are never retried here; the caller decides whether a retry
//! makes sense.

pub mod fake;
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

use maitred_core::operations::{
    AvailabilityReport, AvailabilityRequest, BookingAmendment, BookingConfirmation,
    BookingDetails, BookingRequest, BookingUpdateRequest, CancelRequest, CancellationNotice,
};

pub use fake::FakeBookingProvider;
pub use rest::{is_not_found, RestBookingProvider};

/// Uniform provider failure: HTTP status plus detail text, or code 0 when
/// the provider could not be reached at all.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("provider error {code}: {detail}")]
pub struct GatewayError {
    pub code: u16,
    pub detail: String,
}

impl GatewayError {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self { code, detail: detail.into() }
    }

    pub fn connectivity(detail: impl std::fmt::Display) -> Self {
        Self { code: 0, detail: format!("network connection error: {detail}") }
    }

    pub fn is_connectivity(&self) -> bool {
        self.code == 0
    }
}

/// The five provider operations. Implementations hold no state between
/// calls and perform no caching.
#[async_trait]
pub trait BookingProvider: Send + Sync {
    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<AvailabilityReport, GatewayError>;

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, GatewayError>;

    async fn fetch_booking(&self, reference: &str) -> Result<BookingDetails, GatewayError>;

    async fn amend_booking(
        &self,
        reference: &str,
        request: &BookingUpdateRequest,
    ) -> Result<BookingAmendment, GatewayError>;

    async fn cancel_booking(
        &self,
        request: &CancelRequest,
    ) -> Result<CancellationNotice, GatewayError>;
}
