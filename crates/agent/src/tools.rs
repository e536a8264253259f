//! The closed set of operations the planner may invoke.
//!
//! Dispatch is an enum match, not a name lookup: a planner step either
//! deserializes into one of these variants or it is rejected outright.
//! Every variant re-validates its inputs and re-checks ownership before
//! touching the provider, and every outcome - success or failure - comes
//! back as a JSON observation for the next planner iteration.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use maitred_core::config::AgentConfig;
use maitred_core::domain::booking::{BookingRecord, BookingStatus};
use maitred_core::domain::customer::CustomerDetails;
use maitred_core::domain::user::User;
use maitred_core::errors::ValidationError;
use maitred_core::operations::{
    AvailabilityRequest, BookingRequest, BookingRequestParts, BookingUpdateRequest, CancelRequest,
    ChannelCode,
};
use maitred_db::repositories::{BookingRepository, UserRepository};
use maitred_gateway::{is_not_found, BookingProvider, GatewayError};

use crate::autofill;
use crate::reconciler;

/// Hard ceiling on the multi-day availability scan, whatever the config says.
pub const MAX_SEARCH_DAYS_CEILING: u32 = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    CheckAvailability {
        visit_date: NaiveDate,
        party_size: u32,
        #[serde(default)]
        channel: Option<String>,
    },
    FindEarliestAvailability {
        start_date: NaiveDate,
        party_size: u32,
        #[serde(default)]
        max_days: Option<u32>,
    },
    CreateBooking {
        visit_date: NaiveDate,
        visit_time: NaiveTime,
        party_size: u32,
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        special_requests: Option<String>,
        #[serde(default)]
        customer: Option<CustomerDetails>,
    },
    GetBooking {
        booking_reference: String,
    },
    ListBookings {},
    UpdateBooking {
        booking_reference: String,
        #[serde(default)]
        visit_date: Option<NaiveDate>,
        #[serde(default)]
        visit_time: Option<NaiveTime>,
        #[serde(default)]
        party_size: Option<u32>,
        #[serde(default)]
        special_requests: Option<String>,
    },
    CancelBooking {
        booking_reference: String,
        #[serde(default)]
        cancellation_reason_id: Option<i64>,
    },
    UpdateProfile {
        customer: CustomerDetails,
    },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckAvailability { .. } => "check_availability",
            Self::FindEarliestAvailability { .. } => "find_earliest_availability",
            Self::CreateBooking { .. } => "create_booking",
            Self::GetBooking { .. } => "get_booking",
            Self::ListBookings {} => "list_bookings",
            Self::UpdateBooking { .. } => "update_booking",
            Self::CancelBooking { .. } => "cancel_booking",
            Self::UpdateProfile { .. } => "update_profile",
        }
    }
}

/// Tool descriptions handed to the planner verbatim.
pub fn tool_menu() -> &'static str {
    r#"check_availability: {"visit_date": "YYYY-MM-DD", "party_size": N, "channel": "ONLINE"?} - time slots for one date
find_earliest_availability: {"start_date": "YYYY-MM-DD", "party_size": N, "max_days": N?} - first date with an open slot
create_booking: {"visit_date": "YYYY-MM-DD", "visit_time": "HH:MM:SS", "party_size": N, "special_requests": "..."?, "customer": {...}?} - make a booking
get_booking: {"booking_reference": "REF"} - details of one of the user's bookings
list_bookings: {} - all of the user's bookings, confirmed against the restaurant
update_booking: {"booking_reference": "REF", "visit_date"?, "visit_time"?, "party_size"?, "special_requests"?} - change a booking
cancel_booking: {"booking_reference": "REF", "cancellation_reason_id": 1-5?} - cancel a booking
update_profile: {"customer": {...}} - save contact details for future bookings"#
}

pub struct ToolExecutor {
    provider: Arc<dyn BookingProvider>,
    bookings: Arc<dyn BookingRepository>,
    users: Arc<dyn UserRepository>,
    restaurant: String,
    config: AgentConfig,
}

impl ToolExecutor {
    pub fn new(
        provider: Arc<dyn BookingProvider>,
        bookings: Arc<dyn BookingRepository>,
        users: Arc<dyn UserRepository>,
        restaurant: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self { provider, bookings, users, restaurant: restaurant.into(), config }
    }

    /// Run one tool call for one user. Never returns an error: failures are
    /// reported inside the observation so the planner can react to them.
    pub async fn execute(&self, user: &User, call: ToolCall) -> Value {
        debug!(tool = call.name(), user_id = user.id.0, "executing tool");
        match call {
            ToolCall::CheckAvailability { visit_date, party_size, channel } => {
                self.check_availability(visit_date, party_size, channel).await
            }
            ToolCall::FindEarliestAvailability { start_date, party_size, max_days } => {
                self.find_earliest_availability(start_date, party_size, max_days).await
            }
            ToolCall::CreateBooking {
                visit_date,
                visit_time,
                party_size,
                channel,
                special_requests,
                customer,
            } => {
                self.create_booking(
                    user,
                    visit_date,
                    visit_time,
                    party_size,
                    channel,
                    special_requests,
                    customer,
                )
                .await
            }
            ToolCall::GetBooking { booking_reference } => {
                self.get_booking(user, &booking_reference).await
            }
            ToolCall::ListBookings {} => self.list_bookings(user).await,
            ToolCall::UpdateBooking {
                booking_reference,
                visit_date,
                visit_time,
                party_size,
                special_requests,
            } => {
                self.update_booking(
                    user,
                    &booking_reference,
                    visit_date,
                    visit_time,
                    party_size,
                    special_requests,
                )
                .await
            }
            ToolCall::CancelBooking { booking_reference, cancellation_reason_id } => {
                self.cancel_booking(user, &booking_reference, cancellation_reason_id).await
            }
            ToolCall::UpdateProfile { customer } => self.update_profile(user, customer).await,
        }
    }

    async fn check_availability(
        &self,
        visit_date: NaiveDate,
        party_size: u32,
        channel: Option<String>,
    ) -> Value {
        let channel_code = match parse_channel(channel) {
            Ok(code) => code,
            Err(error) => return validation_observation(&error),
        };
        let request = match AvailabilityRequest::new(visit_date, party_size, channel_code) {
            Ok(request) => request,
            Err(error) => return validation_observation(&error),
        };

        match self.provider.check_availability(&request).await {
            Ok(report) => {
                let open: Vec<Value> = report
                    .open_slots()
                    .map(|slot| {
                        json!({
                            "time": slot.time.format("%H:%M:%S").to_string(),
                            "max_party_size": slot.max_party_size,
                        })
                    })
                    .collect();
                json!({
                    "ok": true,
                    "visit_date": report.visit_date,
                    "party_size": report.party_size,
                    "open_slots": open,
                    "total_slots": report.total_slots,
                })
            }
            Err(error) => gateway_observation(&error),
        }
    }

    async fn find_earliest_availability(
        &self,
        start_date: NaiveDate,
        party_size: u32,
        max_days: Option<u32>,
    ) -> Value {
        let horizon = max_days
            .unwrap_or(self.config.max_availability_search_days)
            .min(self.config.max_availability_search_days)
            .min(MAX_SEARCH_DAYS_CEILING)
            .max(1);

        let mut skipped_days: Vec<Value> = Vec::new();
        for offset in 0..horizon {
            let date = start_date + Duration::days(i64::from(offset));
            let request = match AvailabilityRequest::new(date, party_size, ChannelCode::Online) {
                Ok(request) => request,
                Err(error) => {
                    skipped_days.push(json!({ "date": date, "reason": error.to_string() }));
                    continue;
                }
            };
            // One unreachable day must not end the scan.
            match self.provider.check_availability(&request).await {
                Ok(report) => {
                    let open: Vec<Value> = report
                        .open_slots()
                        .map(|slot| json!(slot.time.format("%H:%M:%S").to_string()))
                        .collect();
                    if !open.is_empty() {
                        return json!({
                            "ok": true,
                            "earliest_date": date,
                            "open_slots": open,
                            "days_checked": offset + 1,
                            "skipped_days": skipped_days,
                        });
                    }
                }
                Err(error) => {
                    skipped_days.push(json!({ "date": date, "reason": error.detail }));
                }
            }
        }

        json!({
            "ok": false,
            "error": format!("no availability found within {horizon} days of {start_date}"),
            "days_checked": horizon,
            "skipped_days": skipped_days,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_booking(
        &self,
        user: &User,
        visit_date: NaiveDate,
        visit_time: NaiveTime,
        party_size: u32,
        channel: Option<String>,
        special_requests: Option<String>,
        customer: Option<CustomerDetails>,
    ) -> Value {
        let channel_code = match parse_channel(channel) {
            Ok(code) => code,
            Err(error) => return validation_observation(&error),
        };

        let explicit = customer.clone().unwrap_or_default();
        let filled = autofill::fill_from_profile(customer, &user.profile);

        let request = match BookingRequest::new(BookingRequestParts {
            visit_date,
            visit_time,
            party_size,
            channel_code,
            special_requests: special_requests.clone(),
            leave_time_confirmed: None,
            room_number: None,
            customer: if filled.customer.is_empty() { None } else { Some(filled.customer.clone()) },
        }) {
            Ok(request) => request,
            Err(error) => return validation_observation(&error),
        };

        let confirmation = match self.provider.create_booking(&request).await {
            Ok(confirmation) => confirmation,
            Err(error) => return gateway_observation(&error),
        };

        let now = Utc::now();
        let record = BookingRecord {
            reference: confirmation.booking_reference.clone(),
            owner: user.id,
            restaurant: self.restaurant.clone(),
            visit_date: confirmation.visit_date,
            visit_time: confirmation.visit_time,
            party_size: confirmation.party_size,
            status: BookingStatus::parse(&confirmation.status)
                .unwrap_or(BookingStatus::Confirmed),
            special_requests,
            customer_snapshot: filled.customer,
            created_at: now,
            updated_at: now,
        };
        if let Err(error) = self.bookings.save(record).await {
            return json!({
                "ok": false,
                "error": format!(
                    "booking {} was created but could not be recorded locally: {error}",
                    confirmation.booking_reference
                ),
                "booking_reference": confirmation.booking_reference,
            });
        }

        // First-capture write-back of anything new the user told us.
        if let Some(updated_profile) = autofill::capture_into_profile(&user.profile, &explicit) {
            if let Err(error) = self.users.update_profile(user.id, &updated_profile).await {
                debug!(user_id = user.id.0, %error, "profile write-back failed");
            }
        }

        info!(
            reference = %confirmation.booking_reference,
            user_id = user.id.0,
            "booking created"
        );
        json!({
            "ok": true,
            "booking_reference": confirmation.booking_reference,
            "visit_date": confirmation.visit_date,
            "visit_time": confirmation.visit_time.format("%H:%M:%S").to_string(),
            "party_size": confirmation.party_size,
            "status": confirmation.status,
            "details_filled_from_profile": filled.filled_from_profile,
        })
    }

    async fn get_booking(&self, user: &User, reference: &str) -> Value {
        let local = match self.bookings.find_by_reference(reference).await {
            Ok(Some(record)) if record.owner == user.id => record,
            Ok(Some(_)) => return not_yours_observation(reference),
            Ok(None) => return unknown_booking_observation(reference),
            Err(error) => return storage_observation(&error.to_string()),
        };

        match self.provider.fetch_booking(reference).await {
            Ok(details) => json!({
                "ok": true,
                "booking_reference": details.booking_reference,
                "visit_date": details.visit_date,
                "visit_time": details.visit_time.format("%H:%M:%S").to_string(),
                "party_size": details.party_size,
                "status": details.status,
                "special_requests": details.special_requests,
                "validated": true,
            }),
            // A 404 is the provider saying the booking does not exist, which
            // is not the same as being unable to ask.
            Err(error) if is_not_found(&error) => json!({
                "ok": false,
                "not_found": true,
                "error": format!("The restaurant has no record of booking {reference}."),
            }),
            Err(error) => json!({
                "ok": true,
                "booking_reference": local.reference,
                "visit_date": local.visit_date,
                "visit_time": local.visit_time.format("%H:%M:%S").to_string(),
                "party_size": local.party_size,
                "status": local.status.as_str(),
                "special_requests": local.special_requests,
                "validated": false,
                "warning": format!(
                    "could not confirm with the restaurant right now ({})", error.detail
                ),
            }),
        }
    }

    async fn list_bookings(&self, user: &User) -> Value {
        let local = match self.bookings.list_for_user(user.id).await {
            Ok(local) => local,
            Err(error) => return storage_observation(&error.to_string()),
        };

        let reconciled =
            reconciler::reconcile(self.provider.as_ref(), self.bookings.as_ref(), local).await;

        let bookings: Vec<Value> = reconciled
            .active
            .iter()
            .map(|booking| {
                json!({
                    "booking_reference": booking.record.reference,
                    "visit_date": booking.record.visit_date,
                    "visit_time": booking.record.visit_time.format("%H:%M:%S").to_string(),
                    "party_size": booking.record.party_size,
                    "status": booking.record.status.as_str(),
                    "validated": booking.validated,
                })
            })
            .collect();

        json!({
            "ok": true,
            "bookings": bookings,
            "cancelled_references": reconciled.cancelled_references,
            "warnings": reconciled.warnings,
        })
    }

    async fn update_booking(
        &self,
        user: &User,
        reference: &str,
        visit_date: Option<NaiveDate>,
        visit_time: Option<NaiveTime>,
        party_size: Option<u32>,
        special_requests: Option<String>,
    ) -> Value {
        let mut local = match self.bookings.find_by_reference(reference).await {
            Ok(Some(record)) if record.owner == user.id => record,
            Ok(Some(_)) => return not_yours_observation(reference),
            Ok(None) => return unknown_booking_observation(reference),
            Err(error) => return storage_observation(&error.to_string()),
        };

        let request = match BookingUpdateRequest::new(
            visit_date,
            visit_time,
            party_size,
            special_requests,
            None,
        ) {
            Ok(request) => request,
            Err(error) => return validation_observation(&error),
        };
        if request.is_empty() {
            return json!({
                "ok": false,
                "error": "no changes were supplied; ask the user what they want to change",
            });
        }

        let amendment = match self.provider.amend_booking(reference, &request).await {
            Ok(amendment) => amendment,
            Err(error) => return gateway_observation(&error),
        };

        if let Some(date) = request.visit_date {
            local.visit_date = date;
        }
        if let Some(time) = request.visit_time {
            local.visit_time = time;
        }
        if let Some(size) = request.party_size {
            local.party_size = size;
        }
        if let Some(text) = &request.special_requests {
            local.special_requests = Some(text.clone());
        }
        local.status = BookingStatus::parse(&amendment.status).unwrap_or(BookingStatus::Updated);
        local.updated_at = Utc::now();
        if let Err(error) = self.bookings.save(local).await {
            debug!(reference, %error, "failed to persist amended booking");
        }

        info!(reference, user_id = user.id.0, "booking updated");
        json!({
            "ok": true,
            "booking_reference": amendment.booking_reference,
            "updates": amendment.updates,
            "status": amendment.status,
        })
    }

    async fn cancel_booking(
        &self,
        user: &User,
        reference: &str,
        cancellation_reason_id: Option<i64>,
    ) -> Value {
        // Authorization comes first: reconcile the user's own bookings and
        // refuse before any reason handling or provider cancel call.
        let local = match self.bookings.list_for_user(user.id).await {
            Ok(local) => local,
            Err(error) => return storage_observation(&error.to_string()),
        };
        let reconciled =
            reconciler::reconcile(self.provider.as_ref(), self.bookings.as_ref(), local).await;
        if let Err(refusal) = reconciler::authorize_cancel(&reconciled, reference) {
            // A reference nobody holds is "not found", not a refusal.
            return match self.bookings.find_by_reference(reference).await {
                Ok(Some(_)) => json!({ "ok": false, "error": refusal.message(), "refused": true }),
                Ok(None) => unknown_booking_observation(reference),
                Err(error) => storage_observation(&error.to_string()),
            };
        }

        let request = match CancelRequest::new(
            self.restaurant.clone(),
            reference,
            cancellation_reason_id.unwrap_or(1),
            self.config.reject_unknown_cancellation_reason,
        ) {
            Ok(request) => request,
            Err(error) => return validation_observation(&error),
        };

        let notice = match self.provider.cancel_booking(&request).await {
            Ok(notice) => notice,
            Err(error) => return gateway_observation(&error),
        };

        if let Err(error) =
            self.bookings.set_status(reference, BookingStatus::Cancelled, Utc::now()).await
        {
            debug!(reference, %error, "failed to persist cancellation");
        }

        info!(reference, user_id = user.id.0, reason = notice.cancellation_reason_id, "booking cancelled");
        json!({
            "ok": true,
            "booking_reference": notice.booking_reference,
            "cancellation_reason": notice.cancellation_reason,
            "reason_fell_back": request.reason_fell_back,
            "status": notice.status,
        })
    }

    async fn update_profile(&self, user: &User, customer: CustomerDetails) -> Value {
        if let Err(error) = customer.validate() {
            return validation_observation(&error);
        }
        if customer.is_empty() {
            return json!({ "ok": false, "error": "no profile fields were supplied" });
        }

        // Explicit profile updates overwrite; autofill capture elsewhere
        // only fills gaps.
        let mut updated = user.profile.clone();
        overwrite_profile_fields(&mut updated, &customer);

        if let Err(error) = self.users.update_profile(user.id, &updated).await {
            return storage_observation(&error.to_string());
        }

        json!({ "ok": true, "message": "profile updated" })
    }
}

fn overwrite_profile_fields(profile: &mut CustomerDetails, supplied: &CustomerDetails) {
    macro_rules! overwrite {
        ($($field:ident),+ $(,)?) => {
            $(
                if supplied.$field.is_some() {
                    profile.$field = supplied.$field.clone();
                }
            )+
        };
    }
    overwrite!(
        title,
        first_name,
        surname,
        email,
        mobile,
        phone,
        mobile_country_code,
        phone_country_code,
        receive_email_marketing,
        receive_sms_marketing,
        group_email_marketing_opt_in_text,
        group_sms_marketing_opt_in_text,
        receive_restaurant_email_marketing,
        receive_restaurant_sms_marketing,
        restaurant_email_marketing_opt_in_text,
        restaurant_sms_marketing_opt_in_text,
    );
}

fn parse_channel(channel: Option<String>) -> Result<ChannelCode, ValidationError> {
    match channel {
        Some(raw) => ChannelCode::parse(&raw),
        None => Ok(ChannelCode::default()),
    }
}

fn validation_observation(error: &ValidationError) -> Value {
    json!({ "ok": false, "error": error.to_string(), "invalid_field": error.field })
}

fn gateway_observation(error: &GatewayError) -> Value {
    json!({
        "ok": false,
        "error": error.detail,
        "provider_status": error.code,
        "connectivity_failure": error.is_connectivity(),
    })
}

fn storage_observation(detail: &str) -> Value {
    json!({ "ok": false, "error": format!("internal storage error: {detail}") })
}

fn not_yours_observation(reference: &str) -> Value {
    json!({
        "ok": false,
        "refused": true,
        "error": format!("Booking {reference} is not among your bookings."),
    })
}

fn unknown_booking_observation(reference: &str) -> Value {
    json!({
        "ok": false,
        "not_found": true,
        "error": format!("No booking with reference {reference} was found."),
    })
}

/// Today in the server's local zone; the planner prompt and date validation
/// must agree on what "today" means.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
