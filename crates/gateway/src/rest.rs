use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use maitred_core::config::ProviderConfig;
use maitred_core::domain::customer::CustomerDetails;
use maitred_core::operations::{
    AvailabilityReport, AvailabilityRequest, BookingAmendment, BookingConfirmation,
    BookingDetails, BookingRequest, BookingUpdateRequest, CancelRequest, CancellationNotice,
};

use crate::{BookingProvider, GatewayError};

/// HTTP client for the provider's consumer API. Bodies are
/// `application/x-www-form-urlencoded`; customer sub-fields are flattened
/// under a `Customer[Field]` key scheme.
pub struct RestBookingProvider {
    client: Client,
    base_url: String,
    api_token: SecretString,
}

impl RestBookingProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(GatewayError::connectivity)?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/api/ConsumerApi/v1/Restaurant/{}",
                config.base_url.trim_end_matches('/'),
                config.restaurant
            ),
            api_token: config.api_token.clone(),
        })
    }

    async fn send_form<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, fields = form.len(), "provider request");

        let response = self
            .client
            .request(method, &url)
            .bearer_auth(self.api_token.expose_secret())
            .form(form)
            .send()
            .await
            .map_err(GatewayError::connectivity)?;

        let status = response.status();
        let body = response.text().await.map_err(GatewayError::connectivity)?;

        if !status.is_success() {
            return Err(GatewayError::new(status.as_u16(), extract_detail(&body)));
        }

        let value: Value = if body.is_empty() {
            serde_json::json!({ "status": "success", "message": "Operation successful" })
        } else {
            serde_json::from_str(&body).map_err(|source| {
                GatewayError::new(status.as_u16(), format!("malformed provider response: {source}"))
            })?
        };

        serde_json::from_value(value).map_err(|source| {
            GatewayError::new(status.as_u16(), format!("unexpected provider response shape: {source}"))
        })
    }
}

#[async_trait]
impl BookingProvider for RestBookingProvider {
    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<AvailabilityReport, GatewayError> {
        self.send_form(Method::POST, "/AvailabilitySearch", &encode_availability(request)).await
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, GatewayError> {
        self.send_form(Method::POST, "/BookingWithStripeToken", &encode_booking(request)).await
    }

    async fn fetch_booking(&self, reference: &str) -> Result<BookingDetails, GatewayError> {
        self.send_form(Method::GET, &format!("/Booking/{reference}"), &[]).await
    }

    async fn amend_booking(
        &self,
        reference: &str,
        request: &BookingUpdateRequest,
    ) -> Result<BookingAmendment, GatewayError> {
        self.send_form(Method::PATCH, &format!("/Booking/{reference}"), &encode_update(request))
            .await
    }

    async fn cancel_booking(
        &self,
        request: &CancelRequest,
    ) -> Result<CancellationNotice, GatewayError> {
        self.send_form(
            Method::POST,
            &format!("/Booking/{}/Cancel", request.booking_reference),
            &encode_cancel(request),
        )
        .await
    }
}

/// Non-2xx bodies usually carry `{"detail": ...}`; fall back to raw text.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").map(flatten_detail))
        .unwrap_or_else(|| body.to_string())
}

fn flatten_detail(detail: &Value) -> String {
    match detail {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encode_availability(request: &AvailabilityRequest) -> Vec<(String, String)> {
    vec![
        ("VisitDate".to_string(), request.visit_date.format("%Y-%m-%d").to_string()),
        ("PartySize".to_string(), request.party_size.to_string()),
        ("ChannelCode".to_string(), request.channel_code.as_str().to_string()),
    ]
}

fn encode_booking(request: &BookingRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("VisitDate".to_string(), request.visit_date.format("%Y-%m-%d").to_string()),
        ("VisitTime".to_string(), request.visit_time.format("%H:%M:%S").to_string()),
        ("PartySize".to_string(), request.party_size.to_string()),
        ("ChannelCode".to_string(), request.channel_code.as_str().to_string()),
    ];
    if let Some(special_requests) = &request.special_requests {
        form.push(("SpecialRequests".to_string(), special_requests.clone()));
    }
    if let Some(confirmed) = request.leave_time_confirmed {
        form.push(("IsLeaveTimeConfirmed".to_string(), confirmed.to_string()));
    }
    if let Some(room_number) = &request.room_number {
        form.push(("RoomNumber".to_string(), room_number.clone()));
    }
    if let Some(customer) = &request.customer {
        form.extend(flatten_customer(customer));
    }
    form
}

fn encode_update(request: &BookingUpdateRequest) -> Vec<(String, String)> {
    let mut form = Vec::new();
    if let Some(date) = request.visit_date {
        form.push(("VisitDate".to_string(), date.format("%Y-%m-%d").to_string()));
    }
    if let Some(time) = request.visit_time {
        form.push(("VisitTime".to_string(), time.format("%H:%M:%S").to_string()));
    }
    if let Some(size) = request.party_size {
        form.push(("PartySize".to_string(), size.to_string()));
    }
    if let Some(special_requests) = &request.special_requests {
        form.push(("SpecialRequests".to_string(), special_requests.clone()));
    }
    if let Some(confirmed) = request.leave_time_confirmed {
        form.push(("IsLeaveTimeConfirmed".to_string(), confirmed.to_string()));
    }
    form
}

fn encode_cancel(request: &CancelRequest) -> Vec<(String, String)> {
    vec![
        ("micrositeName".to_string(), request.microsite_name.clone()),
        ("bookingReference".to_string(), request.booking_reference.clone()),
        ("cancellationReasonId".to_string(), request.reason.id().to_string()),
    ]
}

/// `Customer[Field]=value` pairs; booleans serialize lowercase, absent
/// fields are omitted entirely.
fn flatten_customer(customer: &CustomerDetails) -> Vec<(String, String)> {
    let Ok(Value::Object(fields)) = serde_json::to_value(customer) else {
        return Vec::new();
    };

    fields
        .into_iter()
        .filter_map(|(key, value)| {
            let encoded = match value {
                Value::String(text) => text,
                Value::Bool(flag) => flag.to_string(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((format!("Customer[{key}]"), encoded))
        })
        .collect()
}

// Status helper kept close to the wire layer: a 404 from the provider is
// meaningful to callers deciding between "not found" and "unreachable".
pub fn is_not_found(error: &GatewayError) -> bool {
    error.code == StatusCode::NOT_FOUND.as_u16()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use maitred_core::domain::customer::CustomerDetails;
    use maitred_core::operations::{
        BookingRequest, BookingUpdateRequest, CancelRequest, ChannelCode,
    };

    use super::{encode_booking, encode_cancel, encode_update, extract_detail, flatten_customer};

    fn sample_booking() -> BookingRequest {
        BookingRequest {
            visit_date: NaiveDate::from_ymd_opt(2030, 6, 15).expect("date"),
            visit_time: NaiveTime::from_hms_opt(19, 0, 0).expect("time"),
            party_size: 2,
            channel_code: ChannelCode::Online,
            special_requests: Some("window seat".to_string()),
            leave_time_confirmed: Some(true),
            room_number: None,
            customer: Some(CustomerDetails {
                first_name: Some("Ann".to_string()),
                email: Some("ann@x.com".to_string()),
                receive_sms_marketing: Some(false),
                ..CustomerDetails::default()
            }),
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn booking_form_serializes_dates_and_times_canonically() {
        let form = encode_booking(&sample_booking());
        assert_eq!(field(&form, "VisitDate"), Some("2030-06-15"));
        assert_eq!(field(&form, "VisitTime"), Some("19:00:00"));
        assert_eq!(field(&form, "PartySize"), Some("2"));
        assert_eq!(field(&form, "ChannelCode"), Some("ONLINE"));
        assert_eq!(field(&form, "SpecialRequests"), Some("window seat"));
        assert_eq!(field(&form, "IsLeaveTimeConfirmed"), Some("true"));
    }

    #[test]
    fn customer_fields_flatten_under_prefixed_keys() {
        let form = encode_booking(&sample_booking());
        assert_eq!(field(&form, "Customer[FirstName]"), Some("Ann"));
        assert_eq!(field(&form, "Customer[Email]"), Some("ann@x.com"));
        assert_eq!(field(&form, "Customer[ReceiveSmsMarketing]"), Some("false"));
        // absent optionals never appear
        assert_eq!(field(&form, "Customer[Surname]"), None);
    }

    #[test]
    fn empty_customer_flattens_to_nothing() {
        assert!(flatten_customer(&CustomerDetails::default()).is_empty());
    }

    #[test]
    fn update_form_carries_only_supplied_fields() {
        let update = BookingUpdateRequest {
            party_size: Some(4),
            ..BookingUpdateRequest::default()
        };
        let form = encode_update(&update);
        assert_eq!(form, vec![("PartySize".to_string(), "4".to_string())]);
    }

    #[test]
    fn cancel_form_matches_provider_contract() {
        let request =
            CancelRequest::new("TheHungryUnicorn", "ABC1234", 3, false).expect("valid cancel");
        let form = encode_cancel(&request);
        assert_eq!(field(&form, "micrositeName"), Some("TheHungryUnicorn"));
        assert_eq!(field(&form, "bookingReference"), Some("ABC1234"));
        assert_eq!(field(&form, "cancellationReasonId"), Some("3"));
    }

    #[test]
    fn error_detail_prefers_the_detail_field() {
        assert_eq!(extract_detail(r#"{"detail": "booking not found"}"#), "booking not found");
        assert_eq!(extract_detail("plain text error"), "plain text error");
    }
}
