use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub const VALID_TITLES: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "Prof", "Sir", "Lady"];

/// Contact and marketing-preference fields attached to a booking and stored
/// as the user's profile. Field names serialize in the provider's PascalCase
/// scheme so stored profiles and wire payloads agree.
///
/// Every field is optional; [`CustomerDetails::validate`] enforces the
/// constraints on whatever is present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_email_marketing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_sms_marketing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_email_marketing_opt_in_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_sms_marketing_opt_in_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_restaurant_email_marketing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_restaurant_sms_marketing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_email_marketing_opt_in_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_sms_marketing_opt_in_text: Option<String>,
}

impl CustomerDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = self.title.as_deref() {
            if !title.is_empty() && !VALID_TITLES.contains(&title) {
                return Err(ValidationError::new(
                    "title",
                    format!("must be one of: {}", VALID_TITLES.join(", ")),
                ));
            }
        }
        if let Some(mobile) = self.mobile.as_deref() {
            validate_phone_format("mobile", mobile)?;
        }
        if let Some(phone) = self.phone.as_deref() {
            validate_phone_format("phone", phone)?;
        }
        Ok(())
    }
}

fn validate_phone_format(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    let permitted = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '+'));
    if !permitted {
        return Err(ValidationError::new(
            field,
            "may only contain digits, spaces, hyphens, parentheses and plus signs",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CustomerDetails;

    fn with_title(title: &str) -> CustomerDetails {
        CustomerDetails { title: Some(title.to_string()), ..CustomerDetails::default() }
    }

    #[test]
    fn accepts_known_honorifics() {
        for title in ["Mr", "Mrs", "Ms", "Dr", "Prof", "Sir", "Lady"] {
            assert!(with_title(title).validate().is_ok(), "title {title} should pass");
        }
    }

    #[test]
    fn rejects_unknown_honorific() {
        let error = with_title("Captain").validate().expect_err("unknown title");
        assert_eq!(error.field, "title");
    }

    #[test]
    fn phone_pattern_permits_numeric_punctuation_only() {
        let details = CustomerDetails {
            mobile: Some("+44 (0) 7700-900123".to_string()),
            ..CustomerDetails::default()
        };
        assert!(details.validate().is_ok());

        let details = CustomerDetails {
            mobile: Some("call me maybe".to_string()),
            ..CustomerDetails::default()
        };
        let error = details.validate().expect_err("letters in phone");
        assert_eq!(error.field, "mobile");
    }

    #[test]
    fn serializes_in_provider_field_scheme() {
        let details = CustomerDetails {
            first_name: Some("Ann".to_string()),
            receive_sms_marketing: Some(false),
            ..CustomerDetails::default()
        };
        let value = serde_json::to_value(&details).expect("serialize");
        assert_eq!(value["FirstName"], "Ann");
        assert_eq!(value["ReceiveSmsMarketing"], false);
        assert!(value.get("Email").is_none());
    }
}
