//! Profile-backed autofill for customer details.
//!
//! Explicit values from the current conversation always win; the stored
//! profile only fills gaps. Newly captured explicit values flow back into
//! the profile so the user is not asked twice.

use maitred_core::domain::customer::CustomerDetails;

/// Fields filled from the profile plus the merged result.
#[derive(Clone, Debug, PartialEq)]
pub struct AutofillOutcome {
    pub customer: CustomerDetails,
    pub filled_from_profile: Vec<&'static str>,
}

macro_rules! merge_fields {
    ($explicit:expr, $profile:expr, $filled:expr, $($field:ident => $label:literal),+ $(,)?) => {
        $(
            if $explicit.$field.is_none() && $profile.$field.is_some() {
                $explicit.$field = $profile.$field.clone();
                $filled.push($label);
            }
        )+
    };
}

macro_rules! capture_fields {
    ($profile:expr, $explicit:expr, $captured:expr, $($field:ident),+ $(,)?) => {
        $(
            if $profile.$field.is_none() && $explicit.$field.is_some() {
                $profile.$field = $explicit.$field.clone();
                $captured = true;
            }
        )+
    };
}

/// Merge the stored profile into explicitly supplied details.
pub fn fill_from_profile(
    explicit: Option<CustomerDetails>,
    profile: &CustomerDetails,
) -> AutofillOutcome {
    let mut customer = explicit.unwrap_or_default();
    let mut filled_from_profile = Vec::new();

    merge_fields!(
        customer, profile, filled_from_profile,
        title => "title",
        first_name => "first_name",
        surname => "surname",
        email => "email",
        mobile => "mobile",
        phone => "phone",
        mobile_country_code => "mobile_country_code",
        phone_country_code => "phone_country_code",
        receive_email_marketing => "receive_email_marketing",
        receive_sms_marketing => "receive_sms_marketing",
        group_email_marketing_opt_in_text => "group_email_marketing_opt_in_text",
        group_sms_marketing_opt_in_text => "group_sms_marketing_opt_in_text",
        receive_restaurant_email_marketing => "receive_restaurant_email_marketing",
        receive_restaurant_sms_marketing => "receive_restaurant_sms_marketing",
        restaurant_email_marketing_opt_in_text => "restaurant_email_marketing_opt_in_text",
        restaurant_sms_marketing_opt_in_text => "restaurant_sms_marketing_opt_in_text",
    );

    AutofillOutcome { customer, filled_from_profile }
}

/// First-capture write-back: explicit values land in profile gaps, but an
/// existing profile value is never overwritten by a one-off correction.
pub fn capture_into_profile(
    profile: &CustomerDetails,
    explicit: &CustomerDetails,
) -> Option<CustomerDetails> {
    let mut updated = profile.clone();
    let mut captured = false;

    capture_fields!(
        updated, explicit, captured,
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

    captured.then_some(updated)
}

#[cfg(test)]
mod tests {
    use maitred_core::domain::customer::CustomerDetails;

    use super::{capture_into_profile, fill_from_profile};

    fn profile() -> CustomerDetails {
        CustomerDetails {
            first_name: Some("Ann".to_string()),
            surname: Some("Archer".to_string()),
            email: Some("ann@x.com".to_string()),
            ..CustomerDetails::default()
        }
    }

    #[test]
    fn profile_fills_only_missing_fields() {
        let explicit = CustomerDetails {
            email: Some("work@x.com".to_string()),
            ..CustomerDetails::default()
        };

        let outcome = fill_from_profile(Some(explicit), &profile());
        assert_eq!(outcome.customer.email.as_deref(), Some("work@x.com"));
        assert_eq!(outcome.customer.first_name.as_deref(), Some("Ann"));
        assert!(outcome.filled_from_profile.contains(&"first_name"));
        assert!(!outcome.filled_from_profile.contains(&"email"));
    }

    #[test]
    fn absent_explicit_details_come_entirely_from_profile() {
        let outcome = fill_from_profile(None, &profile());
        assert_eq!(outcome.customer.first_name.as_deref(), Some("Ann"));
        assert_eq!(outcome.customer.surname.as_deref(), Some("Archer"));
        assert_eq!(outcome.filled_from_profile.len(), 3);
    }

    #[test]
    fn capture_adds_new_fields_without_overwriting() {
        let explicit = CustomerDetails {
            email: Some("other@x.com".to_string()),
            mobile: Some("07700 900000".to_string()),
            ..CustomerDetails::default()
        };

        let updated = capture_into_profile(&profile(), &explicit).expect("new field captured");
        // existing email is kept, the new mobile number is captured
        assert_eq!(updated.email.as_deref(), Some("ann@x.com"));
        assert_eq!(updated.mobile.as_deref(), Some("07700 900000"));
    }

    #[test]
    fn capture_reports_nothing_when_no_field_is_new() {
        let explicit = CustomerDetails {
            email: Some("other@x.com".to_string()),
            ..CustomerDetails::default()
        };
        assert_eq!(capture_into_profile(&profile(), &explicit), None);
    }
}
