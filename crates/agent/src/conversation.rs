//! Cheap keyword pre-analysis of the user's message.
//!
//! This never drives dispatch on its own - the planner decides which tool
//! runs. The extracted hints are folded into the planner prompt and the
//! turn trace so ambiguous messages surface a clarification early.

use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingIntent {
    pub wants_availability: bool,
    pub wants_booking: bool,
    pub wants_modification: bool,
    pub wants_cancellation: bool,
    pub wants_listing: bool,
    pub party_size_mentions: Vec<u32>,
    pub booking_references: Vec<String>,
    pub confidence_score: u8,
    pub clarification_prompt: Option<String>,
}

impl BookingIntent {
    pub fn hint(&self) -> Option<&'static str> {
        if self.wants_cancellation {
            Some("the user appears to want a cancellation")
        } else if self.wants_modification {
            Some("the user appears to want to change an existing booking")
        } else if self.wants_booking {
            Some("the user appears to want a new booking")
        } else if self.wants_availability {
            Some("the user appears to be asking about availability")
        } else if self.wants_listing {
            Some("the user appears to be asking about their bookings")
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IntentExtractor;

impl IntentExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> BookingIntent {
        let normalized_text = normalize_text(text);
        let tokens = tokenize(&normalized_text);

        let wants_cancellation = contains_any(&normalized_text, &["cancel", "call off", "scrap"]);
        let wants_modification = contains_any(
            &normalized_text,
            &["change", "move", "reschedule", "amend", "update", "push back", "bring forward"],
        );
        let wants_booking = contains_any(
            &normalized_text,
            &["book", "reserve", "reservation", "table for", "get us in"],
        ) && !wants_cancellation;
        let wants_availability = contains_any(
            &normalized_text,
            &["available", "availability", "free", "any tables", "slots", "openings"],
        );
        let wants_listing = contains_any(
            &normalized_text,
            &["my booking", "my bookings", "my reservation", "what have i", "list"],
        );

        let party_size_mentions = extract_party_sizes(&tokens);
        let booking_references = extract_references(text);

        let confidence_score = confidence_score(
            wants_availability
                || wants_booking
                || wants_modification
                || wants_cancellation
                || wants_listing,
            !party_size_mentions.is_empty(),
            !booking_references.is_empty(),
        );

        let clarification_prompt = if confidence_score < 40 {
            Some(
                "Could you say whether you want to check availability, make, change, or cancel a booking?"
                    .to_string(),
            )
        } else {
            None
        };

        BookingIntent {
            wants_availability,
            wants_booking,
            wants_modification,
            wants_cancellation,
            wants_listing,
            party_size_mentions,
            booking_references,
            confidence_score,
            clarification_prompt,
        }
    }
}

fn normalize_text(text: &str) -> String {
    text.to_ascii_lowercase()
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

fn contains_any(normalized_text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| normalized_text.contains(needle))
}

fn extract_party_sizes(tokens: &[String]) -> Vec<u32> {
    let mut sizes = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let preceded_by_for = index > 0 && tokens[index - 1] == "for";
        let followed_by_unit = tokens
            .get(index + 1)
            .is_some_and(|next| matches!(next.as_str(), "people" | "guests" | "persons" | "of"));
        if !preceded_by_for && !followed_by_unit {
            continue;
        }
        if let Ok(size) = token.parse::<u32>() {
            if size > 0 && size <= 50 {
                sizes.push(size);
            }
        }
    }
    sizes
}

/// Provider references are 3-20 uppercase alphanumerics. Require at least
/// one digit so ordinary shouted words don't match.
fn extract_references(text: &str) -> Vec<String> {
    let mut references = BTreeSet::new();
    for raw in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        let len = raw.len();
        if (3..=20).contains(&len)
            && raw.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            && raw.chars().any(|c| c.is_ascii_digit())
        {
            references.insert(raw.to_string());
        }
    }
    references.into_iter().collect()
}

fn confidence_score(has_verb: bool, has_party_size: bool, has_reference: bool) -> u8 {
    let mut score = 10u8;
    if has_verb {
        score += 50;
    }
    if has_party_size {
        score += 20;
    }
    if has_reference {
        score += 20;
    }
    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::IntentExtractor;

    #[test]
    fn recognizes_a_booking_request_with_party_size() {
        let intent = IntentExtractor::new().extract("Book a table for 4 people on Friday");
        assert!(intent.wants_booking);
        assert!(!intent.wants_cancellation);
        assert_eq!(intent.party_size_mentions, vec![4]);
        assert!(intent.confidence_score >= 70);
        assert!(intent.clarification_prompt.is_none());
    }

    #[test]
    fn recognizes_cancellation_with_reference() {
        let intent = IntentExtractor::new().extract("Please cancel my booking ABC1234");
        assert!(intent.wants_cancellation);
        assert_eq!(intent.booking_references, vec!["ABC1234".to_string()]);
    }

    #[test]
    fn cancellation_wins_over_booking_verbs() {
        let intent = IntentExtractor::new().extract("cancel the reservation I booked");
        assert!(intent.wants_cancellation);
        assert!(!intent.wants_booking);
        assert_eq!(intent.hint(), Some("the user appears to want a cancellation"));
    }

    #[test]
    fn ambiguous_text_requests_clarification() {
        let intent = IntentExtractor::new().extract("hello there");
        assert!(intent.clarification_prompt.is_some());
        assert_eq!(intent.hint(), None);
    }

    #[test]
    fn references_require_a_digit() {
        let intent = IntentExtractor::new().extract("CANCEL my booking REF9X please, ASAP");
        assert_eq!(intent.booking_references, vec!["REF9X".to_string()]);
    }
}
