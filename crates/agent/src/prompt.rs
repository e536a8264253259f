//! Prompt assembly for the planner. Pure functions over the session state,
//! so every prompt is reproducible from its inputs.

use chrono::NaiveDate;

use maitred_core::domain::chat::{ChatHistory, TurnRole};
use maitred_core::domain::customer::CustomerDetails;

use crate::conversation::BookingIntent;
use crate::tools::tool_menu;

pub fn system_prompt(restaurant: &str, today: NaiveDate, profile: &CustomerDetails) -> String {
    let mut prompt = format!(
        "You are a booking assistant for the restaurant {restaurant}. Today is {today}.\n\
         You respond with exactly one JSON object per step: either\n\
         {{\"tool\": \"<name>\", \"arguments\": {{...}}}} to act, or\n\
         {{\"final_answer\": \"<reply to the user>\"}} when done.\n\n\
         Available tools:\n{}\n",
        tool_menu()
    );

    let known = known_profile_fields(profile);
    if known.is_empty() {
        prompt.push_str("\nNothing is known about this user's contact details yet.\n");
    } else {
        prompt.push_str(&format!(
            "\nKnown contact details (filled in automatically, do not ask again): {}.\n",
            known.join(", ")
        ));
    }

    prompt.push_str(
        "\nRules: never invent booking references; confirm a cancellation target with the user \
         before cancelling; dates are YYYY-MM-DD and times HH:MM:SS.\n",
    );
    prompt
}

pub fn transcript(
    history: &ChatHistory,
    message: &str,
    intent: &BookingIntent,
    scratchpad: &[(String, String)],
) -> String {
    let mut out = String::new();

    for turn in history.turns() {
        let speaker = match turn.role {
            TurnRole::Human => "User",
            TurnRole::Agent => "Assistant",
        };
        out.push_str(&format!("{speaker}: {}\n", turn.content));
    }
    out.push_str(&format!("User: {message}\n"));

    if let Some(hint) = intent.hint() {
        out.push_str(&format!("(note: {hint})\n"));
    }

    for (action, observation) in scratchpad {
        out.push_str(&format!("Action: {action}\nObservation: {observation}\n"));
    }
    out.push_str("Next step:");
    out
}

fn known_profile_fields(profile: &CustomerDetails) -> Vec<&'static str> {
    let mut known = Vec::new();
    let checks: [(&'static str, bool); 6] = [
        ("title", profile.title.is_some()),
        ("first name", profile.first_name.is_some()),
        ("surname", profile.surname.is_some()),
        ("email", profile.email.is_some()),
        ("mobile", profile.mobile.is_some()),
        ("phone", profile.phone.is_some()),
    ];
    for (label, present) in checks {
        if present {
            known.push(label);
        }
    }
    known
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use maitred_core::domain::chat::ChatHistory;
    use maitred_core::domain::customer::CustomerDetails;

    use crate::conversation::IntentExtractor;

    use super::{system_prompt, transcript};

    #[test]
    fn system_prompt_names_known_profile_fields() {
        let profile = CustomerDetails {
            first_name: Some("Ann".to_string()),
            email: Some("ann@x.com".to_string()),
            ..CustomerDetails::default()
        };
        let prompt = system_prompt(
            "TheHungryUnicorn",
            NaiveDate::from_ymd_opt(2030, 6, 1).expect("date"),
            &profile,
        );
        assert!(prompt.contains("Today is 2030-06-01"));
        assert!(prompt.contains("first name, email"));
        assert!(prompt.contains("check_availability"));
    }

    #[test]
    fn transcript_interleaves_history_hints_and_observations() {
        let mut history = ChatHistory::new();
        history.push_human("hi");
        history.push_agent("hello, how can I help?");

        let intent = IntentExtractor::new().extract("book a table for 2");
        let scratchpad = vec![(
            "check_availability".to_string(),
            r#"{"ok":true}"#.to_string(),
        )];

        let text = transcript(&history, "book a table for 2", &intent, &scratchpad);
        assert!(text.contains("User: hi\n"));
        assert!(text.contains("Assistant: hello"));
        assert!(text.contains("new booking"));
        assert!(text.contains("Observation: {\"ok\":true}"));
        assert!(text.ends_with("Next step:"));
    }
}
