use thiserror::Error;

/// A request failed a field-level constraint before any network call.
///
/// The message quotes the first failing constraint in terms a user can act
/// on; the planner feeds it back into the conversation verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}
