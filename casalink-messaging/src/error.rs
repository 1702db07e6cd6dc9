//! Error handling for the messaging session
//!
//! Local rejections (validation, re-entrancy) are separate variants so
//! callers can offer the right affordance — a validation message for empty
//! content, a retry affordance for an in-flight send. Backend and transport
//! failures pass through as [`ApiError`].

use casalink_api::ApiError;
use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors surfaced by the messaging session
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Message content was empty or whitespace-only; rejected before any
    /// network call.
    #[error("message content must not be empty")]
    EmptyContent,

    /// A send was requested without an active thread or explicit recipient.
    #[error("no conversation is selected")]
    NoActiveThread,

    /// A send to this recipient is already outstanding; the submit was
    /// rejected rather than dispatched concurrently.
    #[error("a message to {0} is already being sent")]
    SendInFlight(String),

    /// Backend or transport failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl MessagingError {
    /// Whether retrying the operation unchanged might succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MessagingError::EmptyContent | MessagingError::NoActiveThread => false,
            MessagingError::SendInFlight(_) => true,
            MessagingError::Api(error) => error.is_recoverable(),
        }
    }

    /// A message suitable for display in the UI.
    pub fn user_message(&self) -> String {
        match self {
            MessagingError::EmptyContent => "Type a message before sending.".to_string(),
            MessagingError::NoActiveThread => "Select a conversation first.".to_string(),
            MessagingError::SendInFlight(_) => {
                "Your previous message is still sending. Try again in a moment.".to_string()
            }
            MessagingError::Api(error) => error.user_message(),
        }
    }
}
