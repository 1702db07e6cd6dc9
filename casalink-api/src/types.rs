//! Wire types for the messaging endpoints
//!
//! These mirror the JSON shapes served by the marketplace backend. Field
//! names match the backend verbatim, so the structs deserialize straight
//! from response bodies without rename maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed message between two users.
///
/// Messages are immutable once created; only the `is_read` flag changes,
/// and only from the receiver's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// User who sent the message
    pub sender_id: String,

    /// User who received the message
    pub receiver_id: String,

    /// Message text (non-empty)
    pub content: String,

    /// Creation timestamp
    pub timestamp: DateTime<Utc>,

    /// Read status, meaningful from the receiver's perspective
    pub is_read: bool,
}

impl Message {
    /// The participant other than `self_id`, or `None` if `self_id` is not
    /// a participant at all.
    pub fn counterparty_of(&self, self_id: &str) -> Option<&str> {
        if self.sender_id == self_id {
            Some(&self.receiver_id)
        } else if self.receiver_id == self_id {
            Some(&self.sender_id)
        } else {
            None
        }
    }

    /// Whether this message counts toward `self_id`'s unread tally.
    pub fn is_unread_for(&self, self_id: &str) -> bool {
        self.receiver_id == self_id && !self.is_read
    }
}

/// Public profile of a user, as returned by the thread endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// User ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Avatar URL, if the user has one
    pub picture: Option<String>,
}

impl Profile {
    /// Placeholder identity for a counterparty whose profile could not be
    /// resolved, e.g. when a conversation is started fresh via send.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("User {}", id),
            picture: None,
        }
    }
}

/// One row of the backend's pre-aggregated conversation summary.
///
/// Served by `GET /messages/conversations`, one row per counterparty of the
/// authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// The other participant's user ID
    pub counterparty_id: String,

    /// The other participant's display name
    pub counterparty_name: String,

    /// The other participant's avatar URL
    pub counterparty_picture: Option<String>,

    /// Preview text of the most recent message
    pub last_message: String,

    /// Timestamp of the most recent message
    pub last_message_time: DateTime<Utc>,

    /// Unread messages from this counterparty
    pub unread_count: usize,

    /// Whether the authenticated user sent the most recent message
    pub is_last_sender: bool,
}

/// Response of `GET /messages/thread/{counterparty_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadResponse {
    /// Profile of the counterparty
    pub other_user: Profile,

    /// Full message history with that counterparty, ascending by timestamp
    pub messages: Vec<Message>,
}

/// Request body of `POST /messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Recipient user ID
    pub receiver_id: String,

    /// Message text
    pub content: String,
}
