//! Conversation Aggregation
//!
//! Derives the per-counterparty conversation list from a flat message set.
//! The backend serves a pre-aggregated equivalent
//! (`GET /messages/conversations`); [`aggregate`] is the reference
//! implementation over raw messages, used as the fallback path and as the
//! testable definition of the list's invariants:
//!
//! 1. One conversation per distinct counterparty of the current user.
//! 2. `unread_count` counts messages received from that counterparty and
//!    not yet read.
//! 3. The list is ordered descending by last-message timestamp, ties broken
//!    by message creation order, so the ordering is deterministic.
//!
//! Duplicate message records (e.g. from a retried send the backend did not
//! deduplicate) are treated as distinct entries and both contribute to
//! ordering.

use std::collections::HashMap;

use casalink_api::{ConversationRecord, Message, Profile};
use chrono::{DateTime, Utc};

/// Aggregated summary of all messages with one counterparty.
///
/// Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// Display identity of the counterparty; a placeholder when the profile
    /// could not be resolved
    pub counterparty: Profile,

    /// Content of the most recent message
    pub last_message: String,

    /// Timestamp of the most recent message
    pub last_message_time: DateTime<Utc>,

    /// Unread messages from this counterparty
    pub unread_count: usize,

    /// Whether the current user sent the most recent message
    pub is_last_sender: bool,
}

impl Conversation {
    /// Adapt one backend summary row.
    ///
    /// An empty counterparty name falls back to the placeholder identity.
    pub fn from_record(record: ConversationRecord) -> Self {
        let counterparty = if record.counterparty_name.trim().is_empty() {
            Profile::placeholder(&record.counterparty_id)
        } else {
            Profile {
                id: record.counterparty_id,
                name: record.counterparty_name,
                picture: record.counterparty_picture,
            }
        };

        Self {
            counterparty,
            last_message: record.last_message,
            last_message_time: record.last_message_time,
            unread_count: record.unread_count,
            is_last_sender: record.is_last_sender,
        }
    }
}

/// Derive the conversation list from raw messages, with placeholder
/// identities for every counterparty.
pub fn aggregate(messages: &[Message], self_id: &str) -> Vec<Conversation> {
    aggregate_with(messages, self_id, |_| None)
}

/// Derive the conversation list from raw messages, resolving counterparty
/// identities through `resolve`; unresolved ids get a placeholder.
pub fn aggregate_with<F>(messages: &[Message], self_id: &str, mut resolve: F) -> Vec<Conversation>
where
    F: FnMut(&str) -> Option<Profile>,
{
    struct Group<'a> {
        last: &'a Message,
        last_index: usize,
        unread: usize,
    }

    let mut groups: HashMap<String, Group<'_>> = HashMap::new();

    for (index, message) in messages.iter().enumerate() {
        let Some(counterparty_id) = message.counterparty_of(self_id) else {
            continue;
        };

        let group = groups
            .entry(counterparty_id.to_string())
            .or_insert_with(|| Group {
                last: message,
                last_index: index,
                unread: 0,
            });

        // Later creation order wins timestamp ties.
        if message.timestamp > group.last.timestamp
            || (message.timestamp == group.last.timestamp && index > group.last_index)
        {
            group.last = message;
            group.last_index = index;
        }

        if message.is_unread_for(self_id) {
            group.unread += 1;
        }
    }

    let mut conversations: Vec<(usize, Conversation)> = groups
        .into_iter()
        .map(|(counterparty_id, group)| {
            let counterparty = resolve(&counterparty_id)
                .unwrap_or_else(|| Profile::placeholder(&counterparty_id));
            let conversation = Conversation {
                counterparty,
                last_message: group.last.content.clone(),
                last_message_time: group.last.timestamp,
                unread_count: group.unread,
                is_last_sender: group.last.sender_id == self_id,
            };
            (group.last_index, conversation)
        })
        .collect();

    conversations.sort_by(|(index_a, a), (index_b, b)| {
        b.last_message_time
            .cmp(&a.last_message_time)
            .then(index_b.cmp(index_a))
    });

    conversations
        .into_iter()
        .map(|(_, conversation)| conversation)
        .collect()
}

/// Adapt the backend's summary rows, re-sorting locally so the ordering
/// invariant holds regardless of backend order.
pub fn conversations_from_records(records: Vec<ConversationRecord>) -> Vec<Conversation> {
    let mut conversations: Vec<Conversation> =
        records.into_iter().map(Conversation::from_record).collect();

    // Stable sort: rows with equal timestamps keep the backend's relative
    // (creation) order.
    conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    conversations
}

/// Total unread messages across a conversation list.
pub fn unread_total(conversations: &[Conversation]) -> usize {
    conversations.iter().map(|c| c.unread_count).sum()
}
