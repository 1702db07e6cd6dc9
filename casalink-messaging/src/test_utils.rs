//! In-memory backend for session tests.
//!
//! Implements [`MessagesApi`] over a message vector, with call counters and
//! failure/latency injection so tests can assert network silence, slow
//! responses, and error propagation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use casalink_api::{
    ApiError, ConversationRecord, Message, MessagesApi, Profile, Result, ThreadResponse,
};
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use crate::aggregate::aggregate_with;

/// Call counts per endpoint.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub conversations: usize,
    pub threads: usize,
    pub sends: usize,
    pub mark_reads: usize,
}

#[derive(Default)]
struct Inner {
    self_id: String,
    messages: Vec<Message>,
    profiles: HashMap<String, Profile>,
    next_ts: i64,
    next_id: u64,
    calls: Calls,
    thread_delays: HashMap<String, Duration>,
    fail_next_thread: Option<(u16, String)>,
    fail_next_send: Option<(u16, String)>,
    hold_sends: bool,
}

/// In-memory [`MessagesApi`] implementation.
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new(self_id: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                self_id: self_id.to_string(),
                ..Inner::default()
            }),
        }
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.inner
            .lock()
            .await
            .profiles
            .insert(profile.id.clone(), profile);
    }

    /// Seed a message from `sender` to `receiver`; timestamps are strictly
    /// increasing in insertion order.
    pub async fn push_message(&self, sender: &str, receiver: &str, content: &str) -> Message {
        let mut inner = self.inner.lock().await;
        inner.next_ts += 1;
        inner.next_id += 1;
        let message = Message {
            id: format!("m{}", inner.next_id),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            content: content.to_string(),
            timestamp: Utc
                .timestamp_opt(1_700_000_000 + inner.next_ts, 0)
                .unwrap(),
            is_read: false,
        };
        inner.messages.push(message.clone());
        message
    }

    /// Seed an incoming (counterparty → self) message.
    pub async fn push_incoming(&self, from: &str, content: &str) -> Message {
        let self_id = self.inner.lock().await.self_id.clone();
        self.push_message(from, &self_id, content).await
    }

    pub async fn calls(&self) -> Calls {
        self.inner.lock().await.calls.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    /// Delay every thread fetch for `counterparty_id`.
    pub async fn set_thread_delay(&self, counterparty_id: &str, delay: Duration) {
        self.inner
            .lock()
            .await
            .thread_delays
            .insert(counterparty_id.to_string(), delay);
    }

    /// Fail the next thread fetch with a backend error.
    pub async fn fail_next_thread(&self, status: u16, detail: &str) {
        self.inner.lock().await.fail_next_thread = Some((status, detail.to_string()));
    }

    /// Fail the next send with a backend error.
    pub async fn fail_next_send(&self, status: u16, detail: &str) {
        self.inner.lock().await.fail_next_send = Some((status, detail.to_string()));
    }

    /// Park every send until [`release_sends`](Self::release_sends).
    pub async fn hold_sends(&self) {
        self.inner.lock().await.hold_sends = true;
    }

    pub async fn release_sends(&self) {
        self.inner.lock().await.hold_sends = false;
    }
}

#[async_trait]
impl MessagesApi for InMemoryBackend {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>> {
        let mut inner = self.inner.lock().await;
        inner.calls.conversations += 1;

        let conversations = aggregate_with(&inner.messages, &inner.self_id, |id| {
            inner.profiles.get(id).cloned()
        });

        Ok(conversations
            .into_iter()
            .map(|c| ConversationRecord {
                counterparty_id: c.counterparty.id.clone(),
                counterparty_name: c.counterparty.name,
                counterparty_picture: c.counterparty.picture,
                last_message: c.last_message,
                last_message_time: c.last_message_time,
                unread_count: c.unread_count,
                is_last_sender: c.is_last_sender,
            })
            .collect())
    }

    async fn fetch_thread(&self, counterparty_id: &str) -> Result<ThreadResponse> {
        let delay = {
            let mut inner = self.inner.lock().await;
            inner.calls.threads += 1;

            if let Some((status, detail)) = inner.fail_next_thread.take() {
                return Err(ApiError::backend(status, detail));
            }

            inner.thread_delays.get(counterparty_id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.inner.lock().await;
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == inner.self_id && m.receiver_id == counterparty_id)
                    || (m.sender_id == counterparty_id && m.receiver_id == inner.self_id)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);

        let other_user = match inner.profiles.get(counterparty_id) {
            Some(profile) => profile.clone(),
            None if !messages.is_empty() => Profile::placeholder(counterparty_id),
            None => return Err(ApiError::backend(404, "User not found")),
        };

        Ok(ThreadResponse {
            other_user,
            messages,
        })
    }

    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message> {
        while self.inner.lock().await.hold_sends {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut inner = self.inner.lock().await;
        inner.calls.sends += 1;

        if let Some((status, detail)) = inner.fail_next_send.take() {
            return Err(ApiError::backend(status, detail));
        }
        if content.trim().is_empty() {
            return Err(ApiError::backend(400, "Message content must not be empty"));
        }
        if receiver_id == inner.self_id {
            return Err(ApiError::backend(400, "You cannot message yourself"));
        }

        inner.next_ts += 1;
        inner.next_id += 1;
        let message = Message {
            id: format!("m{}", inner.next_id),
            sender_id: inner.self_id.clone(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp: Utc
                .timestamp_opt(1_700_000_000 + inner.next_ts, 0)
                .unwrap(),
            is_read: false,
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_thread_read(&self, counterparty_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.mark_reads += 1;

        let self_id = inner.self_id.clone();
        for message in &mut inner.messages {
            if message.sender_id == counterparty_id && message.receiver_id == self_id {
                message.is_read = true;
            }
        }
        Ok(())
    }
}
