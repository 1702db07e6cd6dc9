//! Compose & Send Pipeline
//!
//! Validates and submits new messages for the active thread (or an explicit
//! recipient, when starting a conversation from a listing page), then
//! forces an immediate re-sync so the sent message appears without waiting
//! for the next poll tick.
//!
//! Rules, in order:
//! - Whitespace-only content is rejected locally; no network call is made.
//! - While a send to a recipient is outstanding, a second submit for the
//!   same recipient is rejected (never dispatched concurrently); the
//!   caller can retry once the first resolves.
//! - On success the draft is cleared and both the thread and the
//!   conversation list are refreshed through the session — the pipeline
//!   never writes thread or list state directly.
//! - On failure the error is surfaced and nothing changes: the draft and
//!   all rendered state stay as they were.

use casalink_api::Message;
use tracing::{info, warn};

use crate::error::{MessagingError, Result};
use crate::session::MessagingSession;

impl MessagingSession {
    /// Send `content` to the active thread's counterparty.
    pub async fn send(&self, content: &str) -> Result<Message> {
        let receiver_id = self
            .selected_counterparty()
            .await
            .ok_or(MessagingError::NoActiveThread)?;
        self.send_to(&receiver_id, content).await
    }

    /// Send `content` to an explicit recipient.
    pub async fn send_to(&self, receiver_id: &str, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessagingError::EmptyContent);
        }

        {
            let mut state = self.state.write().await;
            if !state.sends_in_flight.insert(receiver_id.to_string()) {
                return Err(MessagingError::SendInFlight(receiver_id.to_string()));
            }
        }

        let result = self.api.send_message(receiver_id, content).await;

        {
            let mut state = self.state.write().await;
            state.sends_in_flight.remove(receiver_id);
            if result.is_ok() && state.thread.counterparty_id() == Some(receiver_id) {
                state.draft.clear();
            }
        }

        let message = result?;
        info!("sent message {} to {}", message.id, receiver_id);

        // Forced re-sync; a failure here only delays freshness until the
        // next tick, the send itself already succeeded.
        let (thread_result, list_result) =
            tokio::join!(self.refresh_thread(), self.refresh_conversations());
        if let Err(error) = thread_result {
            warn!("post-send thread refresh failed: {}", error);
        }
        if let Err(error) = list_result {
            warn!("post-send conversation refresh failed: {}", error);
        }

        Ok(message)
    }
}
