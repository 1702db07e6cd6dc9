//! Messaging API client
//!
//! Client for the messaging endpoints of the marketplace backend. All
//! requests carry the authenticated user's bearer token; the backend infers
//! the current user from it, so no endpoint takes a `self` id.
//!
//! **Endpoints**:
//! - `GET /messages/conversations` — one summary row per counterparty
//! - `GET /messages/thread/{counterparty_id}` — counterparty profile plus
//!   the full message history, ascending by timestamp
//! - `POST /messages` — create a message; validation failures come back as
//!   4xx with a `detail` string (empty content, unknown receiver,
//!   self-addressed message)
//! - `POST /messages/thread/{counterparty_id}/read` — mark every message
//!   from that counterparty as read; idempotent on the server
//!
//! The [`MessagesApi`] trait is the seam consumed by the session layer, so
//! tests can substitute an in-memory backend for [`RestClient`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::types::{ConversationRecord, Message, SendMessageRequest, ThreadResponse};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend messaging operations consumed by the session layer.
#[async_trait]
pub trait MessagesApi: Send + Sync {
    /// Fetch the conversation summary rows for the authenticated user.
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>>;

    /// Fetch the full thread with one counterparty.
    ///
    /// A counterparty with no prior messages is not an error: the backend
    /// returns an empty message list (and a placeholder profile if the user
    /// cannot be resolved).
    async fn fetch_thread(&self, counterparty_id: &str) -> Result<ThreadResponse>;

    /// Create a new message addressed to `receiver_id`.
    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message>;

    /// Mark every message from `counterparty_id` as read.
    async fn mark_thread_read(&self, counterparty_id: &str) -> Result<()>;
}

/// 4xx/5xx body shape used by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// REST implementation of [`MessagesApi`] over reqwest.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    /// Create a client for `base_url`, authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        decode_response(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        decode_response(response).await
    }
}

#[async_trait]
impl MessagesApi for RestClient {
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>> {
        self.get_json("/messages/conversations").await
    }

    async fn fetch_thread(&self, counterparty_id: &str) -> Result<ThreadResponse> {
        self.get_json(&format!("/messages/thread/{}", counterparty_id))
            .await
    }

    async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message> {
        let request = SendMessageRequest {
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
        };
        self.post_json("/messages", &request).await
    }

    async fn mark_thread_read(&self, counterparty_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("/messages/thread/{}/read", counterparty_id));
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(backend_error(status.as_u16(), &body))
        }
    }
}

/// Validate and normalize the configured base URL.
fn normalize_base_url(url: String) -> Result<String> {
    let trimmed = url.trim_end_matches('/');
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ApiError::InvalidUrl(url));
    }
    Ok(trimmed.to_string())
}

/// Turn a response into `T`, mapping non-2xx statuses to [`ApiError::Backend`].
async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(serde_json::from_str(&body)?)
    } else {
        Err(backend_error(status.as_u16(), &body))
    }
}

/// Build a backend error, extracting the `detail` field when present.
fn backend_error(status: u16, body: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| {
            let text = body.trim();
            if text.is_empty() {
                format!("HTTP {}", status)
            } else {
                text.to_string()
            }
        });

    ApiError::backend(status, detail)
}
