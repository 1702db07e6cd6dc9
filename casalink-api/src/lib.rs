//! CasaLink Backend API Client
//!
//! This library provides the typed client surface for the CasaLink
//! marketplace backend's messaging endpoints: wire types, the
//! [`MessagesApi`] trait seam, and the [`RestClient`] implementation.
//!
//! Authentication, listing storage, and moderation live entirely on the
//! backend; this crate only consumes them.

pub mod client;
pub mod types;

mod error;

pub use client::{MessagesApi, RestClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ApiError, Result};
pub use types::{ConversationRecord, Message, Profile, SendMessageRequest, ThreadResponse};
