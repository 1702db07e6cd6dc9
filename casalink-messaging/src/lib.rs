//! CasaLink Messaging Core
//!
//! The conversation/messaging subsystem of the CasaLink marketplace
//! client: conversation aggregation, thread session management, periodic
//! synchronization, and the compose/send pipeline, all over the backend
//! client from `casalink-api`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use casalink_api::RestClient;
//! use casalink_messaging::{MessagingSession, SyncConfig, SyncScheduler};
//!
//! let api = Arc::new(RestClient::new("https://api.casalink.example", token)?);
//! let session = MessagingSession::new(api, &user_id);
//!
//! session.refresh_conversations().await?;
//! session.select("agent-17").await?;
//! session.send("Is the cottage still available?").await?;
//!
//! // Keep things fresh while the view is open; dropping the handles
//! // stops the timers.
//! let scheduler = SyncScheduler::new(&SyncConfig::default());
//! let _thread_sync = scheduler.watch_thread(session.clone());
//! let _list_sync = scheduler.watch_conversations(session.clone());
//! ```

pub mod aggregate;
pub mod compose;
pub mod config;
pub mod session;
pub mod sync;

mod error;

pub use aggregate::{aggregate, aggregate_with, conversations_from_records, Conversation};
pub use config::SyncConfig;
pub use error::{MessagingError, Result};
pub use session::{MessagingSession, PollOutcome, ThreadState, ThreadView};
pub use sync::{SyncHandle, SyncScheduler};

#[cfg(test)]
pub mod test_utils;
