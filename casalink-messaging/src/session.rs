//! Thread Session Manager
//!
//! [`MessagingSession`] owns the state of the messaging view: the selected
//! counterparty, the active thread's ordered message list, the cached
//! conversation list, and the draft text. It is an explicit object created
//! and owned by the view that needs it — there is no ambient singleton.
//!
//! ## Thread lifecycle
//!
//! `Unselected → Loading → Ready`. A background refresh of a `Ready`
//! thread re-enters the network but never blanks the view: the stale
//! messages stay visible until the fresh ones replace them in one step.
//!
//! ## Staleness discipline
//!
//! Every thread fetch is tagged at dispatch time with the selection
//! generation (bumped by [`select`](MessagingSession::select) and
//! [`clear_selection`](MessagingSession::clear_selection)) and a monotonic
//! sequence number. A result is applied only if its generation is still
//! current and its sequence is newer than the last applied one — so two
//! overlapping refreshes resolve last-writer-by-sequence (most recently
//! *dispatched* wins, not most recently arrived), and responses for an
//! abandoned selection are discarded without touching state.
//!
//! ## Read transitions
//!
//! Selecting a thread is the only operation that turns unread messages
//! read: the session updates its local copies synchronously and fires the
//! idempotent server-side mark-as-read without blocking thread display.
//! Re-selecting the already-active thread refreshes it but does not
//! re-dispatch mark-as-read.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use casalink_api::{ApiError, MessagesApi, Message, Profile, ThreadResponse};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::aggregate::{conversations_from_records, unread_total, Conversation};
use crate::error::Result;

/// State of the active thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ThreadState {
    /// No conversation selected
    #[default]
    Unselected,

    /// A selection was made and its first fetch is in flight
    Loading {
        /// The selected counterparty
        counterparty_id: String,
    },

    /// The thread is loaded (possibly stale between poll ticks)
    Ready(ThreadView),
}

impl ThreadState {
    /// The selected counterparty, if any.
    pub fn counterparty_id(&self) -> Option<&str> {
        match self {
            ThreadState::Unselected => None,
            ThreadState::Loading { counterparty_id } => Some(counterparty_id),
            ThreadState::Ready(view) => Some(&view.counterparty.id),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ThreadState::Ready(_))
    }
}

/// A loaded thread: the counterparty's identity and the ordered messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    /// Counterparty profile, or a placeholder if unresolved
    pub counterparty: Profile,

    /// Messages with that counterparty, ascending by timestamp
    pub messages: Vec<Message>,
}

/// Outcome of one background poll pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fresh data was applied
    Refreshed,

    /// The previous refresh for this target had not resolved; the tick was
    /// skipped without queuing or cancelling anything
    Skipped,

    /// Nothing to refresh (no thread selected)
    NoTarget,

    /// The response resolved but no longer mattered (superseded by a newer
    /// dispatch or an abandoned selection)
    Discarded,
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) thread: ThreadState,
    pub(crate) conversations: Vec<Conversation>,
    thread_last_applied: u64,
    list_last_applied: u64,
    thread_in_flight: usize,
    list_in_flight: usize,
    pub(crate) draft: String,
    pub(crate) sends_in_flight: HashSet<String>,
}

/// Messaging session for one authenticated user.
///
/// Cheap to clone; clones share the same state, so one can be handed to the
/// sync scheduler while the view keeps another.
#[derive(Clone)]
pub struct MessagingSession {
    pub(crate) api: Arc<dyn MessagesApi>,
    self_id: Arc<str>,
    pub(crate) state: Arc<RwLock<SessionState>>,
    thread_gen: Arc<AtomicU64>,
    thread_seq: Arc<AtomicU64>,
    list_seq: Arc<AtomicU64>,
}

impl MessagingSession {
    /// Create a session for `self_id` over the given backend.
    pub fn new(api: Arc<dyn MessagesApi>, self_id: &str) -> Self {
        Self {
            api,
            self_id: Arc::from(self_id),
            state: Arc::new(RwLock::new(SessionState::default())),
            thread_gen: Arc::new(AtomicU64::new(0)),
            thread_seq: Arc::new(AtomicU64::new(0)),
            list_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The authenticated user's id.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Select a conversation and load its thread.
    ///
    /// Idempotent: re-selecting the active counterparty refreshes the
    /// thread without re-dispatching mark-as-read or touching the draft.
    /// Selecting a counterparty with no history yields an empty `Ready`
    /// thread with a placeholder identity, so a conversation can be
    /// started fresh via send.
    pub async fn select(&self, counterparty_id: &str) -> Result<()> {
        let same_target = {
            let state = self.state.read().await;
            state.thread.counterparty_id() == Some(counterparty_id)
        };
        if same_target {
            self.refresh_thread().await?;
            return Ok(());
        }

        let generation = self.thread_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let sequence = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(
                &mut state.thread,
                ThreadState::Loading {
                    counterparty_id: counterparty_id.to_string(),
                },
            )
        };

        match self.fetch_thread_guarded(counterparty_id).await {
            Ok(response) => {
                let mut state = self.state.write().await;
                if self.thread_gen.load(Ordering::SeqCst) != generation
                    || sequence <= state.thread_last_applied
                {
                    debug!("selection of {} superseded, discarding result", counterparty_id);
                    return Ok(());
                }
                state.thread_last_applied = sequence;

                let mut view = ThreadView {
                    counterparty: response.other_user,
                    messages: response.messages,
                };
                // The receiver-side read transition happens here, locally
                // and synchronously; the server call catches up below.
                for message in &mut view.messages {
                    if message.receiver_id == *self.self_id {
                        message.is_read = true;
                    }
                }
                for conversation in &mut state.conversations {
                    if conversation.counterparty.id == counterparty_id {
                        conversation.unread_count = 0;
                    }
                }

                info!(
                    "selected thread with {} ({} messages)",
                    counterparty_id,
                    view.messages.len()
                );
                state.thread = ThreadState::Ready(view);
                state.draft.clear();
                drop(state);

                self.dispatch_mark_read(counterparty_id);
                Ok(())
            }
            Err(error) => {
                let mut state = self.state.write().await;
                if self.thread_gen.load(Ordering::SeqCst) == generation {
                    state.thread = previous;
                }
                Err(error)
            }
        }
    }

    /// Deselect the active thread and invalidate its in-flight requests.
    pub async fn clear_selection(&self) {
        self.thread_gen.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state.thread = ThreadState::Unselected;
        state.draft.clear();
    }

    /// The currently selected counterparty, if any.
    pub async fn selected_counterparty(&self) -> Option<String> {
        self.state
            .read()
            .await
            .thread
            .counterparty_id()
            .map(String::from)
    }

    /// Current thread state (cloned snapshot).
    pub async fn thread_state(&self) -> ThreadState {
        self.state.read().await.thread.clone()
    }

    /// Messages of the active thread, ascending by timestamp; empty while
    /// no thread is loaded.
    pub async fn thread_messages(&self) -> Vec<Message> {
        match &self.state.read().await.thread {
            ThreadState::Ready(view) => view.messages.clone(),
            _ => Vec::new(),
        }
    }

    /// Profile of the active counterparty once the thread is loaded.
    pub async fn counterparty_profile(&self) -> Option<Profile> {
        match &self.state.read().await.thread {
            ThreadState::Ready(view) => Some(view.counterparty.clone()),
            _ => None,
        }
    }

    /// Cached conversation list, ordered by recency.
    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.read().await.conversations.clone()
    }

    /// Total unread messages across all conversations.
    pub async fn unread_total(&self) -> usize {
        unread_total(&self.state.read().await.conversations)
    }

    /// Replace the draft text for the active thread.
    pub async fn set_draft(&self, text: &str) {
        self.state.write().await.draft = text.to_string();
    }

    /// Current draft text.
    pub async fn draft(&self) -> String {
        self.state.read().await.draft.clone()
    }

    /// Re-fetch the active thread and apply the result if it is still
    /// current. Returns whether fresh data was applied. A `Ready` thread
    /// stays visible (stale) until the fresh messages replace it.
    pub async fn refresh_thread(&self) -> Result<bool> {
        let Some(counterparty_id) = self.selected_counterparty().await else {
            return Ok(false);
        };

        let generation = self.thread_gen.load(Ordering::SeqCst);
        let sequence = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let response = self.fetch_thread_guarded(&counterparty_id).await?;

        let mut state = self.state.write().await;
        if self.thread_gen.load(Ordering::SeqCst) != generation {
            debug!("discarding thread refresh for abandoned target {}", counterparty_id);
            return Ok(false);
        }
        if sequence <= state.thread_last_applied {
            debug!("discarding out-of-sequence thread refresh for {}", counterparty_id);
            return Ok(false);
        }
        state.thread_last_applied = sequence;

        state.thread = ThreadState::Ready(ThreadView {
            counterparty: response.other_user,
            messages: response.messages,
        });
        Ok(true)
    }

    /// Re-fetch the conversation list and apply it if no newer dispatch has
    /// resolved first.
    pub async fn refresh_conversations(&self) -> Result<()> {
        let sequence = self.list_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.state.write().await.list_in_flight += 1;
        let result = self.api.fetch_conversations().await;
        let mut state = self.state.write().await;
        state.list_in_flight -= 1;

        let records = result?;
        if sequence <= state.list_last_applied {
            debug!("discarding out-of-sequence conversation list refresh");
            return Ok(());
        }
        state.list_last_applied = sequence;
        state.conversations = conversations_from_records(records);
        Ok(())
    }

    /// One scheduler pass over the active thread: skip if a refresh is
    /// already in flight, otherwise refresh.
    pub async fn poll_thread(&self) -> Result<PollOutcome> {
        {
            let state = self.state.read().await;
            if state.thread.counterparty_id().is_none() {
                return Ok(PollOutcome::NoTarget);
            }
            if state.thread_in_flight > 0 {
                return Ok(PollOutcome::Skipped);
            }
        }

        if self.refresh_thread().await? {
            Ok(PollOutcome::Refreshed)
        } else {
            Ok(PollOutcome::Discarded)
        }
    }

    /// One scheduler pass over the conversation list.
    pub async fn poll_conversations(&self) -> Result<PollOutcome> {
        if self.state.read().await.list_in_flight > 0 {
            return Ok(PollOutcome::Skipped);
        }

        self.refresh_conversations().await?;
        Ok(PollOutcome::Refreshed)
    }

    /// Fetch a thread with the in-flight flag held; a 404 for the
    /// counterparty means a fresh conversation, not an error.
    async fn fetch_thread_guarded(&self, counterparty_id: &str) -> Result<ThreadResponse> {
        self.state.write().await.thread_in_flight += 1;
        let result = self.api.fetch_thread(counterparty_id).await;
        self.state.write().await.thread_in_flight -= 1;

        match result {
            Ok(response) => Ok(response),
            Err(ApiError::Backend { status: 404, .. }) => Ok(ThreadResponse {
                other_user: Profile::placeholder(counterparty_id),
                messages: Vec::new(),
            }),
            Err(error) => Err(error.into()),
        }
    }

    /// Fire-and-forget server-side mark-as-read; does not block thread
    /// display. Failures are logged, the operation is idempotent and the
    /// next selection retries it.
    fn dispatch_mark_read(&self, counterparty_id: &str) {
        let api = Arc::clone(&self.api);
        let counterparty = counterparty_id.to_string();
        tokio::spawn(async move {
            if let Err(error) = api.mark_thread_read(&counterparty).await {
                warn!("mark-as-read for {} failed: {}", counterparty, error);
            }
        });
    }
}
