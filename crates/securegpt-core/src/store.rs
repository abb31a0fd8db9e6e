//! Conversation list with write-through persistence
//!
//! [`ChatStore`] is the single owner of every [`Conversation`]. Each mutation
//! builds the next [`StoreSnapshot`], swaps it in, writes the conversation
//! list to the persistence slot, and then calls the subscribed observers with
//! the new snapshot. Snapshots handed out earlier never change.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_TITLE_WORDS;
use crate::persist::KeyValueStore;
use crate::state::{ChatMessage, Conversation, MessagePatch, INFERENCE_ERROR_MESSAGE};

/// Slot holding the serialized conversation list
pub const STORAGE_KEY: &str = "secureGPT_chats";

/// Title used when there is nothing better to name a conversation after
pub const DEFAULT_TITLE: &str = "New Chat";

/// Immutable view of the store after a commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// In creation order
    pub conversations: Vec<Conversation>,
    pub active_id: Option<String>,
}

impl StoreSnapshot {
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Appends a fresh conversation and makes it active
    fn push_new(&mut self) -> String {
        let conversation = Conversation::new(format!("{} {}", DEFAULT_TITLE, self.conversations.len() + 1));
        let id = conversation.id.clone();
        self.conversations.push(conversation);
        self.active_id = Some(id.clone());
        id
    }
}

pub type Observer = Box<dyn Fn(&Arc<StoreSnapshot>) + Send>;

pub struct ChatStore {
    snapshot: Arc<StoreSnapshot>,
    slot: Box<dyn KeyValueStore>,
    observers: Vec<Observer>,
    title_words: usize,
}

impl ChatStore {
    /// Hydrate from the persistence slot.
    ///
    /// A missing, unreadable, or empty slot yields a store holding one empty
    /// conversation.
    pub fn load(slot: Box<dyn KeyValueStore>) -> Self {
        let mut conversations = match slot.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(conversations) => conversations,
                Err(e) => {
                    warn!(error = %e, "stored chat history is unreadable, starting fresh");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not read chat history");
                Vec::new()
            }
        };

        let mut store = Self {
            snapshot: Arc::new(StoreSnapshot::default()),
            slot,
            observers: Vec::new(),
            title_words: DEFAULT_TITLE_WORDS,
        };

        if conversations.is_empty() {
            store.ensure_populated();
        } else {
            info!(count = conversations.len(), "loaded chat history");
            let interrupted = resolve_interrupted(&mut conversations);
            let active_id = conversations.first().map(|c| c.id.clone());
            store.snapshot = Arc::new(StoreSnapshot {
                conversations,
                active_id,
            });
            if interrupted {
                store.persist();
            }
        }
        store
    }

    /// Number of words kept when titling a conversation
    pub fn with_title_words(mut self, words: usize) -> Self {
        self.title_words = words.max(1);
        self
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.snapshot.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.snapshot.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.snapshot.active()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.snapshot.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Register an observer called after every commit
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&Arc<StoreSnapshot>) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Restore the non-empty invariant. Returns true if a conversation was created.
    pub fn ensure_populated(&mut self) -> bool {
        if !self.snapshot.is_empty() {
            return false;
        }
        self.update(|next| {
            next.push_new();
            true
        });
        true
    }

    /// Id of the active conversation, creating or selecting one if needed
    pub fn ensure_active(&mut self) -> String {
        self.ensure_populated();
        if let Some(id) = self.active_id() {
            return id.to_string();
        }
        let first = self.snapshot.conversations[0].id.clone();
        self.set_active(&first);
        first
    }

    pub fn create_conversation(&mut self) -> String {
        let mut created = String::new();
        self.update(|next| {
            created = next.push_new();
            true
        });
        created
    }

    /// Remove a conversation. The store is never empty afterwards; the first
    /// remaining conversation (or a fresh one) becomes active.
    pub fn delete_conversation(&mut self, id: &str) {
        self.ensure_populated();
        self.update(|next| {
            let before = next.conversations.len();
            next.conversations.retain(|c| c.id != id);
            if next.conversations.len() == before {
                return false;
            }

            if next.conversations.is_empty() {
                next.push_new();
            } else {
                next.active_id = next.conversations.first().map(|c| c.id.clone());
            }
            true
        });
    }

    /// Drop every conversation and the persisted slot. The store stays empty
    /// until [`ChatStore::ensure_populated`] or another mutation runs.
    pub fn delete_all(&mut self) {
        self.snapshot = Arc::new(StoreSnapshot::default());
        if let Err(e) = self.slot.remove(STORAGE_KEY) {
            warn!(error = %e, "could not clear chat history");
        }
        info!("deleted all conversations");
        self.notify();
    }

    pub fn set_active(&mut self, id: &str) {
        self.ensure_populated();
        self.update(|next| {
            if next.get(id).is_none() || next.active_id.as_deref() == Some(id) {
                return false;
            }
            next.active_id = Some(id.to_string());
            true
        });
    }

    /// No-op when `conversation_id` is unknown
    pub fn append_message(&mut self, conversation_id: &str, message: ChatMessage) {
        self.ensure_populated();
        self.update(|next| match next.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.messages.push(message);
                true
            }
            None => false,
        });
    }

    /// Overwrite the last message of a conversation in place
    pub fn replace_last_message(&mut self, conversation_id: &str, patch: MessagePatch) {
        self.ensure_populated();
        self.update(|next| {
            let last = next
                .get_mut(conversation_id)
                .and_then(|c| c.messages.last_mut());
            match last {
                Some(message) => {
                    message.content = patch.content;
                    message.is_thinking = patch.is_thinking;
                    true
                }
                None => false,
            }
        });
    }

    /// Title the conversation after the leading words of `content`
    pub fn rename_from_first_user_message(&mut self, conversation_id: &str, content: &str) {
        let title = title_from(content, self.title_words);
        self.ensure_populated();
        self.update(|next| match next.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.title = title;
                true
            }
            None => false,
        });
    }

    /// Apply `f` to a copy of the current snapshot and commit it if `f` reports a change
    fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&mut StoreSnapshot) -> bool,
    {
        let mut next = StoreSnapshot::clone(&self.snapshot);
        if !f(&mut next) {
            return;
        }
        self.snapshot = Arc::new(next);
        debug!(
            conversations = self.snapshot.conversations.len(),
            active = ?self.snapshot.active_id,
            "store commit"
        );
        self.persist();
        self.notify();
    }

    fn persist(&mut self) {
        let result = if self.snapshot.is_empty() {
            self.slot.remove(STORAGE_KEY)
        } else {
            serde_json::to_string(&self.snapshot.conversations)
                .map_err(anyhow::Error::from)
                .and_then(|json| self.slot.set(STORAGE_KEY, &json))
        };
        if let Err(e) = result {
            warn!(error = %e, "could not persist chat history");
        }
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer(&self.snapshot);
        }
    }
}

/// First `words` whitespace-separated words, or the default title
pub fn title_from(content: &str, words: usize) -> String {
    let title = content
        .split_whitespace()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// A placeholder that was persisted by a session that exited mid-request
/// will never be answered. Returns true if any were found.
fn resolve_interrupted(conversations: &mut [Conversation]) -> bool {
    let mut found = false;
    for message in conversations.iter_mut().flat_map(|c| c.messages.iter_mut()) {
        if message.is_thinking {
            message.content = INFERENCE_ERROR_MESSAGE.to_string();
            message.is_thinking = false;
            found = true;
        }
    }
    found
}
