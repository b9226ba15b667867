//! User-to-user messages stored as a JSON list.
//!
//! The backing document is a JSON array (`[]` when empty) managed by a
//! [`DocumentStore`]. Sending appends; marking read and deleting rewrite the
//! list, each under one lock acquisition.
//!
//! Elements are decoded one by one: a malformed element is skipped with a
//! warning and kept on disk as is.

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{PartlockError, Result};
use crate::registry::{OwnedEntry, require_identity};
use crate::store::{DocumentStore, StoreOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_user: String,
    pub to_user: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl OwnedEntry for Message {
    /// A message belongs to its recipient.
    fn owner(&self) -> &str {
        &self.to_user
    }
}

/// Message list backed by one JSON document.
#[derive(Clone)]
pub struct MessageBox {
    store: DocumentStore<Vec<Value>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for MessageBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBox")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl MessageBox {
    /// Open the message list at `path`, creating `[]` if missing.
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        Ok(Self {
            store: DocumentStore::open(path, options)?,
            audit: None,
        })
    }

    /// Report sent messages to `sink`.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Append a new unread message and return it.
    pub fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<Message> {
        let from_user = require_identity(from, "sender")?.to_string();
        let to_user = require_identity(to, "recipient")?.to_string();
        if subject.trim().is_empty() && body.trim().is_empty() {
            return Err(PartlockError::InvalidInput(
                "message needs a subject or a body".to_string(),
            ));
        }

        let message = Message {
            id: Uuid::new_v4(),
            from_user,
            to_user,
            subject: subject.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
            read: false,
        };

        let value = serde_json::to_value(&message)?;
        self.store.update(|messages| {
            messages.push(value);
            Ok(())
        })?;

        info!(id = %message.id, from = %message.from_user, to = %message.to_user, "message sent");
        if let Some(sink) = &self.audit {
            let event = AuditEvent::new(AuditAction::MessageSent, &message.from_user)
                .with_key(message.id.to_string())
                .with_details(serde_json::json!({ "to_user": message.to_user }));
            if let Err(e) = sink.record(&event) {
                warn!(id = %message.id, error = %e, "failed to record audit event");
            }
        }
        Ok(message)
    }

    /// Messages addressed to `user`, newest first.
    pub fn inbox(&self, user: &str) -> Result<Vec<Message>> {
        self.newest_first(|m| m.to_user == user)
    }

    /// Messages sent by `user`, newest first.
    pub fn sent(&self, user: &str) -> Result<Vec<Message>> {
        self.newest_first(|m| m.from_user == user)
    }

    /// Number of unread messages addressed to `user`.
    pub fn unread_count(&self, user: &str) -> Result<usize> {
        let raw = self.store.load()?;
        Ok(self
            .decode_all(&raw)
            .filter(|(_, m)| m.to_user == user && !m.read)
            .count())
    }

    /// Mark message `id` as read. Only the recipient may do this.
    pub fn mark_read(&self, id: Uuid, user: &str) -> Result<Message> {
        self.store.update(|raw| {
            let (index, mut message) = self.find_for_recipient(raw, id, user)?;
            message.read = true;
            raw[index] = serde_json::to_value(&message)?;
            Ok(message)
        })
    }

    /// Delete message `id`. Only the recipient may do this.
    pub fn delete(&self, id: Uuid, user: &str) -> Result<Message> {
        self.store.update(|raw| {
            let (index, message) = self.find_for_recipient(raw, id, user)?;
            raw.remove(index);
            Ok(message)
        })
    }

    fn newest_first(&self, keep: impl Fn(&Message) -> bool) -> Result<Vec<Message>> {
        let raw = self.store.load()?;
        let mut messages: Vec<_> = self
            .decode_all(&raw)
            .map(|(_, m)| m)
            .filter(|m| keep(m))
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }

    /// Decoded messages with their position in the stored list.
    fn decode_all<'a>(
        &'a self,
        raw: &'a [Value],
    ) -> impl Iterator<Item = (usize, Message)> + 'a {
        raw.iter()
            .enumerate()
            .filter_map(|(index, value)| match Message::deserialize(value) {
                Ok(message) => Some((index, message)),
                Err(e) => {
                    warn!(
                        path = %self.store.path().display(),
                        index,
                        error = %e,
                        "malformed message, skipping"
                    );
                    None
                }
            })
    }

    fn find_for_recipient(
        &self,
        raw: &[Value],
        id: Uuid,
        user: &str,
    ) -> Result<(usize, Message)> {
        let (index, message) = self
            .decode_all(raw)
            .find(|(_, m)| m.id == id)
            .ok_or_else(|| PartlockError::NotFound(format!("message {}", id)))?;

        if message.owner() != user {
            return Err(PartlockError::NotOwner {
                key: id.to_string(),
                owner: message.to_user.clone(),
            });
        }
        Ok((index, message))
    }
}
