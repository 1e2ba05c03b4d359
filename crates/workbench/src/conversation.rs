//! Conversation log: append-only message histories scoped to one project.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::interpreter::extract_file_tags;
use crate::project::Project;
use crate::store::{Record, Store, StoreError};

/// Errors from the conversation log.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// No conversation with this id
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// Registry backend failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Who sent a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human
    User,
    /// The workbench
    Assistant,
}

/// One message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: String,
    /// Sender
    pub role: Role,
    /// Text content
    pub content: String,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
    /// Project-relative file paths referenced with `@`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_tags: Vec<String>,
}

impl Message {
    /// A user message; file references are extracted from the content.
    pub fn user(content: impl Into<String>) -> Self {
        let content = content.into();
        let file_tags = extract_file_tags(&content);
        Self::new(Role::User, content, file_tags)
    }

    /// An assistant reply.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), Vec::new())
    }

    fn new(role: Role, content: String, file_tags: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            file_tags,
        }
    }
}

/// An ordered message history owned by one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation id
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Messages in append order
    pub messages: Vec<Message>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Record for Conversation {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Stores conversations and appends to them in order.
///
/// Appends are serialized so two concurrent turns cannot lose each other's
/// messages through the store's read-modify-write.
pub struct ConversationLog {
    store: Arc<dyn Store<Conversation>>,
    append_lock: Mutex<()>,
}

impl std::fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLog").finish_non_exhaustive()
    }
}

impl ConversationLog {
    /// Create a log over `store`.
    pub fn new(store: Arc<dyn Store<Conversation>>) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
        }
    }

    /// Start a conversation in `project`, optionally seeded with a first
    /// user message.
    pub async fn create(
        &self,
        project: &Project,
        title: Option<String>,
        initial_message: Option<String>,
    ) -> Result<Conversation, ConversationError> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            title,
            messages: initial_message
                .filter(|m| !m.trim().is_empty())
                .map(Message::user)
                .into_iter()
                .collect(),
            created_at: Utc::now(),
        };
        self.store.put(conversation.clone()).await?;
        tracing::debug!(conversation_id = %conversation.id, project_id = %project.id, "created conversation");
        Ok(conversation)
    }

    /// Look up a conversation.
    pub async fn get(&self, id: &str) -> Result<Conversation, ConversationError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))
    }

    /// Conversations, oldest first, optionally restricted to one project.
    pub async fn list(&self, project_id: Option<&str>) -> Result<Vec<Conversation>, ConversationError> {
        let mut conversations: Vec<_> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|c| project_id.is_none_or(|p| c.project_id == p))
            .collect();
        conversations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(conversations)
    }

    /// Number of conversations.
    pub async fn count(&self) -> Result<usize, ConversationError> {
        Ok(self.store.len().await?)
    }

    /// Append a message to the end of a conversation.
    pub async fn append(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<Message, ConversationError> {
        let _guard = self.append_lock.lock().await;
        let mut conversation = self.get(conversation_id).await?;
        conversation.messages.push(message.clone());
        self.store.put(conversation).await?;
        Ok(message)
    }
}
