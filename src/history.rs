//! Conversation history log.
//!
//! All conversations live in one JSON array on disk. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! crash never leaves a half-written log. An unreadable or corrupt log
//! loads as empty.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Titles are the first characters of the opening question.
const TITLE_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.chars().take(TITLE_CHARS).collect(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Vec<Conversation> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history unreadable, starting empty");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "history corrupt, starting empty");
            Vec::new()
        })
    }

    pub fn save(&self, conversations: &[Conversation]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create history directory: {}", dir.display()))?;

        let json = serde_json::to_string_pretty(conversations)?;
        let tmp = dir.join(format!(".chat_history-{}.tmp", Uuid::new_v4()));
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
        }
        Ok(())
    }

    /// Append a question and its answer, creating the conversation when
    /// `conversation_id` is `None` or unknown. Returns the conversation id.
    pub fn append_exchange(
        &self,
        conversation_id: Option<&str>,
        question: &str,
        answer: &str,
    ) -> Result<String> {
        let mut conversations = self.load();

        let position = conversation_id
            .and_then(|id| conversations.iter().position(|c| c.id == id))
            .unwrap_or_else(|| {
                conversations.push(Conversation::new(question));
                conversations.len() - 1
            });

        let conversation = &mut conversations[position];
        conversation.messages.push(Message {
            role: Role::User,
            content: question.to_string(),
        });
        conversation.messages.push(Message {
            role: Role::Assistant,
            content: answer.to_string(),
        });
        let id = conversation.id.clone();

        self.save(&conversations)?;
        Ok(id)
    }
}
