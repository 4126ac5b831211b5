//! Conversation transcript: turns, history, provider projection
//!
//! The `History` is the single source of truth for what the user sees.
//! What the provider sees is a *projection* of it (`to_provider_payload`):
//! blank turns are filtered out and a synthetic leading greeting is
//! stripped, but the stored transcript itself is never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Who authored a turn in the transcript.
///
/// The provider additionally knows a `system` role; that one never appears
/// in the transcript, it is prepended by the request composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An inline image attached to a turn (data URL), owned by the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub data_url: String,
}

/// One message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
}

/// A `{role, content}` pair as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("turn has neither content nor attachment")]
    EmptyContent,
}

/// Ordered conversation transcript.
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Install the synthetic welcome turn shown before the first exchange.
    ///
    /// It stays in the displayed transcript but is excluded from the
    /// provider payload by `to_provider_payload`.
    pub fn seed_greeting(&mut self, text: impl Into<String>) -> &Turn {
        self.turns.push(Turn {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: text.into(),
            attachment: None,
            created_at: Utc::now(),
        });
        self.turns.last().expect("turn just pushed")
    }

    /// Append a new turn. A turn with blank content and no attachment is
    /// rejected; nothing blank is ever stored.
    pub fn append(
        &mut self,
        role: Role,
        content: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<&Turn, HistoryError> {
        let content = content.into();
        if content.trim().is_empty() && attachment.is_none() {
            return Err(HistoryError::EmptyContent);
        }

        self.turns.push(Turn {
            id: Uuid::new_v4(),
            role,
            content,
            attachment,
            created_at: Utc::now(),
        });
        Ok(self.turns.last().expect("turn just pushed"))
    }

    /// Project the transcript into the sequence sent to the provider.
    ///
    /// Blank-content turns are dropped, then a leading assistant turn (the
    /// seeded greeting) is stripped: the provider-facing history must start
    /// with a user turn. Pure projection, stored turns are untouched.
    pub fn to_provider_payload(&self) -> Vec<PayloadMessage> {
        let mut messages: Vec<PayloadMessage> = self
            .turns
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .map(|t| PayloadMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect();

        if messages.first().map(|m| m.role) == Some(Role::Assistant) {
            messages.remove(0);
        }

        messages
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rejects_blank_content() {
        let mut history = History::new();
        assert!(history.append(Role::User, "", None).is_err());
        assert!(history.append(Role::User, "   ", None).is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn append_accepts_blank_content_with_attachment() {
        let mut history = History::new();
        let attachment = Attachment {
            data_url: "data:image/png;base64,AAAA".into(),
        };
        let turn = history.append(Role::User, "", Some(attachment)).unwrap();
        assert!(turn.attachment.is_some());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn payload_strips_leading_assistant_turn() {
        let mut history = History::new();
        history.seed_greeting("Hi");
        history.append(Role::User, "A", None).unwrap();
        history.append(Role::Assistant, "B", None).unwrap();

        let payload = history.to_provider_payload();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].role, Role::User);
        assert_eq!(payload[0].content, "A");
        assert_eq!(payload[1].role, Role::Assistant);
        assert_eq!(payload[1].content, "B");

        // The greeting stays in the displayed transcript.
        assert_eq!(history.len(), 3);
        assert_eq!(history.turns()[0].content, "Hi");
    }

    #[test]
    fn payload_never_contains_blank_entries() {
        let mut history = History::new();
        history.append(Role::User, "hello", None).unwrap();
        let attachment = Attachment {
            data_url: "data:image/png;base64,AAAA".into(),
        };
        // Attachment-only turn is stored but has no text to send.
        history.append(Role::User, "  ", Some(attachment)).unwrap();

        let payload = history.to_provider_payload();
        assert_eq!(payload.len(), 1);
        assert!(payload.iter().all(|m| !m.content.trim().is_empty()));
    }

    #[test]
    fn turn_ids_are_unique() {
        let mut history = History::new();
        history.append(Role::User, "a", None).unwrap();
        history.append(Role::Assistant, "b", None).unwrap();
        assert_ne!(history.turns()[0].id, history.turns()[1].id);
    }
}
