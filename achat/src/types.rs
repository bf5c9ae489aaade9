//! Session, message, attempt, and run types.

use std::time::{Duration, SystemTime};

use acommon::{CancellationToken, MessageId, SessionId};
use aprovider::{Attachment, ProviderId, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// An active run is still writing to the message.
    Pending,
    Complete,
    /// The provider stream failed after some text arrived.
    Interrupted,
    /// The user stopped generation.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Text,
}

/// What a stored message remembers about an attachment; the content itself is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub name: String,
    pub kind: AttachmentKind,
}

impl From<&Attachment> for AttachmentRef {
    fn from(value: &Attachment) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            kind: if value.is_image() {
                AttachmentKind::Image
            } else {
                AttachmentKind::Text
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    pub created_at: SystemTime,
    pub status: MessageStatus,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(uuid::Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            reasoning: None,
            attachments: Vec::new(),
            created_at: SystemTime::now(),
            status: MessageStatus::Complete,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Empty assistant message that a run streams into.
    pub fn pending(id: MessageId) -> Self {
        Self {
            id,
            status: MessageStatus::Pending,
            ..Self::assistant(String::new())
        }
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl ChatSession {
    pub fn new(title: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id: SessionId::new(uuid::Uuid::new_v4().to_string()),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pending_message(&self) -> Option<&ConversationMessage> {
        self.messages.iter().find(|message| message.is_pending())
    }

    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Advances `updated_at`, never letting it stand still or go backwards.
    pub(crate) fn touch(&mut self) {
        let floor = self.updated_at + Duration::from_nanos(1);
        self.updated_at = SystemTime::now().max(floor);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Not contacted, e.g. no key configured.
    Skipped,
    Error,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationAttempt {
    pub provider_id: ProviderId,
    pub started_at: SystemTime,
    pub outcome: AttemptOutcome,
    pub error_message: Option<String>,
}

impl GenerationAttempt {
    pub fn new(
        provider_id: impl Into<ProviderId>,
        started_at: SystemTime,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            started_at,
            outcome,
            error_message: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// One "send this message" action.
#[derive(Debug, Clone)]
pub struct ChatRunRequest {
    /// Existing session to continue; a new one is created when `None`.
    pub session_id: Option<SessionId>,
    pub message: String,
    pub attachments: Vec<Attachment>,
    /// Caller-held token for a stop button. A fresh one is used when `None`.
    pub token: Option<CancellationToken>,
}

impl ChatRunRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            message: message.into(),
            attachments: Vec::new(),
            token: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// Completed with the text received before the provider stream failed.
    Interrupted,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub provider_id: Option<ProviderId>,
    pub status: RunStatus,
    pub text: String,
    pub reasoning: String,
    pub attempts: Vec<GenerationAttempt>,
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    pub fn is_interrupted(&self) -> bool {
        self.status == RunStatus::Interrupted
    }
}
