//! Chat session storage contract and the in-memory implementation.
//!
//! The store owns the single-pending-message rule: at most one assistant message per
//! session is being written at a time, and nothing else may be appended meanwhile.

use std::sync::{Mutex, MutexGuard};

use acommon::{BoxFuture, MessageId, Registry, SessionId};

use crate::{ChatError, ChatSession, ConversationMessage, MessageStatus};

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

pub trait ChatSessionStore: Send + Sync {
    fn create_session<'a>(
        &'a self,
        title: &'a str,
        first_message: ConversationMessage,
    ) -> ChatFuture<'a, Result<ChatSession, ChatError>>;

    fn get_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<ChatSession>, ChatError>>;

    /// All sessions, most recently updated first.
    fn list_sessions<'a>(&'a self) -> ChatFuture<'a, Result<Vec<ChatSession>, ChatError>>;

    /// Appends a finished message. Rejected while a reply is pending.
    fn append_message<'a>(
        &'a self,
        session_id: &'a SessionId,
        message: ConversationMessage,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Adds an empty pending assistant message. A second pending message for the same
    /// session is an `InvariantViolation`.
    fn register_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: MessageId,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Appends text to the pending message. Returns `Ok(false)` and changes nothing when
    /// `message_id` is not the session's pending message.
    fn append_delta<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
        content: &'a str,
        reasoning: &'a str,
    ) -> ChatFuture<'a, Result<bool, ChatError>>;

    /// Ends the pending state with `status`; the message is immutable afterwards.
    fn finalize_with<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
        status: MessageStatus,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    fn finalize<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        self.finalize_with(session_id, message_id, MessageStatus::Complete)
    }

    /// Removes the pending message entirely. Returns whether anything was removed.
    fn discard_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<bool, ChatError>>;

    fn pending_message<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<MessageId>, ChatError>>;

    /// Renames a session, suffixing ` (n)` when another session already has the title.
    /// Returns the title actually stored.
    fn rename_session<'a>(
        &'a self,
        session_id: &'a SessionId,
        title: &'a str,
    ) -> ChatFuture<'a, Result<String, ChatError>>;

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<bool, ChatError>>;

    fn clear<'a>(&'a self) -> ChatFuture<'a, Result<(), ChatError>>;

    /// Case-insensitive match over titles and message content, most recent first.
    fn search_sessions<'a>(
        &'a self,
        query: &'a str,
    ) -> ChatFuture<'a, Result<Vec<ChatSession>, ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryChatSessionStore {
    sessions: Mutex<Registry<SessionId, ChatSession>>,
}

impl InMemoryChatSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes every session, most recent first.
    pub fn snapshot_json(&self) -> Result<String, ChatError> {
        let sessions = sorted(self.sessions()?.iter().map(|(_, session)| session.clone()));
        serde_json::to_string(&sessions)
            .map_err(|err| ChatError::store(format!("failed to serialize sessions: {err}")))
    }

    /// Replaces the store contents with a previous snapshot. Returns the session count.
    ///
    /// Messages that were still pending when the snapshot was taken belong to a run that
    /// no longer exists, so they are restored as `Interrupted`.
    pub fn restore_json(&self, json: &str) -> Result<usize, ChatError> {
        let restored = serde_json::from_str::<Vec<ChatSession>>(json)
            .map_err(|err| ChatError::store(format!("failed to parse sessions: {err}")))?;

        let mut registry = Registry::new();
        for mut session in restored {
            for message in &mut session.messages {
                if message.is_pending() {
                    message.status = MessageStatus::Interrupted;
                }
            }
            registry.insert(session.id.clone(), session);
        }

        let count = registry.len();
        *self.sessions()? = registry;
        Ok(count)
    }

    fn sessions(&self) -> Result<MutexGuard<'_, Registry<SessionId, ChatSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|_| ChatError::store("chat session store lock poisoned"))
    }

    fn with_session<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut ChatSession) -> Result<R, ChatError>,
    ) -> Result<R, ChatError> {
        let mut sessions = self.sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatError::invalid_request(format!("unknown session '{session_id}'")))?;
        f(session)
    }
}

fn sorted(sessions: impl Iterator<Item = ChatSession>) -> Vec<ChatSession> {
    let mut sessions = sessions.collect::<Vec<_>>();
    sessions.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    sessions
}

fn pending_index(session: &ChatSession, message_id: &MessageId) -> Option<usize> {
    session
        .messages
        .iter()
        .position(|message| message.is_pending() && &message.id == message_id)
}

fn unique_title(title: &str, taken: &[&str]) -> String {
    if !taken.contains(&title) {
        return title.to_string();
    }

    (1..)
        .map(|counter| format!("{title} ({counter})"))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| title.to_string())
}

impl ChatSessionStore for InMemoryChatSessionStore {
    fn create_session<'a>(
        &'a self,
        title: &'a str,
        first_message: ConversationMessage,
    ) -> ChatFuture<'a, Result<ChatSession, ChatError>> {
        Box::pin(async move {
            let mut session = ChatSession::new(title);
            session.messages.push(first_message);

            self.sessions()?
                .insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    fn get_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<ChatSession>, ChatError>> {
        Box::pin(async move { Ok(self.sessions()?.get(session_id).cloned()) })
    }

    fn list_sessions<'a>(&'a self) -> ChatFuture<'a, Result<Vec<ChatSession>, ChatError>> {
        Box::pin(async move {
            Ok(sorted(
                self.sessions()?.iter().map(|(_, session)| session.clone()),
            ))
        })
    }

    fn append_message<'a>(
        &'a self,
        session_id: &'a SessionId,
        message: ConversationMessage,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.with_session(session_id, |session| {
                if session.pending_message().is_some() {
                    return Err(ChatError::invalid_request(
                        "cannot append while a reply is being generated",
                    ));
                }
                if message.is_pending() {
                    return Err(ChatError::invalid_request(
                        "pending messages must be registered with register_pending",
                    ));
                }

                session.messages.push(message);
                session.touch();
                Ok(())
            })
        })
    }

    fn register_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: MessageId,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.with_session(session_id, |session| {
                if let Some(existing) = session.pending_message() {
                    return Err(ChatError::invariant_violation(format!(
                        "session '{}' already has pending message '{}'",
                        session.id, existing.id
                    )));
                }

                session.messages.push(ConversationMessage::pending(message_id));
                session.touch();
                Ok(())
            })
        })
    }

    fn append_delta<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
        content: &'a str,
        reasoning: &'a str,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            self.with_session(session_id, |session| {
                let Some(index) = pending_index(session, message_id) else {
                    return Ok(false);
                };

                let message = &mut session.messages[index];
                message.content.push_str(content);
                if !reasoning.is_empty() {
                    message
                        .reasoning
                        .get_or_insert_with(String::new)
                        .push_str(reasoning);
                }
                session.touch();
                Ok(true)
            })
        })
    }

    fn finalize_with<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
        status: MessageStatus,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            if status == MessageStatus::Pending {
                return Err(ChatError::invalid_request(
                    "a message cannot be finalized as pending",
                ));
            }

            self.with_session(session_id, |session| {
                let index = pending_index(session, message_id).ok_or_else(|| {
                    ChatError::invariant_violation(format!(
                        "message '{message_id}' is not pending in session '{}'",
                        session.id
                    ))
                })?;

                session.messages[index].status = status;
                session.touch();
                Ok(())
            })
        })
    }

    fn discard_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
        message_id: &'a MessageId,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            self.with_session(session_id, |session| {
                let Some(index) = pending_index(session, message_id) else {
                    return Ok(false);
                };

                session.messages.remove(index);
                session.touch();
                Ok(true)
            })
        })
    }

    fn pending_message<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<Option<MessageId>, ChatError>> {
        Box::pin(async move {
            self.with_session(session_id, |session| {
                Ok(session.pending_message().map(|message| message.id.clone()))
            })
        })
    }

    fn rename_session<'a>(
        &'a self,
        session_id: &'a SessionId,
        title: &'a str,
    ) -> ChatFuture<'a, Result<String, ChatError>> {
        Box::pin(async move {
            let title = title.trim();
            if title.is_empty() {
                return Err(ChatError::invalid_request("session title must not be empty"));
            }

            let mut sessions = self.sessions()?;
            if !sessions.contains_key(session_id) {
                return Err(ChatError::invalid_request(format!(
                    "unknown session '{session_id}'"
                )));
            }

            let taken = sessions
                .iter()
                .filter(|(id, _)| *id != session_id)
                .map(|(_, session)| session.title.as_str())
                .collect::<Vec<_>>();
            let unique = unique_title(title, &taken);

            if let Some(session) = sessions.get_mut(session_id) {
                session.title = unique.clone();
                session.touch();
            }
            Ok(unique)
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move { Ok(self.sessions()?.remove(session_id).is_some()) })
    }

    fn clear<'a>(&'a self) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            *self.sessions()? = Registry::new();
            Ok(())
        })
    }

    fn search_sessions<'a>(
        &'a self,
        query: &'a str,
    ) -> ChatFuture<'a, Result<Vec<ChatSession>, ChatError>> {
        Box::pin(async move {
            let query = query.to_lowercase();
            let sessions = self.sessions()?;
            Ok(sorted(
                sessions
                    .iter()
                    .map(|(_, session)| session)
                    .filter(|session| {
                        session.title.to_lowercase().contains(&query)
                            || session
                                .messages
                                .iter()
                                .any(|message| message.content.to_lowercase().contains(&query))
                    })
                    .cloned(),
            ))
        })
    }
}
