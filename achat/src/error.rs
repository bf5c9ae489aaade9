//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use aprovider::ProviderError;

use crate::GenerationAttempt;

pub const ASSISTANT_UNAVAILABLE: &str =
    "The assistant is unavailable right now. Please check the provider configuration.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    Configuration,
    Store,
    /// A store contract was broken, e.g. a second pending reply for one session.
    InvariantViolation,
    AllProvidersFailed,
    Provider,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// Per-provider diagnostics in configuration order. Only set for `AllProvidersFailed`.
    pub attempts: Vec<GenerationAttempt>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: Vec::new(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Configuration, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvariantViolation, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Provider, message)
    }

    pub fn all_providers_failed(attempts: Vec<GenerationAttempt>) -> Self {
        let summary = attempts
            .iter()
            .map(|attempt| {
                format!(
                    "{}: {}",
                    attempt.provider_id,
                    attempt.error_message.as_deref().unwrap_or("failed")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            kind: ChatErrorKind::AllProvidersFailed,
            message: format!("all providers failed ({summary})"),
            attempts,
        }
    }

    /// Text safe to show an end user. Diagnostics stay in `message` and `attempts`.
    pub fn user_message(&self) -> &str {
        match self.kind {
            ChatErrorKind::AllProvidersFailed
            | ChatErrorKind::Configuration
            | ChatErrorKind::Provider => ASSISTANT_UNAVAILABLE,
            ChatErrorKind::InvalidRequest => self.message.as_str(),
            ChatErrorKind::Store | ChatErrorKind::InvariantViolation => {
                "Something went wrong while saving the conversation."
            }
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        match value.kind {
            aprovider::ProviderErrorKind::Configuration => ChatError::configuration(value.to_string()),
            _ => ChatError::provider(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{AttemptOutcome, GenerationAttempt};

    #[test]
    fn aggregate_error_lists_attempts_in_order() {
        let error = ChatError::all_providers_failed(vec![
            GenerationAttempt::new("gemini", SystemTime::UNIX_EPOCH, AttemptOutcome::Skipped)
                .with_error("missing key"),
            GenerationAttempt::new("groq", SystemTime::UNIX_EPOCH, AttemptOutcome::Error)
                .with_error("Transport: connection refused"),
        ]);

        assert_eq!(error.kind, ChatErrorKind::AllProvidersFailed);
        assert_eq!(
            error.message,
            "all providers failed (gemini: missing key; groq: Transport: connection refused)"
        );
        assert_eq!(error.user_message(), ASSISTANT_UNAVAILABLE);
        assert_eq!(error.attempts.len(), 2);
    }

    #[test]
    fn provider_configuration_errors_keep_their_kind() {
        let error = ChatError::from(ProviderError::configuration("bad header"));
        assert_eq!(error.kind, ChatErrorKind::Configuration);

        let error = ChatError::from(ProviderError::timeout("slow"));
        assert_eq!(error.kind, ChatErrorKind::Provider);
        assert_eq!(error.to_string(), "Provider: Timeout: slow");
    }
}
