//! Tracing-based hooks for provider attempts and chat runs.
//!
//! ```rust
//! use achat::ChatRunHooks;
//! use aobserve::TracingObservabilityHooks;
//!
//! fn accepts_run_hooks(_hooks: &dyn ChatRunHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_run_hooks(&hooks);
//! ```

use std::time::Duration;

use acommon::{MessageId, SessionId};
use achat::{AttemptOutcome, ChatError, ChatRunHooks, GenerationAttempt, RunStatus};
use aprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: &ProviderId, operation: &str, streaming: bool) {
        tracing::info!(
            phase = "provider",
            event = "attempt_start",
            provider = %provider,
            operation,
            streaming
        );
    }

    fn on_attempt_skipped(&self, provider: &ProviderId, operation: &str, reason: &str) {
        tracing::info!(
            phase = "provider",
            event = "attempt_skipped",
            provider = %provider,
            operation,
            reason
        );
    }

    fn on_success(&self, provider: &ProviderId, operation: &str, elapsed: Duration) {
        tracing::info!(
            phase = "provider",
            event = "success",
            provider = %provider,
            operation,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_failure(
        &self,
        provider: &ProviderId,
        operation: &str,
        elapsed: Duration,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "failure",
            provider = %provider,
            operation,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_stream_interrupted(&self, provider: &ProviderId, operation: &str, error: &ProviderError) {
        tracing::warn!(
            phase = "provider",
            event = "stream_interrupted",
            provider = %provider,
            operation,
            error_kind = ?error.kind,
            error = %error
        );
    }
}

impl ChatRunHooks for TracingObservabilityHooks {
    fn on_run_start(&self, session_id: &SessionId, message_id: &MessageId) {
        tracing::info!(
            phase = "chat",
            event = "run_start",
            session_id = %session_id,
            message_id = %message_id
        );
    }

    fn on_attempt_finished(&self, session_id: &SessionId, attempt: &GenerationAttempt) {
        match attempt.outcome {
            AttemptOutcome::Error => tracing::warn!(
                phase = "chat",
                event = "attempt_finished",
                session_id = %session_id,
                provider = %attempt.provider_id,
                outcome = ?attempt.outcome,
                error = attempt.error_message.as_deref()
            ),
            _ => tracing::debug!(
                phase = "chat",
                event = "attempt_finished",
                session_id = %session_id,
                provider = %attempt.provider_id,
                outcome = ?attempt.outcome,
                reason = attempt.error_message.as_deref()
            ),
        }
    }

    fn on_run_finished(&self, session_id: &SessionId, status: RunStatus, elapsed: Duration) {
        tracing::info!(
            phase = "chat",
            event = "run_finished",
            session_id = %session_id,
            status = ?status,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_run_failed(&self, error: &ChatError) {
        tracing::error!(
            phase = "chat",
            event = "run_failed",
            error_kind = ?error.kind,
            attempts = error.attempts.len(),
            error = %error
        );
    }
}
