//! Wrappers that keep a panicking hook from taking a run down with it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use acommon::{MessageId, SessionId};
use achat::{ChatError, ChatRunHooks, GenerationAttempt, RunStatus};
use aprovider::{ProviderError, ProviderId, ProviderOperationHooks};

pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_attempt_start(&self, provider: &ProviderId, operation: &str, streaming: bool) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(provider, operation, streaming)
        }));
    }

    fn on_attempt_skipped(&self, provider: &ProviderId, operation: &str, reason: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_skipped(provider, operation, reason)
        }));
    }

    fn on_success(&self, provider: &ProviderId, operation: &str, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(provider, operation, elapsed)
        }));
    }

    fn on_failure(
        &self,
        provider: &ProviderId,
        operation: &str,
        elapsed: Duration,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(provider, operation, elapsed, error)
        }));
    }

    fn on_stream_interrupted(&self, provider: &ProviderId, operation: &str, error: &ProviderError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_stream_interrupted(provider, operation, error)
        }));
    }
}

pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatRunHooks for SafeChatHooks<H>
where
    H: ChatRunHooks,
{
    fn on_run_start(&self, session_id: &SessionId, message_id: &MessageId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_run_start(session_id, message_id)
        }));
    }

    fn on_attempt_finished(&self, session_id: &SessionId, attempt: &GenerationAttempt) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_finished(session_id, attempt)
        }));
    }

    fn on_run_finished(&self, session_id: &SessionId, status: RunStatus, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_run_finished(session_id, status, elapsed)
        }));
    }

    fn on_run_failed(&self, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_run_failed(error)));
    }
}
