//! Operational hook contracts for provider attempts.
//!
//! Hooks are how the core reports what it is doing; the `aobserve` crate turns these calls
//! into tracing events and metrics.

use std::time::Duration;

use crate::{ProviderError, ProviderId};

pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: &ProviderId, _operation: &str, _streaming: bool) {}

    /// The provider was not contacted, e.g. because no key is configured.
    fn on_attempt_skipped(&self, _provider: &ProviderId, _operation: &str, _reason: &str) {}

    fn on_success(&self, _provider: &ProviderId, _operation: &str, _elapsed: Duration) {}

    fn on_failure(
        &self,
        _provider: &ProviderId,
        _operation: &str,
        _elapsed: Duration,
        _error: &ProviderError,
    ) {
    }

    /// A stream failed after its first chunk was accepted; the partial reply is kept.
    fn on_stream_interrupted(
        &self,
        _provider: &ProviderId,
        _operation: &str,
        _error: &ProviderError,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}
