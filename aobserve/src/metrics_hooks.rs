//! Metrics-based hooks for provider attempts and chat runs.
//!
//! ```rust
//! use aobserve::MetricsObservabilityHooks;
//! use aprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use acommon::SessionId;
use achat::{ChatError, ChatRunHooks, GenerationAttempt, RunStatus};
use aprovider::{ProviderError, ProviderId, ProviderOperationHooks};

use crate::label;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: &ProviderId, operation: &str, streaming: bool) {
        metrics::counter!(
            "aspire_provider_attempt_start_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "streaming" => streaming.to_string()
        )
        .increment(1);
    }

    fn on_attempt_skipped(&self, provider: &ProviderId, operation: &str, _reason: &str) {
        metrics::counter!(
            "aspire_provider_skipped_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_success(&self, provider: &ProviderId, operation: &str, elapsed: Duration) {
        metrics::counter!(
            "aspire_provider_success_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "aspire_provider_latency_seconds",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_failure(
        &self,
        provider: &ProviderId,
        operation: &str,
        elapsed: Duration,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "aspire_provider_failure_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => label(error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "aspire_provider_failure_latency_seconds",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_stream_interrupted(&self, provider: &ProviderId, operation: &str, error: &ProviderError) {
        metrics::counter!(
            "aspire_provider_stream_interrupted_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => label(error.kind)
        )
        .increment(1);
    }
}

impl ChatRunHooks for MetricsObservabilityHooks {
    fn on_attempt_finished(&self, _session_id: &SessionId, attempt: &GenerationAttempt) {
        metrics::counter!(
            "aspire_chat_attempts_total",
            "provider" => attempt.provider_id.to_string(),
            "outcome" => label(attempt.outcome)
        )
        .increment(1);
    }

    fn on_run_finished(&self, _session_id: &SessionId, status: RunStatus, elapsed: Duration) {
        metrics::counter!(
            "aspire_chat_runs_total",
            "status" => label(status)
        )
        .increment(1);
        metrics::histogram!(
            "aspire_chat_run_duration_seconds",
            "status" => label(status)
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_run_failed(&self, error: &ChatError) {
        metrics::counter!(
            "aspire_chat_runs_total",
            "status" => "failed",
            "error_kind" => label(error.kind)
        )
        .increment(1);
    }
}
