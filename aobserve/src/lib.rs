//! Observability hooks for provider attempts and chat runs.
//!
//! ```rust
//! use aobserve::{MetricsObservabilityHooks, SafeProviderHooks, TracingObservabilityHooks};
//!
//! let _provider_hooks = SafeProviderHooks::new(TracingObservabilityHooks);
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeChatHooks, SafeProviderHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        MetricsObservabilityHooks, SafeChatHooks, SafeProviderHooks, TracingObservabilityHooks,
    };
}

/// Lowercase label for an enum's `Debug` name, e.g. `Skipped` becomes `skipped`.
pub(crate) fn label(value: impl std::fmt::Debug) -> String {
    format!("{value:?}").to_lowercase()
}
