//! Unified facade over the aspire assistant crates.
//!
//! This crate is the single dependency for most applications. It re-exports the core crates
//! and wires a ready-to-use runtime from an [`AssistantConfig`].
//!
//! ```rust,no_run
//! use aspire::prelude::*;
//!
//! # async fn demo() -> Result<(), ChatError> {
//! let runtime = build_runtime(AssistantConfig::default())?;
//!
//! let mut events = Vec::new();
//! let outcome = runtime
//!     .orchestrator
//!     .run(ChatRunRequest::new("Explain osmosis simply"), &mut events)
//!     .await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod prelude;
pub mod runtime;

pub use achat;
pub use acommon;
pub use aobserve;
pub use aprovider;

pub use achat::{
    ASSISTANT_UNAVAILABLE, AttemptOutcome, ChatError, ChatErrorKind, ChatEvent, ChatRunHooks,
    ChatRunRequest, ChatSession, ChatSessionStore, ChatSink, ChunkDelta, ConversationMessage,
    FallbackOrchestrator, FallbackOrchestratorBuilder, GenerationAttempt,
    InMemoryChatSessionStore, MessageStatus, RunOutcome, RunStatus, generate_chat_title,
    streamed_content,
};
pub use acommon::{BoxFuture, CancellationController, CancellationToken, MessageId, SessionId};
pub use aobserve::{
    MetricsObservabilityHooks, SafeChatHooks, SafeProviderHooks, TracingObservabilityHooks,
};
pub use aprovider::{
    Attachment, CredentialSnapshot, CredentialSource, Framing, ProviderDescriptor,
    ProviderDialect, ProviderError, ProviderErrorKind, ProviderId, ProviderOperationHooks,
    ProviderTransport, SecureCredentialManager,
};

pub use config::{AssistantConfig, DEFAULT_REFERER, DEFAULT_REQUEST_TIMEOUT, descriptor_for};
pub use runtime::{AssistantRuntime, build_runtime_with, env_credentials};

#[cfg(feature = "http-transport")]
pub use runtime::{build_runtime, http_transport};
