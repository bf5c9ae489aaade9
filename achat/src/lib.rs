//! Chat sessions and provider fallback orchestration.
//!
//! A [`FallbackOrchestrator`] turns one user message into one assistant message: it records
//! the turn in a [`ChatSessionStore`], tries providers in order until one is granted, and
//! forwards the answer chunk by chunk to a [`ChatSink`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use achat::prelude::*;
//! use aprovider::{ProviderDescriptor, ProviderFuture, ProviderTransport, TransportResponse};
//!
//! #[derive(Debug)]
//! struct Unreachable;
//!
//! impl ProviderTransport for Unreachable {
//!     fn send<'a>(
//!         &'a self,
//!         _request: aprovider::HttpRequest,
//!     ) -> ProviderFuture<'a, Result<TransportResponse, aprovider::ProviderError>> {
//!         Box::pin(async { Err(aprovider::ProviderError::transport("offline")) })
//!     }
//! }
//!
//! let orchestrator = FallbackOrchestrator::builder(
//!     Arc::new(Unreachable),
//!     Arc::new(InMemoryChatSessionStore::new()),
//! )
//! .provider(ProviderDescriptor::gemini())
//! .build()
//! .expect("one provider is configured");
//!
//! assert_eq!(orchestrator.providers().count(), 1);
//! ```

mod error;
mod orchestrator;
mod sink;
mod store;
mod synthetic;
mod title;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatEvent, ChatRunHooks, ChatRunRequest, ChatSession,
        ChatSessionStore, ChatSink, ChunkDelta, ConversationMessage, FallbackOrchestrator,
        FallbackOrchestratorBuilder, InMemoryChatSessionStore, MessageStatus, RunOutcome,
        RunStatus,
    };
    pub use acommon::{CancellationController, CancellationToken, MessageId, SessionId};
}

pub use error::{ASSISTANT_UNAVAILABLE, ChatError, ChatErrorKind};
pub use orchestrator::{
    ChatRunHooks, FallbackOrchestrator, FallbackOrchestratorBuilder, NoopChatHooks,
    default_chat_options, default_enhance_options,
};
pub use sink::{ChatEvent, ChatSink, ChunkDelta, streamed_content};
pub use store::{ChatFuture, ChatSessionStore, InMemoryChatSessionStore};
pub use synthetic::{DEFAULT_CHUNK_DELAY, SyntheticStep, SyntheticStream, word_chunks};
pub use title::{DEFAULT_TITLE, generate_chat_title};
pub use types::{
    AttachmentKind, AttachmentRef, AttemptOutcome, ChatRunRequest, ChatSession,
    ConversationMessage, GenerationAttempt, MessageStatus, RunOutcome, RunStatus,
};
pub use acommon::{CancellationController, CancellationToken, MessageId, SessionId};
