//! Common imports for applications embedding the assistant.

pub use crate::{AssistantConfig, AssistantRuntime, build_runtime_with, descriptor_for};
pub use crate::{
    CancellationController, CancellationToken, ChatError, ChatErrorKind, ChatEvent,
    ChatRunRequest, ChatSession, ChatSessionStore, ChatSink, ChunkDelta, ConversationMessage,
    FallbackOrchestrator, InMemoryChatSessionStore, MessageId, MessageStatus, ProviderDescriptor,
    ProviderId, RunOutcome, RunStatus, SecureCredentialManager, SessionId,
};

#[cfg(feature = "http-transport")]
pub use crate::build_runtime;
