//! Common `aprovider` imports for downstream crates.

pub use crate::{
    Attachment, AttachmentContent, ByteStream, ChatRequest, CredentialSnapshot, CredentialSource,
    DecodeOutcome, DecodeStep, Framing, HttpRequest, Message, NoopOperationHooks,
    ParsedResponse, ProviderClient, ProviderDescriptor, ProviderDialect, ProviderError,
    ProviderErrorKind, ProviderId, ProviderOperationHooks, ProviderTransport, RequestPlan, Role,
    SecureCredentialManager, StreamDecoder, StreamFrame, TransportResponse,
};
pub use acommon::{BoxFuture, CancellationController, CancellationToken, GenerationOptions};

#[cfg(feature = "http-transport")]
pub use crate::HttpTransport;
