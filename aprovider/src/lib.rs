//! Provider-facing contracts for the aspire assistant core.
//!
//! A provider is configuration ([`ProviderDescriptor`]) plus the pure functions its dialect
//! selects ([`ProviderClient`]). Bytes move through a [`ProviderTransport`] and streamed
//! bodies are framed by the [`StreamDecoder`].
//!
//! ```rust
//! use aprovider::prelude::*;
//!
//! let client = ProviderClient::new(ProviderDescriptor::openrouter("https://aspire.example"));
//! let request = ChatRequest::new(vec![Message::new(Role::User, "Hi")], "What is a cell?");
//!
//! let RequestPlan::Ready(http) = client
//!     .build_request(&request, Some("or-key"))
//!     .expect("request should build")
//! else {
//!     panic!("key was supplied");
//! };
//!
//! assert_eq!(http.url, "https://openrouter.ai/api/v1/chat/completions");
//! assert_eq!(http.headers["x-title"], "AspireExamine AI Assistant");
//! assert_eq!(http.body["stream"], false);
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod client;
pub mod credentials;
pub mod decoder;
pub mod descriptor;
mod dialects;
pub mod error;
pub mod hooks;
pub mod model;
pub mod prelude;
pub mod transport;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use client::{MISSING_KEY, ProviderClient, error_for_status, extract_error_message};
pub use credentials::{CredentialSnapshot, CredentialSource, SecretString, SecureCredentialManager};
pub use decoder::{
    DEFAULT_MAX_LINE_BYTES, DecodeOutcome, DecodeStep, Framing, LineKind, LineSplitter,
    StreamDecoder, decode,
};
pub use descriptor::{ProviderDescriptor, ProviderDialect};
pub use error::{ProviderError, ProviderErrorKind};
pub use hooks::{NoopOperationHooks, ProviderOperationHooks};
pub use model::{
    Attachment, AttachmentContent, ChatRequest, HttpRequest, Message, ParsedResponse, ProviderId,
    RequestPlan, Role, StreamFrame,
};
pub use transport::{ByteStream, ProviderTransport, TransportResponse};

#[cfg(feature = "http-transport")]
pub use transport::HttpTransport;
