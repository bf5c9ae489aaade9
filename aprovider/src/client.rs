//! Descriptor-driven request building and response parsing.
//!
//! ```rust
//! use aprovider::{ChatRequest, ProviderClient, ProviderDescriptor, RequestPlan, StreamFrame};
//!
//! let client = ProviderClient::new(ProviderDescriptor::groq());
//! let request = ChatRequest::new(Vec::new(), "Hello");
//!
//! let plan = client.build_request(&request, None).expect("plan should build");
//! assert_eq!(plan, RequestPlan::CannotAttempt("missing key".to_string()));
//!
//! let frame = client.parse_stream_frame(br#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
//! assert_eq!(frame, StreamFrame::content("Hi"));
//! ```

use serde::Deserialize;

use crate::dialects::{gemini, openai_chat, relay};
use crate::{
    ChatRequest, ParsedResponse, ProviderDescriptor, ProviderDialect, ProviderError, ProviderId,
    RequestPlan, StreamFrame,
};

pub const MISSING_KEY: &str = "missing key";

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderClient {
    descriptor: ProviderDescriptor,
}

impl ProviderClient {
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &ProviderId {
        &self.descriptor.id
    }

    /// Builds the HTTP call for one request.
    ///
    /// A blank key counts as missing. Providers that require a key answer with
    /// [`RequestPlan::CannotAttempt`] instead of an error so callers can skip them.
    pub fn build_request(
        &self,
        request: &ChatRequest,
        api_key: Option<&str>,
    ) -> Result<RequestPlan, ProviderError> {
        let api_key = api_key.map(str::trim).filter(|key| !key.is_empty());
        if self.descriptor.requires_key && api_key.is_none() {
            return Ok(RequestPlan::CannotAttempt(MISSING_KEY.to_string()));
        }

        let http = match self.descriptor.dialect {
            ProviderDialect::Gemini => gemini::build(&self.descriptor, request, api_key)?,
            ProviderDialect::OpenAiChat => openai_chat::build(&self.descriptor, request, api_key)?,
            ProviderDialect::Relay => relay::build(&self.descriptor, request, api_key)?,
        };

        Ok(RequestPlan::Ready(http))
    }

    pub fn parse_non_streaming_response(&self, body: &str) -> Result<ParsedResponse, ProviderError> {
        match self.descriptor.dialect {
            ProviderDialect::Gemini => gemini::parse_response(&self.descriptor, body),
            ProviderDialect::OpenAiChat => openai_chat::parse_response(&self.descriptor, body),
            ProviderDialect::Relay => relay::parse_response(&self.descriptor, body),
        }
    }

    /// Classifies one framing unit's payload. Never fails; unknown shapes are ignorable.
    pub fn parse_stream_frame(&self, payload: &[u8]) -> StreamFrame {
        match self.descriptor.dialect {
            ProviderDialect::Gemini => gemini::parse_frame(payload),
            ProviderDialect::OpenAiChat => openai_chat::parse_frame(payload),
            ProviderDialect::Relay => relay::parse_frame(payload),
        }
    }

    /// Maps a non-2xx response to an error of the matching kind.
    pub fn error_for_status(&self, status: u16, body: &str) -> ProviderError {
        error_for_status(&self.descriptor.display_name, status, body)
    }
}

pub fn error_for_status(provider: &str, status: u16, body: &str) -> ProviderError {
    let detail = extract_error_message(body)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    let message = format!("{provider} API error ({status}): {detail}");

    match status {
        401 | 403 => ProviderError::authentication(message),
        429 => ProviderError::rate_limited(message),
        408 | 504 => ProviderError::timeout(message),
        400 | 422 => ProviderError::invalid_request(message),
        502 | 503 => ProviderError::unavailable(message),
        _ => ProviderError::transport(message),
    }
}

/// Pulls a human-readable message out of an error body: `{"error":{"message":..}}`,
/// `{"error":".."}`, or the raw text truncated.
pub fn extract_error_message(body: &str) -> Option<String> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match envelope.error {
            ErrorDetail::Object { message } => message,
            ErrorDetail::Text(message) => message,
        };
        if !message.trim().is_empty() {
            return Some(message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut truncated = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        truncated.push_str("...");
    }
    Some(truncated)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}
