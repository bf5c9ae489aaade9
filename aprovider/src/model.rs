//! Provider-agnostic request, response, and stream frame types.
//!
//! ```rust
//! use aprovider::{Attachment, ChatRequest, Message, Role};
//!
//! let request = ChatRequest::new(
//!     vec![Message::new(Role::User, "What is osmosis?")],
//!     "Give me an example",
//! )
//! .with_attachments(vec![Attachment::text("file-1", "notes.txt", "plant cells")]);
//!
//! assert_eq!(request.history.len(), 1);
//! assert_eq!(request.attachments[0].name, "notes.txt");
//! ```

use std::fmt::{Display, Formatter};

use acommon::GenerationOptions;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a configured provider, e.g. `gemini` or `groq-relay`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A file the user attached to the outgoing message, already resolved to its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub content: AttachmentContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    /// Image carried as a `data:<mime>;base64,<payload>` URL.
    Image { mime_type: String, data_url: String },
    /// Plain text, or text extracted from a document.
    Text(String),
}

impl Attachment {
    pub fn image(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: AttachmentContent::Image {
                mime_type: mime_type.into(),
                data_url: data_url.into(),
            },
        }
    }

    pub fn text(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: AttachmentContent::Text(text.into()),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.content, AttachmentContent::Image { .. })
    }
}

/// Strips the `data:...;base64,` prefix of a data URL, leaving the encoded payload.
pub(crate) fn data_url_payload(data_url: &str) -> &str {
    match data_url.split_once(',') {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data_url,
    }
}

/// Everything a provider needs to answer one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub history: Vec<Message>,
    pub message: String,
    pub attachments: Vec<Attachment>,
    pub options: GenerationOptions,
}

impl ChatRequest {
    pub fn new(history: Vec<Message>, message: impl Into<String>) -> Self {
        Self {
            history,
            message: message.into(),
            attachments: Vec::new(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.options.stream = stream;
        self
    }
}

/// A fully built HTTP call, ready for a [`crate::ProviderTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestPlan {
    Ready(HttpRequest),
    /// The provider cannot be attempted at all, e.g. its key is missing.
    CannotAttempt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub text: String,
    pub reasoning: Option<String>,
}

/// Classification of one framing unit of a provider stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Delta { content: String, reasoning: String },
    Done,
    /// Keep-alives, partial or malformed records. Dropped without failing the stream.
    Ignorable,
}

impl StreamFrame {
    pub fn delta(content: impl Into<String>, reasoning: impl Into<String>) -> Self {
        let content = content.into();
        let reasoning = reasoning.into();
        if content.is_empty() && reasoning.is_empty() {
            return Self::Ignorable;
        }

        Self::Delta { content, reasoning }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self::delta(content, String::new())
    }

    pub fn reasoning(reasoning: impl Into<String>) -> Self {
        Self::delta(String::new(), reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_deltas_collapse_to_ignorable() {
        assert_eq!(StreamFrame::delta("", ""), StreamFrame::Ignorable);
        assert_eq!(
            StreamFrame::content("hi"),
            StreamFrame::Delta {
                content: "hi".to_string(),
                reasoning: String::new(),
            }
        );
    }

    #[test]
    fn data_url_payload_strips_prefix_only_for_data_urls() {
        assert_eq!(data_url_payload("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(data_url_payload("QUJD"), "QUJD");
        assert_eq!(data_url_payload("https://a,b"), "https://a,b");
    }

    #[test]
    fn role_strings_match_wire_names() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
