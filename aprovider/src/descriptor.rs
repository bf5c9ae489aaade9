//! Static provider configuration records.
//!
//! A descriptor is plain data: the dialect tag selects the pure request, response, and
//! frame functions in [`crate::client`], so adding a provider means adding configuration.
//!
//! ```rust
//! use aprovider::{Framing, ProviderDescriptor, ProviderDialect};
//!
//! let groq = ProviderDescriptor::groq().with_model("llama-3.3-70b-versatile");
//! assert_eq!(groq.id.as_str(), "groq");
//! assert_eq!(groq.dialect, ProviderDialect::OpenAiChat);
//! assert_eq!(groq.framing, Framing::Sse);
//! assert!(groq.supports_native_streaming);
//!
//! let relay = ProviderDescriptor::groq_relay("https://app.example.com/");
//! assert_eq!(relay.endpoint, "https://app.example.com/api/relay/groq");
//! assert_eq!(relay.framing, Framing::NdJson);
//! ```

use serde_json::{Map, Value};

use crate::{Framing, ProviderId};

pub const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const OPENROUTER_APP_TITLE: &str = "AspireExamine AI Assistant";

/// Request/response family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderDialect {
    /// Google `generateContent` / `streamGenerateContent`.
    Gemini,
    /// OpenAI-compatible chat completions (Groq, OpenRouter, OpenAI).
    OpenAiChat,
    /// Same-origin relay that takes the key in the body and re-frames the upstream stream.
    Relay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: String,
    pub dialect: ProviderDialect,
    pub framing: Framing,
    pub endpoint: String,
    pub model: String,
    pub requires_key: bool,
    pub supports_native_streaming: bool,
    pub accepts_images: bool,
    pub extra_headers: Vec<(String, String)>,
    pub extra_body: Map<String, Value>,
    pub credential_env: Option<String>,
}

impl ProviderDescriptor {
    pub fn new(
        id: impl Into<ProviderId>,
        display_name: impl Into<String>,
        dialect: ProviderDialect,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let framing = match dialect {
            ProviderDialect::Relay => Framing::NdJson,
            ProviderDialect::Gemini | ProviderDialect::OpenAiChat => Framing::Sse,
        };

        Self {
            id: id.into(),
            display_name: display_name.into(),
            dialect,
            framing,
            endpoint: endpoint.into(),
            model: model.into(),
            requires_key: true,
            supports_native_streaming: false,
            accepts_images: false,
            extra_headers: Vec::new(),
            extra_body: Map::new(),
            credential_env: None,
        }
    }

    pub fn gemini() -> Self {
        Self::new(
            "gemini",
            "Gemini",
            ProviderDialect::Gemini,
            GEMINI_MODELS_URL,
            "gemini-2.0-flash-exp",
        )
        .with_images(true)
        .with_credential_env("GEMINI_API_KEY")
    }

    pub fn groq() -> Self {
        Self::new(
            "groq",
            "Groq",
            ProviderDialect::OpenAiChat,
            GROQ_CHAT_URL,
            "llama-3.1-8b-instant",
        )
        .with_native_streaming(true)
        .with_images(true)
        .with_credential_env("GROQ_API_KEY")
    }

    /// OpenRouter wants the calling site in `HTTP-Referer` for attribution.
    pub fn openrouter(referer: impl Into<String>) -> Self {
        Self::new(
            "openrouter",
            "OpenRouter",
            ProviderDialect::OpenAiChat,
            OPENROUTER_CHAT_URL,
            "meta-llama/llama-3.1-8b-instruct:free",
        )
        .with_header("HTTP-Referer", referer)
        .with_header("X-Title", OPENROUTER_APP_TITLE)
        .with_credential_env("OPENROUTER_API_KEY")
    }

    pub fn openai() -> Self {
        Self::new(
            "openai",
            "OpenAI",
            ProviderDialect::OpenAiChat,
            OPENAI_CHAT_URL,
            "gpt-4o-mini",
        )
        .with_native_streaming(true)
        .with_images(true)
        .with_credential_env("OPENAI_API_KEY")
    }

    /// Relay that re-frames Groq's SSE into `{type, data}` JSON lines.
    pub fn groq_relay(base_url: impl AsRef<str>) -> Self {
        Self::new(
            "groq-relay",
            "Groq (relay)",
            ProviderDialect::Relay,
            relay_endpoint(base_url.as_ref(), "groq"),
            "llama-3.3-70b-versatile",
        )
        .with_native_streaming(true)
        .with_images(true)
        .with_credential_env("GROQ_API_KEY")
    }

    /// Relay that passes OpenAI's SSE stream through untouched.
    pub fn openai_relay(base_url: impl AsRef<str>) -> Self {
        Self::new(
            "openai-relay",
            "OpenAI (relay)",
            ProviderDialect::Relay,
            relay_endpoint(base_url.as_ref(), "openai"),
            "gpt-3.5-turbo",
        )
        .with_framing(Framing::Sse)
        .with_native_streaming(true)
        .with_credential_env("OPENAI_API_KEY")
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn requiring_key(mut self, requires_key: bool) -> Self {
        self.requires_key = requires_key;
        self
    }

    pub fn with_native_streaming(mut self, supports_native_streaming: bool) -> Self {
        self.supports_native_streaming = supports_native_streaming;
        self
    }

    pub fn with_images(mut self, accepts_images: bool) -> Self {
        self.accepts_images = accepts_images;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Adds a top-level field to every request body, e.g. Groq's `reasoning_format`.
    pub fn with_body_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_body.insert(key.into(), value.into());
        self
    }

    pub fn with_credential_env(mut self, variable: impl Into<String>) -> Self {
        self.credential_env = Some(variable.into());
        self
    }
}

fn relay_endpoint(base_url: &str, provider: &str) -> String {
    format!("{}/api/relay/{provider}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_carry_expected_streaming_and_key_flags() {
        let gemini = ProviderDescriptor::gemini();
        assert!(gemini.requires_key);
        assert!(!gemini.supports_native_streaming);
        assert_eq!(gemini.credential_env.as_deref(), Some("GEMINI_API_KEY"));

        let openrouter = ProviderDescriptor::openrouter("https://aspire.example");
        assert!(!openrouter.supports_native_streaming);
        assert!(!openrouter.accepts_images);
        assert!(
            openrouter
                .extra_headers
                .contains(&("HTTP-Referer".to_string(), "https://aspire.example".to_string()))
        );

        let openai_relay = ProviderDescriptor::openai_relay("http://localhost:3000");
        assert_eq!(openai_relay.framing, Framing::Sse);
        assert_eq!(openai_relay.endpoint, "http://localhost:3000/api/relay/openai");
    }

    #[test]
    fn body_fields_are_recorded_for_merge() {
        let groq = ProviderDescriptor::groq().with_body_field("reasoning_format", "parsed");
        assert_eq!(
            groq.extra_body.get("reasoning_format"),
            Some(&Value::String("parsed".to_string()))
        );
    }
}
