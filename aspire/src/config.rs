//! Assistant configuration: provider order, timeouts, and pacing.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use aspire::AssistantConfig;
//!
//! let config = AssistantConfig::default()
//!     .with_request_timeout(Duration::from_secs(30))
//!     .with_relay_base_url("https://aspire.example");
//!
//! let ids = config.provider_ids().collect::<Vec<_>>();
//! assert_eq!(ids, ["gemini", "groq", "openrouter", "groq-relay", "openai-relay"]);
//! ```

use std::time::Duration;

use achat::DEFAULT_CHUNK_DELAY;
use aprovider::ProviderDescriptor;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFERER: &str = "https://aspireexamine.com";

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    /// Providers in attempt order.
    pub providers: Vec<ProviderDescriptor>,
    /// Longest silence tolerated while waiting for response bytes. A stream that keeps
    /// delivering is never cut off.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub chunk_delay: Duration,
    pub relay_base_url: Option<String>,
}

impl Default for AssistantConfig {
    /// Gemini, then Groq, then OpenRouter.
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderDescriptor::gemini(),
                ProviderDescriptor::groq(),
                ProviderDescriptor::openrouter(DEFAULT_REFERER),
            ],
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            relay_base_url: None,
        }
    }
}

impl AssistantConfig {
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }

    /// Builds the provider list from names such as `"groq"` or `"openrouter"`.
    ///
    /// Relay names need [`Self::with_relay_base_url`] to have been applied first, so this
    /// resolves against the current relay base. Unknown names are returned as the error.
    pub fn with_provider_names<'a>(
        mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, String> {
        let mut providers = Vec::new();
        for name in names {
            let descriptor = descriptor_for(name, self.relay_base_url.as_deref())
                .ok_or_else(|| name.to_string())?;
            providers.push(descriptor);
        }

        self.providers = providers;
        Ok(self)
    }

    pub fn with_provider(mut self, descriptor: ProviderDescriptor) -> Self {
        self.providers.push(descriptor);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Records the relay base and appends the Groq and OpenAI relay providers.
    pub fn with_relay_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.providers.push(ProviderDescriptor::groq_relay(&base_url));
        self.providers.push(ProviderDescriptor::openai_relay(&base_url));
        self.relay_base_url = Some(base_url);
        self
    }

    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|descriptor| descriptor.id.as_str())
    }
}

/// Resolves a provider name or alias to its preset descriptor.
pub fn descriptor_for(name: &str, relay_base_url: Option<&str>) -> Option<ProviderDescriptor> {
    match name.trim().to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some(ProviderDescriptor::gemini()),
        "groq" => Some(ProviderDescriptor::groq()),
        "openrouter" | "open-router" => Some(ProviderDescriptor::openrouter(DEFAULT_REFERER)),
        "openai" => Some(ProviderDescriptor::openai()),
        "groq-relay" | "groq_relay" => relay_base_url.map(ProviderDescriptor::groq_relay),
        "openai-relay" | "openai_relay" => relay_base_url.map(ProviderDescriptor::openai_relay),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lineup_is_gemini_groq_openrouter() {
        let config = AssistantConfig::default();
        assert_eq!(
            config.provider_ids().collect::<Vec<_>>(),
            ["gemini", "groq", "openrouter"]
        );
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.chunk_delay, Duration::from_millis(30));
    }

    #[test]
    fn provider_names_resolve_aliases_in_order() {
        let config = AssistantConfig::default()
            .with_provider_names(["OpenRouter", "google"])
            .expect("known names");
        assert_eq!(
            config.provider_ids().collect::<Vec<_>>(),
            ["openrouter", "gemini"]
        );

        let unknown = AssistantConfig::default()
            .with_provider_names(["groq", "mystery"])
            .expect_err("unknown provider");
        assert_eq!(unknown, "mystery");
    }

    #[test]
    fn relay_names_need_a_base_url() {
        assert!(descriptor_for("groq-relay", None).is_none());

        let relay = descriptor_for("groq_relay", Some("https://aspire.example"))
            .expect("relay resolves with a base");
        assert_eq!(relay.endpoint, "https://aspire.example/api/relay/groq");
    }
}
