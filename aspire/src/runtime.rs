//! Runtime wiring: transport, store, credentials, hooks, and the orchestrator.

use std::sync::Arc;

use achat::{ChatError, FallbackOrchestrator, InMemoryChatSessionStore};
use aobserve::{SafeChatHooks, SafeProviderHooks, TracingObservabilityHooks};
use aprovider::{ProviderError, ProviderId, ProviderTransport, SecureCredentialManager};

use crate::AssistantConfig;

/// Everything an application needs to drive chats.
#[derive(Clone)]
pub struct AssistantRuntime {
    pub orchestrator: FallbackOrchestrator,
    pub store: Arc<InMemoryChatSessionStore>,
    pub credentials: Arc<SecureCredentialManager>,
}

impl AssistantRuntime {
    pub fn set_api_key(
        &self,
        provider: impl Into<ProviderId>,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        self.credentials.set_api_key(provider.into(), api_key)
    }

    /// Whether any configured provider currently has a key.
    pub fn has_any_credentials(&self) -> Result<bool, ProviderError> {
        for descriptor in self.orchestrator.providers() {
            if !descriptor.requires_key || self.credentials.has_credentials(&descriptor.id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Credential manager pre-loaded from each provider's environment variable.
pub fn env_credentials(config: &AssistantConfig) -> Result<SecureCredentialManager, ChatError> {
    let credentials = SecureCredentialManager::new();
    credentials.load_from_env(&config.providers)?;
    Ok(credentials)
}

/// Reqwest-backed transport. `request_timeout` bounds each wait for bytes, not the whole
/// body, so a long answer that keeps streaming is not cut off.
#[cfg(feature = "http-transport")]
pub fn http_transport(config: &AssistantConfig) -> Result<aprovider::HttpTransport, ChatError> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.request_timeout)
        .build()
        .map_err(|err| ChatError::configuration(format!("http client: {err}")))?;

    Ok(aprovider::HttpTransport::new(client))
}

/// Real HTTP, in-memory sessions, keys from the environment, tracing hooks.
#[cfg(feature = "http-transport")]
pub fn build_runtime(config: AssistantConfig) -> Result<AssistantRuntime, ChatError> {
    let transport = Arc::new(http_transport(&config)?);
    let credentials = Arc::new(env_credentials(&config)?);
    build_runtime_with(config, transport, credentials)
}

pub fn build_runtime_with(
    config: AssistantConfig,
    transport: Arc<dyn ProviderTransport>,
    credentials: Arc<SecureCredentialManager>,
) -> Result<AssistantRuntime, ChatError> {
    let store = Arc::new(InMemoryChatSessionStore::new());
    let orchestrator = FallbackOrchestrator::builder(transport, store.clone())
        .providers(config.providers)
        .credentials(credentials.clone())
        .provider_hooks(Arc::new(SafeProviderHooks::new(TracingObservabilityHooks)))
        .run_hooks(Arc::new(SafeChatHooks::new(TracingObservabilityHooks)))
        .chunk_delay(config.chunk_delay)
        .build()?;

    Ok(AssistantRuntime {
        orchestrator,
        store,
        credentials,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use achat::{ChatEvent, ChatRunRequest, ChatSessionStore, streamed_content};
    use aprovider::{
        HttpRequest, ProviderError, ProviderFuture, ProviderTransport, TransportResponse,
    };

    use super::build_runtime_with;
    use crate::AssistantConfig;

    #[derive(Debug)]
    struct OpenRouterOnly;

    impl ProviderTransport for OpenRouterOnly {
        fn send<'a>(
            &'a self,
            request: HttpRequest,
        ) -> ProviderFuture<'a, Result<TransportResponse, ProviderError>> {
            Box::pin(async move {
                if !request.url.contains("openrouter.ai") {
                    return Err(ProviderError::transport("unexpected provider"));
                }
                assert_eq!(request.headers["x-title"], "AspireExamine AI Assistant");

                Ok(TransportResponse::from_chunks(
                    200,
                    [r#"{"choices":[{"message":{"content":"Mitochondria make ATP."}}]}"#],
                ))
            })
        }
    }

    #[tokio::test]
    async fn runtime_skips_keyless_providers_and_records_the_session() {
        let config = AssistantConfig::default().with_chunk_delay(Duration::ZERO);
        let credentials = Arc::new(aprovider::SecureCredentialManager::new());
        let runtime = build_runtime_with(config, Arc::new(OpenRouterOnly), credentials)
            .expect("runtime should build");

        assert!(!runtime.has_any_credentials().expect("lock"));
        runtime
            .set_api_key("openrouter", "or-key")
            .expect("key stored");
        assert!(runtime.has_any_credentials().expect("lock"));

        let mut events = Vec::new();
        let outcome = runtime
            .orchestrator
            .run(ChatRunRequest::new("what do mitochondria do"), &mut events)
            .await
            .expect("openrouter answers");

        assert_eq!(streamed_content(&events), "Mitochondria make ATP.");
        assert!(matches!(events.last(), Some(ChatEvent::Done { .. })));
        assert_eq!(outcome.attempts.len(), 3);

        let sessions = runtime.store.list_sessions().await.expect("list");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "What do mitochondria do");
    }

    /// Serves one SSE answer, pausing `gap` before each frame.
    #[cfg(feature = "http-transport")]
    async fn serve_slow_stream(
        listener: tokio::net::TcpListener,
        words: &'static [&'static str],
        gap: Duration,
    ) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.expect("client connects");

        let mut request = Vec::new();
        let mut buffer = [0_u8; 1024];
        let body_start = loop {
            let read = socket.read(&mut buffer).await.expect("request bytes");
            request.extend_from_slice(&buffer[..read]);
            if let Some(end) = request.windows(4).position(|window| window == b"\r\n\r\n") {
                break end + 4;
            }
        };
        let headers = String::from_utf8_lossy(&request[..body_start]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while request.len() < body_start + content_length {
            let read = socket.read(&mut buffer).await.expect("request body");
            request.extend_from_slice(&buffer[..read]);
        }

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .expect("status line");
        for word in words {
            tokio::time::sleep(gap).await;
            let frame = format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{word}\"}}}}]}}\n\n");
            socket.write_all(frame.as_bytes()).await.expect("frame");
        }
        socket.write_all(b"data: [DONE]\n\n").await.expect("done");
        socket.shutdown().await.expect("shutdown");
    }

    #[cfg(feature = "http-transport")]
    #[tokio::test]
    async fn live_stream_outlasting_the_request_timeout_is_not_cut_off() {
        const WORDS: &[&str] = &["Cells ", "store ", "energy ", "as ", "ATP", "."];

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let address = listener.local_addr().expect("address");
        let server = tokio::spawn(serve_slow_stream(
            listener,
            WORDS,
            Duration::from_millis(100),
        ));

        let config = AssistantConfig::new(vec![
            aprovider::ProviderDescriptor::groq()
                .with_endpoint(format!("http://{address}/openai/v1/chat/completions")),
        ])
        .with_request_timeout(Duration::from_millis(400));
        let transport = Arc::new(super::http_transport(&config).expect("client"));
        let credentials = Arc::new(aprovider::SecureCredentialManager::new());
        let runtime =
            build_runtime_with(config, transport, credentials).expect("runtime should build");
        runtime.set_api_key("groq", "gsk-test").expect("key stored");

        let mut events = Vec::new();
        let outcome = runtime
            .orchestrator
            .run(ChatRunRequest::new("how do cells store energy"), &mut events)
            .await
            .expect("groq answers");

        assert_eq!(outcome.status, achat::RunStatus::Completed);
        assert_eq!(outcome.text, WORDS.concat());
        assert_eq!(streamed_content(&events), WORDS.concat());
        server.await.expect("server task");
    }

    #[test]
    fn runtime_rejects_an_empty_provider_list() {
        let config = AssistantConfig::new(Vec::new());
        let error = build_runtime_with(
            config,
            Arc::new(OpenRouterOnly),
            Arc::new(aprovider::SecureCredentialManager::new()),
        )
        .err()
        .expect("no providers configured");

        assert_eq!(error.kind, achat::ChatErrorKind::Configuration);
    }
}
