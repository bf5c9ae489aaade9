//! Provider fallback and the generation run lifecycle.
//!
//! A run walks the configured providers in order until one is granted. Streaming providers
//! are committed as soon as a 2xx response arrives; complete-response providers once their
//! body has parsed. After commit no other provider is tried, whatever happens to the stream.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use acommon::{CancellationController, CancellationToken, GenerationOptions, MessageId, SessionId};
use aprovider::{
    ChatRequest, CredentialSnapshot, CredentialSource, DecodeStep, Message, NoopOperationHooks,
    ProviderClient, ProviderDescriptor, ProviderError, ProviderOperationHooks, ProviderTransport,
    RequestPlan, StreamDecoder, StreamFrame, TransportResponse,
};

use crate::{
    AttachmentRef, AttemptOutcome, ChatError, ChatRunRequest, ChatSessionStore, ChatSink,
    ChunkDelta, ConversationMessage, GenerationAttempt, MessageStatus, RunOutcome, RunStatus,
    SyntheticStep, SyntheticStream, generate_chat_title, synthetic::DEFAULT_CHUNK_DELAY,
};

const CHAT_OPERATION: &str = "chat";
const ENHANCE_OPERATION: &str = "enhance";

const ENHANCE_INSTRUCTION: &str = "Please enhance the following text by correcting grammatical \
mistakes and improving readability. Do NOT add extra content, details, or change the meaning. \
Only fix grammar, spelling, and sentence structure to make it clearer and more readable. Return \
only the enhanced text without any explanations or additional commentary.";

/// Run-level observation points. Provider-level events go through
/// [`ProviderOperationHooks`].
pub trait ChatRunHooks: Send + Sync {
    fn on_run_start(&self, _session_id: &SessionId, _message_id: &MessageId) {}

    fn on_attempt_finished(&self, _session_id: &SessionId, _attempt: &GenerationAttempt) {}

    fn on_run_finished(&self, _session_id: &SessionId, _status: RunStatus, _elapsed: Duration) {}

    fn on_run_failed(&self, _error: &ChatError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatHooks;

impl ChatRunHooks for NoopChatHooks {}

pub fn default_chat_options() -> GenerationOptions {
    GenerationOptions::default()
        .with_temperature(0.7)
        .with_max_tokens(1024)
        .enable_streaming()
}

pub fn default_enhance_options() -> GenerationOptions {
    GenerationOptions::default()
        .with_temperature(0.3)
        .with_max_tokens(512)
}

#[derive(Clone)]
pub struct FallbackOrchestrator {
    providers: Vec<ProviderClient>,
    transport: Arc<dyn ProviderTransport>,
    credentials: Arc<dyn CredentialSource>,
    store: Arc<dyn ChatSessionStore>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    run_hooks: Arc<dyn ChatRunHooks>,
    chunk_delay: Duration,
    chat_options: GenerationOptions,
    enhance_options: GenerationOptions,
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field(
                "providers",
                &self.providers.iter().map(|client| client.id().as_str()).collect::<Vec<_>>(),
            )
            .field("chunk_delay", &self.chunk_delay)
            .finish_non_exhaustive()
    }
}

pub struct FallbackOrchestratorBuilder {
    providers: Vec<ProviderDescriptor>,
    transport: Arc<dyn ProviderTransport>,
    store: Arc<dyn ChatSessionStore>,
    credentials: Arc<dyn CredentialSource>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    run_hooks: Arc<dyn ChatRunHooks>,
    chunk_delay: Duration,
    chat_options: GenerationOptions,
    enhance_options: GenerationOptions,
}

impl FallbackOrchestratorBuilder {
    pub fn new(transport: Arc<dyn ProviderTransport>, store: Arc<dyn ChatSessionStore>) -> Self {
        Self {
            providers: Vec::new(),
            transport,
            store,
            credentials: Arc::new(CredentialSnapshot::new()),
            provider_hooks: Arc::new(NoopOperationHooks),
            run_hooks: Arc::new(NoopChatHooks),
            chunk_delay: DEFAULT_CHUNK_DELAY,
            chat_options: default_chat_options(),
            enhance_options: default_enhance_options(),
        }
    }

    /// Appends a provider; attempts follow insertion order.
    pub fn provider(mut self, descriptor: ProviderDescriptor) -> Self {
        self.providers.push(descriptor);
        self
    }

    pub fn providers(mut self, descriptors: impl IntoIterator<Item = ProviderDescriptor>) -> Self {
        self.providers.extend(descriptors);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn provider_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.provider_hooks = hooks;
        self
    }

    pub fn run_hooks(mut self, hooks: Arc<dyn ChatRunHooks>) -> Self {
        self.run_hooks = hooks;
        self
    }

    /// Pause between synthetic chunks. Zero disables sleeping.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn chat_options(mut self, options: GenerationOptions) -> Self {
        self.chat_options = options;
        self
    }

    pub fn enhance_options(mut self, options: GenerationOptions) -> Self {
        self.enhance_options = options;
        self
    }

    pub fn build(self) -> Result<FallbackOrchestrator, ChatError> {
        if self.providers.is_empty() {
            return Err(ChatError::configuration(
                "at least one provider must be configured",
            ));
        }

        let mut seen = HashSet::new();
        for descriptor in &self.providers {
            if !seen.insert(&descriptor.id) {
                return Err(ChatError::configuration(format!(
                    "provider '{}' is configured more than once",
                    descriptor.id
                )));
            }
        }

        Ok(FallbackOrchestrator {
            providers: self.providers.into_iter().map(ProviderClient::new).collect(),
            transport: self.transport,
            credentials: self.credentials,
            store: self.store,
            provider_hooks: self.provider_hooks,
            run_hooks: self.run_hooks,
            chunk_delay: self.chunk_delay,
            chat_options: self.chat_options,
            enhance_options: self.enhance_options,
        })
    }
}

impl FallbackOrchestrator {
    pub fn builder(
        transport: Arc<dyn ProviderTransport>,
        store: Arc<dyn ChatSessionStore>,
    ) -> FallbackOrchestratorBuilder {
        FallbackOrchestratorBuilder::new(transport, store)
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter().map(ProviderClient::descriptor)
    }

    pub fn store(&self) -> &Arc<dyn ChatSessionStore> {
        &self.store
    }

    /// Sends one user message and streams the first working provider's answer into `sink`.
    ///
    /// The sink receives exactly one terminal callback, matching the returned value:
    /// `on_done` for completed or interrupted runs, `on_aborted` for stopped runs, and
    /// `on_error` for every `Err`.
    pub async fn run(
        &self,
        request: ChatRunRequest,
        sink: &mut dyn ChatSink,
    ) -> Result<RunOutcome, ChatError> {
        let started = Instant::now();
        let result = self.run_inner(request, sink).await;

        match &result {
            Ok(outcome) => {
                match outcome.status {
                    RunStatus::Completed | RunStatus::Interrupted => {
                        sink.on_done(&outcome.text, &outcome.reasoning)
                    }
                    RunStatus::Aborted => sink.on_aborted(&outcome.text),
                }
                self.run_hooks
                    .on_run_finished(&outcome.session_id, outcome.status, started.elapsed());
            }
            Err(error) => {
                sink.on_error(error);
                self.run_hooks.on_run_failed(error);
            }
        }

        result
    }

    async fn run_inner(
        &self,
        request: ChatRunRequest,
        sink: &mut dyn ChatSink,
    ) -> Result<RunOutcome, ChatError> {
        let ChatRunRequest {
            session_id,
            message,
            attachments,
            token,
        } = request;

        if message.trim().is_empty() && attachments.is_empty() {
            return Err(ChatError::invalid_request("message must not be empty"));
        }

        let token = token.unwrap_or_else(|| CancellationController::new().token());
        if !token.try_claim() {
            return Err(ChatError::invalid_request(
                "cancellation token already drove a run; create a new controller",
            ));
        }

        let credentials = self
            .credentials
            .snapshot()
            .unwrap_or_else(|_| CredentialSnapshot::new());

        let user_message = ConversationMessage::user(message.clone())
            .with_attachments(attachments.iter().map(AttachmentRef::from).collect());

        let (session_id, history) = match session_id {
            Some(session_id) => {
                let session = self.store.get_session(&session_id).await?.ok_or_else(|| {
                    ChatError::invalid_request(format!("unknown session '{session_id}'"))
                })?;
                self.store.append_message(&session_id, user_message).await?;
                (session_id, history_of(&session.messages))
            }
            None => {
                let session = self
                    .store
                    .create_session(&generate_chat_title(&message), user_message)
                    .await?;
                (session.id, Vec::new())
            }
        };

        let message_id = MessageId::new(uuid::Uuid::new_v4().to_string());
        self.store
            .register_pending(&session_id, message_id.clone())
            .await?;
        self.run_hooks.on_run_start(&session_id, &message_id);

        let chat_request = ChatRequest::new(history, message)
            .with_attachments(attachments)
            .with_options(self.chat_options);

        let mut run = RunState::new(session_id, message_id);
        let result = self
            .attempt_providers(&chat_request, &credentials, &token, &mut run, sink)
            .await;
        if result.is_err() {
            self.release_pending(&run).await;
        }
        result
    }

    /// Clears the pending message after a failed run so the session accepts new turns.
    /// Uncommitted replies are removed; committed ones keep their partial text.
    async fn release_pending(&self, run: &RunState) {
        let cleanup = if run.committed {
            self.store
                .finalize_with(&run.session_id, &run.message_id, MessageStatus::Interrupted)
                .await
        } else {
            self.store
                .discard_pending(&run.session_id, &run.message_id)
                .await
                .map(|_| ())
        };

        if let Err(error) = cleanup {
            self.run_hooks.on_run_failed(&error);
        }
    }

    async fn attempt_providers(
        &self,
        chat_request: &ChatRequest,
        credentials: &CredentialSnapshot,
        token: &CancellationToken,
        run: &mut RunState,
        sink: &mut dyn ChatSink,
    ) -> Result<RunOutcome, ChatError> {
        for client in &self.providers {
            if token.is_aborted() {
                return self.finish(run, None, RunStatus::Aborted).await;
            }

            let provider = client.id().clone();
            let descriptor = client.descriptor();
            let attempt_started = SystemTime::now();
            let clock = Instant::now();
            let streaming = descriptor.supports_native_streaming && chat_request.options.stream;

            let http = match client.build_request(chat_request, credentials.api_key(&provider)) {
                Ok(RequestPlan::Ready(http)) => http,
                Ok(RequestPlan::CannotAttempt(reason)) => {
                    self.provider_hooks
                        .on_attempt_skipped(&provider, CHAT_OPERATION, &reason);
                    run.record(
                        &*self.run_hooks,
                        GenerationAttempt::new(provider, attempt_started, AttemptOutcome::Skipped)
                            .with_error(reason),
                    );
                    continue;
                }
                Err(error) => {
                    self.record_failure(run, provider, attempt_started, clock, &error);
                    continue;
                }
            };

            self.provider_hooks
                .on_attempt_start(&provider, CHAT_OPERATION, streaming);

            let response = match self.send(client, http).await {
                Ok(response) => response,
                Err(error) => {
                    self.record_failure(run, provider, attempt_started, clock, &error);
                    continue;
                }
            };

            if token.is_aborted() {
                run.record(
                    &*self.run_hooks,
                    GenerationAttempt::new(provider.clone(), attempt_started, AttemptOutcome::Aborted),
                );
                return self.finish(run, Some(provider), RunStatus::Aborted).await;
            }

            let status = if streaming {
                run.committed = true;
                self.stream_native(client, response, token, run, sink).await?
            } else {
                let parsed = match read_complete(client, response).await {
                    Ok(parsed) => parsed,
                    Err(error) => {
                        self.record_failure(run, provider, attempt_started, clock, &error);
                        continue;
                    }
                };
                run.committed = true;
                self.stream_synthetic(parsed, token, run, sink).await?
            };

            let outcome = match &status {
                StreamStatus::Completed => {
                    self.provider_hooks
                        .on_success(&provider, CHAT_OPERATION, clock.elapsed());
                    GenerationAttempt::new(provider.clone(), attempt_started, AttemptOutcome::Success)
                }
                StreamStatus::Interrupted(error) => {
                    self.provider_hooks
                        .on_stream_interrupted(&provider, CHAT_OPERATION, error);
                    GenerationAttempt::new(provider.clone(), attempt_started, AttemptOutcome::Error)
                        .with_error(error.to_string())
                }
                StreamStatus::Aborted => {
                    GenerationAttempt::new(provider.clone(), attempt_started, AttemptOutcome::Aborted)
                }
            };
            run.record(&*self.run_hooks, outcome);

            let run_status = match status {
                StreamStatus::Completed => RunStatus::Completed,
                StreamStatus::Interrupted(_) => RunStatus::Interrupted,
                StreamStatus::Aborted => RunStatus::Aborted,
            };
            return self.finish(run, Some(provider), run_status).await;
        }

        Err(ChatError::all_providers_failed(std::mem::take(
            &mut run.attempts,
        )))
    }

    async fn send(
        &self,
        client: &ProviderClient,
        http: aprovider::HttpRequest,
    ) -> Result<TransportResponse, ProviderError> {
        let response = self.transport.send(http).await?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let body = response.text().await.unwrap_or_default();
        Err(client.error_for_status(status, &body))
    }

    async fn stream_native(
        &self,
        client: &ProviderClient,
        response: TransportResponse,
        token: &CancellationToken,
        run: &mut RunState,
        sink: &mut dyn ChatSink,
    ) -> Result<StreamStatus, ChatError> {
        let mut decoder = StreamDecoder::new(response.body, client.descriptor().framing);

        loop {
            let step = match decoder.next_frame(token).await {
                Ok(step) => step,
                Err(error) => return Ok(StreamStatus::Interrupted(error)),
            };

            match step {
                DecodeStep::Frame(payload) => match client.parse_stream_frame(&payload) {
                    StreamFrame::Delta { content, reasoning } => {
                        if token.is_aborted() {
                            return Ok(StreamStatus::Aborted);
                        }
                        self.forward(run, sink, content, reasoning).await?;
                    }
                    StreamFrame::Done => return Ok(StreamStatus::Completed),
                    StreamFrame::Ignorable => {}
                },
                DecodeStep::Done | DecodeStep::EndOfStream => return Ok(StreamStatus::Completed),
                DecodeStep::Aborted => return Ok(StreamStatus::Aborted),
            }
        }
    }

    async fn stream_synthetic(
        &self,
        parsed: aprovider::ParsedResponse,
        token: &CancellationToken,
        run: &mut RunState,
        sink: &mut dyn ChatSink,
    ) -> Result<StreamStatus, ChatError> {
        if let Some(reasoning) = parsed.reasoning {
            self.forward(run, sink, String::new(), reasoning).await?;
        }

        let mut chunks = SyntheticStream::new(&parsed.text, self.chunk_delay);
        loop {
            match chunks.next_chunk(token).await {
                SyntheticStep::Chunk(chunk) => {
                    self.forward(run, sink, chunk.to_string(), String::new())
                        .await?;
                }
                SyntheticStep::Finished => return Ok(StreamStatus::Completed),
                SyntheticStep::Aborted => return Ok(StreamStatus::Aborted),
            }
        }
    }

    /// Stores a delta on the pending message, then hands it to the sink.
    async fn forward(
        &self,
        run: &mut RunState,
        sink: &mut dyn ChatSink,
        content: String,
        reasoning: String,
    ) -> Result<(), ChatError> {
        self.store
            .append_delta(&run.session_id, &run.message_id, &content, &reasoning)
            .await?;

        run.text.push_str(&content);
        run.reasoning.push_str(&reasoning);
        sink.on_chunk(&ChunkDelta {
            session_id: run.session_id.clone(),
            message_id: run.message_id.clone(),
            content,
            reasoning,
        });
        Ok(())
    }

    async fn finish(
        &self,
        run: &mut RunState,
        provider_id: Option<aprovider::ProviderId>,
        status: RunStatus,
    ) -> Result<RunOutcome, ChatError> {
        let message_status = match status {
            RunStatus::Completed => MessageStatus::Complete,
            RunStatus::Interrupted => MessageStatus::Interrupted,
            RunStatus::Aborted => MessageStatus::Stopped,
        };
        self.store
            .finalize_with(&run.session_id, &run.message_id, message_status)
            .await?;

        Ok(RunOutcome {
            session_id: run.session_id.clone(),
            message_id: run.message_id.clone(),
            provider_id,
            status,
            text: std::mem::take(&mut run.text),
            reasoning: std::mem::take(&mut run.reasoning),
            attempts: std::mem::take(&mut run.attempts),
        })
    }

    fn record_failure(
        &self,
        run: &mut RunState,
        provider: aprovider::ProviderId,
        started_at: SystemTime,
        clock: Instant,
        error: &ProviderError,
    ) {
        self.provider_hooks
            .on_failure(&provider, CHAT_OPERATION, clock.elapsed(), error);
        run.record(
            &*self.run_hooks,
            GenerationAttempt::new(provider, started_at, AttemptOutcome::Error)
                .with_error(error.to_string()),
        );
    }

    /// Rewrites `text` with corrected grammar using the first provider that answers.
    ///
    /// Session-less and non-streaming; providers are tried in the configured order.
    pub async fn enhance_prompt(&self, text: &str) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::invalid_request("text to enhance must not be empty"));
        }

        let credentials = self
            .credentials
            .snapshot()
            .unwrap_or_else(|_| CredentialSnapshot::new());
        let request = ChatRequest::new(
            Vec::new(),
            format!("{ENHANCE_INSTRUCTION}\n\nOriginal text: \"{text}\""),
        )
        .with_options(self.enhance_options.with_streaming(false));

        let mut attempts = Vec::new();
        for client in &self.providers {
            let provider = client.id().clone();
            let started_at = SystemTime::now();
            let clock = Instant::now();

            let http = match client.build_request(&request, credentials.api_key(&provider)) {
                Ok(RequestPlan::Ready(http)) => http,
                Ok(RequestPlan::CannotAttempt(reason)) => {
                    self.provider_hooks
                        .on_attempt_skipped(&provider, ENHANCE_OPERATION, &reason);
                    attempts.push(
                        GenerationAttempt::new(provider, started_at, AttemptOutcome::Skipped)
                            .with_error(reason),
                    );
                    continue;
                }
                Err(error) => {
                    self.provider_hooks
                        .on_failure(&provider, ENHANCE_OPERATION, clock.elapsed(), &error);
                    attempts.push(
                        GenerationAttempt::new(provider, started_at, AttemptOutcome::Error)
                            .with_error(error.to_string()),
                    );
                    continue;
                }
            };

            self.provider_hooks
                .on_attempt_start(&provider, ENHANCE_OPERATION, false);
            let parsed = match self.send(client, http).await {
                Ok(response) => read_complete(client, response).await,
                Err(error) => Err(error),
            };

            match parsed {
                Ok(parsed) => {
                    self.provider_hooks
                        .on_success(&provider, ENHANCE_OPERATION, clock.elapsed());
                    return Ok(parsed.text.trim().to_string());
                }
                Err(error) => {
                    self.provider_hooks
                        .on_failure(&provider, ENHANCE_OPERATION, clock.elapsed(), &error);
                    attempts.push(
                        GenerationAttempt::new(provider, started_at, AttemptOutcome::Error)
                            .with_error(error.to_string()),
                    );
                }
            }
        }

        Err(ChatError::all_providers_failed(attempts))
    }
}

async fn read_complete(
    client: &ProviderClient,
    response: TransportResponse,
) -> Result<aprovider::ParsedResponse, ProviderError> {
    let body = response.text().await?;
    client.parse_non_streaming_response(&body)
}

/// Completed turns as provider history. Pending and empty messages carry nothing useful.
fn history_of(messages: &[ConversationMessage]) -> Vec<Message> {
    messages
        .iter()
        .filter(|message| !message.is_pending() && !message.content.trim().is_empty())
        .map(|message| Message::new(message.role, message.content.clone()))
        .collect()
}

enum StreamStatus {
    Completed,
    Interrupted(ProviderError),
    Aborted,
}

struct RunState {
    session_id: SessionId,
    message_id: MessageId,
    text: String,
    reasoning: String,
    attempts: Vec<GenerationAttempt>,
    committed: bool,
}

impl RunState {
    fn new(session_id: SessionId, message_id: MessageId) -> Self {
        Self {
            session_id,
            message_id,
            text: String::new(),
            reasoning: String::new(),
            attempts: Vec::new(),
            committed: false,
        }
    }

    fn record(&mut self, hooks: &dyn ChatRunHooks, attempt: GenerationAttempt) {
        hooks.on_attempt_finished(&self.session_id, &attempt);
        self.attempts.push(attempt);
    }
}
