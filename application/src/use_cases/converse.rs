//! Conversation orchestration.
//!
//! [`ConversationOrchestrator`] drives one turn at a time:
//!
//! ```text
//! Idle → Sending → Streaming → (Extracting → Generating → Reconciling)? → Idle
//! ```
//!
//! The session state lives behind a synchronous mutex that is never held
//! across an await point. Every mutation schedules a debounced save; the
//! [`teardown`](ConversationOrchestrator::teardown) hook flushes it and
//! releases every image handle.

use crate::config::SessionParams;
use crate::ports::chat_gateway::{ChatGateway, ChatRequest, GatewayError};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::image_generator::GenerationProgress;
use crate::ports::turn_progress::TurnProgressNotifier;
use crate::services::persistence::DeferredPersistence;
use crate::use_cases::generate_image::{GenerateImageInput, GenerateImageUseCase};
use cud_domain::util::preview;
use cud_domain::{
    GenerationDirective, HistoryEntry, ModelId, PersistedSnapshot, ResourceHandle, SessionState,
    Speaker, StreamDecoder, TranscriptMessage, TurnPhase, UserInput, extract_directive,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a turn early
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    #[error("A turn is already in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyInput,

    #[error("Chat request failed: {0}")]
    Transport(#[from] GatewayError),
}

/// How a completed turn resolved
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Plain text reply (including replies whose directive was rejected)
    Replied { text: String },
    /// The reply asked for an image and the job succeeded
    Generated {
        text: String,
        directive: GenerationDirective,
        images: Vec<ResourceHandle>,
    },
    /// The reply asked for an image and the job failed
    GenerationFailed {
        text: String,
        directive: GenerationDirective,
        error: String,
    },
}

impl TurnOutcome {
    /// Full assistant text as streamed
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Replied { text }
            | TurnOutcome::Generated { text, .. }
            | TurnOutcome::GenerationFailed { text, .. } => text,
        }
    }
}

/// Read-only copy of the session for display
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub transcript: Vec<TranscriptMessage>,
    pub history_len: usize,
    pub current_model: ModelId,
    pub phase: TurnPhase,
    pub error: Option<String>,
}

impl SessionView {
    pub fn is_loading(&self) -> bool {
        !self.phase.is_idle()
    }
}

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    phase: TurnPhase,
    error: Option<String>,
}

pub struct ConversationOrchestrator {
    gateway: Arc<dyn ChatGateway>,
    images: GenerateImageUseCase,
    persistence: DeferredPersistence,
    params: SessionParams,
    conversation_logger: Arc<dyn ConversationLogger>,
    inner: Mutex<SessionInner>,
}

impl ConversationOrchestrator {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        images: GenerateImageUseCase,
        persistence: DeferredPersistence,
        params: SessionParams,
    ) -> Self {
        let inner = SessionInner {
            state: SessionState::new(params.default_model.clone()),
            ..Default::default()
        };
        Self {
            gateway,
            images,
            persistence,
            params,
            conversation_logger: Arc::new(NoConversationLogger),
            inner: Mutex::new(inner),
        }
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, inner: &SessionInner) {
        self.persistence.schedule(PersistedSnapshot::capture(
            &inner.state,
            self.params.max_persisted_entries,
        ));
    }

    // ==================== Session Lifecycle ====================

    /// Replace the session with whatever the store holds. Returns the
    /// number of restored transcript messages.
    pub async fn restore(&self) -> usize {
        let partial = self.persistence.load().await;
        let state = partial.into_session_state(self.params.default_model.clone());
        let restored = state.transcript.len();
        info!(
            "Restored {} messages, {} history entries (model {})",
            restored,
            state.history.len(),
            state.current_model
        );
        self.lock().state = state;
        restored
    }

    /// Flush pending persistence and release every image handle.
    pub async fn teardown(&self) {
        {
            let mut inner = self.lock();
            inner.state.settle_generating();
            inner.phase = TurnPhase::Idle;
            self.persist(&inner);
        }
        self.persistence.shutdown().await;
        let released = self.images.resources().release_all();
        debug!("Teardown released {} handles", released);
    }

    // ==================== Accessors ====================

    pub fn view(&self) -> SessionView {
        let inner = self.lock();
        SessionView {
            transcript: inner.state.transcript.clone(),
            history_len: inner.state.history.len(),
            current_model: inner.state.current_model.clone(),
            phase: inner.phase,
            error: inner.error.clone(),
        }
    }

    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        self.lock().state.transcript.clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().state.history.clone()
    }

    pub fn current_model(&self) -> ModelId {
        self.lock().state.current_model.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.lock().phase
    }

    pub fn is_loading(&self) -> bool {
        !self.phase().is_idle()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn images(&self) -> &GenerateImageUseCase {
        &self.images
    }

    // ==================== Mutations ====================

    /// Switch the model used for subsequent turns.
    pub fn set_model(&self, model: ModelId) {
        let mut inner = self.lock();
        info!("Model set to {}", model);
        inner.state.current_model = model;
        self.persist(&inner);
    }

    pub fn dismiss_error(&self) {
        self.lock().error = None;
    }

    /// Empty the conversation, release its images and clear stored records.
    pub async fn clear(&self) -> Result<(), TurnError> {
        {
            let mut inner = self.lock();
            if !inner.phase.is_idle() {
                return Err(TurnError::Busy);
            }
            inner.state.clear_conversation();
            inner.error = None;
        }
        self.images.resources().release_all();
        self.persistence.clear().await;
        info!("Conversation cleared");
        Ok(())
    }

    // ==================== Turn ====================

    /// Run one turn to completion.
    ///
    /// Rejects the submission with [`TurnError::Busy`] while another turn
    /// is in flight. Transport failures end the turn with no assistant
    /// message left behind; generation failures still complete the turn.
    pub async fn submit(
        &self,
        text: &str,
        progress: &dyn TurnProgressNotifier,
    ) -> Result<TurnOutcome, TurnError> {
        let input = UserInput::try_new(text).ok_or(TurnError::EmptyInput)?;

        let request = {
            let mut inner = self.lock();
            if !inner.phase.is_idle() {
                return Err(TurnError::Busy);
            }
            inner.phase = TurnPhase::Sending;
            inner.error = None;
            inner
                .state
                .transcript
                .push(TranscriptMessage::user_text(input.content()));
            self.persist(&inner);
            ChatRequest::new(
                inner.state.current_model.clone(),
                input.content(),
                inner.state.history.clone(),
            )
        };
        let _guard = TurnGuard { orchestrator: self };
        progress.on_phase(TurnPhase::Sending);

        info!(
            "Sending to {}: {}",
            request.model,
            preview(&request.message, 100)
        );
        self.conversation_logger.log(ConversationEvent::new(
            "chat_request",
            serde_json::json!({
                "model": request.model,
                "message": request.message,
                "history_len": request.history.len(),
            }),
        ));

        let model = request.model.clone();
        let mut stream = match self.gateway.send_chat(request).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail_transport(e, None, progress)),
        };

        let message_index = {
            let mut inner = self.lock();
            inner
                .state
                .transcript
                .push(TranscriptMessage::assistant_text(""));
            inner.phase = TurnPhase::Streaming;
            inner.state.transcript.len() - 1
        };
        progress.on_phase(TurnPhase::Streaming);

        let mut decoder = StreamDecoder::new();
        while let Some(chunk) = stream.next_chunk().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    return Err(self.fail_transport(e, Some(message_index), progress));
                }
            };
            let outcome = decoder.feed(&bytes);
            for line_error in &outcome.errors {
                warn!("Skipping stream line: {}", line_error);
            }
            if outcome.has_text() {
                self.update_message(message_index, |m| {
                    m.content = decoder.accumulated_text().to_string()
                });
                progress.on_stream_chunk(&outcome.appended);
            }
        }
        let tail = decoder.finish();
        for line_error in &tail.errors {
            warn!("Skipping final stream line: {}", line_error);
        }
        if tail.has_text() {
            progress.on_stream_chunk(&tail.appended);
        }
        let text = decoder.into_text();
        debug!("Stream finished: {} bytes", text.len());
        self.conversation_logger.log(ConversationEvent::new(
            "assistant_response",
            serde_json::json!({
                "model": model,
                "bytes": text.len(),
                "text": text,
            }),
        ));

        {
            let mut inner = self.lock();
            if let Some(message) = inner.state.transcript.get_mut(message_index) {
                message.content = text.clone();
            }
            inner.phase = TurnPhase::Extracting;
        }
        progress.on_phase(TurnPhase::Extracting);

        let directive = match extract_directive(&text) {
            Ok(directive) => directive,
            Err(e) => {
                warn!("Ignoring unusable image directive: {}", e);
                progress.on_directive_rejected(&e);
                None
            }
        };

        let Some(directive) = directive else {
            self.complete(&input, &text, progress);
            return Ok(TurnOutcome::Replied { text });
        };

        let outcome = self
            .run_generation(text.clone(), directive, message_index, progress)
            .await;
        self.complete(&input, &text, progress);
        Ok(outcome)
    }

    async fn run_generation(
        &self,
        text: String,
        directive: GenerationDirective,
        message_index: usize,
        progress: &dyn TurnProgressNotifier,
    ) -> TurnOutcome {
        info!(
            "Directive detected: {} ({})",
            preview(&directive.prompt, 80),
            directive.resolution
        );
        self.conversation_logger.log(ConversationEvent::new(
            "directive_detected",
            serde_json::json!({ "directive": directive }),
        ));
        {
            let mut inner = self.lock();
            if let Some(message) = inner.state.transcript.get_mut(message_index) {
                message.begin_generation(directive.response_during_generation.as_deref());
            }
            inner.phase = TurnPhase::Generating;
            self.persist(&inner);
        }
        progress.on_directive(&directive);
        progress.on_phase(TurnPhase::Generating);

        let reporter = MessageProgress {
            orchestrator: self,
            message_index,
            notifier: progress,
        };
        let result = self
            .images
            .execute(GenerateImageInput::from(&directive), &reporter)
            .await;

        self.lock().phase = TurnPhase::Reconciling;
        progress.on_phase(TurnPhase::Reconciling);

        match result {
            Ok(generated) => {
                {
                    let mut inner = self.lock();
                    if let Some(message) = inner.state.transcript.get_mut(message_index) {
                        message.finish_generation();
                    }
                    for handle in &generated.handles {
                        inner
                            .state
                            .transcript
                            .push(TranscriptMessage::assistant_image(handle.clone()));
                    }
                }
                for handle in &generated.handles {
                    progress.on_image(handle);
                }
                TurnOutcome::Generated {
                    text,
                    directive,
                    images: generated.handles,
                }
            }
            Err(e) => {
                let message = format!("Image generation failed: {e}");
                {
                    let mut inner = self.lock();
                    if let Some(progress_message) = inner.state.transcript.get_mut(message_index) {
                        progress_message.fail_generation(&self.params.failure_notice);
                    }
                    inner.error = Some(message.clone());
                }
                progress.on_error(&message);
                TurnOutcome::GenerationFailed {
                    text,
                    directive,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Commit the resolved turn to history and return to idle.
    fn complete(&self, input: &UserInput, text: &str, progress: &dyn TurnProgressNotifier) {
        {
            let mut inner = self.lock();
            inner.state.history.push(HistoryEntry::user(input.content()));
            inner.state.history.push(HistoryEntry::assistant(text));
            inner.phase = TurnPhase::Idle;
            self.persist(&inner);
        }
        progress.on_phase(TurnPhase::Idle);
    }

    /// Abort the turn: drop the partial assistant message and surface the
    /// error. History is untouched since nothing was committed yet.
    fn fail_transport(
        &self,
        error: GatewayError,
        message_index: Option<usize>,
        progress: &dyn TurnProgressNotifier,
    ) -> TurnError {
        let error = TurnError::Transport(error);
        let message = error.to_string();
        warn!("{}", message);
        {
            let mut inner = self.lock();
            if let Some(index) = message_index
                && index < inner.state.transcript.len()
            {
                inner.state.transcript.remove(index);
            }
            inner.error = Some(message.clone());
            inner.phase = TurnPhase::Idle;
            self.persist(&inner);
        }
        self.conversation_logger.log(ConversationEvent::new(
            "turn_failed",
            serde_json::json!({ "error": message }),
        ));
        progress.on_error(&message);
        error
    }

    fn update_message(&self, index: usize, f: impl FnOnce(&mut TranscriptMessage)) {
        if let Some(message) = self.lock().state.transcript.get_mut(index) {
            f(message);
        }
    }
}

/// Returns the session to idle if a turn future is dropped mid-flight.
/// An abandoned turn commits nothing to history.
struct TurnGuard<'a> {
    orchestrator: &'a ConversationOrchestrator,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.orchestrator.lock();
        if inner.phase.is_idle() {
            return;
        }
        if inner.phase == TurnPhase::Streaming
            && inner
                .state
                .transcript
                .last()
                .is_some_and(|m| m.role == Speaker::Assistant && !m.is_image())
        {
            inner.state.transcript.pop();
        }
        let settled = inner.state.settle_generating();
        warn!(
            "Turn abandoned during {} ({} pending generation settled)",
            inner.phase, settled
        );
        inner.phase = TurnPhase::Idle;
        self.orchestrator.persist(&inner);
    }
}

/// Mirrors job progress onto the transcript's progress message
struct MessageProgress<'a> {
    orchestrator: &'a ConversationOrchestrator,
    message_index: usize,
    notifier: &'a dyn TurnProgressNotifier,
}

impl GenerationProgress for MessageProgress<'_> {
    fn on_progress(&self, percent: u8) {
        self.orchestrator
            .update_message(self.message_index, |m| m.set_progress(percent));
        self.notifier.on_generation_progress(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FAILURE_NOTICE;
    use crate::ports::chat_gateway::ChunkStream;
    use crate::ports::handle_backend::InMemoryHandleBackend;
    use crate::ports::image_generator::{ImageError, ImageGenerator, ImageRequest};
    use crate::ports::state_store::{MemoryStateStore, StateStore};
    use crate::ports::turn_progress::NoTurnProgress;
    use crate::services::adapter_session::AdapterSessionManager;
    use crate::services::resource_manager::ResourceManager;
    use async_trait::async_trait;
    use cud_domain::{AdapterId, BinaryImage, MessageKind};
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::mpsc;

    // ==================== Test Mocks ====================

    /// One scripted reply: a request failure, a list of chunks, or one
    /// chunk on a stream that never ends
    enum Script {
        Fail(GatewayError),
        Chunks(Vec<Result<Vec<u8>, GatewayError>>),
        Hang(Vec<u8>),
    }

    type ChunkSender = mpsc::Sender<Result<Vec<u8>, GatewayError>>;

    struct MockGateway {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
        /// Senders of hanging streams, kept so the streams stay open
        open: Mutex<Vec<ChunkSender>>,
    }

    impl MockGateway {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(VecDeque::from(scripts)),
                requests: Mutex::new(Vec::new()),
                open: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatGateway for MockGateway {
        async fn send_chat(&self, request: ChatRequest) -> Result<ChunkStream, GatewayError> {
            self.requests.lock().unwrap().push(request);
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| GatewayError::Other("No more scripts".to_string()))?;
            match script {
                Script::Fail(e) => Err(e),
                Script::Chunks(chunks) => {
                    let (tx, rx) = mpsc::channel(chunks.len().max(1));
                    for chunk in chunks {
                        tx.send(chunk).await.unwrap();
                    }
                    Ok(ChunkStream::new(rx))
                }
                Script::Hang(chunk) => {
                    let (tx, rx) = mpsc::channel(1);
                    tx.send(Ok(chunk)).await.unwrap();
                    self.open.lock().unwrap().push(tx);
                    Ok(ChunkStream::new(rx))
                }
            }
        }
    }

    struct MockGenerator {
        result: Result<Vec<BinaryImage>, ImageError>,
    }

    #[async_trait]
    impl ImageGenerator for MockGenerator {
        async fn generate(
            &self,
            _request: &ImageRequest,
            progress: &dyn GenerationProgress,
        ) -> Result<Vec<BinaryImage>, ImageError> {
            progress.on_progress(50);
            self.result.clone()
        }

        async fn list_adapters(&self) -> Result<Vec<AdapterId>, ImageError> {
            Ok(vec![])
        }
    }

    /// Records the phases a turn passes through
    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<TurnPhase>>,
        chunks: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl TurnProgressNotifier for RecordingProgress {
        fn on_phase(&self, phase: TurnPhase) {
            self.phases.lock().unwrap().push(phase);
        }

        fn on_stream_chunk(&self, text: &str) {
            self.chunks.lock().unwrap().push(text.to_string());
        }

        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn line(content: &str) -> Vec<u8> {
        format!("{}\n", serde_json::json!({"message": {"content": content}})).into_bytes()
    }

    fn reply(contents: &[&str]) -> Script {
        Script::Chunks(contents.iter().map(|c| Ok(line(c))).collect())
    }

    struct Harness {
        orchestrator: ConversationOrchestrator,
        gateway: Arc<MockGateway>,
        store: Arc<MemoryStateStore>,
    }

    fn harness(scripts: Vec<Script>, images: Result<Vec<BinaryImage>, ImageError>) -> Harness {
        let gateway = Arc::new(MockGateway::new(scripts));
        let store = Arc::new(MemoryStateStore::new());
        let images = GenerateImageUseCase::new(
            Arc::new(MockGenerator { result: images }),
            Arc::new(AdapterSessionManager::new()),
            Arc::new(ResourceManager::new(Arc::new(InMemoryHandleBackend::new()))),
        );
        let persistence = DeferredPersistence::spawn(store.clone(), Duration::from_secs(60));
        let orchestrator = ConversationOrchestrator::new(
            gateway.clone(),
            images,
            persistence,
            SessionParams::default(),
        );
        Harness {
            orchestrator,
            gateway,
            store,
        }
    }

    const DIRECTIVE_TEXT: &str = r#"[GENERATE_IMAGE]{prompt:"a cat",resolution:landscape,response_during_generation:"Taking the photo..."}"#;

    // ==================== Scenarios ====================

    #[tokio::test]
    async fn test_plain_text_turn() {
        let h = harness(vec![reply(&["Hi", " there"])], Ok(vec![]));
        let progress = RecordingProgress::default();

        let outcome = h.orchestrator.submit("Hello", &progress).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Replied { text: "Hi there".to_string() });

        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0], TranscriptMessage::user_text("Hello"));
        assert_eq!(transcript[1], TranscriptMessage::assistant_text("Hi there"));
        assert_eq!(
            h.orchestrator.history(),
            vec![HistoryEntry::user("Hello"), HistoryEntry::assistant("Hi there")]
        );
        assert!(!h.orchestrator.is_loading());
        assert_eq!(*progress.chunks.lock().unwrap(), vec!["Hi", " there"]);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                TurnPhase::Sending,
                TurnPhase::Streaming,
                TurnPhase::Extracting,
                TurnPhase::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_request_carries_prior_history_only() {
        let h = harness(vec![reply(&["one"]), reply(&["two"])], Ok(vec![]));
        h.orchestrator.submit("first", &NoTurnProgress).await.unwrap();
        h.orchestrator.submit("second", &NoTurnProgress).await.unwrap();

        let requests = h.gateway.requests.lock().unwrap();
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[1].message, "second");
        assert_eq!(
            requests[1].history,
            vec![HistoryEntry::user("first"), HistoryEntry::assistant("one")]
        );
    }

    #[tokio::test]
    async fn test_generation_turn() {
        let image = BinaryImage::png(vec![7u8; 16]);
        let h = harness(vec![reply(&[DIRECTIVE_TEXT])], Ok(vec![image.clone()]));

        let outcome = h.orchestrator.submit("Show me a cat", &NoTurnProgress).await.unwrap();
        let TurnOutcome::Generated { images, directive, text } = outcome else {
            panic!("expected a generated outcome");
        };
        assert_eq!(directive.prompt, "a cat");
        assert_eq!(text, DIRECTIVE_TEXT);
        assert_eq!(images.len(), 1);

        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].content, "Taking the photo...");
        assert!(!transcript[1].is_generating);
        assert_eq!(transcript[1].progress, None);
        assert_eq!(transcript[2].kind, MessageKind::Image);
        assert_eq!(transcript[2].role, Speaker::Assistant);
        assert_eq!(transcript[2].handle.as_ref(), Some(&images[0]));
        assert!(h.orchestrator.images().resources().contains(&images[0]));

        let history = h.orchestrator.history();
        assert_eq!(history.last(), Some(&HistoryEntry::assistant(DIRECTIVE_TEXT)));
        assert!(!h.orchestrator.is_loading());
    }

    #[tokio::test]
    async fn test_generation_failure_still_completes_turn() {
        let h = harness(
            vec![reply(&[DIRECTIVE_TEXT])],
            Err(ImageError::ConnectionError("refused".to_string())),
        );
        let progress = RecordingProgress::default();

        let outcome = h.orchestrator.submit("Show me a cat", &progress).await.unwrap();
        assert!(matches!(outcome, TurnOutcome::GenerationFailed { .. }));

        let transcript = h.orchestrator.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, DEFAULT_FAILURE_NOTICE);
        assert!(!transcript[1].is_generating);
        assert!(transcript.iter().all(|m| m.kind == MessageKind::Text));

        let error = h.orchestrator.error().unwrap();
        assert!(error.starts_with("Image generation failed:"));
        assert_eq!(progress.errors.lock().unwrap().len(), 1);
        assert_eq!(h.orchestrator.phase(), TurnPhase::Idle);
        assert_eq!(h.orchestrator.history().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_directive_is_a_plain_turn() {
        let text = r#"[GENERATE_IMAGE]{prompt:"x",resolution:"ultrawide"}"#;
        let h = harness(vec![reply(&[text])], Ok(vec![]));

        let outcome = h.orchestrator.submit("draw", &NoTurnProgress).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Replied { text: text.to_string() });
        assert_eq!(h.orchestrator.transcript()[1].content, text);
        assert!(!h.orchestrator.transcript()[1].is_generating);
    }

    #[tokio::test]
    async fn test_request_failure_leaves_no_assistant_message() {
        let h = harness(
            vec![Script::Fail(GatewayError::ConnectionError("refused".to_string()))],
            Ok(vec![]),
        );

        let err = h.orchestrator.submit("Hello", &NoTurnProgress).await.unwrap_err();
        assert!(matches!(err, TurnError::Transport(_)));

        let view = h.orchestrator.view();
        assert_eq!(view.transcript, vec![TranscriptMessage::user_text("Hello")]);
        assert_eq!(view.history_len, 0);
        assert!(!view.is_loading());
        assert_eq!(
            view.error.as_deref(),
            Some("Chat request failed: Connection error: refused")
        );

        h.orchestrator.dismiss_error();
        assert_eq!(h.orchestrator.error(), None);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_rolls_back() {
        let h = harness(
            vec![Script::Chunks(vec![
                Ok(line("partial")),
                Err(GatewayError::StreamInterrupted("reset".to_string())),
            ])],
            Ok(vec![]),
        );

        let err = h.orchestrator.submit("Hello", &NoTurnProgress).await.unwrap_err();
        assert!(matches!(err, TurnError::Transport(GatewayError::StreamInterrupted(_))));
        assert_eq!(h.orchestrator.transcript().len(), 1);
        assert!(h.orchestrator.history().is_empty());
        assert!(!h.orchestrator.is_loading());
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_end_turn() {
        let h = harness(
            vec![Script::Chunks(vec![
                Ok(line("Hi")),
                Ok(b"{broken\n".to_vec()),
                Ok(line("!")),
            ])],
            Ok(vec![]),
        );
        let outcome = h.orchestrator.submit("Hello", &NoTurnProgress).await.unwrap();
        assert_eq!(outcome.text(), "Hi!");
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let h = harness(vec![], Ok(vec![]));
        let err = h.orchestrator.submit("   ", &NoTurnProgress).await.unwrap_err();
        assert_eq!(err, TurnError::EmptyInput);
        assert!(h.orchestrator.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_busy_submission_is_rejected() {
        let h = harness(vec![], Ok(vec![]));
        h.orchestrator.lock().phase = TurnPhase::Streaming;
        let err = h.orchestrator.submit("Hello", &NoTurnProgress).await.unwrap_err();
        assert_eq!(err, TurnError::Busy);
        assert_eq!(h.orchestrator.clear().await, Err(TurnError::Busy));
    }

    #[tokio::test]
    async fn test_abandoned_turn_returns_to_idle() {
        let h = harness(vec![], Ok(vec![]));
        {
            let mut inner = h.orchestrator.lock();
            let mut pending = TranscriptMessage::assistant_text("Taking the photo...");
            pending.begin_generation(None);
            inner.state.transcript.push(pending);
            inner.phase = TurnPhase::Generating;
        }
        drop(TurnGuard {
            orchestrator: &h.orchestrator,
        });

        assert!(!h.orchestrator.is_loading());
        assert!(!h.orchestrator.transcript()[0].is_generating);
    }

    #[tokio::test]
    async fn test_abandoned_stream_commits_no_history() {
        let h = harness(vec![Script::Hang(line("Hi th")), reply(&["Hi again"])], Ok(vec![]));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            h.orchestrator.submit("Hello", &NoTurnProgress),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!h.orchestrator.is_loading());
        assert!(h.orchestrator.history().is_empty());
        assert_eq!(
            h.orchestrator.transcript(),
            vec![TranscriptMessage::user_text("Hello")]
        );

        h.orchestrator.submit("Still there?", &NoTurnProgress).await.unwrap();
        assert!(h.gateway.requests.lock().unwrap()[1].history.is_empty());

        h.orchestrator.teardown().await;
        let saved = h.store.saved().unwrap();
        assert_eq!(
            saved.history,
            vec![
                HistoryEntry::user("Still there?"),
                HistoryEntry::assistant("Hi again")
            ]
        );
    }

    // ==================== Persistence ====================

    #[tokio::test]
    async fn test_teardown_flushes_and_releases_handles() {
        let image = BinaryImage::png(vec![1u8, 2, 3]);
        let h = harness(vec![reply(&[DIRECTIVE_TEXT])], Ok(vec![image]));
        h.orchestrator.set_model(ModelId::Elora);
        h.orchestrator.submit("cat please", &NoTurnProgress).await.unwrap();

        h.orchestrator.teardown().await;

        assert_eq!(h.orchestrator.images().resources().stats().handles, 0);
        let saved = h.store.saved().unwrap();
        assert_eq!(saved.current_model, ModelId::Elora);
        assert_eq!(saved.messages.len(), 3);
        assert_eq!(saved.messages[2].kind, MessageKind::Image);
        assert_eq!(saved.messages[2].handle, None);
        assert_eq!(saved.history.len(), 2);
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let h = harness(vec![], Ok(vec![]));
        let mut state = SessionState::new(ModelId::Wizzy);
        state.transcript.push(TranscriptMessage::user_text("earlier"));
        state.history.push(HistoryEntry::user("earlier"));
        h.store.save(&PersistedSnapshot::capture(&state, 100));

        assert_eq!(h.orchestrator.restore().await, 1);
        assert_eq!(h.orchestrator.current_model(), ModelId::Wizzy);
        assert_eq!(h.orchestrator.history(), vec![HistoryEntry::user("earlier")]);
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let h = harness(vec![reply(&["Hi"])], Ok(vec![]));
        h.orchestrator.submit("Hello", &NoTurnProgress).await.unwrap();
        h.orchestrator.clear().await.unwrap();

        assert!(h.orchestrator.transcript().is_empty());
        assert!(h.orchestrator.history().is_empty());
        assert!(h.store.saved().is_none());
    }
}
