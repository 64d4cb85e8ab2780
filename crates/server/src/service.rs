//! Dialogue orchestration.
//!
//! The service sits between the transport and the state machine: it loads the
//! chat session, runs the transition, performs every side effect the outcome
//! demands and persists the new state. All replies go out through the Bot API
//! directly, so handlers always report `Processed`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use aktly_agent::runtime::AgentFacade;
use aktly_core::audit::{AuditContext, AuditSink};
use aktly_core::dialogue::{
    DialogueAction, DialogueEngine, DialogueEvent, DialogueState, DialogueTransitionError,
};
use aktly_core::domain::session::DialogueSession;
use aktly_db::repositories::{
    DocumentKind, GeneratedDocument, GeneratedDocumentRepository, SessionRepository,
};
use aktly_telegram::api::BotApi;
use aktly_telegram::commands::BotCommand;
use aktly_telegram::events::{
    CommandEvent, CommandService, DocumentEvent, DocumentService, EventContext, EventHandlerError,
    TextMessageEvent, TextMessageService,
};
use aktly_telegram::replies::{self, OutgoingMessage};

use crate::delivery::DocumentCourier;
use crate::docgen::DocumentGenerator;

/// Per-event payload the dialogue actions draw from.
enum EventInput {
    None,
    Text(String),
    Document { file_id: String, file_name: Option<String> },
}

/// Action outcomes that should not fail the whole update.
enum ActionError {
    /// Wiring or transport problem; surfaces as a handler error.
    Infra(String),
    /// Expected runtime failure; the user gets a reply and the session
    /// stays where it was.
    Recoverable { reply: OutgoingMessage, detail: String },
}

pub struct DialogueService<A> {
    engine: DialogueEngine,
    sessions: Arc<dyn SessionRepository>,
    documents: Arc<dyn GeneratedDocumentRepository>,
    api: Arc<dyn BotApi>,
    agent: Arc<AgentFacade>,
    generator: Arc<DocumentGenerator>,
    courier: Arc<DocumentCourier>,
    audit: A,
}

impl<A> DialogueService<A>
where
    A: AuditSink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        documents: Arc<dyn GeneratedDocumentRepository>,
        api: Arc<dyn BotApi>,
        agent: Arc<AgentFacade>,
        generator: Arc<DocumentGenerator>,
        courier: Arc<DocumentCourier>,
        audit: A,
    ) -> Self {
        Self {
            engine: DialogueEngine::default(),
            sessions,
            documents,
            api,
            agent,
            generator,
            courier,
            audit,
        }
    }

    async fn process(
        &self,
        chat_id: i64,
        event: DialogueEvent,
        input: EventInput,
        ctx: &EventContext,
        wrap: fn(String) -> EventHandlerError,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        let mut session = self
            .sessions
            .find_by_chat_id(chat_id)
            .await
            .map_err(|e| wrap(e.to_string()))?
            .unwrap_or_else(|| DialogueSession::new(chat_id));

        let audit_ctx = AuditContext::new(Some(chat_id), &ctx.correlation_id, "dialogue-service");
        let outcome = match self.engine.apply_with_audit(
            &session.state,
            &event,
            &session.context(),
            &self.audit,
            &audit_ctx,
        ) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.send(chat_id, rejection_reply(&session.state, &error))
                    .await
                    .map_err(|e| to_handler(e, wrap))?;
                return Ok(None);
            }
        };

        for action in &outcome.actions {
            match self.run_action(action, &mut session, &input, chat_id).await {
                Ok(()) => {}
                Err(ActionError::Recoverable { reply, detail }) => {
                    warn!(
                        event_name = "dialogue.action_failed",
                        chat_id,
                        correlation_id = %ctx.correlation_id,
                        action = ?action,
                        error = %detail,
                        "dialogue action failed, keeping previous state"
                    );
                    self.send(chat_id, reply).await.map_err(|e| to_handler(e, wrap))?;
                    return Ok(None);
                }
                Err(ActionError::Infra(detail)) => return Err(wrap(detail)),
            }
        }

        session.state = outcome.to.clone();
        session.touch();
        self.sessions.save(session).await.map_err(|e| wrap(e.to_string()))?;

        info!(
            event_name = "dialogue.event_processed",
            chat_id,
            correlation_id = %ctx.correlation_id,
            from = ?outcome.from,
            to = ?outcome.to,
            "dialogue transition applied"
        );
        Ok(None)
    }

    async fn run_action(
        &self,
        action: &DialogueAction,
        session: &mut DialogueSession,
        input: &EventInput,
        chat_id: i64,
    ) -> Result<(), ActionError> {
        match action {
            DialogueAction::SendGreeting => self.send(chat_id, replies::greeting()).await,
            DialogueAction::SendCommandList => self.send(chat_id, replies::command_list()).await,
            DialogueAction::SendDocumentList => self.send(chat_id, replies::document_list()).await,
            DialogueAction::PromptExecutorFile => {
                self.send(chat_id, replies::prompt_executor_file()).await
            }
            DialogueAction::PromptClientFile => {
                self.send(chat_id, replies::prompt_client_file()).await
            }
            DialogueAction::PromptWorksList => {
                self.send(chat_id, replies::prompt_works_list()).await
            }
            DialogueAction::PromptField => {
                self.send(chat_id, replies::prompt_field(session.step)).await
            }
            DialogueAction::PromptPreviousField => {
                session.step = session.step.saturating_sub(1);
                self.send(chat_id, replies::prompt_field(session.step)).await
            }
            DialogueAction::RecordAnswer => {
                let EventInput::Text(text) = input else {
                    return Err(ActionError::Infra("answer action without text input".to_owned()));
                };
                session.answers.record(session.step, text.trim());
                session.step += 1;
                Ok(())
            }
            DialogueAction::IngestExecutorFile => {
                let file_id = self.ingest_file(input).await?;
                session.executor_file_id = Some(file_id);
                Ok(())
            }
            DialogueAction::IngestClientFile => {
                let file_id = self.ingest_file(input).await?;
                session.client_file_id = Some(file_id);
                Ok(())
            }
            DialogueAction::PrimeAgent => {
                let attachments = [&session.executor_file_id, &session.client_file_id]
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect();
                self.agent.prime(attachments).await;
                Ok(())
            }
            DialogueAction::ForwardToAgent => {
                let EventInput::Text(text) = input else {
                    return Err(ActionError::Infra("forward action without text input".to_owned()));
                };
                let tagged = format!("[USER_ID:{chat_id}]\n{text}");
                // every chat turn re-attaches the client requisites file
                let attachments: Vec<String> = session.client_file_id.iter().cloned().collect();
                let answer = self.agent.invoke(&tagged, attachments).await.map_err(|e| {
                    ActionError::Recoverable {
                        reply: replies::agent_unavailable(),
                        detail: e.to_string(),
                    }
                })?;
                self.send(chat_id, OutgoingMessage::new(answer)).await
            }
            DialogueAction::GenerateRequisitesCard => {
                let generated = self
                    .generator
                    .generate_requisites_card(chat_id, &session.answers)
                    .await
                    .map_err(|e| ActionError::Recoverable {
                        reply: replies::generation_failed(),
                        detail: e.to_string(),
                    })?;
                let file_name = generated
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "requisites".to_owned());
                self.documents
                    .record(GeneratedDocument::new(
                        chat_id,
                        DocumentKind::RequisitesCard,
                        file_name,
                    ))
                    .await
                    .map_err(|e| ActionError::Infra(e.to_string()))
            }
            DialogueAction::DeliverGeneratedFiles => {
                self.courier.deliver(chat_id).await.map_err(|e| ActionError::Recoverable {
                    reply: replies::generation_failed(),
                    detail: e.to_string(),
                })?;
                Ok(())
            }
            DialogueAction::ConfirmCancellation => {
                self.send(chat_id, replies::cancel_confirmation()).await
            }
            DialogueAction::ClearSession => {
                session.clear();
                Ok(())
            }
        }
    }

    /// Pulls the uploaded document off the Bot API and hands it to the agent
    /// backend, returning the backend-side attachment id.
    async fn ingest_file(&self, input: &EventInput) -> Result<String, ActionError> {
        let EventInput::Document { file_id, file_name } = input else {
            return Err(ActionError::Infra("file action without document input".to_owned()));
        };
        let intake_failed = |detail: String| ActionError::Recoverable {
            reply: replies::file_intake_failed(),
            detail,
        };

        let info = self.api.get_file(file_id).await.map_err(|e| intake_failed(e.to_string()))?;
        let path = info
            .file_path
            .ok_or_else(|| intake_failed(format!("no file path for file id {file_id}")))?;
        let bytes =
            self.api.download_file(&path).await.map_err(|e| intake_failed(e.to_string()))?;
        let name = file_name.clone().unwrap_or_else(|| "requisites".to_owned());

        self.agent.upload(&name, bytes).await.map_err(|e| intake_failed(e.to_string()))
    }

    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<(), ActionError> {
        self.api
            .send_message(chat_id, &message.text)
            .await
            .map_err(|e| ActionError::Infra(e.to_string()))
    }
}

fn to_handler(error: ActionError, wrap: fn(String) -> EventHandlerError) -> EventHandlerError {
    match error {
        ActionError::Infra(detail) => wrap(detail),
        ActionError::Recoverable { detail, .. } => wrap(detail),
    }
}

fn rejection_reply(state: &DialogueState, error: &DialogueTransitionError) -> OutgoingMessage {
    match error {
        DialogueTransitionError::AlreadyAtFirstField => replies::already_at_first_field(),
        DialogueTransitionError::InvalidTransition { event, .. } => match event {
            DialogueEvent::CancelRequested => replies::nothing_to_cancel(),
            DialogueEvent::DocumentReceived => replies::unexpected_document(),
            DialogueEvent::TextReceived
                if matches!(
                    state,
                    DialogueState::AwaitingExecutorFile | DialogueState::AwaitingClientFile
                ) =>
            {
                replies::expected_document()
            }
            _ => replies::command_not_applicable(),
        },
    }
}

fn command_event(command: BotCommand) -> DialogueEvent {
    match command {
        BotCommand::Start => DialogueEvent::StartRequested,
        BotCommand::Commands => DialogueEvent::CommandListRequested,
        BotCommand::Docs => DialogueEvent::DocumentListRequested,
        BotCommand::New => DialogueEvent::FileFlowRequested,
        BotCommand::Reqs => DialogueEvent::QuestionnaireRequested,
        BotCommand::Back => DialogueEvent::BackRequested,
        BotCommand::Cancel => DialogueEvent::CancelRequested,
    }
}

#[async_trait]
impl<A> CommandService for DialogueService<A>
where
    A: AuditSink + 'static,
{
    async fn handle_command(
        &self,
        chat_id: i64,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        self.process(
            chat_id,
            command_event(event.command),
            EventInput::None,
            ctx,
            EventHandlerError::Command,
        )
        .await
    }
}

#[async_trait]
impl<A> TextMessageService for DialogueService<A>
where
    A: AuditSink + 'static,
{
    async fn handle_text(
        &self,
        chat_id: i64,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        self.process(
            chat_id,
            DialogueEvent::TextReceived,
            EventInput::Text(event.text.clone()),
            ctx,
            EventHandlerError::Text,
        )
        .await
    }
}

#[async_trait]
impl<A> DocumentService for DialogueService<A>
where
    A: AuditSink + 'static,
{
    async fn handle_document(
        &self,
        chat_id: i64,
        event: &DocumentEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        self.process(
            chat_id,
            DialogueEvent::DocumentReceived,
            EventInput::Document {
                file_id: event.file_id.clone(),
                file_name: event.file_name.clone(),
            },
            ctx,
            EventHandlerError::Document,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use aktly_agent::llm::{ChatRequest, ChatResponse, LlmClient, LlmError, UploadedFile};
    use aktly_agent::runtime::AgentFacade;
    use aktly_agent::tools::ToolRegistry;
    use aktly_core::audit::InMemoryAuditSink;
    use aktly_core::dialogue::DialogueState;
    use aktly_core::domain::requisites::field_count;
    use aktly_db::repositories::{
        InMemoryGeneratedDocumentRepository, InMemorySessionRepository, SessionRepository,
    };
    use aktly_telegram::api::{ApiError, BotApi, FileInfo, Update};
    use aktly_telegram::commands::BotCommand;
    use aktly_telegram::events::{
        CommandEvent, CommandService, DocumentEvent, DocumentService, EventContext,
        TextMessageEvent, TextMessageService,
    };

    use super::DialogueService;
    use crate::delivery::DocumentCourier;
    use crate::docgen::DocumentGenerator;

    #[derive(Default)]
    struct RecordingBotApi {
        messages: Mutex<Vec<(i64, String)>>,
        documents: Mutex<Vec<(i64, String)>>,
    }

    impl RecordingBotApi {
        async fn message_texts(&self) -> Vec<String> {
            self.messages.lock().await.iter().map(|(_, text)| text.clone()).collect()
        }
    }

    #[async_trait]
    impl BotApi for RecordingBotApi {
        async fn get_updates(
            &self,
            _offset: i64,
            _timeout_secs: u64,
        ) -> Result<Vec<Update>, ApiError> {
            Ok(Vec::new())
        }

        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ApiError> {
            self.messages.lock().await.push((chat_id, text.to_owned()));
            Ok(())
        }

        async fn send_document(
            &self,
            chat_id: i64,
            file_name: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), ApiError> {
            self.documents.lock().await.push((chat_id, file_name.to_owned()));
            Ok(())
        }

        async fn get_file(&self, file_id: &str) -> Result<FileInfo, ApiError> {
            Ok(FileInfo {
                file_id: file_id.to_owned(),
                file_path: Some(format!("documents/{file_id}")),
            })
        }

        async fn download_file(&self, _file_path: &str) -> Result<Vec<u8>, ApiError> {
            Ok(vec![1, 2, 3])
        }
    }

    struct ScriptedLlm {
        responses: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedLlm {
        fn with_responses(responses: Vec<ChatResponse>) -> Self {
            Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().await.push(request);
            self.responses
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| LlmError::Decode("script exhausted".to_owned()))
        }

        async fn upload_file(
            &self,
            file_name: &str,
            _bytes: Vec<u8>,
        ) -> Result<UploadedFile, LlmError> {
            Ok(UploadedFile { id: format!("file-{file_name}") })
        }
    }

    struct Harness {
        service: DialogueService<InMemoryAuditSink>,
        api: Arc<RecordingBotApi>,
        sessions: Arc<InMemorySessionRepository>,
        llm: Arc<ScriptedLlm>,
        _output: TempDir,
    }

    fn harness(responses: Vec<ChatResponse>) -> Harness {
        let output = TempDir::new().expect("tempdir");
        let api = Arc::new(RecordingBotApi::default());
        let sessions = Arc::new(InMemorySessionRepository::default());
        let documents = Arc::new(InMemoryGeneratedDocumentRepository::default());
        let llm = Arc::new(ScriptedLlm::with_responses(responses));
        let agent =
            Arc::new(AgentFacade::new(llm.clone(), Arc::new(ToolRegistry::default()), 0.1));
        let generator = Arc::new(
            DocumentGenerator::with_embedded_templates(output.path()).without_compiler(),
        );
        let courier =
            Arc::new(DocumentCourier::new(api.clone(), documents.clone(), output.path()));

        let service = DialogueService::new(
            sessions.clone(),
            documents,
            api.clone(),
            agent,
            generator,
            courier,
            InMemoryAuditSink::default(),
        );
        Harness { service, api, sessions, llm, _output: output }
    }

    fn command(command: BotCommand) -> CommandEvent {
        CommandEvent { command, raw_text: format!("/{command:?}").to_lowercase() }
    }

    fn text(text: &str) -> TextMessageEvent {
        TextMessageEvent { text: text.to_owned() }
    }

    fn ctx() -> EventContext {
        EventContext { correlation_id: "test-correlation".to_owned() }
    }

    #[tokio::test]
    async fn start_command_sends_the_greeting() {
        let h = harness(Vec::new());

        h.service.handle_command(1, &command(BotCommand::Start), &ctx()).await.expect("handle");

        let texts = h.api.message_texts().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Hello!"));
    }

    #[tokio::test]
    async fn file_flow_reaches_chatting_and_forwards_to_the_agent() {
        let h = harness(vec![ChatResponse {
            content: "Send me the works list.".to_owned(),
            tool_calls: Vec::new(),
        }]);

        h.service.handle_command(42, &command(BotCommand::New), &ctx()).await.expect("new");
        h.service
            .handle_document(
                42,
                &DocumentEvent {
                    file_id: "exec-1".to_owned(),
                    file_name: Some("executor.pdf".to_owned()),
                },
                &ctx(),
            )
            .await
            .expect("executor file");
        h.service
            .handle_document(
                42,
                &DocumentEvent {
                    file_id: "client-1".to_owned(),
                    file_name: Some("client.pdf".to_owned()),
                },
                &ctx(),
            )
            .await
            .expect("client file");

        let session =
            h.sessions.find_by_chat_id(42).await.expect("find").expect("session exists");
        assert_eq!(session.state, DialogueState::Chatting);
        assert_eq!(session.executor_file_id.as_deref(), Some("file-executor.pdf"));
        assert_eq!(session.client_file_id.as_deref(), Some("file-client.pdf"));

        h.service
            .handle_text(42, &text("Glassware supply 40000"), &ctx())
            .await
            .expect("chat turn");

        let requests = h.llm.requests.lock().await;
        assert_eq!(requests.len(), 1);
        // system prompt with both attachments, then the tagged user turn
        // carrying the client requisites file again
        assert_eq!(requests[0].messages[0].attachments, vec!["file-executor.pdf", "file-client.pdf"]);
        assert!(requests[0].messages[1].content.starts_with("[USER_ID:42]\n"));
        assert_eq!(requests[0].messages[1].attachments, vec!["file-client.pdf"]);

        let texts = h.api.message_texts().await;
        assert!(texts.iter().any(|t| t == "Send me the works list."));
    }

    #[tokio::test]
    async fn questionnaire_generates_and_delivers_the_card() {
        let h = harness(Vec::new());

        h.service.handle_command(7, &command(BotCommand::Reqs), &ctx()).await.expect("reqs");
        for step in 0..field_count() {
            h.service
                .handle_text(7, &text(&format!("answer-{step}")), &ctx())
                .await
                .expect("answer");
        }

        let sent = h.api.documents.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert!(sent[0].1.starts_with("requisites_"));
        drop(sent);

        // questionnaire closed: session is idle again with no answers kept
        let session = h.sessions.find_by_chat_id(7).await.expect("find").expect("exists");
        assert_eq!(session.state, DialogueState::Idle);
        assert!(session.answers.is_empty());
    }

    #[tokio::test]
    async fn text_while_awaiting_file_asks_for_a_document() {
        let h = harness(Vec::new());

        h.service.handle_command(9, &command(BotCommand::New), &ctx()).await.expect("new");
        h.service.handle_text(9, &text("here you go"), &ctx()).await.expect("text");

        let texts = h.api.message_texts().await;
        assert!(texts.last().expect("reply").contains("document attachment"));

        let session = h.sessions.find_by_chat_id(9).await.expect("find").expect("exists");
        assert_eq!(session.state, DialogueState::AwaitingExecutorFile);
    }

    #[tokio::test]
    async fn cancel_in_idle_and_back_at_first_field_are_reported() {
        let h = harness(Vec::new());

        h.service.handle_command(3, &command(BotCommand::Cancel), &ctx()).await.expect("cancel");
        let texts = h.api.message_texts().await;
        assert!(texts.last().expect("reply").contains("nothing to cancel"));

        h.service.handle_command(3, &command(BotCommand::Reqs), &ctx()).await.expect("reqs");
        h.service.handle_command(3, &command(BotCommand::Back), &ctx()).await.expect("back");
        let texts = h.api.message_texts().await;
        assert!(texts.last().expect("reply").contains("already at the first question"));
    }

    #[tokio::test]
    async fn back_steps_to_the_previous_field() {
        let h = harness(Vec::new());

        h.service.handle_command(5, &command(BotCommand::Reqs), &ctx()).await.expect("reqs");
        h.service.handle_text(5, &text("Acme LLC"), &ctx()).await.expect("answer");
        h.service.handle_command(5, &command(BotCommand::Back), &ctx()).await.expect("back");

        let texts = h.api.message_texts().await;
        // prompt 0, prompt 1, prompt 0 again
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], texts[2]);

        let session = h.sessions.find_by_chat_id(5).await.expect("find").expect("exists");
        assert_eq!(session.step, 0);
    }

    #[tokio::test]
    async fn agent_failure_keeps_the_chatting_state() {
        let h = harness(Vec::new()); // empty script: the first completion fails

        let mut session = aktly_core::domain::session::DialogueSession::new(11);
        session.state = DialogueState::Chatting;
        h.sessions.save(session).await.expect("seed session");

        h.service.handle_text(11, &text("hello"), &ctx()).await.expect("handled");

        let texts = h.api.message_texts().await;
        assert!(texts.last().expect("reply").contains("temporarily unavailable"));

        let session = h.sessions.find_by_chat_id(11).await.expect("find").expect("exists");
        assert_eq!(session.state, DialogueState::Chatting);
    }
}
