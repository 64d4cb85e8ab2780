use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::api::Update;
use crate::commands::{parse_command, BotCommand};
use crate::replies::{self, OutgoingMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub chat_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(CommandEvent),
    Text(TextMessageEvent),
    Document(DocumentEvent),
    Unsupported,
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Command(_) => ChatEventType::Command,
            Self::Text(_) => ChatEventType::Text,
            Self::Document(_) => ChatEventType::Document,
            Self::Unsupported => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Command,
    Text,
    Document,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub command: BotCommand,
    pub raw_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentEvent {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutgoingMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("command handler failure: {0}")]
    Command(String),
    #[error("text message handler failure: {0}")]
    Text(String),
    #[error("document handler failure: {0}")]
    Document(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// Converts a raw Bot API update into a typed envelope.
///
/// Returns `None` for updates without a message. A document attachment wins
/// over text; a leading known command wins over plain text.
pub fn classify_update(update: Update) -> Option<UpdateEnvelope> {
    let message = update.message?;
    let chat_id = message.chat.id;

    let event = if let Some(document) = message.document {
        ChatEvent::Document(DocumentEvent {
            file_id: document.file_id,
            file_name: document.file_name,
        })
    } else if let Some(text) = message.text {
        match parse_command(&text) {
            Some(command) => ChatEvent::Command(CommandEvent { command, raw_text: text }),
            None => ChatEvent::Text(TextMessageEvent { text }),
        }
    } else {
        ChatEvent::Unsupported
    };

    Some(UpdateEnvelope { update_id: update.update_id, chat_id, event })
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub fn register_shared(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(handler.event_type(), handler);
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(NoopCommandService));
    dispatcher.register(TextMessageHandler::new(NoopTextMessageService));
    dispatcher.register(DocumentHandler::new(NoopDocumentService));
    dispatcher
}

#[async_trait]
pub trait CommandService: Send + Sync {
    async fn handle_command(
        &self,
        chat_id: i64,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError>;
}

pub struct CommandHandler<S> {
    service: S,
}

impl<S> CommandHandler<S>
where
    S: CommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: CommandService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Command
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Command(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_command(envelope.chat_id, event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

/// Answers the stateless commands and leaves stateful ones untouched.
#[derive(Default)]
pub struct NoopCommandService;

#[async_trait]
impl CommandService for NoopCommandService {
    async fn handle_command(
        &self,
        _chat_id: i64,
        event: &CommandEvent,
        _ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        Ok(match event.command {
            BotCommand::Start => Some(replies::greeting()),
            BotCommand::Commands => Some(replies::command_list()),
            BotCommand::Docs => Some(replies::document_list()),
            _ => None,
        })
    }
}

#[async_trait]
impl<S> CommandService for Arc<S>
where
    S: CommandService,
{
    async fn handle_command(
        &self,
        chat_id: i64,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        (**self).handle_command(chat_id, event, ctx).await
    }
}

#[async_trait]
pub trait TextMessageService: Send + Sync {
    async fn handle_text(
        &self,
        chat_id: i64,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError>;
}

pub struct TextMessageHandler<S> {
    service: S,
}

impl<S> TextMessageHandler<S>
where
    S: TextMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: TextMessageService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Text
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Text(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_text(envelope.chat_id, event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[derive(Default)]
pub struct NoopTextMessageService;

#[async_trait]
impl TextMessageService for NoopTextMessageService {
    async fn handle_text(
        &self,
        _chat_id: i64,
        _event: &TextMessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        Ok(None)
    }
}

#[async_trait]
impl<S> TextMessageService for Arc<S>
where
    S: TextMessageService,
{
    async fn handle_text(
        &self,
        chat_id: i64,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        (**self).handle_text(chat_id, event, ctx).await
    }
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn handle_document(
        &self,
        chat_id: i64,
        event: &DocumentEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError>;
}

pub struct DocumentHandler<S> {
    service: S,
}

impl<S> DocumentHandler<S>
where
    S: DocumentService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for DocumentHandler<S>
where
    S: DocumentService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Document
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Document(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_document(envelope.chat_id, event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[async_trait]
impl<S> DocumentService for Arc<S>
where
    S: DocumentService,
{
    async fn handle_document(
        &self,
        chat_id: i64,
        event: &DocumentEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        (**self).handle_document(chat_id, event, ctx).await
    }
}

#[derive(Default)]
pub struct NoopDocumentService;

#[async_trait]
impl DocumentService for NoopDocumentService {
    async fn handle_document(
        &self,
        _chat_id: i64,
        _event: &DocumentEvent,
        _ctx: &EventContext,
    ) -> Result<Option<OutgoingMessage>, EventHandlerError> {
        Ok(Some(replies::unexpected_document()))
    }
}
