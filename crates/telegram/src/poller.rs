use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, BotApi, Update};
use crate::events::{classify_update, EventContext, EventDispatcher, HandlerResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("update poll failed: {0}")]
    Poll(String),
    #[error("reply send failed: {0}")]
    Send(String),
}

impl From<ApiError> for TransportError {
    fn from(value: ApiError) -> Self {
        Self::Poll(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of update batches. `Ok(None)` means the stream is finished and the
/// runner should stop, which is how tests and graceful shutdown terminate it.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn poll(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError>;
}

pub struct BotApiUpdateSource {
    api: Arc<dyn BotApi>,
    poll_timeout_secs: u64,
}

impl BotApiUpdateSource {
    pub fn new(api: Arc<dyn BotApi>, poll_timeout_secs: u64) -> Self {
        Self { api, poll_timeout_secs }
    }
}

#[async_trait]
impl UpdateSource for BotApiUpdateSource {
    async fn poll(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError> {
        let updates = self.api.get_updates(offset, self.poll_timeout_secs).await?;
        Ok(Some(updates))
    }
}

/// Long-poll loop: fetch update batches, classify, dispatch, send replies.
///
/// Poll failures back off and retry per [`ReconnectPolicy`]; once retries are
/// exhausted the runner returns without crashing the process.
pub struct LongPollRunner {
    source: Arc<dyn UpdateSource>,
    responder: Arc<dyn BotApi>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl LongPollRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        responder: Arc<dyn BotApi>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, responder, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut offset = 0_i64;
        let mut attempt = 0_u32;

        loop {
            match self.source.poll(offset).await {
                Ok(None) => {
                    info!(offset, "update stream closed");
                    return Ok(());
                }
                Ok(Some(updates)) => {
                    attempt = 0;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.process_update(update).await;
                    }
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "long poll transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "long poll retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn process_update(&self, update: Update) {
        let update_id = update.update_id;
        let Some(envelope) = classify_update(update) else {
            debug!(update_id, "update carries no message; skipping");
            return;
        };

        let correlation_id = format!("upd-{update_id}");
        info!(
            event_name = "ingress.telegram.update_received",
            update_id,
            chat_id = envelope.chat_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %correlation_id,
            "received telegram update"
        );

        let context = EventContext { correlation_id: correlation_id.clone() };
        match self.dispatcher.dispatch(&envelope, &context).await {
            Ok(HandlerResult::Responded(message)) => {
                if let Err(error) =
                    self.responder.send_message(envelope.chat_id, &message.text).await
                {
                    warn!(
                        update_id,
                        chat_id = envelope.chat_id,
                        correlation_id = %correlation_id,
                        error = %error,
                        "failed to send reply; continuing poll loop"
                    );
                }
            }
            Ok(HandlerResult::Processed) | Ok(HandlerResult::Ignored) => {}
            Err(error) => {
                warn!(
                    update_id,
                    chat_id = envelope.chat_id,
                    correlation_id = %correlation_id,
                    error = %error,
                    "event dispatch failed; continuing poll loop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{LongPollRunner, ReconnectPolicy, TransportError, UpdateSource};
    use crate::api::{ApiError, BotApi, Chat, FileInfo, Message, Update};
    use crate::events::default_dispatcher;

    #[derive(Default)]
    struct ScriptedUpdates {
        batches: Mutex<VecDeque<Result<Option<Vec<Update>>, TransportError>>>,
        offsets: Mutex<Vec<i64>>,
    }

    impl ScriptedUpdates {
        fn with_script(batches: Vec<Result<Option<Vec<Update>>, TransportError>>) -> Self {
            Self { batches: Mutex::new(batches.into()), offsets: Mutex::new(Vec::new()) }
        }

        async fn offsets(&self) -> Vec<i64> {
            self.offsets.lock().await.clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedUpdates {
        async fn poll(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError> {
            self.offsets.lock().await.push(offset);
            self.batches.lock().await.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingBotApi {
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl RecordingBotApi {
        async fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().await.clone()
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
            self.sent.lock().await.push((chat_id, text.to_owned()));
            Ok(())
        }

        async fn send_document(
            &self,
            _chat_id: i64,
            _file_name: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn get_file(&self, file_id: &str) -> Result<FileInfo, ApiError> {
            Ok(FileInfo { file_id: file_id.to_owned(), file_path: None })
        }

        async fn download_file(&self, _file_path: &str) -> Result<Vec<u8>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                chat: Chat { id: chat_id },
                text: Some(text.to_owned()),
                document: None,
            }),
        }
    }

    #[tokio::test]
    async fn advances_offset_past_every_seen_update() {
        let source = Arc::new(ScriptedUpdates::with_script(vec![
            Ok(Some(vec![text_update(10, 1, "/start"), text_update(11, 1, "hello")])),
            Ok(Some(vec![text_update(12, 1, "/commands")])),
            Ok(None),
        ]));
        let responder = Arc::new(RecordingBotApi::default());

        let runner = LongPollRunner::new(
            source.clone(),
            responder.clone(),
            default_dispatcher(),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );
        runner.start().await.expect("runner should not fail");

        assert_eq!(source.offsets().await, vec![0, 12, 13]);
        let sent = responder.sent().await;
        assert_eq!(sent.len(), 2, "only /start and /commands have canned replies");
        assert_eq!(sent[0].0, 1);
    }

    #[tokio::test]
    async fn retries_after_poll_failure_then_resumes() {
        let source = Arc::new(ScriptedUpdates::with_script(vec![
            Err(TransportError::Poll("network down".to_owned())),
            Ok(Some(vec![text_update(5, 2, "/start")])),
            Ok(None),
        ]));
        let responder = Arc::new(RecordingBotApi::default());

        let runner = LongPollRunner::new(
            source.clone(),
            responder.clone(),
            default_dispatcher(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );
        runner.start().await.expect("runner should recover");

        assert_eq!(responder.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let source = Arc::new(ScriptedUpdates::with_script(vec![
            Err(TransportError::Poll("fail-1".to_owned())),
            Err(TransportError::Poll("fail-2".to_owned())),
            Err(TransportError::Poll("fail-3".to_owned())),
        ]));

        let runner = LongPollRunner::new(
            source.clone(),
            Arc::new(RecordingBotApi::default()),
            default_dispatcher(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(source.offsets().await.len(), 3);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0).as_millis(), 100);
        assert_eq!(policy.backoff(1).as_millis(), 200);
        assert_eq!(policy.backoff(2).as_millis(), 400);
        assert_eq!(policy.backoff(10).as_millis(), 1_000);
    }
}
