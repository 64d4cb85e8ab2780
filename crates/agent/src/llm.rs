use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(String),
    #[error("llm provider rejected the call: status {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Provider-side file ids attached to this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            attachments: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            attachments: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            attachments: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
}

/// Pluggable LLM backend: one completion call, one file upload call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedFile, LlmError>;
}

#[derive(Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// HTTP client for an OpenAI-compatible chat completion endpoint.
///
/// The API key lives in a [`SecretString`] and is only exposed when the
/// authorization header is built.
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self { client, api_key, base_url: base_url.into(), model: model.into() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|message| {
                let mut wire = serde_json::json!({
                    "role": message.role,
                    "content": message.content,
                });
                if !message.attachments.is_empty() {
                    wire["attachments"] = serde_json::json!(message.attachments);
                }
                if let Some(tool_call_id) = &message.tool_call_id {
                    wire["tool_call_id"] = serde_json::json!(tool_call_id);
                }
                wire
            })
            .collect();

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
                "temperature": request.temperature,
            }))
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status: status.as_u16(), message });
        }

        let wire: WireChatResponse =
            response.json().await.map_err(|e| LlmError::Decode(e.to_string()))?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("completion contained no choices".to_owned()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = if call.function.arguments.trim().is_empty() {
                    Ok(serde_json::Value::Null)
                } else {
                    serde_json::from_str(&call.function.arguments)
                };
                arguments
                    .map(|arguments| ToolCall { id: call.id, name: call.function.name, arguments })
                    .map_err(|e| LlmError::Decode(format!("tool call arguments: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChatResponse { content: choice.message.content.unwrap_or_default(), tool_calls })
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedFile, LlmError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str("application/octet-stream")
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "general")
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("files"))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider { status: status.as_u16(), message });
        }

        response.json().await.map_err(|e| LlmError::Decode(e.to_string()))
    }
}

/// Retries transient backend failures with linear backoff.
///
/// Transient means a transport error or a 429/5xx provider status. Decode
/// failures and other provider rejections pass through on the first attempt.
pub struct RetryingLlmClient<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C> RetryingLlmClient<C> {
    pub fn new(inner: C, max_retries: u32) -> Self {
        Self { inner, max_retries, base_delay: Duration::from_millis(250) }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    async fn back_off(&self, attempt: u32, operation: &str, error: &LlmError) {
        warn!(
            event_name = "llm.retrying",
            operation,
            attempt,
            max_retries = self.max_retries,
            error = %error,
            "transient llm failure, backing off before retrying"
        );
        tokio::time::sleep(self.base_delay * attempt).await;
    }
}

fn is_transient(error: &LlmError) -> bool {
    match error {
        LlmError::Http(_) => true,
        LlmError::Provider { status, .. } => *status == 429 || *status >= 500,
        LlmError::Decode(_) => false,
    }
}

#[async_trait]
impl<C> LlmClient for RetryingLlmClient<C>
where
    C: LlmClient,
{
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) if is_transient(&error) && attempt < self.max_retries => {
                    attempt += 1;
                    self.back_off(attempt, "complete", &error).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadedFile, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.upload_file(file_name, bytes.clone()).await {
                Ok(uploaded) => return Ok(uploaded),
                Err(error) if is_transient(&error) && attempt < self.max_retries => {
                    attempt += 1;
                    self.back_off(attempt, "upload_file", &error).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
