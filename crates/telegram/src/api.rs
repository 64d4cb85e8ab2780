use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telegram request failed: {0}")]
    Http(String),
    #[error("telegram api rejected the call: {0}")]
    Api(String),
    #[error("telegram response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Outbound surface of the Bot API that the dialogue service depends on.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ApiError>;
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ApiError>;
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError>;
    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ApiError>;
    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct HttpBotApi {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl HttpBotApi {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), token }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret(),
            method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret(),
            file_path
        )
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;

        if !envelope.ok {
            return Err(ApiError::Api(
                envelope.description.unwrap_or_else(|| format!("{method} returned ok=false")),
            ));
        }
        envelope
            .result
            .ok_or_else(|| ApiError::Decode(format!("{method} returned ok=true without a result")))
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, ApiError> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .call("sendMessage", serde_json::json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str("application/octet-stream")
            .map_err(|e| ApiError::Http(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let envelope: ApiEnvelope<serde_json::Value> =
            response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        if !envelope.ok {
            return Err(ApiError::Api(
                envelope.description.unwrap_or_else(|| "sendDocument returned ok=false".to_owned()),
            ));
        }
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ApiError> {
        self.call("getFile", serde_json::json!({ "file_id": file_id })).await
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Api(format!(
                "file download returned status {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await.map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Discards everything. Used as a default wiring target in tests.
#[derive(Default)]
pub struct NoopBotApi;

#[async_trait]
impl BotApi for NoopBotApi {
    async fn get_updates(&self, _offset: i64, _timeout_secs: u64) -> Result<Vec<Update>, ApiError> {
        Ok(Vec::new())
    }

    async fn send_message(&self, _chat_id: i64, _text: &str) -> Result<(), ApiError> {
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
