//! Delivery of generated documents to the chat.
//!
//! The generation pipeline drops files into a per-chat directory. The courier
//! picks everything up from there, sends each file as a document and removes
//! the directory so nothing is sent twice.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use aktly_db::repositories::GeneratedDocumentRepository;
use aktly_telegram::api::{ApiError, BotApi};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to send document: {0}")]
    Send(#[from] ApiError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DocumentCourier {
    api: Arc<dyn BotApi>,
    documents: Arc<dyn GeneratedDocumentRepository>,
    output_dir: PathBuf,
}

impl DocumentCourier {
    pub fn new(
        api: Arc<dyn BotApi>,
        documents: Arc<dyn GeneratedDocumentRepository>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { api, documents, output_dir: output_dir.into() }
    }

    /// Sends every file waiting for the chat and removes its directory.
    /// Returns the number of files delivered; a missing directory is not an
    /// error, there is just nothing to deliver.
    pub async fn deliver(&self, chat_id: i64) -> Result<usize, DeliveryError> {
        let dir = self.output_dir.join(chat_id.to_string());
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut delivered = 0;
        for path in &files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "document".to_owned());
            let bytes = tokio::fs::read(path).await?;
            self.api.send_document(chat_id, &file_name, bytes).await?;
            delivered += 1;

            info!(
                event_name = "delivery.document_sent",
                chat_id,
                file_name = %file_name,
                "delivered generated document"
            );
            self.mark_delivered(chat_id, &file_name).await;
        }

        tokio::fs::remove_dir_all(&dir).await?;
        Ok(delivered)
    }

    /// Delivery outranks the ledger: a write failure here is logged, not
    /// propagated, the user already has the file.
    async fn mark_delivered(&self, chat_id: i64, file_name: &str) {
        let records = match self.documents.list_for_chat(chat_id).await {
            Ok(records) => records,
            Err(error) => {
                warn!(chat_id, error = %error, "could not load document ledger");
                return;
            }
        };
        let Some(record) =
            records.iter().find(|r| r.file_name == file_name && r.delivered_at.is_none())
        else {
            return;
        };
        if let Err(error) = self.documents.mark_delivered(&record.id, Utc::now()).await {
            warn!(chat_id, error = %error, "could not mark document as delivered");
        }
    }
}
