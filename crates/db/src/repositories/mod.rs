use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use aktly_core::domain::session::DialogueSession;

pub mod document;
pub mod memory;
pub mod session;

pub use document::SqlGeneratedDocumentRepository;
pub use memory::{InMemoryGeneratedDocumentRepository, InMemorySessionRepository};
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Ledger record for a document produced by the generation pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub id: String,
    pub chat_id: i64,
    pub kind: DocumentKind,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Act,
    RequisitesCard,
}

impl GeneratedDocument {
    pub fn new(chat_id: i64, kind: DocumentKind, file_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id,
            kind,
            file_name: file_name.into(),
            created_at: Utc::now(),
            delivered_at: None,
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_chat_id(&self, chat_id: i64)
        -> Result<Option<DialogueSession>, RepositoryError>;
    async fn save(&self, session: DialogueSession) -> Result<(), RepositoryError>;
    async fn delete(&self, chat_id: i64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait GeneratedDocumentRepository: Send + Sync {
    async fn record(&self, document: GeneratedDocument) -> Result<(), RepositoryError>;
    async fn mark_delivered(
        &self,
        id: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn list_for_chat(&self, chat_id: i64)
        -> Result<Vec<GeneratedDocument>, RepositoryError>;
}
