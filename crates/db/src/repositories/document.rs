use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{DocumentKind, GeneratedDocument, GeneratedDocumentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlGeneratedDocumentRepository {
    pool: DbPool,
}

impl SqlGeneratedDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_kind(s: &str) -> DocumentKind {
    match s {
        "requisites_card" => DocumentKind::RequisitesCard,
        _ => DocumentKind::Act,
    }
}

pub fn kind_as_str(kind: &DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Act => "act",
        DocumentKind::RequisitesCard => "requisites_card",
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<GeneratedDocument, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let chat_id: i64 =
        row.try_get("chat_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let file_name: String =
        row.try_get("file_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivered_at_str: Option<String> =
        row.try_get("delivered_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let delivered_at = delivered_at_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(GeneratedDocument {
        id,
        chat_id,
        kind: parse_kind(&kind_str),
        file_name,
        created_at,
        delivered_at,
    })
}

#[async_trait::async_trait]
impl GeneratedDocumentRepository for SqlGeneratedDocumentRepository {
    async fn record(&self, document: GeneratedDocument) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO generated_document (id, chat_id, kind, file_name, created_at, delivered_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 delivered_at = excluded.delivered_at",
        )
        .bind(&document.id)
        .bind(document.chat_id)
        .bind(kind_as_str(&document.kind))
        .bind(&document.file_name)
        .bind(document.created_at.to_rfc3339())
        .bind(document.delivered_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_delivered(
        &self,
        id: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE generated_document SET delivered_at = ? WHERE id = ?")
            .bind(delivered_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_chat(
        &self,
        chat_id: i64,
    ) -> Result<Vec<GeneratedDocument>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, chat_id, kind, file_name, created_at, delivered_at
             FROM generated_document WHERE chat_id = ? ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect::<Result<Vec<_>, _>>()
    }
}
