use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use aktly_core::domain::session::DialogueSession;

use super::{
    GeneratedDocument, GeneratedDocumentRepository, RepositoryError, SessionRepository,
};

/// In-memory session store for tests and smoke runs.
#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<i64, DialogueSession>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_chat_id(
        &self,
        chat_id: i64,
    ) -> Result<Option<DialogueSession>, RepositoryError> {
        Ok(self.sessions.read().await.get(&chat_id).cloned())
    }

    async fn save(&self, session: DialogueSession) -> Result<(), RepositoryError> {
        self.sessions.write().await.insert(session.chat_id, session);
        Ok(())
    }

    async fn delete(&self, chat_id: i64) -> Result<(), RepositoryError> {
        self.sessions.write().await.remove(&chat_id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryGeneratedDocumentRepository {
    documents: Arc<RwLock<Vec<GeneratedDocument>>>,
}

impl InMemoryGeneratedDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GeneratedDocumentRepository for InMemoryGeneratedDocumentRepository {
    async fn record(&self, document: GeneratedDocument) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.iter_mut().find(|d| d.id == document.id) {
            *existing = document;
        } else {
            documents.push(document);
        }
        Ok(())
    }

    async fn mark_delivered(
        &self,
        id: &str,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.iter_mut().find(|d| d.id == id) {
            existing.delivered_at = Some(delivered_at);
        }
        Ok(())
    }

    async fn list_for_chat(
        &self,
        chat_id: i64,
    ) -> Result<Vec<GeneratedDocument>, RepositoryError> {
        let mut documents: Vec<GeneratedDocument> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|d| d.chat_id == chat_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use aktly_core::dialogue::DialogueState;
    use aktly_core::domain::session::DialogueSession;

    use super::InMemorySessionRepository;
    use crate::repositories::SessionRepository;

    #[tokio::test]
    async fn session_round_trip_and_delete() {
        let repo = InMemorySessionRepository::new();

        let mut session = DialogueSession::new(1);
        session.state = DialogueState::AwaitingClientFile;
        repo.save(session).await.expect("save");

        let found = repo.find_by_chat_id(1).await.expect("find").expect("exists");
        assert_eq!(found.state, DialogueState::AwaitingClientFile);

        repo.delete(1).await.expect("delete");
        assert!(repo.find_by_chat_id(1).await.expect("find").is_none());
    }
}
