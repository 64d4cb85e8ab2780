use chrono::{DateTime, Utc};
use sqlx::Row;

use aktly_core::dialogue::DialogueState;
use aktly_core::domain::requisites::RequisiteAnswers;
use aktly_core::domain::session::DialogueSession;

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_state(s: &str) -> DialogueState {
    match s {
        "awaiting_executor_file" => DialogueState::AwaitingExecutorFile,
        "awaiting_client_file" => DialogueState::AwaitingClientFile,
        "chatting" => DialogueState::Chatting,
        "collecting" => DialogueState::Collecting,
        _ => DialogueState::Idle,
    }
}

pub fn state_as_str(state: &DialogueState) -> &'static str {
    match state {
        DialogueState::Idle => "idle",
        DialogueState::AwaitingExecutorFile => "awaiting_executor_file",
        DialogueState::AwaitingClientFile => "awaiting_client_file",
        DialogueState::Chatting => "chatting",
        DialogueState::Collecting => "collecting",
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<DialogueSession, RepositoryError> {
    let chat_id: i64 =
        row.try_get("chat_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state_str: String =
        row.try_get("state").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step: i64 = row.try_get("step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let answers_json: String =
        row.try_get("answers").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let executor_file_id: Option<String> =
        row.try_get("executor_file_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let client_file_id: Option<String> =
        row.try_get("client_file_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let answers: RequisiteAnswers = serde_json::from_str(&answers_json)
        .map_err(|e| RepositoryError::Decode(format!("answers column: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(DialogueSession {
        chat_id,
        state: parse_state(&state_str),
        step: step.max(0) as usize,
        answers,
        executor_file_id,
        client_file_id,
        updated_at,
    })
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_by_chat_id(
        &self,
        chat_id: i64,
    ) -> Result<Option<DialogueSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT chat_id, state, step, answers, executor_file_id, client_file_id, updated_at
             FROM dialogue_session WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: DialogueSession) -> Result<(), RepositoryError> {
        let answers_json = serde_json::to_string(&session.answers)
            .map_err(|e| RepositoryError::Decode(format!("answers column: {e}")))?;

        sqlx::query(
            "INSERT INTO dialogue_session (chat_id, state, step, answers,
                                           executor_file_id, client_file_id, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(chat_id) DO UPDATE SET
                 state = excluded.state,
                 step = excluded.step,
                 answers = excluded.answers,
                 executor_file_id = excluded.executor_file_id,
                 client_file_id = excluded.client_file_id,
                 updated_at = excluded.updated_at",
        )
        .bind(session.chat_id)
        .bind(state_as_str(&session.state))
        .bind(session.step as i64)
        .bind(&answers_json)
        .bind(&session.executor_file_id)
        .bind(&session.client_file_id)
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, chat_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM dialogue_session WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aktly_core::dialogue::DialogueState;
    use aktly_core::domain::session::DialogueSession;

    use super::SqlSessionRepository;
    use crate::repositories::SessionRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_and_find_round_trips_all_fields() {
        let pool = setup().await;
        let repo = SqlSessionRepository::new(pool);

        let mut session = DialogueSession::new(777);
        session.state = DialogueState::Collecting;
        session.step = 11;
        session.answers.record(0, "Romashka LLC");
        session.answers.record(3, "7707083893");
        session.executor_file_id = Some("file-exec".to_string());

        repo.save(session.clone()).await.expect("save");
        let found = repo.find_by_chat_id(777).await.expect("find").expect("should exist");

        assert_eq!(found.chat_id, 777);
        assert_eq!(found.state, DialogueState::Collecting);
        assert_eq!(found.step, 11);
        assert_eq!(found.answers.get(0), Some("Romashka LLC"));
        assert_eq!(found.answers.get(3), Some("7707083893"));
        assert_eq!(found.executor_file_id.as_deref(), Some("file-exec"));
        assert!(found.client_file_id.is_none());
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let pool = setup().await;
        let repo = SqlSessionRepository::new(pool);

        let session = DialogueSession::new(42);
        repo.save(session.clone()).await.expect("save");

        let mut updated = session;
        updated.state = DialogueState::Chatting;
        updated.client_file_id = Some("file-client".to_string());
        repo.save(updated).await.expect("upsert");

        let found = repo.find_by_chat_id(42).await.expect("find").expect("should exist");
        assert_eq!(found.state, DialogueState::Chatting);
        assert_eq!(found.client_file_id.as_deref(), Some("file-client"));
    }

    #[tokio::test]
    async fn delete_removes_the_session() {
        let pool = setup().await;
        let repo = SqlSessionRepository::new(pool);

        repo.save(DialogueSession::new(13)).await.expect("save");
        repo.delete(13).await.expect("delete");

        assert!(repo.find_by_chat_id(13).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn missing_session_returns_none() {
        let pool = setup().await;
        let repo = SqlSessionRepository::new(pool);

        assert!(repo.find_by_chat_id(1).await.expect("find").is_none());
    }
}
