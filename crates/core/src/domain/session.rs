use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialogue::states::{DialogueState, SessionContext};
use crate::domain::requisites::{field_count, RequisiteAnswers};

/// Persistent per-chat conversation record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSession {
    pub chat_id: i64,
    pub state: DialogueState,
    pub step: usize,
    pub answers: RequisiteAnswers,
    /// Agent-side attachment id of the executor requisites file.
    pub executor_file_id: Option<String>,
    /// Agent-side attachment id of the client requisites file.
    pub client_file_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DialogueSession {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            state: DialogueState::Idle,
            step: 0,
            answers: RequisiteAnswers::default(),
            executor_file_id: None,
            client_file_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Snapshot of the facts the transition function needs.
    pub fn context(&self) -> SessionContext {
        SessionContext {
            step: self.step,
            total_fields: field_count(),
            executor_file_recorded: self.executor_file_id.is_some(),
            client_file_recorded: self.client_file_id.is_some(),
        }
    }

    /// Reset everything except the chat id.
    pub fn clear(&mut self) {
        *self = Self::new(self.chat_id);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use crate::dialogue::states::DialogueState;
    use crate::domain::session::DialogueSession;

    #[test]
    fn context_reflects_recorded_files_and_cursor() {
        let mut session = DialogueSession::new(99);
        session.state = DialogueState::Collecting;
        session.step = 7;
        session.executor_file_id = Some("file-abc".to_owned());

        let context = session.context();
        assert_eq!(context.step, 7);
        assert_eq!(context.total_fields, 16);
        assert!(context.executor_file_recorded);
        assert!(!context.client_file_recorded);
    }

    #[test]
    fn clear_resets_everything_but_the_chat_id() {
        let mut session = DialogueSession::new(99);
        session.state = DialogueState::Chatting;
        session.step = 12;
        session.answers.record(0, "Acme LLC");
        session.client_file_id = Some("file-def".to_owned());

        session.clear();

        assert_eq!(session.chat_id, 99);
        assert_eq!(session.state, DialogueState::Idle);
        assert_eq!(session.step, 0);
        assert!(session.answers.is_empty());
        assert!(session.client_file_id.is_none());
    }
}
