use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::dialogue::states::{
    DialogueAction, DialogueEvent, DialogueState, SessionContext, TransitionOutcome,
};

pub trait DialogueDefinition {
    fn initial_state(&self) -> DialogueState;
    fn transition(
        &self,
        current: &DialogueState,
        event: &DialogueEvent,
        context: &SessionContext,
    ) -> Result<TransitionOutcome, DialogueTransitionError>;
}

/// The private-chat dialogue: file intake, agent chat, and the requisites
/// questionnaire, all in one state machine.
#[derive(Clone, Debug, Default)]
pub struct PrivateChatDialogue;

impl DialogueDefinition for PrivateChatDialogue {
    fn initial_state(&self) -> DialogueState {
        DialogueState::Idle
    }

    fn transition(
        &self,
        current: &DialogueState,
        event: &DialogueEvent,
        context: &SessionContext,
    ) -> Result<TransitionOutcome, DialogueTransitionError> {
        transition_private_chat(current, event, context)
    }
}

pub struct DialogueEngine<D = PrivateChatDialogue> {
    dialogue: D,
}

impl<D> DialogueEngine<D>
where
    D: DialogueDefinition,
{
    pub fn new(dialogue: D) -> Self {
        Self { dialogue }
    }

    pub fn initial_state(&self) -> DialogueState {
        self.dialogue.initial_state()
    }

    pub fn apply(
        &self,
        current: &DialogueState,
        event: &DialogueEvent,
        context: &SessionContext,
    ) -> Result<TransitionOutcome, DialogueTransitionError> {
        self.dialogue.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &DialogueState,
        event: &DialogueEvent,
        context: &SessionContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DialogueTransitionError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.chat_id,
                        audit.correlation_id.clone(),
                        "dialogue.transition_applied",
                        AuditCategory::Dialogue,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.chat_id,
                        audit.correlation_id.clone(),
                        "dialogue.transition_rejected",
                        AuditCategory::Dialogue,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for DialogueEngine<PrivateChatDialogue> {
    fn default() -> Self {
        Self::new(PrivateChatDialogue)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueTransitionError {
    #[error("event {event:?} is not accepted in state {state:?}")]
    InvalidTransition { state: DialogueState, event: DialogueEvent },
    #[error("questionnaire is already at the first field")]
    AlreadyAtFirstField,
}

fn transition_private_chat(
    current: &DialogueState,
    event: &DialogueEvent,
    context: &SessionContext,
) -> Result<TransitionOutcome, DialogueTransitionError> {
    use DialogueAction::{
        ClearSession, ConfirmCancellation, DeliverGeneratedFiles, ForwardToAgent,
        GenerateRequisitesCard, IngestClientFile, IngestExecutorFile, PrimeAgent, PromptClientFile,
        PromptExecutorFile, PromptField, PromptPreviousField, PromptWorksList, RecordAnswer,
        SendCommandList, SendDocumentList, SendGreeting,
    };
    use DialogueEvent::{
        BackRequested, CancelRequested, CommandListRequested, DocumentListRequested,
        DocumentReceived, FileFlowRequested, QuestionnaireRequested, StartRequested, TextReceived,
    };
    use DialogueState::{AwaitingClientFile, AwaitingExecutorFile, Chatting, Collecting, Idle};

    let (to, actions) = match (current, event) {
        // Informational commands never move the conversation.
        (state, StartRequested) => (state.clone(), vec![SendGreeting]),
        (state, CommandListRequested) => (state.clone(), vec![SendCommandList]),
        (state, DocumentListRequested) => (state.clone(), vec![SendDocumentList]),

        // `/new` and `/reqs` restart their workflow from any state.
        (_, FileFlowRequested) => (AwaitingExecutorFile, vec![ClearSession, PromptExecutorFile]),
        (_, QuestionnaireRequested) => (Collecting, vec![ClearSession, PromptField]),

        (AwaitingExecutorFile, DocumentReceived) => {
            (AwaitingClientFile, vec![IngestExecutorFile, PromptClientFile])
        }
        (AwaitingClientFile, DocumentReceived) => {
            (Chatting, vec![IngestClientFile, PromptWorksList, PrimeAgent])
        }

        (Chatting, TextReceived) => (Chatting, vec![ForwardToAgent, DeliverGeneratedFiles]),

        (Collecting, TextReceived) if context.answering_last_field() => (
            Idle,
            vec![RecordAnswer, GenerateRequisitesCard, DeliverGeneratedFiles, ClearSession],
        ),
        (Collecting, TextReceived) => (Collecting, vec![RecordAnswer, PromptField]),

        (Collecting, BackRequested) if context.step == 0 => {
            return Err(DialogueTransitionError::AlreadyAtFirstField);
        }
        (Collecting, BackRequested) => (Collecting, vec![PromptPreviousField]),

        (Idle, CancelRequested) => {
            return Err(DialogueTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
        (_, CancelRequested) => (Idle, vec![ConfirmCancellation, ClearSession]),

        // Free text outside an active workflow is silently ignored.
        (Idle, TextReceived) => (Idle, Vec::new()),

        _ => {
            return Err(DialogueTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
