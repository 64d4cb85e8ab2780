use serde::{Deserialize, Serialize};

/// Conversation phase for a single private chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    /// No active workflow; commands and small talk only.
    Idle,
    /// `/new` was issued; the next document upload is the executor requisites file.
    AwaitingExecutorFile,
    /// Executor file recorded; the next document upload is the client requisites file.
    AwaitingClientFile,
    /// Both files forwarded to the agent; free-form messages go to the agent.
    Chatting,
    /// `/reqs` questionnaire in progress; the cursor lives in `SessionContext`.
    Collecting,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueEvent {
    StartRequested,
    CommandListRequested,
    DocumentListRequested,
    FileFlowRequested,
    QuestionnaireRequested,
    DocumentReceived,
    TextReceived,
    BackRequested,
    CancelRequested,
}

/// Facts the transition function needs beyond the bare state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionContext {
    /// Zero-based questionnaire cursor; only meaningful in `Collecting`.
    pub step: usize,
    /// Total questionnaire fields; the final answer closes the questionnaire.
    pub total_fields: usize,
    pub executor_file_recorded: bool,
    pub client_file_recorded: bool,
}

impl SessionContext {
    pub fn questionnaire(step: usize, total_fields: usize) -> Self {
        Self { step, total_fields, ..Self::default() }
    }

    pub fn answering_last_field(&self) -> bool {
        self.total_fields > 0 && self.step + 1 >= self.total_fields
    }
}

/// Side effects the service layer must perform after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueAction {
    SendGreeting,
    SendCommandList,
    SendDocumentList,
    PromptExecutorFile,
    PromptClientFile,
    PromptWorksList,
    PromptField,
    PromptPreviousField,
    RecordAnswer,
    IngestExecutorFile,
    IngestClientFile,
    PrimeAgent,
    ForwardToAgent,
    GenerateRequisitesCard,
    DeliverGeneratedFiles,
    ConfirmCancellation,
    ClearSession,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogueState,
    pub to: DialogueState,
    pub event: DialogueEvent,
    pub actions: Vec<DialogueAction>,
}
