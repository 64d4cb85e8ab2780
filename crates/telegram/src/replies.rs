use aktly_core::domain::requisites::{field_label, BANK_SECTION_START};

/// A plain text reply addressed back to the chat the event came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
}

impl OutgoingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

pub fn greeting() -> OutgoingMessage {
    OutgoingMessage::new(
        "Hello! I prepare acts of completed works and organization requisites cards.\n\
         Send /commands to see what I can do.",
    )
}

pub fn command_list() -> OutgoingMessage {
    OutgoingMessage::new(
        "/docs - list the documents I can prepare\n\
         /new - start preparing an act of completed works\n\
         /reqs - fill in your organization requisites card\n\
         /back - return to the previous questionnaire field\n\
         /cancel - abort the current operation",
    )
}

pub fn document_list() -> OutgoingMessage {
    OutgoingMessage::new(
        "I can prepare:\n\
         1. Act of completed works (send /new and attach both requisites files)\n\
         2. Organization requisites card (send /reqs and answer the questionnaire)",
    )
}

pub fn prompt_executor_file() -> OutgoingMessage {
    OutgoingMessage::new("Send the executor requisites file as a document attachment.")
}

pub fn prompt_client_file() -> OutgoingMessage {
    OutgoingMessage::new("Got it. Now send the client requisites file.")
}

pub fn prompt_works_list() -> OutgoingMessage {
    OutgoingMessage::new(
        "Both files are in. Now describe the completed works and their prices,\n\
         one job per line, and I will draft the act.",
    )
}

pub fn prompt_field(step: usize) -> OutgoingMessage {
    let label = field_label(step).unwrap_or("answer");
    if step == BANK_SECTION_START {
        OutgoingMessage::new(format!("Now the banking details. Enter: {label}"))
    } else {
        OutgoingMessage::new(format!("Enter: {label}"))
    }
}

pub fn already_at_first_field() -> OutgoingMessage {
    OutgoingMessage::new("You are already at the first question.")
}

pub fn cancel_confirmation() -> OutgoingMessage {
    OutgoingMessage::new("Operation cancelled. Send /commands to start over.")
}

pub fn nothing_to_cancel() -> OutgoingMessage {
    OutgoingMessage::new("There is nothing to cancel right now.")
}

pub fn expected_document() -> OutgoingMessage {
    OutgoingMessage::new("I expected a document attachment here. Send the file, or /cancel.")
}

pub fn unexpected_document() -> OutgoingMessage {
    OutgoingMessage::new(
        "I was not expecting a file. Send /new to start the act flow, or /commands for help.",
    )
}

pub fn command_not_applicable() -> OutgoingMessage {
    OutgoingMessage::new("That command does not apply right now. Send /commands for help.")
}

pub fn file_intake_failed() -> OutgoingMessage {
    OutgoingMessage::new("I could not read that file. Please send it again.")
}

pub fn generation_failed() -> OutgoingMessage {
    OutgoingMessage::new("Document generation failed. Please try again later.")
}

pub fn agent_unavailable() -> OutgoingMessage {
    OutgoingMessage::new("The assistant is temporarily unavailable. Please retry shortly.")
}
