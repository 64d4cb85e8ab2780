pub mod engine;
pub mod states;

pub use engine::{DialogueDefinition, DialogueEngine, DialogueTransitionError, PrivateChatDialogue};
pub use states::{DialogueAction, DialogueEvent, DialogueState, SessionContext, TransitionOutcome};
