pub mod audit;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, DocgenConfig, LlmConfig, LoadOptions,
    LogFormat, LoggingConfig, ServerConfig, TelegramConfig,
};
pub use dialogue::{
    DialogueAction, DialogueDefinition, DialogueEngine, DialogueEvent, DialogueState,
    DialogueTransitionError, PrivateChatDialogue, SessionContext, TransitionOutcome,
};
pub use domain::act::{ActData, BankDetails, JobItem, Party};
pub use domain::requisites::{field_count, field_label, RequisiteAnswers, REQUISITE_FIELDS};
pub use domain::session::DialogueSession;
pub use errors::{ApplicationError, DomainError, InterfaceError};
