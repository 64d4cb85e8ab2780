pub mod act;
pub mod requisites;
pub mod session;

pub use act::{ActData, BankDetails, JobItem, Party};
pub use requisites::{field_count, field_label, RequisiteAnswers, BANK_SECTION_START, REQUISITE_FIELDS};
pub use session::DialogueSession;
