use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered questionnaire fields for the organization requisites card.
///
/// The index is the questionnaire step number and the storage key. The bank
/// section starts at [`BANK_SECTION_START`]; everything before it lands in
/// the organization card section of the generated document.
pub const REQUISITE_FIELDS: &[&str] = &[
    "Full legal name",
    "Short name",
    "OGRN",
    "INN",
    "KPP",
    "Registered address",
    "Mailing address",
    "Phone",
    "Email",
    "Director",
    "Chief accountant",
    "Settlement account",
    "Bank name",
    "Correspondent account",
    "BIC",
    "Signatory",
];

/// Index of the first banking field ("Settlement account").
pub const BANK_SECTION_START: usize = 11;

pub fn field_label(step: usize) -> Option<&'static str> {
    REQUISITE_FIELDS.get(step).copied()
}

pub fn field_count() -> usize {
    REQUISITE_FIELDS.len()
}

/// Answers collected so far, keyed by step number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisiteAnswers {
    answers: BTreeMap<usize, String>,
}

impl RequisiteAnswers {
    pub fn record(&mut self, step: usize, value: impl Into<String>) {
        self.answers.insert(step, value.into());
    }

    pub fn get(&self, step: usize) -> Option<&str> {
        self.answers.get(&step).map(String::as_str)
    }

    pub fn get_or_empty(&self, step: usize) -> &str {
        self.get(step).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        (0..field_count()).all(|step| {
            self.answers.get(&step).map(|value| !value.trim().is_empty()).unwrap_or(false)
        })
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        (0..field_count())
            .filter(|step| {
                self.answers.get(step).map(|value| value.trim().is_empty()).unwrap_or(true)
            })
            .filter_map(field_label)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.answers.iter().map(|(step, value)| (*step, value.as_str()))
    }
}
