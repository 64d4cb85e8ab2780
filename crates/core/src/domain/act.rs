use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Banking details of one party to the act.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub name: String,
    pub bic: String,
    pub settlement_account: String,
    pub correspondent_account: String,
}

/// A party to the act of completed works (customer or executor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub inn: String,
    pub ogrn: String,
    pub address: String,
    pub signatory: String,
    pub bank: BankDetails,
}

/// One completed job line: what was done and its price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub task: String,
    pub price: Decimal,
}

/// Everything the act template needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActData {
    pub customer: Party,
    pub executor: Party,
    pub jobs: Vec<JobItem>,
}

impl ActData {
    pub fn total(&self) -> Decimal {
        self.jobs.iter().map(|job| job.price).sum()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.jobs.is_empty() {
            return Err(DomainError::InvariantViolation(
                "an act must contain at least one completed job".to_owned(),
            ));
        }
        if self.jobs.iter().any(|job| job.price < Decimal::ZERO) {
            return Err(DomainError::InvariantViolation(
                "job prices must not be negative".to_owned(),
            ));
        }
        Ok(())
    }
}
