use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a loan application row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted loan application. Rows are append-only once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub name: String,
    pub cnic: String,
    pub address: String,
    pub district: String,
    pub tehsil: String,
    pub amount: f64,
    pub purpose: String,
    pub contact: String,
    /// Server clock (UTC) at insert time.
    pub created_at: NaiveDateTime,
}

/// Validated fields of an application that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoanApplication {
    pub name: String,
    pub cnic: String,
    pub address: String,
    pub district: String,
    pub tehsil: String,
    pub amount: f64,
    pub purpose: String,
    pub contact: String,
}

impl NewLoanApplication {
    pub(crate) fn into_record(self, id: ApplicationId, created_at: NaiveDateTime) -> LoanApplication {
        LoanApplication {
            id,
            name: self.name,
            cnic: self.cnic,
            address: self.address,
            district: self.district,
            tehsil: self.tehsil,
            amount: self.amount,
            purpose: self.purpose,
            contact: self.contact,
            created_at,
        }
    }
}

/// Raw intake form fields exactly as posted. Every field is optional at the
/// decoding layer so a missing input becomes a [`ValidationError`] rather than
/// an extractor rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cnic: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub tehsil: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

impl LoanSubmission {
    /// Checks presence of every field and coerces `amount` to a number.
    pub fn validate(self) -> Result<NewLoanApplication, ValidationError> {
        let name = required("name", self.name)?;
        let cnic = required("cnic", self.cnic)?;
        let address = required("address", self.address)?;
        let district = required("district", self.district)?;
        let tehsil = required("tehsil", self.tehsil)?;
        let amount = parse_amount(&required("amount", self.amount)?)?;
        let purpose = required("purpose", self.purpose)?;
        let contact = required("contact", self.contact)?;

        Ok(NewLoanApplication {
            name,
            cnic,
            address,
            district,
            tehsil,
            amount,
            purpose,
            contact,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn parse_amount(raw: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(ValidationError::InvalidAmount(raw.to_string())),
    }
}

/// User-correctable problems with an intake submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("amount '{0}' is not a number")]
    InvalidAmount(String),
}
