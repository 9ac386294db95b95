use chrono::NaiveDateTime;

use super::domain::{LoanApplication, NewLoanApplication};
use super::query::LoanQuery;

/// Append-only storage for loan applications. There is deliberately no update
/// or delete operation.
pub trait LoanRepository: Send + Sync {
    /// Persists one application atomically and returns it with its assigned id.
    fn insert(
        &self,
        application: NewLoanApplication,
        created_at: NaiveDateTime,
    ) -> Result<LoanApplication, RepositoryError>;

    /// Rows matching `query`, newest first (ties by id descending).
    fn query(&self, query: &LoanQuery) -> Result<Vec<LoanApplication>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored row is malformed: {0}")]
    Corrupt(String),
}
