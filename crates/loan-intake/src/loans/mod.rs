//! Loan application intake, storage, dashboard aggregation, and Excel export.

pub mod domain;
pub mod export;
pub mod pages;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;
pub mod summary;

#[cfg(test)]
mod tests;

pub use domain::{ApplicationId, LoanApplication, LoanSubmission, NewLoanApplication, ValidationError};
pub use export::{export, ExportArtifact, ExportCell, ExportError, EXPORT_COLUMNS};
pub use pages::PageRenderer;
pub use query::{DateRange, FilterParams, LoanQuery};
pub use repository::{LoanRepository, RepositoryError};
pub use router::{loan_router, LoanDesk};
pub use service::{DashboardView, LoanApplicationService, LoanServiceError};
pub use sqlite::SqliteLoanRepository;
pub use summary::LoanSummary;
