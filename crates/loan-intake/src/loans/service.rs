use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{LoanApplication, LoanSubmission, ValidationError};
use super::export::{export, ExportArtifact, ExportError};
use super::query::{FilterParams, LoanQuery};
use super::repository::{LoanRepository, RepositoryError};
use super::summary::LoanSummary;

/// Everything the dashboard page needs for one request.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub records: Vec<LoanApplication>,
    pub summary: LoanSummary,
    pub filters: FilterParams,
}

/// Service composing the repository with intake validation, aggregation and export.
pub struct LoanApplicationService<R> {
    repository: Arc<R>,
}

impl<R> LoanApplicationService<R>
where
    R: LoanRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Validate a raw submission and persist it with a server-assigned timestamp.
    pub fn submit(
        &self,
        submission: LoanSubmission,
        now: NaiveDateTime,
    ) -> Result<LoanApplication, LoanServiceError> {
        let application = submission.validate().map_err(|err| {
            warn!(error = %err, "rejected loan application");
            err
        })?;
        let stored = self.repository.insert(application, now)?;
        info!(id = %stored.id, purpose = %stored.purpose, "loan application stored");
        Ok(stored)
    }

    /// Filtered listing plus headline figures.
    pub fn dashboard(
        &self,
        filters: FilterParams,
        now: NaiveDateTime,
    ) -> Result<DashboardView, LoanServiceError> {
        let query = filters.to_query();
        let all = self.repository.query(&LoanQuery::all())?;
        let records = if query.is_unfiltered() {
            all.clone()
        } else {
            self.repository.query(&query)?
        };
        let summary = LoanSummary::compute(&records, &all, now.date());

        Ok(DashboardView {
            records,
            summary,
            filters,
        })
    }

    /// Build a workbook of the rows matching `filters`.
    pub fn export(
        &self,
        filters: &FilterParams,
        now: NaiveDateTime,
    ) -> Result<ExportArtifact, LoanServiceError> {
        let records = self.repository.query(&filters.to_query())?;
        let artifact = export(&records, now)?;
        info!(rows = artifact.rows, filename = %artifact.filename, "loan export generated");
        Ok(artifact)
    }
}

/// Error raised by the loan application service.
#[derive(Debug, thiserror::Error)]
pub enum LoanServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
