use chrono::{NaiveDate, Utc};
use clap::Args;
use loan_intake::config::AppConfig;
use loan_intake::error::AppError;
use loan_intake::loans::export::format_created_at;
use loan_intake::loans::{
    DashboardView, FilterParams, LoanApplicationService, LoanRepository, SqliteLoanRepository,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct FilterArgs {
    /// Case-insensitive match on name, CNIC, purpose, district or tehsil
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// First day of the creation-date window (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Last day of the creation-date window, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) end_date: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_params(&self) -> FilterParams {
        FilterParams {
            search: self.search.clone(),
            start_date: self.start_date.map(|date| date.format("%Y-%m-%d").to_string()),
            end_date: self.end_date.map(|date| date.format("%Y-%m-%d").to_string()),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Destination path for the generated workbook
    #[arg(long)]
    pub(crate) output: PathBuf,
    #[command(flatten)]
    pub(crate) filters: FilterArgs,
}

fn open_service() -> Result<LoanApplicationService<SqliteLoanRepository>, AppError> {
    let config = AppConfig::load()?;
    let repository = SqliteLoanRepository::open(&config.database.location()?)?;
    Ok(LoanApplicationService::new(Arc::new(repository)))
}

pub(crate) fn run_summary(args: FilterArgs) -> Result<(), AppError> {
    let service = open_service()?;
    let view = service.dashboard(args.to_params(), Utc::now().naive_utc())?;
    let stdout = io::stdout();
    write_summary(&mut stdout.lock(), &view)?;
    Ok(())
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let service = open_service()?;
    let rows = export_to_path(&service, &args.filters.to_params(), &args.output)?;
    println!("Wrote {} applications to {}", rows, args.output.display());
    Ok(())
}

fn export_to_path<R>(
    service: &LoanApplicationService<R>,
    filters: &FilterParams,
    output: &Path,
) -> Result<usize, AppError>
where
    R: LoanRepository + 'static,
{
    let artifact = service.export(filters, Utc::now().naive_utc())?;
    std::fs::write(output, &artifact.bytes)?;
    Ok(artifact.rows)
}

fn write_summary(out: &mut impl Write, view: &DashboardView) -> io::Result<()> {
    let summary = &view.summary;
    writeln!(out, "Loan applications")?;
    writeln!(out, "Total: {}", summary.total)?;
    writeln!(out, "Total amount: {:.2}", summary.total_amount)?;
    writeln!(out, "Average amount: {:.2}", summary.avg_amount)?;
    writeln!(out, "Submitted today: {}", summary.today_count)?;

    if summary.purpose_counts.is_empty() {
        writeln!(out, "\nBy purpose: none")?;
    } else {
        writeln!(out, "\nBy purpose")?;
        for (purpose, count) in &summary.purpose_counts {
            writeln!(out, "- {purpose}: {count}")?;
        }
    }

    if view.records.is_empty() {
        writeln!(out, "\nNo applications match the current filters.")?;
        return Ok(());
    }

    writeln!(out, "\nApplications")?;
    for record in &view.records {
        writeln!(
            out,
            "#{} {} | CNIC {} | {} / {} | {:.2} | {} | {}",
            record.id,
            record.name,
            record.cnic,
            record.district,
            record.tehsil,
            record.amount,
            record.purpose,
            format_created_at(record.created_at)
        )?;
    }
    Ok(())
}
