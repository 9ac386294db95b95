use crate::report::{run_export, run_summary, ExportArgs, FilterArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Loan Intake",
    about = "Serve the loan intake desk or inspect stored applications from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print dashboard aggregates and matching applications
    Summary(FilterArgs),
    /// Write matching applications to an .xlsx workbook
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Summary(args) => run_summary(args),
        Command::Export(args) => run_export(args),
    }
}
