use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_intake::auth::{AdminCredentials, SessionStore};
use loan_intake::config::AppConfig;
use loan_intake::error::AppError;
use loan_intake::loans::{LoanApplicationService, LoanDesk, PageRenderer, SqliteLoanRepository};
use loan_intake::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let location = config.database.location()?;
    let repository = Arc::new(SqliteLoanRepository::open(&location)?);
    info!(
        database = %config.database.url,
        schema_revision = repository.schema_revision()?,
        "loan store opened"
    );

    let desk = Arc::new(LoanDesk::new(
        LoanApplicationService::new(repository),
        SessionStore::new(&config.session),
        AdminCredentials::from_config(&config.admin),
        PageRenderer::new()?,
    ));

    let app = with_operational_routes(desk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan intake desk ready");

    axum::serve(listener, app).await?;
    Ok(())
}
