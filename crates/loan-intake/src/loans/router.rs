use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::{NaiveDateTime, Utc};
use tracing::{info, warn};

use super::domain::LoanSubmission;
use super::export::ExportError;
use super::pages::PageRenderer;
use super::query::FilterParams;
use super::repository::LoanRepository;
use super::service::{LoanApplicationService, LoanServiceError};
use crate::auth::{AdminCredentials, FlashLevel, LoginForm, SessionState, SessionStore};
use crate::error::AppError;

pub const SUBMITTED_NOTICE: &str = "درخواست کامیابی سے جمع ہوگئی!";
pub const EMPTY_EXPORT_NOTICE: &str = "کوئی درخواست موجود نہیں!";
pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to view applications.";
pub const BAD_CREDENTIALS_NOTICE: &str = "Invalid username or password.";
pub const LOGGED_OUT_NOTICE: &str = "You have been logged out.";

fn system_clock() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Shared state behind every intake and dashboard route.
pub struct LoanDesk<R> {
    pub service: LoanApplicationService<R>,
    pub sessions: SessionStore,
    pub admin: AdminCredentials,
    pub pages: PageRenderer,
    clock: fn() -> NaiveDateTime,
}

impl<R> LoanDesk<R>
where
    R: LoanRepository + 'static,
{
    pub fn new(
        service: LoanApplicationService<R>,
        sessions: SessionStore,
        admin: AdminCredentials,
        pages: PageRenderer,
    ) -> Self {
        Self {
            service,
            sessions,
            admin,
            pages,
            clock: system_clock,
        }
    }

    /// Replaces the UTC wall clock used for `created_at` and "today".
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Queue a notice on the caller's session (creating one if needed) and redirect.
    fn redirect_with_notice(
        &self,
        headers: &HeaderMap,
        to: &str,
        level: FlashLevel,
        message: impl Into<String>,
    ) -> Response {
        let (id, created) = self.sessions.ensure(headers);
        self.sessions.flash(id, level, message);
        let mut response = Redirect::to(to).into_response();
        if created {
            response
                .headers_mut()
                .insert(header::SET_COOKIE, self.sessions.set_cookie(id));
        }
        response
    }
}

/// Router builder exposing the intake form, login flow, dashboard and export.
pub fn loan_router<R>(desk: Arc<LoanDesk<R>>) -> Router
where
    R: LoanRepository + 'static,
{
    Router::new()
        .route("/", get(intake_form::<R>).post(submit_intake::<R>))
        .route("/login", get(login_form::<R>).post(login::<R>))
        .route("/logout", get(logout::<R>))
        .route("/dashboard", get(dashboard::<R>))
        .route("/download", get(download::<R>))
        .with_state(desk)
}

pub(crate) async fn intake_form<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
{
    let flashes = desk.sessions.take_flashes(&headers);
    Ok(Html(desk.pages.intake(&flashes)?).into_response())
}

pub(crate) async fn submit_intake<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
    Form(submission): Form<LoanSubmission>,
) -> Response
where
    R: LoanRepository + 'static,
{
    match desk.service.submit(submission, desk.now()) {
        Ok(_) => desk.redirect_with_notice(&headers, "/", FlashLevel::Success, SUBMITTED_NOTICE),
        Err(err) => {
            desk.redirect_with_notice(&headers, "/", FlashLevel::Danger, format!("Error: {err}"))
        }
    }
}

pub(crate) async fn login_form<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
{
    if desk.sessions.state(&headers) == SessionState::Authenticated {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let flashes = desk.sessions.take_flashes(&headers);
    Ok(Html(desk.pages.login(&flashes)?).into_response())
}

pub(crate) async fn login<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response
where
    R: LoanRepository + 'static,
{
    match desk.admin.verify(&form.username, &form.password) {
        Ok(()) => {
            let id = desk.sessions.login(desk.sessions.resolve(&headers));
            info!("administrator logged in");
            let mut response = Redirect::to("/dashboard").into_response();
            response
                .headers_mut()
                .insert(header::SET_COOKIE, desk.sessions.set_cookie(id));
            response
        }
        Err(err) => {
            warn!(error = %err, "rejected login attempt");
            desk.redirect_with_notice(&headers, "/login", FlashLevel::Danger, BAD_CREDENTIALS_NOTICE)
        }
    }
}

pub(crate) async fn logout<R>(State(desk): State<Arc<LoanDesk<R>>>, headers: HeaderMap) -> Response
where
    R: LoanRepository + 'static,
{
    if let Some(id) = desk.sessions.resolve(&headers) {
        desk.sessions.logout(id);
    }
    desk.redirect_with_notice(&headers, "/login", FlashLevel::Info, LOGGED_OUT_NOTICE)
}

pub(crate) async fn dashboard<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
    Query(filters): Query<FilterParams>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
{
    if desk.sessions.require_authenticated(&headers).is_err() {
        return Ok(desk.redirect_with_notice(
            &headers,
            "/login",
            FlashLevel::Info,
            LOGIN_REQUIRED_NOTICE,
        ));
    }

    let view = desk.service.dashboard(filters, desk.now())?;
    let flashes = desk.sessions.take_flashes(&headers);
    Ok(Html(desk.pages.dashboard(&view, &flashes)?).into_response())
}

pub(crate) async fn download<R>(
    State(desk): State<Arc<LoanDesk<R>>>,
    headers: HeaderMap,
    Query(filters): Query<FilterParams>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
{
    if desk.sessions.require_authenticated(&headers).is_err() {
        return Ok(desk.redirect_with_notice(
            &headers,
            "/login",
            FlashLevel::Info,
            LOGIN_REQUIRED_NOTICE,
        ));
    }

    match desk.service.export(&filters, desk.now()) {
        Ok(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.bytes,
            )
                .into_response())
        }
        Err(LoanServiceError::Export(ExportError::Empty)) => Ok(desk.redirect_with_notice(
            &headers,
            "/dashboard",
            FlashLevel::Danger,
            EMPTY_EXPORT_NOTICE,
        )),
        Err(other) => Err(other.into()),
    }
}
