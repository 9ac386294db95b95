use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::Request;
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};

use crate::auth::{AdminCredentials, SessionStore};
use crate::config::SessionConfig;
use crate::loans::domain::{ApplicationId, LoanApplication, LoanSubmission, NewLoanApplication};
use crate::loans::query::LoanQuery;
use crate::loans::repository::{LoanRepository, RepositoryError};
use crate::loans::{loan_router, LoanApplicationService, LoanDesk, PageRenderer};

pub(super) const ADMIN_USER: &str = "admin";
pub(super) const ADMIN_PASSWORD: &str = "s3cret";

pub(super) fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 15)
        .and_then(|date| date.and_hms_opt(10, 30, 0))
        .expect("valid timestamp")
}

pub(super) fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp")
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<Vec<LoanApplication>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl LoanRepository for MemoryRepository {
    fn insert(
        &self,
        application: NewLoanApplication,
        created_at: NaiveDateTime,
    ) -> Result<LoanApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let id = ApplicationId(guard.len() as i64 + 1);
        let record = application.into_record(id, created_at);
        guard.push(record.clone());
        Ok(record)
    }

    fn query(&self, query: &LoanQuery) -> Result<Vec<LoanApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(query.apply(guard.iter()))
    }
}

pub(super) struct UnavailableRepository;

impl LoanRepository for UnavailableRepository {
    fn insert(
        &self,
        _application: NewLoanApplication,
        _created_at: NaiveDateTime,
    ) -> Result<LoanApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _query: &LoanQuery) -> Result<Vec<LoanApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn submission() -> LoanSubmission {
    LoanSubmission {
        name: Some("Ali".to_string()),
        cnic: Some("12345".to_string()),
        address: Some("X".to_string()),
        district: Some("Lahore".to_string()),
        tehsil: Some("Model Town".to_string()),
        amount: Some("5000".to_string()),
        purpose: Some("Business".to_string()),
        contact: Some("0300-1234567".to_string()),
    }
}

pub(super) fn submission_for(name: &str, purpose: &str, amount: &str) -> LoanSubmission {
    LoanSubmission {
        name: Some(name.to_string()),
        purpose: Some(purpose.to_string()),
        amount: Some(amount.to_string()),
        ..submission()
    }
}

pub(super) fn build_desk<R>(repository: Arc<R>) -> Arc<LoanDesk<R>>
where
    R: LoanRepository + 'static,
{
    let sessions = SessionStore::new(&SessionConfig {
        secret: "routing-test-secret".to_string(),
        cookie_name: "loan_session".to_string(),
    });
    let desk = LoanDesk::new(
        LoanApplicationService::new(repository),
        sessions,
        AdminCredentials::new(ADMIN_USER, ADMIN_PASSWORD),
        PageRenderer::new().expect("templates parse"),
    )
    .with_clock(fixed_now);
    Arc::new(desk)
}

pub(super) fn router_for<R>(desk: Arc<LoanDesk<R>>) -> axum::Router
where
    R: LoanRepository + 'static,
{
    loan_router(desk)
}

pub(super) fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

/// `name=value` pair from the response's `Set-Cookie`, ready for a `Cookie` header.
pub(super) fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(';').next())
        .map(str::to_string)
}

pub(super) fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) async fn read_bytes_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}
