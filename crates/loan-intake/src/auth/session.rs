//! Server-side sessions keyed by signed, opaque cookie tokens.
//!
//! The cookie carries `<uuid>.<hmac>`; everything else (the authenticated flag
//! and pending flash notices) stays in the in-process [`SessionStore`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use super::AuthRequired;
use crate::config::SessionConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Danger,
    Info,
}

/// One-shot notice displayed on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Default)]
struct SessionData {
    authenticated: bool,
    flashes: Vec<FlashMessage>,
}

/// HMAC-SHA256 signer for session tokens.
pub struct SessionSigner {
    key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    pub fn sign(&self, id: SessionId) -> String {
        let encoded = id.0.simple().to_string();
        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{encoded}.{signature}")
    }

    pub fn verify(&self, token: &str) -> Option<SessionId> {
        let (encoded, signature) = token.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Uuid::parse_str(encoded).ok().map(SessionId)
    }
}

/// Anonymous sessions exist only to carry flash notices to the next page, so
/// the store keeps at most this many and evicts the oldest first.
pub const MAX_ANONYMOUS_SESSIONS: usize = 4096;

#[derive(Default)]
struct SessionTable {
    entries: HashMap<SessionId, SessionData>,
    /// Anonymous ids, oldest first.
    anonymous: VecDeque<SessionId>,
}

impl SessionTable {
    fn track_anonymous(&mut self, id: SessionId, limit: usize) {
        self.anonymous.retain(|tracked| *tracked != id);
        while self.anonymous.len() >= limit {
            let Some(oldest) = self.anonymous.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.anonymous.push_back(id);
    }

    fn forget(&mut self, id: SessionId) {
        self.entries.remove(&id);
        self.anonymous.retain(|tracked| *tracked != id);
    }
}

pub struct SessionStore {
    cookie_name: String,
    signer: SessionSigner,
    anonymous_limit: usize,
    sessions: Mutex<SessionTable>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            signer: SessionSigner::new(&config.secret),
            anonymous_limit: MAX_ANONYMOUS_SESSIONS,
            sessions: Mutex::new(SessionTable::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_anonymous_limit(mut self, limit: usize) -> Self {
        self.anonymous_limit = limit.max(1);
        self
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().entries.len()
    }

    /// Recovers a poisoned lock; no mutation leaves the table half-updated.
    fn table(&self) -> MutexGuard<'_, SessionTable> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live session named by the request's cookie, if its signature holds.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<SessionId> {
        let id = cookie_value(headers, &self.cookie_name).and_then(|token| self.signer.verify(token))?;
        self.table().entries.contains_key(&id).then_some(id)
    }

    pub fn state(&self, headers: &HeaderMap) -> SessionState {
        let Some(id) = self.resolve(headers) else {
            return SessionState::Anonymous;
        };
        match self.table().entries.get(&id) {
            Some(data) if data.authenticated => SessionState::Authenticated,
            _ => SessionState::Anonymous,
        }
    }

    pub fn require_authenticated(&self, headers: &HeaderMap) -> Result<SessionId, AuthRequired> {
        match (self.state(headers), self.resolve(headers)) {
            (SessionState::Authenticated, Some(id)) => Ok(id),
            _ => Err(AuthRequired),
        }
    }

    /// Existing session for the request, or a new anonymous one. The flag is
    /// `true` when a cookie must be issued.
    pub fn ensure(&self, headers: &HeaderMap) -> (SessionId, bool) {
        match self.resolve(headers) {
            Some(id) => (id, false),
            None => (self.create(), true),
        }
    }

    fn create(&self) -> SessionId {
        let id = SessionId::generate();
        let mut table = self.table();
        table.track_anonymous(id, self.anonymous_limit);
        table.entries.insert(id, SessionData::default());
        id
    }

    /// Grants the authenticated state under a fresh id, discarding the old one.
    pub fn login(&self, previous: Option<SessionId>) -> SessionId {
        let id = SessionId::generate();
        let mut table = self.table();
        if let Some(previous) = previous {
            table.forget(previous);
        }
        table.entries.insert(
            id,
            SessionData {
                authenticated: true,
                flashes: Vec::new(),
            },
        );
        id
    }

    /// Demotes the session to anonymous; it lives on only until its notices are read.
    pub fn logout(&self, id: SessionId) {
        let mut table = self.table();
        let Some(data) = table.entries.get_mut(&id) else {
            return;
        };
        if data.authenticated {
            data.authenticated = false;
            table.track_anonymous(id, self.anonymous_limit);
        }
    }

    pub fn flash(&self, id: SessionId, level: FlashLevel, message: impl Into<String>) {
        if let Some(data) = self.table().entries.get_mut(&id) {
            data.flashes.push(FlashMessage {
                level,
                message: message.into(),
            });
        }
    }

    /// Drains pending notices for the request's session. An anonymous session
    /// has nothing left to carry afterwards and is dropped.
    pub fn take_flashes(&self, headers: &HeaderMap) -> Vec<FlashMessage> {
        let Some(id) = self.resolve(headers) else {
            return Vec::new();
        };
        let mut table = self.table();
        let Some(data) = table.entries.get_mut(&id) else {
            return Vec::new();
        };
        let flashes = std::mem::take(&mut data.flashes);
        if !data.authenticated {
            table.forget(id);
        }
        flashes
    }

    pub fn set_cookie(&self, id: SessionId) -> HeaderValue {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            self.signer.sign(id)
        );
        HeaderValue::from_str(&cookie).expect("session cookie is ASCII")
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig {
            secret: "test-secret".to_string(),
            cookie_name: "loan_session".to_string(),
        })
    }

    fn request_with(store: &SessionStore, id: SessionId) -> HeaderMap {
        let token = store.signer.sign(id);
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; loan_session={token}")).expect("ascii"),
        );
        headers
    }

    #[test]
    fn signed_tokens_round_trip() {
        let signer = SessionSigner::new("k1");
        let id = SessionId::generate();
        assert_eq!(signer.verify(&signer.sign(id)), Some(id));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let signer = SessionSigner::new("k1");
        let other = SessionSigner::new("k2");
        let id = SessionId::generate();

        assert_eq!(other.verify(&signer.sign(id)), None);

        let token = signer.sign(id);
        let (_, signature) = token.split_once('.').expect("dot separated");
        let forged = format!("{}.{signature}", SessionId::generate().0.simple());
        assert_eq!(signer.verify(&forged), None);
        assert_eq!(signer.verify("no-signature"), None);
    }

    #[test]
    fn missing_cookie_is_anonymous() {
        let store = store();
        assert_eq!(store.state(&HeaderMap::new()), SessionState::Anonymous);
        assert!(store.require_authenticated(&HeaderMap::new()).is_err());
    }

    #[test]
    fn login_rotates_the_session_and_logout_clears_it() {
        let store = store();
        let (anonymous, created) = store.ensure(&HeaderMap::new());
        assert!(created);

        let authenticated = store.login(Some(anonymous));
        assert_ne!(anonymous, authenticated);
        assert_eq!(
            store.state(&request_with(&store, anonymous)),
            SessionState::Anonymous
        );

        let headers = request_with(&store, authenticated);
        assert_eq!(store.state(&headers), SessionState::Authenticated);
        assert_eq!(store.require_authenticated(&headers).ok(), Some(authenticated));

        store.logout(authenticated);
        assert_eq!(store.state(&headers), SessionState::Anonymous);
    }

    #[test]
    fn unknown_but_validly_signed_ids_are_anonymous() {
        let store = store();
        let headers = request_with(&store, SessionId::generate());
        assert_eq!(store.resolve(&headers), None);
        assert_eq!(store.state(&headers), SessionState::Anonymous);
    }

    #[test]
    fn flashes_are_consumed_once() {
        let store = store();
        let (id, _) = store.ensure(&HeaderMap::new());
        store.flash(id, FlashLevel::Success, "saved");

        let headers = request_with(&store, id);
        let flashes = store.take_flashes(&headers);
        assert_eq!(
            flashes,
            vec![FlashMessage {
                level: FlashLevel::Success,
                message: "saved".to_string(),
            }]
        );
        assert!(store.take_flashes(&headers).is_empty());
    }

    #[test]
    fn anonymous_sessions_are_dropped_once_notices_are_read() {
        let store = store();
        let (id, _) = store.ensure(&HeaderMap::new());
        store.flash(id, FlashLevel::Danger, "Error: name is required");
        let headers = request_with(&store, id);

        assert_eq!(store.take_flashes(&headers).len(), 1);
        assert_eq!(store.resolve(&headers), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn logged_out_sessions_expire_after_their_notice() {
        let store = store();
        let id = store.login(None);
        let headers = request_with(&store, id);
        assert!(store.take_flashes(&headers).is_empty());
        assert_eq!(store.resolve(&headers), Some(id));

        store.logout(id);
        store.flash(id, FlashLevel::Info, "logged out");
        assert_eq!(store.take_flashes(&headers).len(), 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn anonymous_sessions_are_capped() {
        let store = store().with_anonymous_limit(8);
        let admin = store.login(None);
        let first = store.ensure(&HeaderMap::new()).0;

        for _ in 0..100 {
            let (id, created) = store.ensure(&HeaderMap::new());
            assert!(created);
            store.flash(id, FlashLevel::Success, "saved");
        }

        assert_eq!(store.len(), 8 + 1);
        assert_eq!(store.resolve(&request_with(&store, first)), None);
        assert_eq!(
            store.state(&request_with(&store, admin)),
            SessionState::Authenticated
        );
    }

    #[test]
    fn poisoned_lock_does_not_take_the_store_down() {
        let store = std::sync::Arc::new(store());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.sessions.lock().expect("first lock");
            panic!("handler panicked while holding the session lock");
        })
        .join();
        assert!(store.sessions.is_poisoned());

        let (id, created) = store.ensure(&HeaderMap::new());
        assert!(created);
        assert_eq!(store.resolve(&request_with(&store, id)), Some(id));
    }

    #[test]
    fn set_cookie_is_http_only() {
        let store = store();
        let (id, _) = store.ensure(&HeaderMap::new());
        let cookie = store.set_cookie(id);
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("loan_session="));
        assert!(cookie.contains("HttpOnly"));
    }
}
