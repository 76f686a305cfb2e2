use std::sync::Arc;
use tracing::{debug, info, warn};

use super::codec::{Callbacks, SessionData, StatePayload};
use super::store::SessionStore;
use super::SessionError;
use crate::config::{CookieConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::server::{Request, Response, SetCookie};

/// Query parameter carrying the session id when no cookie is available
pub const SESSION_PARAM: &str = "_s";
/// Query parameter carrying the state id
pub const STATE_PARAM: &str = "_c";

/// Per-request session record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// `None` until the store allocated or confirmed the session
    pub session_id: Option<u64>,
    pub state_id: u64,
    pub secure_token: String,
    pub is_new: bool,
    pub use_same_state: bool,
    pub data: SessionData,
    pub callbacks: Callbacks,
}

/// The part of the session a handler may touch
#[derive(Debug)]
pub struct SessionScope<'s> {
    pub session_id: u64,
    pub state_id: u64,
    pub data: &'s mut SessionData,
    pub callbacks: &'s mut Callbacks,
}

impl SessionScope<'_> {
    /// Query string reaching this session and state, e.g. `_s=12&_c=3`
    #[must_use]
    pub fn query(&self) -> String {
        format!(
            "{SESSION_PARAM}={}&{STATE_PARAM}={}",
            self.session_id, self.state_id
        )
    }
}

/// A cookie the coordinator reads and writes; disabled when `name` is empty
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionCookie {
    name: String,
    secure: bool,
    http_only: bool,
    max_age: Option<i64>,
}

impl SessionCookie {
    fn new(config: &CookieConfig, app_name: &str, suffix: &str) -> Self {
        Self {
            name: config.resolve_name(app_name, suffix),
            secure: config.secure,
            http_only: config.httponly,
            max_age: config.max_age,
        }
    }

    fn enabled(&self) -> bool {
        !self.name.is_empty()
    }

    fn to_set_cookie(&self, value: String, path: &str) -> SetCookie {
        SetCookie {
            secure: self.secure,
            http_only: self.http_only,
            max_age: self.max_age,
            ..SetCookie::new(self.name.clone(), value, path)
        }
    }
}

/// Session coordinator.
///
/// Resolves which session and state a request addresses, holds that session's
/// lock around the handler chain and persists the updated state afterwards.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    states_history: bool,
    session_cookie: SessionCookie,
    security_cookie: SessionCookie,
}

impl SessionService {
    pub fn new(config: &SessionConfig, app_name: &str, store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            states_history: config.states_history,
            session_cookie: SessionCookie::new(&config.session_cookie, app_name, "session"),
            security_cookie: SessionCookie::new(&config.security_cookie, app_name, "token"),
        }
    }

    #[must_use]
    pub fn states_history(&self) -> bool {
        self.states_history
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie.name
    }

    #[must_use]
    pub fn security_cookie_name(&self) -> &str {
        &self.security_cookie.name
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// `(session_id, state_id)` addressed by the request, `None` for a new session.
    ///
    /// The session id comes from the session cookie, then from the `_s`
    /// parameter. A cookie that is not a number starts a new session without
    /// looking at the parameter.
    #[must_use]
    pub fn extract_state_ids(&self, request: &Request) -> Option<(u64, u64)> {
        let mut session_id = 0;
        if self.session_cookie.enabled() {
            if let Some(cookie) = request.get_cookie(&self.session_cookie.name) {
                session_id = cookie.trim().parse().ok()?;
            }
        }
        if session_id == 0 {
            session_id = request.get_param(SESSION_PARAM)?.trim().parse().ok()?;
        }
        if session_id == 0 {
            return None;
        }

        let state_id = if self.states_history {
            request.get_param(STATE_PARAM)?.trim().parse().ok()?
        } else {
            0
        };
        Some((session_id, state_id))
    }

    /// Token presented by the request, empty when absent or disabled
    #[must_use]
    pub fn extract_secure_token(&self, request: &Request) -> String {
        if !self.security_cookie.enabled() {
            return String::new();
        }
        request
            .get_cookie(&self.security_cookie.name)
            .unwrap_or_default()
            .to_string()
    }

    /// Build the session record for `request` without touching the store
    #[must_use]
    pub fn create_session(&self, request: &Request) -> Session {
        let ids = self.extract_state_ids(request);
        Session {
            session_id: ids.map(|(s, _)| s),
            state_id: ids.map_or(0, |(_, c)| c),
            secure_token: self.extract_secure_token(request),
            is_new: ids.is_none(),
            use_same_state: request.is_xhr() || !self.states_history,
            ..Session::default()
        }
    }

    /// Write the session and token cookies on `response`
    pub fn set_cookies(&self, request: &Request, response: &mut Response, session_id: u64, secure_token: &str) {
        let path = request.cookie_path();
        if self.session_cookie.enabled() {
            response.set_cookie(&self.session_cookie.to_set_cookie(session_id.to_string(), path));
        }
        if self.security_cookie.enabled() {
            response.set_cookie(&self.security_cookie.to_set_cookie(secure_token.to_string(), path));
        }
    }

    /// `303` back to the request URL, with both session cookies deleted
    #[must_use]
    pub fn redirect(&self, request: &Request) -> Response {
        let mut response = Response::redirect(&request.url());
        let path = request.cookie_path();
        for cookie in [&self.session_cookie, &self.security_cookie] {
            if cookie.enabled() {
                response.delete_cookie(&cookie.name, path);
            }
        }
        response
    }

    /// Run `chain` inside the session of `request`.
    ///
    /// Recoverable session errors, raised by the store or by the chain, replace
    /// `response` with a redirect and return `Ok`; nothing is stored for that
    /// request. Every other error is returned unchanged.
    pub fn handle_request<F>(&self, request: &Request, response: &mut Response, chain: F) -> Result<()>
    where
        F: FnOnce(SessionScope<'_>, &mut Response) -> Result<()>,
    {
        match self.process(request, response, chain) {
            Err(Error::Session(e)) if e.is_recoverable() => {
                match &e {
                    SessionError::Security => warn!(
                        request_id = %request.request_id,
                        url = %request.url(),
                        "Secure token mismatch, restarting session"
                    ),
                    _ => info!(
                        request_id = %request.request_id,
                        url = %request.url(),
                        error = %e,
                        "Session state unavailable, restarting session"
                    ),
                }
                *response = self.redirect(request);
                Ok(())
            }
            other => other,
        }
    }

    fn process<F>(&self, request: &Request, response: &mut Response, chain: F) -> Result<()>
    where
        F: FnOnce(SessionScope<'_>, &mut Response) -> Result<()>,
    {
        let mut session = self.create_session(request);

        let (session_id, _lock) = match session.session_id.filter(|_| !session.is_new) {
            None => {
                let (new, lock) = self.store.create(&session.secure_token)?;
                info!(
                    request_id = %request.request_id,
                    session_id = new.session_id,
                    "Session created"
                );
                session.state_id = new.state_id;
                session.secure_token = new.secure_token;
                (new.session_id, lock)
            }
            Some(session_id) => {
                let lock = self.store.get_lock(session_id)?;
                let fetched = self.store.fetch(session_id, session.state_id)?;

                if self.security_cookie.enabled() && fetched.secure_token != session.secure_token {
                    return Err(SessionError::Security.into());
                }
                if !session.use_same_state {
                    session.state_id = fetched.new_state_id;
                }
                session.secure_token = fetched.secure_token;
                session.data = fetched.payload.data;
                // A new state only keeps the callbacks registered while rendering it
                if session.use_same_state {
                    session.callbacks = fetched.payload.callbacks;
                }
                (session_id, lock)
            }
        };
        session.session_id = Some(session_id);

        debug!(
            session_id,
            state_id = session.state_id,
            use_same_state = session.use_same_state,
            is_new = session.is_new,
            "Session locked"
        );

        self.set_cookies(request, response, session_id, &session.secure_token);

        chain(
            SessionScope {
                session_id,
                state_id: session.state_id,
                data: &mut session.data,
                callbacks: &mut session.callbacks,
            },
            response,
        )?;

        let payload = StatePayload {
            data: session.data,
            callbacks: session.callbacks,
        };
        self.store.store(
            session_id,
            session.state_id,
            &session.secure_token,
            session.use_same_state,
            &payload,
        )?;
        Ok(())
    }
}
