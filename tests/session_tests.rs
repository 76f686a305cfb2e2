use brrtweb::config::SessionConfig;
use brrtweb::session::{
    FetchedState, MemorySessionStore, NewSession, SessionError, SessionLock, SessionService,
    SessionStore, StatePayload,
};
use brrtweb::{Request, Response};
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing_util::TestTracing;

fn service_with(states_history: bool, store: Arc<dyn SessionStore>) -> SessionService {
    let config = SessionConfig {
        states_history,
        ..SessionConfig::default()
    };
    SessionService::new(&config, "app", store)
}

fn service(states_history: bool) -> SessionService {
    service_with(states_history, Arc::new(MemorySessionStore::default()))
}

// Value of the `name` cookie set on the response
fn cookie<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.get_all_headers("set-cookie").find_map(|c| {
        let (pair, _) = c.split_once(';').unwrap_or((c, ""));
        let (n, v) = pair.split_once('=')?;
        (n == name).then_some(v)
    })
}

// First request of a browser: returns (session_id, token)
fn start_session(service: &SessionService) -> (String, String) {
    let mut response = Response::default();
    service
        .handle_request(&Request::new(Method::GET, "/app", "/"), &mut response, |scope, _| {
            scope.data.insert("counter".into(), json!(0));
            Ok(())
        })
        .unwrap();
    (
        cookie(&response, "app-session").unwrap().to_string(),
        cookie(&response, "app-token").unwrap().to_string(),
    )
}

fn follow_up(session_id: &str, token: &str) -> Request {
    Request::new(Method::GET, "/app", "/page")
        .with_cookie("app-session", session_id)
        .with_cookie("app-token", token)
}

#[test]
fn test_new_session_sets_cookies() {
    let _tracing = TestTracing::init();
    let s = service(false);
    let mut response = Response::default();
    let mut seen = None;
    s.handle_request(&Request::new(Method::GET, "/app", "/"), &mut response, |scope, _| {
        seen = Some((scope.session_id, scope.state_id));
        Ok(())
    })
    .unwrap();

    let (session_id, state_id) = seen.unwrap();
    assert_ne!(session_id, 0);
    assert_eq!(state_id, 0);
    assert_eq!(cookie(&response, "app-session"), Some(session_id.to_string().as_str()));
    assert_eq!(cookie(&response, "app-token").map(str::len), Some(22));
    assert!(response
        .get_all_headers("set-cookie")
        .all(|c| c.contains("Path=/app") && c.contains("HttpOnly")));
}

#[test]
fn test_data_survives_between_requests() {
    let s = service(false);
    let (session_id, token) = start_session(&s);

    for expected in 1..=3 {
        let mut response = Response::default();
        s.handle_request(&follow_up(&session_id, &token), &mut response, |scope, _| {
            let n = scope.data["counter"].as_i64().unwrap() + 1;
            scope.data.insert("counter".into(), json!(n));
            assert_eq!(n, expected);
            Ok(())
        })
        .unwrap();
        assert_eq!(response.status, 200);
    }
}

#[test]
fn test_history_advances_state_ids() {
    let s = service(true);
    let (session_id, token) = start_session(&s);

    let mut state_ids = vec![0];
    for _ in 0..3 {
        let previous = *state_ids.last().unwrap();
        let request = follow_up(&session_id, &token).with_param("_c", previous.to_string());
        let mut response = Response::default();
        s.handle_request(&request, &mut response, |scope, _| {
            state_ids.push(scope.state_id);
            Ok(())
        })
        .unwrap();
    }
    assert_eq!(state_ids, vec![0, 1, 2, 3]);

    // Going back to an old state starts from its data, under a fresh id
    let request = follow_up(&session_id, &token).with_param("_c", "1");
    let mut response = Response::default();
    let mut revisited = 0;
    s.handle_request(&request, &mut response, |scope, _| {
        revisited = scope.state_id;
        Ok(())
    })
    .unwrap();
    assert_eq!(revisited, 4);
}

#[test]
fn test_new_state_drops_old_callbacks() {
    let s = service(true);
    let (session_id, token) = start_session(&s);

    let request = follow_up(&session_id, &token).with_param("_c", "0");
    let mut response = Response::default();
    s.handle_request(&request, &mut response, |scope, _| {
        assert!(scope.callbacks.is_empty());
        scope.callbacks.insert("c1".into(), json!({"action": "increment"}));
        Ok(())
    })
    .unwrap();

    // XHR requests stay on state 1 and see its callbacks
    let xhr = follow_up(&session_id, &token)
        .with_param("_c", "1")
        .with_header("X-Requested-With", "XMLHttpRequest");
    let mut response = Response::default();
    s.handle_request(&xhr, &mut response, |scope, _| {
        assert_eq!(scope.state_id, 1);
        assert!(scope.callbacks.contains_key("c1"));
        Ok(())
    })
    .unwrap();

    // A full page moves to state 2 without re-registering c1
    let request = follow_up(&session_id, &token).with_param("_c", "1");
    let mut response = Response::default();
    let mut kept = None;
    s.handle_request(&request, &mut response, |scope, _| {
        kept = Some(scope.callbacks.contains_key("c1"));
        Ok(())
    })
    .unwrap();
    assert_eq!(kept, Some(false));

    let sid: u64 = session_id.parse().unwrap();
    let _lock = s.store().get_lock(sid).unwrap();
    assert!(s.store().fetch(sid, 2).unwrap().payload.callbacks.is_empty());
    assert!(s.store().fetch(sid, 1).unwrap().payload.callbacks.contains_key("c1"));
}

#[test]
fn test_xhr_keeps_state_id() {
    let s = service(true);
    let (session_id, token) = start_session(&s);

    let request = follow_up(&session_id, &token)
        .with_param("_c", "0")
        .with_header("X-Requested-With", "XMLHttpRequest");
    let mut response = Response::default();
    let mut state_id = u64::MAX;
    s.handle_request(&request, &mut response, |scope, _| {
        state_id = scope.state_id;
        Ok(())
    })
    .unwrap();
    assert_eq!(state_id, 0);
}

#[test]
fn test_session_id_from_query_parameter() {
    let s = service(false);
    let (session_id, token) = start_session(&s);

    let request = Request::new(Method::GET, "/app", "/")
        .with_param("_s", session_id.clone())
        .with_cookie("app-token", token);
    let mut response = Response::default();
    let mut seen = 0;
    s.handle_request(&request, &mut response, |scope, _| {
        seen = scope.session_id;
        Ok(())
    })
    .unwrap();
    assert_eq!(seen.to_string(), session_id);
}

#[test]
fn test_concurrent_requests_never_lose_updates() {
    let s = Arc::new(service(false));
    let (session_id, token) = start_session(&s);

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let s = Arc::clone(&s);
            let (session_id, token) = (session_id.clone(), token.clone());
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let mut response = Response::default();
                    s.handle_request(&follow_up(&session_id, &token), &mut response, |scope, _| {
                        let n = scope.data["counter"].as_i64().unwrap();
                        std::thread::yield_now();
                        scope.data.insert("counter".into(), json!(n + 1));
                        Ok(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let mut response = Response::default();
    let mut total = 0;
    s.handle_request(&follow_up(&session_id, &token), &mut response, |scope, _| {
        total = scope.data["counter"].as_i64().unwrap();
        Ok(())
    })
    .unwrap();
    assert_eq!(total, 200);
}

#[test]
fn test_token_mismatch_redirects_and_clears_cookies() {
    let _tracing = TestTracing::init();
    let s = service(false);
    let (session_id, _token) = start_session(&s);

    let mut response = Response::default();
    let mut ran = false;
    s.handle_request(&follow_up(&session_id, "forged"), &mut response, |scope, _| {
        ran = true;
        scope.data.insert("counter".into(), json!(99));
        Ok(())
    })
    .unwrap();

    assert!(!ran);
    assert_eq!(response.status, 303);
    assert_eq!(response.get_header("location"), Some("/app/page"));
    let cleared: Vec<_> = response.get_all_headers("set-cookie").collect();
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0") && c.contains("Path=/app")));
    assert_eq!(cookie(&response, "app-session"), Some(""));
    assert_eq!(cookie(&response, "app-token"), Some(""));

    let sid: u64 = session_id.parse().unwrap();
    let _lock = s.store().get_lock(sid).unwrap();
    assert_eq!(s.store().fetch(sid, 0).unwrap().payload.data["counter"], json!(0));
}

#[test]
fn test_unknown_session_redirects() {
    let s = service(false);
    let mut response = Response::default();
    s.handle_request(&follow_up("12345", "whatever"), &mut response, |_, _| {
        panic!("chain must not run")
    })
    .unwrap();
    assert_eq!(response.status, 303);
}

#[test]
fn test_state_error_from_chain_redirects_without_storing() {
    let s = service(false);
    let (session_id, token) = start_session(&s);

    let mut response = Response::default();
    s.handle_request(&follow_up(&session_id, &token), &mut response, |scope, response| {
        scope.data.insert("counter".into(), json!(42));
        response.body = b"partial".to_vec();
        Err(SessionError::State("callback expired".into()).into())
    })
    .unwrap();
    assert_eq!(response.status, 303);
    assert!(response.body.is_empty());

    let sid: u64 = session_id.parse().unwrap();
    assert_eq!(s.store().fetch(sid, 0).unwrap().payload.data["counter"], json!(0));
}

#[test]
fn test_other_errors_propagate_without_storing() {
    let s = service(false);
    let (session_id, token) = start_session(&s);

    let mut response = Response::default();
    let err = s
        .handle_request(&follow_up(&session_id, &token), &mut response, |scope, _| {
            scope.data.insert("counter".into(), json!(42));
            Err(anyhow::anyhow!("template missing").into())
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "template missing");

    let sid: u64 = session_id.parse().unwrap();
    assert_eq!(s.store().fetch(sid, 0).unwrap().payload.data["counter"], json!(0));
}

/// Store whose every session exists but whose fetch fails with a fixed error
struct FailingStore {
    error: SessionError,
    stores: AtomicUsize,
}

impl FailingStore {
    fn new(error: SessionError) -> Self {
        Self {
            error,
            stores: AtomicUsize::new(0),
        }
    }
}

impl SessionStore for FailingStore {
    fn get_lock(&self, _session_id: u64) -> Result<SessionLock, SessionError> {
        Ok(SessionLock::new(()))
    }

    fn create(&self, secure_token: &str) -> Result<(NewSession, SessionLock), SessionError> {
        Ok((
            NewSession {
                session_id: 1,
                state_id: 0,
                secure_token: secure_token.to_string(),
            },
            SessionLock::new(()),
        ))
    }

    fn fetch(&self, _session_id: u64, _state_id: u64) -> Result<FetchedState, SessionError> {
        Err(self.error.clone())
    }

    fn store(
        &self,
        _session_id: u64,
        _state_id: u64,
        _secure_token: &str,
        _use_same_state: bool,
        _payload: &StatePayload,
    ) -> Result<(), SessionError> {
        self.stores.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_store_state_error_redirects() {
    let store = Arc::new(FailingStore::new(SessionError::State("corrupt".into())));
    let s = service_with(false, store.clone());
    let mut response = Response::default();
    s.handle_request(&follow_up("1", "t"), &mut response, |_, _| Ok(()))
        .unwrap();
    assert_eq!(response.status, 303);
    assert_eq!(store.stores.load(Ordering::Relaxed), 0);
}

#[test]
fn test_store_backend_error_propagates() {
    let store = Arc::new(FailingStore::new(SessionError::Backend("connection refused".into())));
    let s = service_with(false, store.clone());
    let mut response = Response::default();
    let err = s
        .handle_request(&follow_up("1", "t"), &mut response, |_, _| Ok(()))
        .unwrap_err();
    assert!(!err.is_recoverable_session_error());
    assert_eq!(err.to_string(), "session store failure: connection refused");
    assert_eq!(response.status, 200);
}

#[test]
fn test_new_session_keeps_offered_token() {
    let store = Arc::new(FailingStore::new(SessionError::Security));
    let s = service_with(false, store.clone());
    let request = Request::new(Method::GET, "", "/").with_cookie("app-token", "kept");
    let mut response = Response::default();
    s.handle_request(&request, &mut response, |_, _| Ok(())).unwrap();
    assert_eq!(cookie(&response, "app-token"), Some("kept"));
    assert_eq!(store.stores.load(Ordering::Relaxed), 1);
}
