//! # Session Store
//!
//! Storage adapter for `(session_id, state_id) -> payload` records, plus the
//! bounded in-memory implementation used by default.
//!
//! ## Locking
//!
//! Every session owns one lock. The coordinator holds it from the moment the
//! session is created or fetched until its new state is stored, which
//! linearizes all storage operations of one session. Distinct sessions never
//! contend on each other's lock.
//!
//! ## Eviction
//!
//! [`MemorySessionStore`] keeps at most `max_sessions` sessions and, for each of
//! them, the `states_per_session` most recently used states. The lock of an
//! evicted session stays valid for whoever still holds it; the next fetch of
//! that session fails with [`SessionError::State`].

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use lru::LruCache;
use parking_lot::Mutex;
use rand::{Rng, RngCore};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use super::codec::{JsonCodec, StateCodec, StatePayload};
use super::SessionError;
use crate::config::StoreConfig;

/// Scoped guard over a session's lock; dropping it releases the lock
pub struct SessionLock {
    _guard: Box<dyn Send>,
}

impl SessionLock {
    /// Wrap any guard whose drop releases the lock
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionLock")
    }
}

/// Identifiers allocated for a brand new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub session_id: u64,
    pub state_id: u64,
    pub secure_token: String,
}

/// A stored state, read under the session lock
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedState {
    /// Id to use when the request starts a new state
    pub new_state_id: u64,
    pub secure_token: String,
    pub payload: StatePayload,
}

/// Storage adapter used by the session coordinator.
///
/// `fetch` and `store` are only called while the caller holds the lock
/// returned by `get_lock` or `create` for the same session.
pub trait SessionStore: Send + Sync {
    /// Block until the lock of `session_id` is acquired
    fn get_lock(&self, session_id: u64) -> Result<SessionLock, SessionError>;

    /// Allocate a new session and return it with its lock already held.
    ///
    /// A non-empty `secure_token` is kept as the session's token.
    fn create(&self, secure_token: &str) -> Result<(NewSession, SessionLock), SessionError>;

    fn fetch(&self, session_id: u64, state_id: u64) -> Result<FetchedState, SessionError>;

    fn store(
        &self,
        session_id: u64,
        state_id: u64,
        secure_token: &str,
        use_same_state: bool,
        payload: &StatePayload,
    ) -> Result<(), SessionError>;
}

/// Random URL-safe token made of 16 random bytes
#[must_use]
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

struct SessionRecord {
    lock: Arc<Mutex<()>>,
    secure_token: String,
    last_state_id: u64,
    states: LruCache<u64, Vec<u8>>,
}

/// Bounded in-process session store
pub struct MemorySessionStore<C = JsonCodec> {
    sessions: Mutex<LruCache<u64, SessionRecord>>,
    states_per_session: NonZeroUsize,
    codec: C,
}

impl MemorySessionStore<JsonCodec> {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }
}

impl Default for MemorySessionStore<JsonCodec> {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl<C: StateCodec> MemorySessionStore<C> {
    pub fn with_codec(config: &StoreConfig, codec: C) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(non_zero(config.max_sessions))),
            states_per_session: non_zero(config.states_per_session),
            codec,
        }
    }

    /// Number of sessions currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of states held for `session_id`
    #[must_use]
    pub fn state_count(&self, session_id: u64) -> usize {
        self.sessions
            .lock()
            .peek(&session_id)
            .map_or(0, |record| record.states.len())
    }

    /// Overwrite the raw bytes of a stored state
    pub fn put_raw(&self, session_id: u64, state_id: u64, bytes: Vec<u8>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(&session_id)
            .ok_or_else(|| SessionError::State(format!("session {session_id} not found")))?;
        record.states.put(state_id, bytes);
        Ok(())
    }
}

fn non_zero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl<C: StateCodec> SessionStore for MemorySessionStore<C> {
    fn get_lock(&self, session_id: u64) -> Result<SessionLock, SessionError> {
        // The cache mutex must be released before blocking on the session lock.
        let lock = {
            let sessions = self.sessions.lock();
            match sessions.peek(&session_id) {
                Some(record) => Arc::clone(&record.lock),
                None => Arc::new(Mutex::new(())),
            }
        };
        Ok(SessionLock::new(lock.lock_arc()))
    }

    fn create(&self, secure_token: &str) -> Result<(NewSession, SessionLock), SessionError> {
        let secure_token = if secure_token.is_empty() {
            generate_secure_token()
        } else {
            secure_token.to_string()
        };

        let lock = Arc::new(Mutex::new(()));
        let guard = lock.lock_arc();

        let mut sessions = self.sessions.lock();
        let mut rng = rand::thread_rng();
        let session_id = loop {
            let id: u64 = rng.gen();
            if id != 0 && !sessions.contains(&id) {
                break id;
            }
        };
        if let Some((evicted, _)) = sessions.push(
            session_id,
            SessionRecord {
                lock,
                secure_token: secure_token.clone(),
                last_state_id: 0,
                states: LruCache::new(self.states_per_session),
            },
        ) {
            debug!(evicted_session = evicted, "Session store full, evicted least recently used session");
        }

        Ok((
            NewSession {
                session_id,
                state_id: 0,
                secure_token,
            },
            SessionLock::new(guard),
        ))
    }

    fn fetch(&self, session_id: u64, state_id: u64) -> Result<FetchedState, SessionError> {
        let (new_state_id, secure_token, bytes) = {
            let mut sessions = self.sessions.lock();
            let record = sessions
                .get_mut(&session_id)
                .ok_or_else(|| SessionError::State(format!("session {session_id} not found")))?;
            let bytes = record.states.get(&state_id).cloned().ok_or_else(|| {
                SessionError::State(format!("state {state_id} of session {session_id} not found"))
            })?;
            (record.last_state_id + 1, record.secure_token.clone(), bytes)
        };

        Ok(FetchedState {
            new_state_id,
            secure_token,
            payload: self.codec.decode(&bytes)?,
        })
    }

    fn store(
        &self,
        session_id: u64,
        state_id: u64,
        secure_token: &str,
        use_same_state: bool,
        payload: &StatePayload,
    ) -> Result<(), SessionError> {
        let bytes = self.codec.encode(payload)?;

        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(&session_id)
            .ok_or_else(|| SessionError::State(format!("session {session_id} expired")))?;
        record.secure_token = secure_token.to_string();
        if !use_same_state {
            record.last_state_id = state_id;
        }
        record.states.put(state_id, bytes);
        Ok(())
    }
}
