//! # Session Module
//!
//! Session and state persistence across stateless HTTP requests.
//!
//! A request addresses a session through the session cookie (or the `_s`
//! parameter) and, when state history is enabled, one of its states through
//! the `_c` parameter. [`SessionService`] resolves those ids, holds the
//! session lock while the handler runs and stores the resulting state.
//!
//! ## Security
//!
//! Each session carries a random secure token, sent to the browser in a second
//! cookie. A request whose token does not match is redirected to a fresh
//! session rather than served.
//!
//! ## Storage
//!
//! [`SessionStore`] is the storage seam; [`MemorySessionStore`] keeps a bounded
//! number of sessions and states in process memory, encoded with a
//! [`StateCodec`] (JSON by default).

mod codec;
mod error;
mod service;
pub mod store;

pub use codec::{Callbacks, JsonCodec, SessionData, StateCodec, StatePayload};
pub use error::SessionError;
pub use service::{Session, SessionScope, SessionService, SESSION_PARAM, STATE_PARAM};
pub use store::{
    generate_secure_token, FetchedState, MemorySessionStore, NewSession, SessionLock, SessionStore,
};
