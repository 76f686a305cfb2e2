use std::time::Duration;

use crate::server::{Request, Response};

/// Hooks run around every request handled by [`crate::App`].
///
/// `before` hooks run in registration order; the first one returning a
/// response short-circuits the handler. `after` hooks see the final response,
/// including session redirects.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &Request) -> Option<Response> {
        None
    }
    fn after(&self, _req: &Request, _res: &mut Response, _latency: Duration) {}
}
