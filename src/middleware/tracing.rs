use std::time::Duration;

use tracing::{debug, info};

use super::Middleware;
use crate::server::{Request, Response};

/// Structured request log: one line on entry, one on completion
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &Request) -> Option<Response> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.url(),
            xhr = req.is_xhr(),
            "Request started"
        );
        None
    }

    fn after(&self, req: &Request, res: &mut Response, latency: Duration) {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.url(),
            status = res.status,
            body_bytes = res.body.len(),
            latency_ms = latency.as_millis() as u64,
            "Request completed"
        );
    }
}
