//! Application dispatch: hooks, session coordinator, presentation service and
//! the handler, wired in that order around every request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::config::AppConfig;
use crate::error::Result;
use crate::middleware::Middleware;
use crate::presentation::PresentationService;
use crate::renderer::Renderer;
use crate::server::{Request, Response};
use crate::session::{MemorySessionStore, SessionData, SessionScope, SessionService, SessionStore};

/// Everything a handler sees of the request it serves
pub struct RequestContext<'a> {
    pub request: &'a Request,
    pub response: &'a mut Response,
    pub renderer: &'a mut Renderer,
    /// `None` when sessions are disabled
    pub session: Option<SessionScope<'a>>,
}

impl RequestContext<'_> {
    /// Session data of the request, when sessions are enabled
    pub fn session_data(&mut self) -> Option<&mut SessionData> {
        self.session.as_mut().map(|s| &mut *s.data)
    }
}

/// Application code run for every request.
///
/// Implemented for plain functions and closures taking a [`RequestContext`].
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext<'_>) -> Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut RequestContext<'_>) -> Result<()> {
        self(ctx)
    }
}

pub struct App {
    config: AppConfig,
    handler: Arc<dyn Handler>,
    presentation: PresentationService,
    sessions: Option<SessionService>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl App {
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// App with default services and no hooks
    pub fn new(config: AppConfig, handler: impl Handler + 'static) -> Self {
        AppBuilder::new(config).build(handler)
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> Option<&SessionService> {
        self.sessions.as_ref()
    }

    /// Handle one request.
    ///
    /// Handler errors other than recoverable session errors are returned as is
    /// and skip the `after` hooks, since there is no response to show them.
    pub fn handle(&self, request: &Request) -> Result<Response> {
        let start = Instant::now();

        for mw in &self.middlewares {
            if let Some(mut response) = mw.before(request) {
                debug!(request_id = %request.request_id, status = response.status, "Request answered by hook");
                self.run_after(request, &mut response, start.elapsed());
                return Ok(response);
            }
        }

        let renderer = Renderer::new(self.config.flavour, &self.config.static_url);
        let mut response = Response::default();

        let result = match &self.sessions {
            Some(sessions) => sessions.handle_request(request, &mut response, |scope, response| {
                self.presentation
                    .handle_request(request, response, renderer, |renderer, response| {
                        self.handler.handle(&mut RequestContext {
                            request,
                            response,
                            renderer,
                            session: Some(scope),
                        })
                    })
            }),
            None => self
                .presentation
                .handle_request(request, &mut response, renderer, |renderer, response| {
                    self.handler.handle(&mut RequestContext {
                        request,
                        response,
                        renderer,
                        session: None,
                    })
                }),
        };

        if let Err(e) = result {
            error!(request_id = %request.request_id, path = %request.url(), error = %e, "Request failed");
            return Err(e);
        }

        self.run_after(request, &mut response, start.elapsed());
        Ok(response)
    }

    fn run_after(&self, request: &Request, response: &mut Response, latency: Duration) {
        for mw in &self.middlewares {
            mw.after(request, response, latency);
        }
    }
}

pub struct AppBuilder {
    config: AppConfig,
    store: Option<Arc<dyn SessionStore>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            middlewares: Vec::new(),
        }
    }

    /// Use `store` instead of an in-memory store sized from the config
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a hook; hooks run in the order they are added
    #[must_use]
    pub fn middleware(mut self, mw: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(mw);
        self
    }

    pub fn build(self, handler: impl Handler + 'static) -> App {
        let sessions = self.config.session.enabled.then(|| {
            let store = self
                .store
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new(&self.config.store)));
            SessionService::new(&self.config.session, &self.config.name, store)
        });

        App {
            presentation: PresentationService::new(&self.config.presentation),
            sessions,
            handler: Arc::new(handler),
            middlewares: self.middlewares,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Element;
    use http::Method;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.presentation.canonical_url = false;
        config.session.enabled = false;
        config
    }

    struct Deny;
    impl Middleware for Deny {
        fn before(&self, _req: &Request) -> Option<Response> {
            Some(Response::new(403))
        }
    }

    #[test]
    fn test_handle_without_sessions() {
        let app = App::new(config(), |ctx: &mut RequestContext<'_>| -> Result<()> {
            assert!(ctx.session.is_none());
            ctx.renderer.push(Element::new("p").child("hello"));
            Ok(())
        });
        let response = app.handle(&Request::new(Method::GET, "/b", "/a")).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "<!DOCTYPE html>\n<html><head></head><body><p>hello</p></body></html>"
        );
    }

    #[test]
    fn test_before_hook_short_circuits() {
        let app = App::builder(config())
            .middleware(Arc::new(Deny))
            .build(|_: &mut RequestContext<'_>| -> Result<()> { panic!("handler must not run") });
        let response = app.handle(&Request::new(Method::GET, "", "/")).unwrap();
        assert_eq!(response.status, 403);
    }

    #[test]
    fn test_handler_error_propagates() {
        let app = App::new(config(), |_: &mut RequestContext<'_>| -> Result<()> {
            Err(anyhow::anyhow!("database down").into())
        });
        let err = app.handle(&Request::new(Method::GET, "", "/")).unwrap_err();
        assert_eq!(err.to_string(), "database down");
    }
}
