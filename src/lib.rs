//! # brrtweb
//!
//! **brrtweb** is the presentation and session core of a server-side web
//! framework: handlers build markup trees, the framework turns them into a
//! complete HTML document and keeps per-user state between stateless HTTP
//! requests.
//!
//! ## Architecture
//!
//! - **[`markup`]** - Element/text/comment tree and the per-request head accumulator
//! - **[`renderer`]** - What a handler writes into: root fragment, head, content type
//! - **[`presentation`]** - Document merge, serialization and the presentation service
//! - **[`session`]** - Session coordinator, state codec and session stores
//! - **[`server`]** - Request and response envelopes
//! - **[`middleware`]** - `before`/`after` hooks (tracing, metrics)
//! - **[`config`]** - YAML configuration with environment overrides
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Http as HTTP layer
//!     participant App
//!     participant Hooks as Middleware
//!     participant Session as SessionService
//!     participant Store as SessionStore
//!     participant Pres as PresentationService
//!     participant Handler
//!
//!     Http->>App: handle(&Request)
//!     App->>Hooks: before()
//!     App->>Session: handle_request()
//!     Session->>Store: create() / get_lock() + fetch()
//!     Session->>Pres: chain(SessionScope)
//!     Pres->>Handler: handle(&mut RequestContext)
//!     Handler-->>Pres: Ok(())
//!     Pres->>Pres: merge + serialize
//!     Pres-->>Session: Ok(())
//!     Session->>Store: store()
//!     Session-->>App: Ok(()) or 303 redirect
//!     App->>Hooks: after()
//!     App-->>Http: Response
//! ```
//!
//! ### Handler Example
//!
//! ```rust
//! use brrtweb::markup::Element;
//! use brrtweb::{App, AppConfig, Request, RequestContext, Result};
//!
//! let app = App::new(AppConfig::default(), |ctx: &mut RequestContext<'_>| -> Result<()> {
//!     let visits = ctx
//!         .session_data()
//!         .map(|data| {
//!             let n = data.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
//!             data.insert("visits".into(), n.into());
//!             n
//!         })
//!         .unwrap_or(0);
//!     ctx.renderer.head_mut().title("Counter");
//!     ctx.renderer.push(Element::new("p").child(format!("visit {visits}")));
//!     Ok(())
//! });
//!
//! let response = app.handle(&Request::new(http::Method::GET, "", "/")).unwrap();
//! assert_eq!(response.status, 200);
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod markup;
pub mod middleware;
pub mod presentation;
pub mod renderer;
pub mod server;
pub mod session;

pub use app::{App, AppBuilder, Handler, RequestContext};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use presentation::{serialize, Merger, Output, PathContext, PresentationService};
pub use renderer::{Flavour, Renderer};
pub use server::{Request, Response};
pub use session::{MemorySessionStore, SessionError, SessionScope, SessionService, SessionStore};
