//! Request and response types exchanged with the HTTP layer in front of the application.

pub mod request;
pub mod response;

pub use request::{parse_cookies, parse_query_params, Request, RequestId};
pub use response::{status_reason, HeaderVec, Response, SetCookie, MAX_INLINE_HEADERS};
