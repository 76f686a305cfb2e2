use http::Method;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use tracing::debug;

use crate::presentation::PathContext;

/// Request identifier backed by ULID, used to correlate log lines
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse a propagated id when it parses, otherwise generate a new one
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| ulid::Ulid::from_string(s).ok())
            .map(Self)
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incoming request as seen by the application.
///
/// The HTTP layer in front of the application owns parsing of the wire format;
/// this type only carries what the presentation and session layers consume.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_id: RequestId,
    pub method: Method,
    /// Mount point of the application (no trailing slash), e.g. `/app`
    pub script_name: String,
    /// Path below the mount point, e.g. `/users/42`
    pub path_info: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Cookies parsed from the `Cookie` header
    pub cookies: HashMap<String, String>,
    /// Query string parameters
    pub params: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, script_name: &str, path_info: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            script_name: script_name.trim_end_matches('/').to_string(),
            path_info: path_info.to_string(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            params: HashMap::new(),
        }
    }

    /// Build a request from a raw path (with query string) and header pairs.
    ///
    /// Header names are lowercased, cookies are read from the `Cookie` header and
    /// parameters from the query string.
    pub fn from_parts<I, K, V>(method: Method, script_name: &str, raw_path: &str, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers: HashMap<String, String> = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();
        let cookies = parse_cookies(&headers);
        let params = parse_query_params(raw_path);
        let path_info = raw_path.split('?').next().unwrap_or("").to_string();
        let request_id = RequestId::from_header_or_new(headers.get("x-request-id").map(String::as_str));

        debug!(
            request_id = %request_id,
            method = %method,
            path = %path_info,
            cookie_count = cookies.len(),
            param_count = params.len(),
            "Request assembled"
        );

        Self {
            request_id,
            method,
            script_name: script_name.trim_end_matches('/').to_string(),
            path_info,
            headers,
            cookies,
            params,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// True for requests sent by `XMLHttpRequest`
    #[must_use]
    pub fn is_xhr(&self) -> bool {
        self.get_header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }

    #[must_use]
    pub fn path_context(&self) -> PathContext {
        PathContext::new(self.script_name.clone(), self.path_info.clone())
    }

    /// Path of the request without its query string, used as redirect target
    #[must_use]
    pub fn url(&self) -> String {
        let url = format!("{}{}", self.script_name, self.path_info);
        if url.is_empty() {
            "/".to_string()
        } else {
            url
        }
    }

    /// Path scope for cookies set by the application
    #[must_use]
    pub fn cookie_path(&self) -> &str {
        if self.script_name.is_empty() {
            "/"
        } else {
            &self.script_name
        }
    }
}

/// Parse the `Cookie` header into name/value pairs
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse query string parameters from a URL path
///
/// Everything after the `?` is URL-decoded; for repeated names the last value wins.
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    match path.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        None => HashMap::new(),
    }
}
