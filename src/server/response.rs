use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names are `Arc<str>` since the same few names repeat on every
/// response. Several entries may share a name (`set-cookie`).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Reason phrase for the status codes the framework produces itself
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        303 => "See Other",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// A `Set-Cookie` header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Lifetime in seconds; session cookie when `None`
    pub max_age: Option<i64>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: path.into(),
            secure: false,
            http_only: true,
            max_age: None,
        }
    }

    /// Cookie telling the browser to forget `name` under `path`
    pub fn expired(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            max_age: Some(0),
            http_only: false,
            ..Self::new(name, "", path)
        }
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
            if max_age <= 0 {
                f.write_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT")?;
            }
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

/// Response envelope built once per request.
///
/// `content_type`, `doctype` and `charset` are copied from the renderer by the
/// presentation service; `body` holds the serialized document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderVec,
    pub content_type: String,
    pub doctype: Option<String>,
    pub charset: String,
    pub body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            content_type: "text/html".to_string(),
            doctype: None,
            charset: "utf-8".to_string(),
            body: Vec::new(),
        }
    }

    /// `303 See Other` pointing at `location`
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::new(303);
        response.set_header("location", location.to_string());
        response.content_type = "text/plain".to_string();
        response
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        status_reason(self.status)
    }

    /// Get the first header with this name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value sent under this header name
    pub fn get_all_headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Set a header unless the response already carries one
    pub fn set_default_header(&mut self, name: &str, value: String) {
        if self.get_header(name).is_none() {
            self.headers.push((Arc::from(name), value));
        }
    }

    /// Append a header, keeping existing values of the same name
    pub fn add_header(&mut self, name: &str, value: String) {
        self.headers.push((Arc::from(name), value));
    }

    pub fn set_cookie(&mut self, cookie: &SetCookie) {
        self.add_header("set-cookie", cookie.to_string());
    }

    pub fn delete_cookie(&mut self, name: &str, path: &str) {
        self.set_cookie(&SetCookie::expired(name, path));
    }

    /// `Content-Type` header value, with the charset for textual types
    #[must_use]
    pub fn content_type_header(&self) -> String {
        let textual = self.content_type.starts_with("text/")
            || self.content_type.contains("xml")
            || self.content_type.contains("javascript");
        if textual && !self.charset.is_empty() {
            format!("{}; charset={}", self.content_type, self.charset)
        } else {
            self.content_type.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(303), "See Other");
        assert_eq!(status_reason(404), "Not Found");
    }

    #[test]
    fn test_set_cookie_format() {
        let mut c = SetCookie::new("app-session", "42", "/app");
        c.secure = true;
        c.max_age = Some(3600);
        assert_eq!(
            c.to_string(),
            "app-session=42; Path=/app; Max-Age=3600; Secure; HttpOnly"
        );
        assert_eq!(
            SetCookie::expired("app-token", "/").to_string(),
            "app-token=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn test_headers() {
        let mut r = Response::default();
        r.set_default_header("X-Frame-Options", "DENY".to_string());
        r.set_default_header("x-frame-options", "SAMEORIGIN".to_string());
        assert_eq!(r.get_header("X-FRAME-OPTIONS"), Some("DENY"));

        r.set_cookie(&SetCookie::new("a", "1", "/"));
        r.set_cookie(&SetCookie::new("b", "2", "/"));
        assert_eq!(r.get_all_headers("set-cookie").count(), 2);

        r.set_header("x-frame-options", "SAMEORIGIN".to_string());
        assert_eq!(r.get_all_headers("x-frame-options").count(), 1);
    }

    #[test]
    fn test_redirect_and_content_type() {
        let r = Response::redirect("/app/page");
        assert_eq!(r.status, 303);
        assert_eq!(r.reason(), "See Other");
        assert_eq!(r.get_header("location"), Some("/app/page"));

        let html = Response::default();
        assert_eq!(html.content_type_header(), "text/html; charset=utf-8");
        let mut json = Response::default();
        json.content_type = "application/json".to_string();
        assert_eq!(json.content_type_header(), "application/json");
    }
}
