//! # Configuration Module
//!
//! Application settings loaded from a YAML file, with every field defaulted so
//! an empty file (or no file at all) yields a working configuration.
//!
//! ## Example Configuration
//!
//! ```yaml
//! name: shop
//! static_url: /static/shop
//! presentation:
//!   canonical_url: true
//!   frame_options: SAMEORIGIN
//! session:
//!   states_history: true
//!   session_cookie:
//!     secure: true
//!     max_age: 86400
//!   security_cookie:
//!     name: ""        # disables the token cookie
//! store:
//!   max_sessions: 5000
//! ```
//!
//! ## Environment Variables
//!
//! Applied on top of the file by [`AppConfig::apply_env`]:
//!
//! - `BRRTWEB_CANONICAL_URL` - `true`/`false`
//! - `BRRTWEB_FRAME_OPTIONS` - header value, empty to disable
//! - `BRRTWEB_PRETTY_PRINT` - `true`/`false`
//! - `BRRTWEB_STATES_HISTORY` - `true`/`false`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::renderer::Flavour;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used to derive default cookie names
    pub name: String,
    /// URL prefix for relative stylesheet and script references
    pub static_url: String,
    /// Renderer created for each request
    pub flavour: Flavour,
    pub presentation: PresentationConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "brrtweb".to_string(),
            static_url: "/static".to_string(),
            flavour: Flavour::Html5,
            presentation: PresentationConfig::default(),
            session: SessionConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&source).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source).context("Failed to parse YAML configuration")
    }

    /// Override settings from `BRRTWEB_*` environment variables
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = env_bool("BRRTWEB_CANONICAL_URL") {
            self.presentation.canonical_url = v;
        }
        if let Ok(v) = env::var("BRRTWEB_FRAME_OPTIONS") {
            self.presentation.frame_options = v;
        }
        if let Some(v) = env_bool("BRRTWEB_PRETTY_PRINT") {
            self.presentation.pretty_print = v;
        }
        if let Some(v) = env_bool("BRRTWEB_STATES_HISTORY") {
            self.session.states_history = v;
        }
        self
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Add `<link rel="canonical">` to pages that do not carry one
    pub canonical_url: bool,
    /// `X-Frame-Options` value for full pages; empty disables the header
    pub frame_options: String,
    pub pretty_print: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            canonical_url: true,
            frame_options: "DENY".to_string(),
            pretty_print: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enabled: bool,
    /// Give every non-XHR request its own state id
    pub states_history: bool,
    pub session_cookie: CookieConfig,
    pub security_cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            states_history: false,
            session_cookie: CookieConfig::default(),
            security_cookie: CookieConfig::default(),
        }
    }
}

/// Settings of one cookie written by the session layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name. `None` derives it from the application name, an empty
    /// string disables the cookie.
    pub name: Option<String>,
    pub secure: bool,
    pub httponly: bool,
    pub max_age: Option<i64>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: None,
            secure: false,
            httponly: true,
            max_age: None,
        }
    }
}

impl CookieConfig {
    /// Effective name: configured one, or `<app>-<suffix>`
    #[must_use]
    pub fn resolve_name(&self, app_name: &str, suffix: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{app_name}-{suffix}"),
        }
    }
}

/// Bounds of the in-memory session store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_sessions: usize,
    pub states_per_session: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            states_per_session: 20,
        }
    }
}
