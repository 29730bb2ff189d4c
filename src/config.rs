//! Class helper configuration.
//!
//! Where the tracker REST API lives relative to the page, how long requests
//! may take, and how the popup is dressed.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ClassHelperError, Result};

/// Configuration shared by every class helper on a page.
#[derive(Debug, Clone)]
pub struct ClassHelperConfig {
    /// Path of the data API below `{origin}/{tracker}`.
    pub rest_data_path: String,

    /// Path of the REST root below `{origin}/{tracker}`, used for dropdown
    /// sources that are not classes (e.g. `roles`).
    pub rest_root_path: String,

    /// Stylesheet linked into every popup, relative to the tracker.
    pub stylesheet: String,

    /// Timeout for a single REST request.
    pub request_timeout: Duration,

    /// Navigation backlog of the per-session event bus.
    ///
    /// Page and search requests beyond this many queued events are
    /// dropped. Row toggles and Apply/Cancel are always delivered.
    pub event_buffer: usize,

    /// Search fields whose dropdown options come from a non-class path
    /// below the REST root.
    pub dropdown_sources: HashMap<String, String>,

    /// Page URL fragment that disables the component.
    pub disabled_fragment: String,
}

impl Default for ClassHelperConfig {
    fn default() -> Self {
        Self {
            rest_data_path: "rest/data".to_string(),
            rest_root_path: "rest".to_string(),
            stylesheet: "@@file/classhelper.css".to_string(),
            request_timeout: Duration::from_secs(30),
            event_buffer: 64,
            dropdown_sources: HashMap::from([("roles".to_string(), "roles".to_string())]),
            disabled_fragment: "classhelper-wc-toggle".to_string(),
        }
    }
}

impl ClassHelperConfig {
    /// Defaults overlaid with `CLASSHELPER_*` environment variables.
    ///
    /// A `.env` file is honored if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = var("CLASSHELPER_REST_PATH") {
            self.rest_data_path = path;
        }
        if let Some(stylesheet) = var("CLASSHELPER_STYLESHEET") {
            self.stylesheet = stylesheet;
        }
        if let Some(secs) = var("CLASSHELPER_TIMEOUT_SECS") {
            let secs = parse_env_number("CLASSHELPER_TIMEOUT_SECS", &secs)?;
            self.request_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(size) = var("CLASSHELPER_EVENT_BUFFER") {
            self.event_buffer = parse_env_number("CLASSHELPER_EVENT_BUFFER", &size)?;
        }
        Ok(self)
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the event bus capacity.
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Route dropdown options for `field` to `{rest_root}/{path}`.
    pub fn dropdown_source(mut self, field: &str, path: &str) -> Self {
        self.dropdown_sources
            .insert(field.to_string(), path.to_string());
        self
    }
}

fn parse_env_number(key: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        ClassHelperError::Environment(format!("{key} must be a number, got '{value}'"))
    })
}
