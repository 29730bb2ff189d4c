//! Page location: where the tracker lives relative to the opener page.

use url::Url;

use crate::config::ClassHelperConfig;
use crate::error::{ClassHelperError, Result};

/// The opener page's URL, from which the tracker base is derived.
///
/// Trackers are served as `{origin}/{tracker}/...`, so the tracker name is
/// the first path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn parse(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url).map_err(|e| {
            ClassHelperError::Environment(format!("invalid page url '{page_url}': {e}"))
        })?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// The tracker name, or an environment error when the page is not
    /// below one.
    pub fn tracker(&self) -> Result<&str> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                ClassHelperError::Environment(format!(
                    "error parsing tracker name from page url '{}'",
                    self.url
                ))
            })
    }

    /// `{origin}/{tracker}`
    pub fn tracker_url(&self) -> Result<Url> {
        self.join(&[])
    }

    /// `{origin}/{tracker}/{rest_data_path}/{class}`
    pub fn collection_url(&self, config: &ClassHelperConfig, class: &str) -> Result<Url> {
        self.join(&[&config.rest_data_path, class])
    }

    /// `{origin}/{tracker}/{rest_root_path}/{path}`
    pub fn rest_root_url(&self, config: &ClassHelperConfig, path: &str) -> Result<Url> {
        self.join(&[&config.rest_root_path, path])
    }

    /// `{origin}/{tracker}/{stylesheet}`
    pub fn stylesheet_url(&self, config: &ClassHelperConfig) -> Result<Url> {
        self.join(&[&config.stylesheet])
    }

    /// Whether the page opted out of the component via its URL fragment.
    pub fn is_disabled(&self, config: &ClassHelperConfig) -> bool {
        self.url.fragment() == Some(config.disabled_fragment.as_str())
    }

    fn join(&self, parts: &[&str]) -> Result<Url> {
        let mut joined = format!("{}/{}", self.origin(), self.tracker()?);
        for part in parts {
            let part = part.trim_matches('/');
            if !part.is_empty() {
                joined.push('/');
                joined.push_str(part);
            }
        }
        Url::parse(&joined).map_err(|e| {
            ClassHelperError::Environment(format!("cannot build tracker url '{joined}': {e}"))
        })
    }
}
