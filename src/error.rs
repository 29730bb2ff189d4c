//! Error handling for the class helper
//!
//! Two layers, mirroring how failures propagate:
//!
//! - [`DescriptorError`]: a class-help link carries bad or missing attributes.
//!   Caught at activation, logged, and the link keeps its native behavior.
//! - [`ClassHelperError`]: everything that can end an activation or a popup
//!   session (configuration, environment, network, response format).

use thiserror::Error;

/// Rejection of a link's declarative attributes.
///
/// Parsing stops at the first failing check, so exactly one of these is
/// reported per link.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("class help link must have a data-{0} attribute")]
    MissingAttribute(&'static str),

    #[error("{attribute} in helpurl must be a number, got '{value}'")]
    NotANumber {
        attribute: &'static str,
        value: String,
    },

    #[error("{attribute} must be positive, got {value}")]
    NotPositive { attribute: &'static str, value: i64 },

    #[error("{attribute} must not be negative, got {value}")]
    Negative { attribute: &'static str, value: i64 },

    #[error("{attribute} is out of range, got {value}")]
    OutOfRange { attribute: &'static str, value: i64 },

    #[error("invalid helpurl '{0}': expected '<class>?<query>'")]
    InvalidHelpUrl(String),

    #[error("helpurl is missing the '{0}' parameter")]
    MissingParameter(&'static str),

    #[error("class helper must wrap a single class help link, found {0}")]
    LinkCount(usize),
}

/// Main error type for the class helper
#[derive(Error, Debug, Clone)]
pub enum ClassHelperError {
    #[error("configuration error: {0}")]
    Configuration(#[from] DescriptorError),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("error fetching data from {url}: {message}")]
    Network { url: String, message: String },

    #[error("error parsing response from {url}: {message}")]
    ResponseFormat { url: String, message: String },

    #[error("popup window could not be opened: {0}")]
    Popup(String),
}

impl ClassHelperError {
    pub(crate) fn network(url: &str, message: impl ToString) -> Self {
        Self::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn response_format(url: &str, message: impl ToString) -> Self {
        Self::ResponseFormat {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Errors that only ever abort activation. These are logged and the
    /// link degrades to its native click; they are never shown to the user.
    pub fn is_activation_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Environment(_))
    }

    /// Short user-facing text for a failed popup session.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::Environment(_) => "class helper is not available",
            Self::Network { .. } | Self::Popup(_) => "error fetching data from the tracker",
            Self::ResponseFormat { .. } => "error reading data from the tracker",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassHelperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_errors() {
        let config = ClassHelperError::from(DescriptorError::MissingAttribute("height"));
        assert!(config.is_activation_error());
        assert!(ClassHelperError::Environment("no tracker".into()).is_activation_error());
        assert!(!ClassHelperError::network("http://x", "refused").is_activation_error());
        assert!(!ClassHelperError::response_format("http://x", "eof").is_activation_error());
    }

    #[test]
    fn test_descriptor_messages() {
        assert_eq!(
            DescriptorError::MissingAttribute("width").to_string(),
            "class help link must have a data-width attribute"
        );
        assert_eq!(
            DescriptorError::NotANumber {
                attribute: "pagesize",
                value: "ten".into()
            }
            .to_string(),
            "pagesize in helpurl must be a number, got 'ten'"
        );
    }
}
