//! The crate-wide error type and rendering policy.
//!
//! One variant per kind from `spec.md` §7, each carrying a message, an
//! optional boxed cause, a context map, and suggestions — rendered by the
//! CLI the way the teacher renders `anyhow::Error` chains.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LarderError {
    #[error("{message}")]
    Validation {
        message: String,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Parse {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Resolution {
        message: String,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Network {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    FileSystem {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },

    #[error("{message}")]
    Configuration {
        message: String,
        context: BTreeMap<String, String>,
        suggestions: Vec<String>,
    },
}

impl LarderError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn network(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            cause: Some(Box::new(cause)),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn filesystem(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::FileSystem {
            message: message.into(),
            cause: Some(Box::new(cause)),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Validation { context, .. }
            | Self::Parse { context, .. }
            | Self::Resolution { context, .. }
            | Self::Network { context, .. }
            | Self::FileSystem { context, .. }
            | Self::Authentication { context, .. }
            | Self::Configuration { context, .. } => {
                context.insert(key.into(), value.into());
            }
        }
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        match &mut self {
            Self::Validation { suggestions, .. }
            | Self::Parse { suggestions, .. }
            | Self::Resolution { suggestions, .. }
            | Self::Network { suggestions, .. }
            | Self::FileSystem { suggestions, .. }
            | Self::Authentication { suggestions, .. }
            | Self::Configuration { suggestions, .. } => {
                suggestions.push(suggestion.into());
            }
        }
        self
    }

    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Validation { suggestions, .. }
            | Self::Parse { suggestions, .. }
            | Self::Resolution { suggestions, .. }
            | Self::Network { suggestions, .. }
            | Self::FileSystem { suggestions, .. }
            | Self::Authentication { suggestions, .. }
            | Self::Configuration { suggestions, .. } => suggestions,
        }
    }
}

impl From<crate::manifest::ParseError> for LarderError {
    fn from(err: crate::manifest::ParseError) -> Self {
        Self::Parse {
            message: err.to_string(),
            cause: None,
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }
}

impl From<crate::version::VersionError> for LarderError {
    fn from(err: crate::version::VersionError) -> Self {
        Self::Validation {
            message: err.to_string(),
            context: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Render an error the way the CLI prints it: message, `caused by:` chain,
/// then each suggestion on its own line.
#[must_use]
pub fn render_error(err: &LarderError) -> String {
    use std::error::Error as _;

    let mut out = format!("error: {err}");

    let mut source = err.source();
    if source.is_some() {
        out.push_str("\n\ncaused by:");
    }
    while let Some(cause) = source {
        out.push_str(&format!("\n  {cause}"));
        source = cause.source();
    }

    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        out.push_str("\n\nsuggestions:");
        for suggestion in suggestions {
            out.push_str(&format!("\n  - {suggestion}"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_message_and_suggestions() {
        let err = LarderError::validation("cookbook 'nginx' not found")
            .with_suggestion("check the cookbook name for typos");
        let rendered = render_error(&err);
        assert!(rendered.contains("cookbook 'nginx' not found"));
        assert!(rendered.contains("check the cookbook name for typos"));
    }

    #[test]
    fn context_is_attached() {
        let err = LarderError::resolution("conflict").with_context("cookbook", "nginx");
        if let LarderError::Resolution { context, .. } = &err {
            assert_eq!(context.get("cookbook").map(String::as_str), Some("nginx"));
        } else {
            panic!("expected Resolution variant");
        }
    }
}
