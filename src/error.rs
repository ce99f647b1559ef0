//! Error and diagnostic types.
//!
//! Only a transform-table failure aborts an extraction. Everything else that
//! can go wrong inside a page (broken markup, templates nobody wrote a rule
//! for, a language the page doesn't have) is reported as a [`Diagnostic`]
//! next to the result.

use std::path::PathBuf;

/// Fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transform source {path:?} could not be read: {source}")]
    TransformSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transform source {path:?} is not a valid rule list: {source}")]
    TransformSourceInvalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("transform rule '{rule}' is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("no transform source found (tried {tried})")]
    TransformSourceMissing { tried: String },

    #[error("unknown language code '{0}'")]
    UnknownLanguage(String),

    #[error("malformed API payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable conditions met while extracting one entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// A `{{` or `[[` without its closing delimiter. The fragment is dropped.
    #[error("line {line}: unclosed markup dropped: {fragment}")]
    MalformedToken { line: usize, fragment: String },

    /// No rule matches the template id; the raw record was passed through.
    #[error("no transform rule for template '{id}' (passed through as {iri})")]
    UnresolvedTemplate { id: String, iri: String },

    /// A template whose first segment is a `key=value` pair.
    #[error("line {line}: template without a name passed through")]
    AnonymousTemplate { line: usize },

    #[error("no '{heading}' section on this page")]
    MissingLanguageSection { heading: String },
}

impl Diagnostic {
    /// Records produced under this diagnostic are kept but unnormalized.
    pub fn is_low_confidence(&self) -> bool {
        matches!(
            self,
            Diagnostic::UnresolvedTemplate { .. } | Diagnostic::AnonymousTemplate { .. }
        )
    }
}
