//! Error types for the solr-scope crate.

use thiserror::Error;

/// Boxed error produced by a transport. The crate never inspects it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when building, compiling, executing or hydrating
/// a search scope.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A field type or mapping is misconfigured.
    ///
    /// Raised for unknown type names (usually a typo), for types that have
    /// no suffix where one is mandatory, and for mappings that would make
    /// reverse lookups ambiguous.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A named operation is neither a scope method nor a registered named scope.
    #[error("undefined operation '{0}' for criteria")]
    UnknownOperation(String),

    /// A compilation or execution hook was called on a criteria without an
    /// engine attached.
    #[error("implement in subclass: '{0}' needs a search backend")]
    ImplementInSubclass(&'static str),

    /// The engine response could not be parsed.
    #[error("unable to parse search response: {source}")]
    PayloadParse {
        /// The offending raw payload.
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    /// Execution was requested but the backend has no transport.
    #[error("no transport configured for search backend")]
    MissingTransport,

    /// Transport or engine-side failure, passed through untouched.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// A hydrated record could not be decoded into the requested type.
    #[error("unable to decode record: {0}")]
    RecordDecode(#[source] serde_json::Error),

    /// A bulk update body was requested for zero documents.
    #[error("nothing to index")]
    EmptyBatch,
}

impl ScopeError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an unknown-operation error.
    pub fn unknown_operation(name: impl Into<String>) -> Self {
        Self::UnknownOperation(name.into())
    }

    /// Wrap a payload parse failure, keeping the payload for diagnostics.
    pub fn payload_parse(payload: impl Into<String>, source: serde_json::Error) -> Self {
        Self::PayloadParse {
            payload: payload.into(),
            source,
        }
    }
}

/// Result type for scope operations.
pub type Result<T> = std::result::Result<T, ScopeError>;
