//! Error taxonomy for the query pipeline.
//!
//! Every stage reports failure through [`RagError`]. Nothing in the core
//! substitutes a default answer or retries on failure; the caller decides
//! how to render the error and whether to ask again.

use thiserror::Error;

/// Typed failure of a pipeline stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RagError {
    /// The document bytes could not be parsed in the declared format.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The document parsed but no page yielded any text.
    #[error("document contains no extractable text")]
    EmptyDocument,

    /// Invalid chunking, retrieval, or provider settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding (or other remote provider) call failed: network, quota, timeout.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No index has been built for the active document.
    #[error("index not ready: no document has been indexed")]
    IndexNotReady,

    /// An index build is in progress for this scope.
    #[error("index is being built; try again when indexing completes")]
    IndexBuilding,

    /// The language-generation call failed.
    #[error("generation error: {0}")]
    Generation(String),

    /// Index persistence failed.
    #[error("store error: {0}")]
    Store(String),
}

impl RagError {
    /// Short machine-readable code, used by the HTTP layer and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Extraction(_) => "extraction_error",
            RagError::EmptyDocument => "empty_document",
            RagError::Configuration(_) => "configuration_error",
            RagError::ProviderUnavailable(_) => "provider_unavailable",
            RagError::IndexNotReady => "index_not_ready",
            RagError::IndexBuilding => "index_building",
            RagError::Generation(_) => "generation_error",
            RagError::Store(_) => "store_error",
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
