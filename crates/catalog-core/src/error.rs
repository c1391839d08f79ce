//! Error taxonomy for the catalog core.

use thiserror::Error;

/// Errors surfaced by the catalog core
///
/// `Clone` so one failed computation can be handed to every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// A required credential or setting is missing; never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The third-party API answered with a failure status or an in-body error
    #[error("upstream error (status {status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },

    /// Revalidation token missing or wrong
    #[error("unauthorized")]
    Authorization,

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not the expected JSON
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The relational store failed
    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CatalogError {
    /// True for failures of the external catalog API itself
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            CatalogError::Upstream { .. } | CatalogError::Transport(_) | CatalogError::Decode(_)
        )
    }

    pub(crate) fn store(error: anyhow::Error) -> Self {
        CatalogError::Store(format!("{:#}", error))
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(error: anyhow::Error) -> Self {
        CatalogError::store(error)
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
