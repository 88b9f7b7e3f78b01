//! Error types for the search core.
//!
//! Errors are grouped by failure domain: parameter parsing, authorization,
//! schema resolution, transport, cluster-reported errors and bulk-item
//! failures. Query construction itself never fails once the parser view
//! exists; invalid facet fields degrade to empty buckets instead of errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Result alias used throughout the crate.
pub type SearchResult<T> = Result<T, SearchError>;

/// The primary error type for all search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Invalid request parameters. Surfaced before any cluster contact.
    #[error("invalid parameter `{key}`: {message}")]
    Parameter { key: String, message: String },

    /// Authorization is enabled but no auth object was provided.
    #[error("authorization required: {0}")]
    Authorization(String),

    /// A query builder received an unknown or unmatchable schema.
    #[error("invalid schema `{schema}`: {message}")]
    Schema { schema: String, message: String },

    /// Connection failures, timeouts and retryable statuses, after the
    /// retry budget is exhausted.
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { message: String, attempts: u32 },

    /// A non-retryable error reported by the cluster (4xx other than 429).
    /// Carries both the response and the request body for diagnosis.
    #[error("cluster error (status {status}): {reason}")]
    Cluster {
        status: u16,
        reason: String,
        body: Option<serde_json::Value>,
        request: Option<serde_json::Value>,
    },

    /// Aggregated per-item failures from a bulk request. Version conflicts
    /// and retried transients are not included here.
    #[error("bulk indexing failed for {} item(s)", failures.len())]
    Bulk { failures: Vec<BulkFailure> },
}

/// A single failed item from a `_bulk` response.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    /// Document `_id` of the failed action.
    pub id: String,
    /// HTTP-ish status for the item.
    pub status: u16,
    /// Failure type reported by the cluster (e.g. `mapper_parsing_exception`).
    pub error_type: String,
    /// Human-readable reason.
    pub reason: String,
}

impl SearchError {
    /// Builds a parameter error for the given key.
    pub fn parameter(key: impl Into<String>, message: impl Into<String>) -> Self {
        SearchError::Parameter {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Builds a schema error.
    pub fn schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        SearchError::Schema {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// True if this error came from the cluster rather than from local
    /// validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SearchError::Transport { .. } | SearchError::Cluster { .. } | SearchError::Bulk { .. }
        )
    }
}
