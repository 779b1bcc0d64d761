//! Error types for the splitter.
//!
//! Uses the dual-error pattern: `SplitError` for library consumers with
//! detailed context (query text, document id, node position, log path), and a
//! crate-wide `Result` alias. Errors fall into three lifecycles: compile errors
//! abort startup, document errors abort a single document, and delete-log
//! errors surface to the caller so no deletion record is silently lost.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the splitter library.
#[derive(Debug, Error)]
pub enum SplitError {
    /// A path query failed to compile.
    #[error("Invalid path query '{query}': {reason}")]
    InvalidQuery { query: String, reason: String },

    /// A namespace prefix mapping is unusable.
    #[error("Invalid namespace prefix '{prefix}': {reason}")]
    InvalidNamespace { prefix: String, reason: String },

    /// Configuration is inconsistent or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A payload value is not well-formed XML.
    #[error("XML payload of document {doc_id} could not be parsed: {source}")]
    XmlParse {
        doc_id: String,
        #[source]
        source: roxmltree::Error,
    },

    /// The id-query selected nothing for a matched node.
    #[error("Id query '{id_query}' not found for node {node} of document {doc_id}")]
    UnresolvedId {
        id_query: String,
        doc_id: String,
        node: String,
    },

    /// The id-query selected a node whose text is blank.
    #[error("Id query '{id_query}' resolved to an empty identifier for node {node} of document {doc_id}")]
    EmptyId {
        id_query: String,
        doc_id: String,
        node: String,
    },

    /// A compiled query could not be evaluated against a document.
    #[error("Error evaluating path query '{query}': {reason}")]
    Evaluation { query: String, reason: String },

    /// Writing to the delete log failed.
    #[error("Failed to write delete log {}: {source}", .path.display())]
    DeleteLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of documents failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration could not be read.
    #[error("YAML configuration invalid: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A batch run finished with per-document failures.
    #[error("{failed} of {total} documents failed to split")]
    BatchFailed { failed: usize, total: usize },
}

impl SplitError {
    /// Whether this error aborts startup rather than a single document.
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery { .. } | Self::InvalidNamespace { .. } | Self::Config(_)
        )
    }
}

/// Result type alias for splitter operations.
pub type Result<T> = std::result::Result<T, SplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_query_names_query_text() {
        let err = SplitError::InvalidQuery {
            query: "/docs/doc[".to_string(),
            reason: "unexpected end of query".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid path query '/docs/doc[': unexpected end of query"
        );
        assert!(err.is_startup_error());
    }

    #[test]
    fn test_unresolved_id_names_node_position() {
        let err = SplitError::UnresolvedId {
            id_query: "@id".to_string(),
            doc_id: "1".to_string(),
            node: "/docs/doc[1]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Id query '@id' not found for node /docs/doc[1] of document 1"
        );
        assert!(!err.is_startup_error());
    }

    #[test]
    fn test_delete_log_error_includes_path() {
        let err = SplitError::DeleteLog {
            path: PathBuf::from("/var/log/deletePaths.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/var/log/deletePaths.txt"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_batch_failed_display() {
        let err = SplitError::BatchFailed {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 documents failed to split");
    }
}
