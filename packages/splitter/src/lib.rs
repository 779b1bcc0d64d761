//! Lineage Splitter - Split XML payloads of ingest documents into derived
//! documents.
//!
//! Each input document carries serialized XML in one or more payload fields.
//! Split rules select nodes from that XML; every selected node becomes a new
//! document with its own id, the serialized node as payload, a reference to
//! the parent document, and the lineage of its id. Delete rules flag folder
//! assets, which are recorded in an append-only delete log for a separate
//! deletion job.
//!
//! # Example
//!
//! ```
//! use lineage_splitter::{FieldValue, IngestDocument, SplitterConfig};
//!
//! let mut splitter = SplitterConfig::new()
//!     .with_rule("/docs/doc", "@id")
//!     .start()
//!     .unwrap();
//!
//! let input = IngestDocument::new("feed")
//!     .with_value("xmldom", FieldValue::xml(r#"<docs><doc id="a/b"/></docs>"#));
//! let mut out: Vec<IngestDocument> = Vec::new();
//! splitter.process(&input, &mut out).unwrap();
//!
//! assert_eq!(out[0].id(), "a/b");
//! assert_eq!(out[0].texts("lineage_ids"), vec!["/a", "/a/b"]);
//! splitter.stop().unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Splitter configuration and startup
//! - [`document`]: Ingest documents, fields and values
//! - [`error`]: Error types and Result alias
//! - [`query`]: Path query engine (an XPath 1.0 subset)
//! - [`splitting`]: Rule compilation, field propagation, lineage and the splitter
//! - [`deletion`]: Delete-flag detection and the delete log
//! - [`sink`]: Document sinks and warning feedback
//! - [`xml`]: XML utilities
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod deletion;
pub mod document;
pub mod error;
pub mod query;
pub mod sink;
pub mod splitting;
pub mod xml;

// Re-export commonly used items
pub use config::{EmitMode, RuleMap, SplitterConfig};
pub use document::{ContentPointer, FieldValue, IngestDocument, IngestField};
pub use error::{Result, SplitError};
pub use query::{CompiledQuery, NamespaceTable, PathQueryEngine, QueryEngine};
pub use sink::{CollectingFeedback, DocumentSink, JsonLinesSink, ProcessingFeedback, TracingFeedback};
pub use splitting::{generate_lineage, RuleSet, SplitOutcome, Splitter};
