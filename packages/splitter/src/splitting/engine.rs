//! Document splitter that drives rules over each input document.

use std::fmt;
use std::sync::Arc;

use roxmltree::Node;

use super::fields::propagate_fields;
use super::lineage::generate_lineage;
use super::rules::{CompiledRule, RuleSet};
use crate::config::{EmitMode, SplitterConfig};
use crate::deletion::{open_log, DeleteDetector};
use crate::document::{FieldValue, IngestDocument, IngestField};
use crate::error::{Result, SplitError};
use crate::sink::{DocumentSink, ProcessingFeedback, TracingFeedback};
use crate::xml::{node_path, serialize_subtree};

/// What processing one input document produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Derived documents handed to the sink.
    pub derived: usize,

    /// Whether the unchanged input document was handed to the sink.
    pub parent_emitted: bool,

    /// Entries appended to the delete log.
    pub deletions: usize,

    /// Whether the document was skipped for lack of payload.
    pub skipped: bool,
}

/// Feeds documents to the sink directly or, in atomic mode, only once the
/// whole input document succeeded.
struct Emitter<'s> {
    sink: &'s mut dyn DocumentSink,
    buffer: Option<Vec<IngestDocument>>,
}

impl<'s> Emitter<'s> {
    fn new(sink: &'s mut dyn DocumentSink, mode: EmitMode) -> Self {
        let buffer = match mode {
            EmitMode::Stream => None,
            EmitMode::Atomic => Some(Vec::new()),
        };
        Self { sink, buffer }
    }

    fn emit(&mut self, doc: IngestDocument) -> Result<()> {
        match &mut self.buffer {
            Some(buffer) => {
                buffer.push(doc);
                Ok(())
            }
            None => self.sink.feed(doc),
        }
    }

    fn commit(self) -> Result<()> {
        let Emitter { sink, buffer } = self;
        for doc in buffer.into_iter().flatten() {
            sink.feed(doc)?;
        }
        Ok(())
    }
}

/// A started document splitter.
///
/// Created by [`SplitterConfig::start`] once every rule compiled, and shut
/// down with [`Splitter::stop`], which releases the delete log. Documents
/// are processed one at a time, each to completion.
pub struct Splitter<F: ProcessingFeedback = TracingFeedback> {
    config: SplitterConfig,
    rules: Arc<RuleSet>,
    detector: Option<DeleteDetector>,
    feedback: F,
}

impl<F: ProcessingFeedback> Splitter<F> {
    /// Assemble a splitter from a validated configuration and compiled rules.
    pub(crate) fn from_parts(config: SplitterConfig, rules: Arc<RuleSet>, feedback: F) -> Result<Self> {
        if rules.split_rules().is_empty() {
            return Err(SplitError::Config(
                "at least one split rule is required".to_string(),
            ));
        }

        let detector = if rules.delete_rules().is_empty() {
            None
        } else {
            let Some(path) = config.delete_log.as_deref() else {
                return Err(SplitError::Config(
                    "delete_flags are configured but delete_log is not set".to_string(),
                ));
            };
            let log = open_log(path, config.close_log_after_write)?;
            Some(DeleteDetector::new(log, config.delete_id_attribute.clone()))
        };

        tracing::info!(
            split_rules = rules.split_rules().len(),
            delete_rules = rules.delete_rules().len(),
            emit_mode = ?config.emit_mode,
            "Splitter started"
        );

        Ok(Self {
            config,
            rules,
            detector,
            feedback,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// The compiled rules, shareable with other splitters.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// The feedback channel.
    #[must_use]
    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    /// Split one input document, feeding results to `sink`.
    ///
    /// A document without payload is skipped (with a feedback warning when
    /// configured) and is not an error.
    ///
    /// # Errors
    ///
    /// Fails the document when a payload is not well-formed XML, an id query
    /// finds nothing or only blank text, a query cannot be evaluated, the
    /// delete log cannot be written, or the sink rejects a document. In
    /// stream mode, documents fed before the failure stay fed.
    pub fn process(&mut self, doc: &IngestDocument, sink: &mut dyn DocumentSink) -> Result<SplitOutcome> {
        let payload_fields: Vec<&IngestField> = self
            .config
            .input_fields
            .iter()
            .filter_map(|name| doc.field(name))
            .collect();

        if payload_fields.is_empty() {
            if self.config.error_on_missing_payload {
                self.feedback.warn(
                    doc.id(),
                    &format!(
                        "No XML found in fields {:?} of document {}",
                        self.config.input_fields,
                        doc.id()
                    ),
                );
            } else {
                tracing::debug!(doc_id = %doc.id(), "No XML payload, skipping");
            }
            return Ok(SplitOutcome {
                skipped: true,
                ..SplitOutcome::default()
            });
        }

        let mut outcome = SplitOutcome::default();
        let mut emitter = Emitter::new(sink, self.config.emit_mode);

        if !self.config.drop_parent_document {
            emitter.emit(doc.clone())?;
            outcome.parent_emitted = true;
        }

        for field in payload_fields {
            for value in &field.values {
                let Some(xml) = value.as_xml() else {
                    self.feedback.warn(
                        doc.id(),
                        &format!("Content pointer in input field '{}' skipped", field.name),
                    );
                    continue;
                };

                let tree = roxmltree::Document::parse(xml).map_err(|source| SplitError::XmlParse {
                    doc_id: doc.id().to_string(),
                    source,
                })?;
                let root = tree.root_element();

                if let Some(detector) = self.detector.as_mut() {
                    outcome.deletions +=
                        detector.detect(self.rules.delete_rules(), root, doc.id(), &mut self.feedback)?;
                }

                for rule in self.rules.split_rules() {
                    outcome.derived += self.apply_rule(rule, root, doc, &mut emitter)?;
                }
            }
        }

        emitter.commit()?;

        tracing::debug!(
            doc_id = %doc.id(),
            derived = outcome.derived,
            deletions = outcome.deletions,
            "Split document"
        );
        Ok(outcome)
    }

    /// Emit one derived document per node selected by `rule`.
    fn apply_rule(
        &self,
        rule: &CompiledRule,
        root: Node<'_, '_>,
        parent: &IngestDocument,
        emitter: &mut Emitter<'_>,
    ) -> Result<usize> {
        let items = rule.node_query().select_nodes(root)?;
        tracing::debug!(
            query = %rule.node_query().source(),
            matches = items.len(),
            "Evaluated split rule"
        );

        let mut count = 0;
        for (counter, item) in items.into_iter().enumerate() {
            let Some(node) = item.as_element() else {
                return Err(SplitError::Evaluation {
                    query: rule.node_query().source().to_string(),
                    reason: format!("selected a non-element node at {}", node_path(item.node())),
                });
            };

            let id = resolve_id(rule, node, parent.id())?;
            let id = if self.config.autonumber_child_ids {
                format!("{id}-{counter}")
            } else {
                id
            };

            emitter.emit(self.derive(parent, &id, node))?;
            count += 1;
        }

        Ok(count)
    }

    /// Build a derived document for a matched node.
    fn derive(&self, parent: &IngestDocument, id: &str, node: Node<'_, '_>) -> IngestDocument {
        let mut child = IngestDocument::new(id);

        if self.config.copy_parent_fields {
            propagate_fields(parent, &mut child, &self.config.input_fields);
        }

        // Payload, parent reference and lineage never merge with inherited values.
        child.set_field(
            IngestField::new(&self.config.output_field)
                .with_value(FieldValue::xml(serialize_subtree(node))),
        );
        child.set_field(
            IngestField::new(&self.config.parent_id_field).with_value(FieldValue::text(parent.id())),
        );
        child.remove_field(&self.config.lineage_field);
        for entry in generate_lineage(id) {
            child.add_value(&self.config.lineage_field, FieldValue::text(entry));
        }

        child
    }

    /// Shut down, releasing the delete log. Returns the feedback channel.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::DeleteLog` when the final flush fails; the
    /// handle is released either way.
    pub fn stop(self) -> Result<F> {
        let Splitter {
            detector, feedback, ..
        } = self;

        if let Some(mut detector) = detector {
            detector.close()?;
        }

        tracing::info!("Splitter stopped");
        Ok(feedback)
    }
}

impl<F: ProcessingFeedback> fmt::Debug for Splitter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("config", &self.config)
            .field("rules", &self.rules)
            .field("delete_log_open", &self.detector.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolve the trimmed identifier of a matched node.
fn resolve_id(rule: &CompiledRule, node: Node<'_, '_>, doc_id: &str) -> Result<String> {
    let Some(id_item) = rule.id_query().select_single_node(node)? else {
        return Err(SplitError::UnresolvedId {
            id_query: rule.id_query().source().to_string(),
            doc_id: doc_id.to_string(),
            node: node_path(node),
        });
    };

    let text = id_item.string_value();
    let id = text.trim();
    if id.is_empty() {
        return Err(SplitError::EmptyId {
            id_query: rule.id_query().source().to_string(),
            doc_id: doc_id.to_string(),
            node: node_path(node),
        });
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingFeedback;
    use crate::query::PathQueryEngine;
    use pretty_assertions::assert_eq;

    const DOCS: &str = r#"<docs><doc id="1"><title>doc 1</title></doc><doc id="2"><title>doc 2</title></doc></docs>"#;

    fn splitter(config: SplitterConfig) -> Splitter<CollectingFeedback> {
        config
            .start_with(&PathQueryEngine::new(), CollectingFeedback::new())
            .unwrap()
    }

    fn input(xml: &str) -> IngestDocument {
        IngestDocument::new("feed.xml")
            .with_value("title", FieldValue::text("Feed"))
            .with_value("xmldom", FieldValue::xml(xml))
    }

    #[test]
    fn test_splits_each_matched_node() {
        let mut splitter = splitter(SplitterConfig::new().with_rule("/docs/doc", "@id"));
        let mut out: Vec<IngestDocument> = Vec::new();

        let outcome = splitter.process(&input(DOCS), &mut out).unwrap();

        assert_eq!(outcome.derived, 2);
        assert!(!outcome.parent_emitted);
        let ids: Vec<&str> = out.iter().map(IngestDocument::id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let first = &out[0];
        assert_eq!(first.first_text("title"), Some("Feed"));
        assert_eq!(first.first_text("parent_id"), Some("feed.xml"));
        assert_eq!(first.texts("lineage_ids"), vec!["/1"]);
        assert_eq!(
            first.field("xmldom").unwrap().first().unwrap().as_xml(),
            Some(r#"<doc id="1"><title>doc 1</title></doc>"#)
        );
    }

    #[test]
    fn test_parent_emitted_once_before_children() {
        let mut splitter = splitter(
            SplitterConfig::new()
                .with_rule("/docs/doc", "@id")
                .with_drop_parent_document(false),
        );
        let mut doc = input(DOCS);
        doc.add_value("xmldom", FieldValue::xml(DOCS));
        let mut out: Vec<IngestDocument> = Vec::new();

        let outcome = splitter.process(&doc, &mut out).unwrap();

        assert!(outcome.parent_emitted);
        assert_eq!(outcome.derived, 4);
        assert_eq!(out[0], doc);
        assert_eq!(out.iter().filter(|d| d.id() == "feed.xml").count(), 1);
    }

    #[test]
    fn test_id_text_is_trimmed_and_blank_is_an_error() {
        let mut splitter = splitter(SplitterConfig::new().with_rule("/docs/doc", "key"));
        let mut out: Vec<IngestDocument> = Vec::new();

        splitter
            .process(&input("<docs><doc><key>  a/b \n</key></doc></docs>"), &mut out)
            .unwrap();
        assert_eq!(out[0].id(), "a/b");

        let err = splitter
            .process(&input("<docs><doc><key> </key></doc></docs>"), &mut out)
            .unwrap_err();
        assert!(matches!(err, SplitError::EmptyId { ref node, .. } if node == "/docs[1]/doc[1]"));
    }

    #[test]
    fn test_non_element_match_is_an_error() {
        let mut splitter = splitter(SplitterConfig::new().with_rule("/docs/doc/@id", "."));
        let mut out: Vec<IngestDocument> = Vec::new();

        let err = splitter.process(&input(DOCS), &mut out).unwrap_err();
        assert!(matches!(err, SplitError::Evaluation { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_a_document_error() {
        let mut splitter = splitter(SplitterConfig::new().with_rule("/docs/doc", "@id"));
        let mut out: Vec<IngestDocument> = Vec::new();

        let err = splitter.process(&input("<docs><doc>"), &mut out).unwrap_err();
        assert!(matches!(err, SplitError::XmlParse { ref doc_id, .. } if doc_id == "feed.xml"));
        assert!(!err.is_startup_error());
    }

    #[test]
    fn test_content_pointer_payload_is_skipped_with_warning() {
        use crate::document::ContentPointer;

        let mut splitter = splitter(SplitterConfig::new().with_rule("/docs/doc", "@id"));
        let doc = IngestDocument::new("p").with_value(
            "xmldom",
            FieldValue::ContentPointer(ContentPointer::new("store", "k")),
        );
        let mut out: Vec<IngestDocument> = Vec::new();

        let outcome = splitter.process(&doc, &mut out).unwrap();
        assert_eq!(outcome.derived, 0);
        assert!(out.is_empty());

        let feedback = splitter.stop().unwrap();
        assert_eq!(feedback.warnings().len(), 1);
    }

    #[test]
    fn test_start_requires_split_rule_and_delete_log() {
        let err = SplitterConfig::new().start().unwrap_err();
        assert!(err.is_startup_error());

        let err = SplitterConfig::new()
            .with_rule("/docs/doc", "@id")
            .with_delete_flag("//asset", "@deleted")
            .start()
            .unwrap_err();
        assert!(err.to_string().contains("delete_log"));
    }
}
