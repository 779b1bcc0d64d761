//! Output side of the splitter: the document sink and the warning channel.

use std::io::Write;

use crate::document::IngestDocument;
use crate::error::Result;

/// Accepts documents produced by the splitter.
pub trait DocumentSink {
    /// Hand over one produced document.
    fn feed(&mut self, doc: IngestDocument) -> Result<()>;
}

impl DocumentSink for Vec<IngestDocument> {
    fn feed(&mut self, doc: IngestDocument) -> Result<()> {
        self.push(doc);
        Ok(())
    }
}

/// Writes each document as one line of JSON.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of documents written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> DocumentSink for JsonLinesSink<W> {
    fn feed(&mut self, doc: IngestDocument) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &doc)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

/// Channel for recoverable per-document problems, such as a skipped
/// document without payload.
pub trait ProcessingFeedback {
    /// Report a warning about a document.
    fn warn(&mut self, doc_id: &str, message: &str);
}

/// Reports warnings through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFeedback;

impl ProcessingFeedback for TracingFeedback {
    fn warn(&mut self, doc_id: &str, message: &str) {
        tracing::warn!(doc_id = %doc_id, "{message}");
    }
}

/// A warning recorded by [`CollectingFeedback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub doc_id: String,
    pub message: String,
}

/// Records warnings (and logs them through `tracing`).
#[derive(Debug, Clone, Default)]
pub struct CollectingFeedback {
    warnings: Vec<Warning>,
}

impl CollectingFeedback {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings recorded so far, oldest first.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl ProcessingFeedback for CollectingFeedback {
    fn warn(&mut self, doc_id: &str, message: &str) {
        TracingFeedback.warn(doc_id, message);
        self.warnings.push(Warning {
            doc_id: doc_id.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldValue;

    #[test]
    fn test_json_lines_sink_writes_one_line_per_document() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.feed(IngestDocument::new("a")).unwrap();
        sink.feed(IngestDocument::new("b").with_value("t", FieldValue::text("x")))
            .unwrap();
        assert_eq!(sink.written(), 2);

        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(IngestDocument::from_json(lines[0]).unwrap().id(), "a");
        assert_eq!(IngestDocument::from_json(lines[1]).unwrap().first_text("t"), Some("x"));
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<IngestDocument> = Vec::new();
        sink.feed(IngestDocument::new("a")).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_collecting_feedback() {
        let mut feedback = CollectingFeedback::new();
        feedback.warn("doc-1", "no payload");

        assert_eq!(
            feedback.warnings(),
            &[Warning {
                doc_id: "doc-1".to_string(),
                message: "no payload".to_string()
            }]
        );
    }
}
