//! Delete-flag detection.
//!
//! A delete rule selects candidate elements and tests each for a delete flag.
//! Flagged elements name an asset through an identifying attribute; only
//! assets whose identifier has no file extension are folders, and only
//! folders are recorded. Files inside a deleted folder are removed together
//! with it downstream.

use roxmltree::Node;

use super::log::LogSink;
use crate::error::Result;
use crate::sink::ProcessingFeedback;
use crate::splitting::DeleteRule;
use crate::xml::node_path;

/// Extension of the last path segment of an identifier, without the dot.
///
/// Both `/` and `\` separate segments. A dot inside a directory name does
/// not count, and a trailing dot yields an empty extension.
///
/// # Examples
/// ```
/// use lineage_splitter::deletion::file_extension;
///
/// assert_eq!(file_extension("docs/report.pdf"), "pdf");
/// assert_eq!(file_extension("v1.2/folder"), "");
/// assert_eq!(file_extension("archive.tar.gz"), "gz");
/// ```
pub fn file_extension(id: &str) -> &str {
    let name_start = id.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let name = &id[name_start..];
    match name.rfind('.') {
        Some(dot) => &name[dot + 1..],
        None => "",
    }
}

/// Whether an identifier denotes a folder asset (no file extension).
pub fn is_folder_identifier(id: &str) -> bool {
    file_extension(id).is_empty()
}

/// Outcome for one flagged element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flagged {
    /// A folder identifier, to be logged.
    Folder(String),

    /// A file identifier, ignored by this detector.
    File(String),

    /// The element lacks the identifying attribute; `node` is its position.
    MissingId { node: String },
}

/// Evaluate delete rules against a payload tree, in rule order and, within
/// a rule, in document order.
///
/// # Errors
///
/// Returns `SplitError::Evaluation` when a rule query fails to evaluate.
pub fn find_flagged(rules: &[DeleteRule], root: Node<'_, '_>, id_attribute: &str) -> Result<Vec<Flagged>> {
    let mut flagged = Vec::new();

    for rule in rules {
        let candidates = rule.node_query().select_nodes(root)?;
        tracing::debug!(
            query = %rule.node_query().source(),
            candidates = candidates.len(),
            "Evaluated delete rule"
        );

        for candidate in candidates {
            let Some(element) = candidate.as_element() else {
                tracing::debug!(
                    query = %rule.node_query().source(),
                    "Skipping non-element delete candidate"
                );
                continue;
            };

            if rule.flag_query().select_single_node(element)?.is_none() {
                continue;
            }

            flagged.push(match element.attribute(id_attribute) {
                Some(id) if is_folder_identifier(id) => Flagged::Folder(id.to_string()),
                Some(id) => Flagged::File(id.to_string()),
                None => Flagged::MissingId {
                    node: node_path(element),
                },
            });
        }
    }

    Ok(flagged)
}

/// Records flagged folders to a delete log.
pub struct DeleteDetector {
    log: Box<dyn LogSink>,
    id_attribute: String,
}

impl DeleteDetector {
    /// Create a detector writing to `log`.
    pub fn new(log: Box<dyn LogSink>, id_attribute: impl Into<String>) -> Self {
        Self {
            log,
            id_attribute: id_attribute.into(),
        }
    }

    /// Detect flagged folders under `root` and append them to the log.
    ///
    /// Returns the number of entries written.
    pub fn detect<F: ProcessingFeedback + ?Sized>(
        &mut self,
        rules: &[DeleteRule],
        root: Node<'_, '_>,
        doc_id: &str,
        feedback: &mut F,
    ) -> Result<usize> {
        let mut written = 0;

        for item in find_flagged(rules, root, &self.id_attribute)? {
            match item {
                Flagged::Folder(id) => {
                    self.log.append(&id)?;
                    tracing::info!(
                        doc_id = %doc_id,
                        folder = %id,
                        log = %self.log.path().display(),
                        "Recorded folder for deletion"
                    );
                    written += 1;
                }
                Flagged::File(id) => {
                    tracing::debug!(doc_id = %doc_id, asset = %id, "Flagged asset is a file, not logged");
                }
                Flagged::MissingId { node } => {
                    feedback.warn(
                        doc_id,
                        &format!(
                            "flagged node {node} has no '{}' attribute, not logged",
                            self.id_attribute
                        ),
                    );
                }
            }
        }

        Ok(written)
    }

    /// Close the underlying log.
    pub fn close(&mut self) -> Result<()> {
        self.log.close()
    }
}
