//! Splitter configuration: defaults, YAML loading and startup validation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SplitError};
use crate::query::{NamespaceTable, PathQueryEngine, QueryEngine};
use crate::sink::{ProcessingFeedback, TracingFeedback};
use crate::splitting::{RuleSet, Splitter};

/// Field carrying the embedded XML payload when none is configured.
pub const DEFAULT_INPUT_FIELD: &str = "xmldom";

/// Field receiving the parent document's identifier on derived documents.
pub const DEFAULT_PARENT_ID_FIELD: &str = "parent_id";

/// Field receiving the lineage entries on derived documents.
pub const DEFAULT_LINEAGE_FIELD: &str = "lineage_ids";

/// Attribute read from a flagged node to obtain its asset identifier.
pub const DEFAULT_DELETE_ID_ATTRIBUTE: &str = "id";

/// Field name pattern: no whitespace, no control characters.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static FIELD_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("valid regex"));

/// Validate a document field name.
///
/// # Examples
/// ```
/// use lineage_splitter::config::validate_field_name;
///
/// assert!(validate_field_name("xmldom").is_ok());
/// assert!(validate_field_name("two words").is_err());
/// assert!(validate_field_name("").is_err());
/// ```
pub fn validate_field_name(name: &str) -> Result<()> {
    if FIELD_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(SplitError::Config(format!("invalid field name '{name}'")))
    }
}

/// Ordered mapping of query strings, kept in configuration order.
///
/// Split rules map a node query to an id query; delete-flag rules map a node
/// query to a flag query. Rules are applied in the order they are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMap(Vec<(String, String)>);

impl RuleMap {
    /// Create an empty rule map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Look up the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over `(key, value)` pairs in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuleMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for RuleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RuleMapVisitor;

        impl<'de> Visitor<'de> for RuleMapVisitor {
            type Value = RuleMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of query strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<RuleMap, A::Error> {
                let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    if rules.iter().any(|(k, _): &(String, String)| *k == key) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate rule for query '{key}'"
                        )));
                    }
                    rules.push((key, value));
                }
                Ok(RuleMap(rules))
            }
        }

        deserializer.deserialize_map(RuleMapVisitor)
    }
}

/// When derived documents are handed to the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    /// Feed each document as soon as it is produced. A later failure leaves
    /// earlier outputs of the same input already fed.
    #[default]
    Stream,

    /// Buffer all outputs of one input document and feed them only when the
    /// whole document succeeded.
    Atomic,
}

/// Configuration of a document splitter.
///
/// # Examples
/// ```
/// use lineage_splitter::config::SplitterConfig;
///
/// let config = SplitterConfig::from_yaml_str(
///     "rules:\n  /docs/doc: '@id'\ndrop_parent_document: false\n",
/// )
/// .unwrap();
/// assert_eq!(config.rules.get("/docs/doc"), Some("@id"));
/// assert!(!config.drop_parent_document);
/// assert_eq!(config.input_fields, vec!["xmldom".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitterConfig {
    /// Fields scanned for XML payloads, in order.
    pub input_fields: Vec<String>,

    /// Split rules: node query to id query.
    pub rules: RuleMap,

    /// Delete-flag rules: node query to flag query.
    pub delete_flags: RuleMap,

    /// Namespace prefixes usable in queries.
    pub namespaces: BTreeMap<String, String>,

    /// Copy parent fields onto derived documents.
    pub copy_parent_fields: bool,

    /// Append a per-rule counter to derived identifiers.
    pub autonumber_child_ids: bool,

    /// Suppress re-emission of the input document.
    pub drop_parent_document: bool,

    /// Warn when a document carries no payload (otherwise skip silently).
    pub error_on_missing_payload: bool,

    /// Destination of detected folder deletions.
    pub delete_log: Option<PathBuf>,

    /// Reopen the delete log for every write instead of holding it open.
    pub close_log_after_write: bool,

    /// Attribute holding the asset identifier of a flagged node.
    pub delete_id_attribute: String,

    /// When outputs are fed to the sink.
    pub emit_mode: EmitMode,

    /// Field receiving the serialized subtree on derived documents.
    pub output_field: String,

    /// Field receiving the parent identifier on derived documents.
    pub parent_id_field: String,

    /// Field receiving lineage entries on derived documents.
    pub lineage_field: String,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            input_fields: vec![DEFAULT_INPUT_FIELD.to_string()],
            rules: RuleMap::new(),
            delete_flags: RuleMap::new(),
            namespaces: BTreeMap::new(),
            copy_parent_fields: true,
            autonumber_child_ids: false,
            drop_parent_document: true,
            error_on_missing_payload: true,
            delete_log: None,
            close_log_after_write: false,
            delete_id_attribute: DEFAULT_DELETE_ID_ATTRIBUTE.to_string(),
            emit_mode: EmitMode::Stream,
            output_field: DEFAULT_INPUT_FIELD.to_string(),
            parent_id_field: DEFAULT_PARENT_ID_FIELD.to_string(),
            lineage_field: DEFAULT_LINEAGE_FIELD.to_string(),
        }
    }
}

impl SplitterConfig {
    /// Create a configuration with default options and no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            SplitError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Set the input fields.
    #[must_use]
    pub fn with_input_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.input_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add a split rule.
    #[must_use]
    pub fn with_rule(mut self, node_query: impl Into<String>, id_query: impl Into<String>) -> Self {
        self.rules.insert(node_query, id_query);
        self
    }

    /// Add a delete-flag rule.
    #[must_use]
    pub fn with_delete_flag(
        mut self,
        node_query: impl Into<String>,
        flag_query: impl Into<String>,
    ) -> Self {
        self.delete_flags.insert(node_query, flag_query);
        self
    }

    /// Bind a namespace prefix.
    #[must_use]
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Enable or disable parent field propagation.
    #[must_use]
    pub fn with_copy_parent_fields(mut self, copy: bool) -> Self {
        self.copy_parent_fields = copy;
        self
    }

    /// Enable or disable id autonumbering.
    #[must_use]
    pub fn with_autonumber_child_ids(mut self, autonumber: bool) -> Self {
        self.autonumber_child_ids = autonumber;
        self
    }

    /// Drop or re-emit the input document.
    #[must_use]
    pub fn with_drop_parent_document(mut self, drop: bool) -> Self {
        self.drop_parent_document = drop;
        self
    }

    /// Warn on or silently skip documents without payload.
    #[must_use]
    pub fn with_error_on_missing_payload(mut self, warn: bool) -> Self {
        self.error_on_missing_payload = warn;
        self
    }

    /// Set the delete-log path.
    #[must_use]
    pub fn with_delete_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.delete_log = Some(path.into());
        self
    }

    /// Select the reopen-per-write delete-log policy.
    #[must_use]
    pub fn with_close_log_after_write(mut self, close: bool) -> Self {
        self.close_log_after_write = close;
        self
    }

    /// Set the attribute holding a flagged node's identifier.
    #[must_use]
    pub fn with_delete_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.delete_id_attribute = attribute.into();
        self
    }

    /// Set the emit mode.
    #[must_use]
    pub fn with_emit_mode(mut self, mode: EmitMode) -> Self {
        self.emit_mode = mode;
        self
    }

    /// Set the field receiving serialized subtrees.
    #[must_use]
    pub fn with_output_field(mut self, field: impl Into<String>) -> Self {
        self.output_field = field.into();
        self
    }

    /// Validate option consistency.
    ///
    /// Rule-dependent checks (at least one split rule, a delete log for
    /// delete-flag rules) run against the compiled rule set at startup.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.input_fields.is_empty() {
            return Err(SplitError::Config(
                "at least one input field is required".to_string(),
            ));
        }
        for field in &self.input_fields {
            validate_field_name(field)?;
        }

        let outputs = [
            ("output_field", &self.output_field),
            ("parent_id_field", &self.parent_id_field),
            ("lineage_field", &self.lineage_field),
        ];
        for (option, field) in outputs {
            validate_field_name(field)
                .map_err(|_| SplitError::Config(format!("{option} '{field}' is not a valid field name")))?;
        }
        if self.output_field == self.parent_id_field
            || self.output_field == self.lineage_field
            || self.parent_id_field == self.lineage_field
        {
            return Err(SplitError::Config(
                "output_field, parent_id_field and lineage_field must differ".to_string(),
            ));
        }

        if self.delete_id_attribute.trim().is_empty() {
            return Err(SplitError::Config(
                "delete_id_attribute must not be empty".to_string(),
            ));
        }

        if let Some(path) = &self.delete_log {
            if path.as_os_str().is_empty() {
                return Err(SplitError::Config("delete_log path is empty".to_string()));
            }
        }

        Ok(())
    }

    /// Build the namespace table from the configured prefixes.
    pub fn namespace_table(&self) -> Result<NamespaceTable> {
        NamespaceTable::from_pairs(self.namespaces.iter().map(|(p, u)| (p.clone(), u.clone())))
    }

    /// Start a splitter with the built-in query engine, reporting warnings
    /// through `tracing`.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or any rule does not compile;
    /// no splitter is created in that case.
    pub fn start(self) -> Result<Splitter> {
        self.start_with(&PathQueryEngine::new(), TracingFeedback)
    }

    /// Start a splitter with a specific query engine and feedback channel.
    pub fn start_with<F: ProcessingFeedback>(
        self,
        engine: &dyn QueryEngine,
        feedback: F,
    ) -> Result<Splitter<F>> {
        self.validate()?;
        let namespaces = self.namespace_table()?;
        let rules = RuleSet::compile(&self.rules, &self.delete_flags, &namespaces, engine)?;
        Splitter::from_parts(self, Arc::new(rules), feedback)
    }

    /// Start a splitter that shares an already compiled rule set.
    ///
    /// The `rules` and `delete_flags` of this configuration are ignored.
    pub fn start_with_rules<F: ProcessingFeedback>(
        self,
        rules: Arc<RuleSet>,
        feedback: F,
    ) -> Result<Splitter<F>> {
        self.validate()?;
        Splitter::from_parts(self, rules, feedback)
    }
}
