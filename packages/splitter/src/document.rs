//! Ingest document model.
//!
//! An `IngestDocument` is an identifier plus an ordered set of uniquely named
//! fields. Each field holds an ordered sequence of values; a value is plain
//! text, a pointer to externally stored content, or an embedded XML payload.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};

/// Reference to large content held in an external content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPointer {
    /// Name of the content store.
    pub store: String,

    /// Key of the stored bytes within the store.
    pub key: String,
}

impl ContentPointer {
    /// Create a new content pointer.
    #[must_use]
    pub fn new(store: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            key: key.into(),
        }
    }
}

/// Embedded XML payload, kept in serialized form and parsed by the
/// splitter for each evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XmlPayload(String);

impl XmlPayload {
    /// Wrap serialized XML.
    #[must_use]
    pub fn new(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }

    /// The serialized XML text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Inline scalar text.
    Text(String),

    /// Reference to externally stored content.
    ContentPointer(ContentPointer),

    /// Embedded XML tree.
    Xml(XmlPayload),
}

impl FieldValue {
    /// Create a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Create an XML payload value.
    #[must_use]
    pub fn xml(xml: impl Into<String>) -> Self {
        Self::Xml(XmlPayload::new(xml))
    }

    /// Whether this value points at external content.
    #[must_use]
    pub fn is_content_pointer(&self) -> bool {
        matches!(self, Self::ContentPointer(_))
    }

    /// Text of this value, if it is a scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Serialized XML carried by this value.
    ///
    /// Plain text values are treated as serialized XML as well; content
    /// pointers carry no inline XML.
    #[must_use]
    pub fn as_xml(&self) -> Option<&str> {
        match self {
            Self::Xml(payload) => Some(payload.as_str()),
            Self::Text(text) => Some(text),
            Self::ContentPointer(_) => None,
        }
    }
}

/// A named, multi-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestField {
    /// Field name (case-sensitive, unique within a document).
    pub name: String,

    /// Ordered values.
    pub values: Vec<FieldValue>,
}

impl IngestField {
    /// Create an empty field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Add a value, builder style.
    #[must_use]
    pub fn with_value(mut self, value: FieldValue) -> Self {
        self.values.push(value);
        self
    }

    /// Whether any value of this field is a content pointer.
    #[must_use]
    pub fn has_content_pointer(&self) -> bool {
        self.values.iter().any(FieldValue::is_content_pointer)
    }

    /// First value of the field.
    #[must_use]
    pub fn first(&self) -> Option<&FieldValue> {
        self.values.first()
    }
}

/// A document flowing through the ingestion pipeline.
///
/// Field names are unique. When a serialized document lists a name more than
/// once, the values are merged into the first occurrence in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SerializedDocument")]
pub struct IngestDocument {
    id: String,
    fields: Vec<IngestField>,
}

/// Wire form of a document, before field names are made unique.
#[derive(Deserialize)]
struct SerializedDocument {
    id: String,
    #[serde(default)]
    fields: Vec<IngestField>,
}

impl From<SerializedDocument> for IngestDocument {
    fn from(raw: SerializedDocument) -> Self {
        let mut doc = IngestDocument::new(raw.id);
        for field in raw.fields {
            match doc.fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => existing.values.extend(field.values),
                None => doc.fields.push(field),
            }
        }
        doc
    }
}

impl IngestDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Document identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&IngestField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a field with this name is present.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &IngestField> {
        self.fields.iter()
    }

    /// Set a whole field, replacing any existing field of the same name.
    pub fn set_field(&mut self, field: IngestField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Remove a field, returning it if it was present.
    pub fn remove_field(&mut self, name: &str) -> Option<IngestField> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index))
    }

    /// Append a value to a field, creating the field when missing.
    pub fn add_value(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.values.push(value),
            None => self.fields.push(IngestField::new(name).with_value(value)),
        }
    }

    /// Add a value, builder style.
    #[must_use]
    pub fn with_value(mut self, name: &str, value: FieldValue) -> Self {
        self.add_value(name, value);
        self
    }

    /// First text value of a field.
    #[must_use]
    pub fn first_text(&self, name: &str) -> Option<&str> {
        self.field(name)?.first()?.as_text()
    }

    /// All text values of a field, in order.
    #[must_use]
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.field(name)
            .map(|f| f.values.iter().filter_map(FieldValue::as_text).collect())
            .unwrap_or_default()
    }

    /// Parse a document from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(SplitError::from)
    }

    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(SplitError::from)
    }
}
