//! Namespace prefix table used to resolve prefixed query names.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SplitError};

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Regex for a namespace prefix (an NCName without non-ASCII letters).
#[allow(clippy::expect_used)]
static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex")
});

/// Mapping from namespace prefix to URI.
///
/// Built once from configuration and read-only afterwards. The `xml` prefix
/// is always bound to the XML namespace and cannot be rebound to anything
/// else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(prefix, uri)` pairs, validating each entry.
    pub fn from_pairs<I, P, U>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        let mut table = Self::new();
        for (prefix, uri) in pairs {
            table.insert(prefix, uri)?;
        }
        Ok(table)
    }

    /// Bind a prefix to a URI.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::InvalidNamespace` when the prefix is not a valid
    /// name, is `xmlns`, rebinds `xml`, is already bound, or the URI is empty.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Result<()> {
        let prefix = prefix.into();
        let uri = uri.into();

        let invalid = |reason: &str| SplitError::InvalidNamespace {
            prefix: prefix.clone(),
            reason: reason.to_string(),
        };

        if !PREFIX_PATTERN.is_match(&prefix) {
            return Err(invalid("not a valid prefix name"));
        }
        if prefix == "xmlns" {
            return Err(invalid("the xmlns prefix is reserved"));
        }
        if prefix == "xml" && uri != XML_NAMESPACE {
            return Err(invalid("the xml prefix cannot be rebound"));
        }
        if uri.trim().is_empty() {
            return Err(invalid("namespace URI is empty"));
        }
        if self.prefixes.contains_key(&prefix) {
            return Err(invalid("prefix is bound more than once"));
        }

        self.prefixes.insert(prefix, uri);
        Ok(())
    }

    /// Resolve a prefix to its URI.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Number of configured bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Whether no prefixes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Iterate over configured `(prefix, uri)` bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_configured_prefix() {
        let table = NamespaceTable::from_pairs([("m", "urn:m")]).unwrap();
        assert_eq!(table.resolve("m"), Some("urn:m"));
        assert_eq!(table.resolve("x"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_xml_prefix_is_implicit() {
        let table = NamespaceTable::new();
        assert_eq!(table.resolve("xml"), Some(XML_NAMESPACE));
        assert!(table.is_empty());
    }

    #[test]
    fn test_rejects_invalid_prefixes() {
        let mut table = NamespaceTable::new();
        assert!(table.insert("1abc", "urn:a").is_err());
        assert!(table.insert("a:b", "urn:a").is_err());
        assert!(table.insert("xmlns", "urn:a").is_err());
        assert!(table.insert("xml", "urn:a").is_err());
        assert!(table.insert("a", "  ").is_err());
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let mut table = NamespaceTable::new();
        table.insert("a", "urn:a").unwrap();
        let err = table.insert("a", "urn:b").unwrap_err();
        assert!(matches!(err, SplitError::InvalidNamespace { prefix, .. } if prefix == "a"));
    }
}
