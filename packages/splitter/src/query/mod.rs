//! Path-query engine.
//!
//! Queries are compiled once against a [`NamespaceTable`] and evaluated many
//! times against context nodes of parsed payload trees. The engine is
//! reached through the [`QueryEngine`] and [`CompiledQuery`] traits so rules
//! hold trait objects rather than a concrete query implementation.
//!
//! [`PathQueryEngine`] implements a subset of XPath 1.0: location paths with
//! the child, attribute, descendant, descendant-or-self, self and parent
//! axes, name and node-type tests, predicates, comparisons, `and`/`or`,
//! unions and a handful of core functions.

mod engine;
mod eval;
mod lexer;
mod namespace;
mod parser;

use std::cmp::Ordering;
use std::fmt;

use roxmltree::{Node, NodeType};

pub use engine::{PathQuery, PathQueryEngine};
pub use namespace::{NamespaceTable, XML_NAMESPACE};

use crate::error::Result;
use crate::xml::text_content;

/// A compiler of path queries.
pub trait QueryEngine: Send + Sync {
    /// Engine name for diagnostics.
    fn name(&self) -> &'static str;

    /// Compile a query string, resolving prefixes through `namespaces`.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::InvalidQuery` naming the offending query text.
    fn compile(&self, query: &str, namespaces: &NamespaceTable) -> Result<Box<dyn CompiledQuery>>;
}

/// A compiled, stateless query.
pub trait CompiledQuery: fmt::Debug + Send + Sync {
    /// The query text this was compiled from.
    fn source(&self) -> &str;

    /// Select all matching items relative to `context`, in document order.
    fn select_nodes<'a, 'input>(&self, context: Node<'a, 'input>)
        -> Result<Vec<QueryItem<'a, 'input>>>;

    /// Select the first matching item in document order.
    fn select_single_node<'a, 'input>(
        &self,
        context: Node<'a, 'input>,
    ) -> Result<Option<QueryItem<'a, 'input>>> {
        Ok(self.select_nodes(context)?.into_iter().next())
    }
}

/// An item selected by a query.
///
/// roxmltree does not model attributes as tree nodes, so an attribute is
/// addressed by its owning element and its index in that element's
/// attribute list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryItem<'a, 'input> {
    /// A tree node (element, text, comment, processing instruction or root).
    Node(Node<'a, 'input>),

    /// An attribute of `owner`.
    Attribute { owner: Node<'a, 'input>, index: usize },
}

impl<'a, 'input> QueryItem<'a, 'input> {
    /// The tree node itself, or the owning element for an attribute.
    #[must_use]
    pub fn node(&self) -> Node<'a, 'input> {
        match self {
            Self::Node(node) => *node,
            Self::Attribute { owner, .. } => *owner,
        }
    }

    /// The element node, if this item is one.
    #[must_use]
    pub fn as_element(&self) -> Option<Node<'a, 'input>> {
        match self {
            Self::Node(node) if node.is_element() => Some(*node),
            _ => None,
        }
    }

    /// Whether this item is an attribute.
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::Attribute { .. })
    }

    /// XPath string value: the attribute value, or the untrimmed text
    /// content of a node.
    #[must_use]
    pub fn string_value(&self) -> String {
        match self {
            Self::Node(node) => text_content(*node),
            Self::Attribute { owner, index } => owner
                .attributes()
                .nth(*index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    /// Local name of an element, attribute or processing instruction.
    #[must_use]
    pub fn local_name(&self) -> String {
        match self {
            Self::Node(node) => match node.node_type() {
                NodeType::Element => node.tag_name().name().to_string(),
                NodeType::PI => node.pi().map(|pi| pi.target.to_string()).unwrap_or_default(),
                _ => String::new(),
            },
            Self::Attribute { owner, index } => owner
                .attributes()
                .nth(*index)
                .map(|attr| attr.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// Document-order key: attributes sort after their owner and before its
    /// children.
    pub(crate) fn order_key(&self) -> (usize, usize) {
        match self {
            Self::Node(node) => (node.id().get_usize(), 0),
            Self::Attribute { owner, index } => (owner.id().get_usize(), index + 1),
        }
    }

    /// Compare two items of the same document by document order.
    #[must_use]
    pub fn document_order(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}
