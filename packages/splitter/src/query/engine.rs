//! Built-in path-query engine.

use roxmltree::Node;

use super::eval::{evaluate, Context, Value};
use super::lexer::tokenize;
use super::namespace::NamespaceTable;
use super::parser::{parse, Expr};
use super::{CompiledQuery, QueryEngine, QueryItem};
use crate::error::{Result, SplitError};

/// Engine for the supported XPath 1.0 subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathQueryEngine;

impl PathQueryEngine {
    /// Create a new engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QueryEngine for PathQueryEngine {
    fn name(&self) -> &'static str {
        "xpath-subset"
    }

    fn compile(&self, query: &str, namespaces: &NamespaceTable) -> Result<Box<dyn CompiledQuery>> {
        Ok(Box::new(PathQuery::compile(query, namespaces)?))
    }
}

/// A compiled query of the built-in engine.
///
/// Immutable after compilation; evaluating it never touches shared state,
/// so one instance may serve several threads.
#[derive(Debug, Clone)]
pub struct PathQuery {
    source: String,
    expr: Expr,
}

impl PathQuery {
    /// Compile a query string against a namespace table.
    ///
    /// # Errors
    ///
    /// Returns `SplitError::InvalidQuery` naming the query text when it is
    /// malformed, uses an unbound prefix, or does not select nodes.
    pub fn compile(query: &str, namespaces: &NamespaceTable) -> Result<Self> {
        let invalid = |reason: String| SplitError::InvalidQuery {
            query: query.to_string(),
            reason,
        };

        let tokens = tokenize(query).map_err(invalid)?;
        let expr = parse(tokens, namespaces).map_err(invalid)?;
        if !expr.is_node_set() {
            return Err(invalid(
                "expression does not select nodes (expected a location path)".to_string(),
            ));
        }

        tracing::debug!(query = %query, "Compiled path query");
        Ok(Self {
            source: query.to_string(),
            expr,
        })
    }
}

impl CompiledQuery for PathQuery {
    fn source(&self) -> &str {
        &self.source
    }

    fn select_nodes<'a, 'input>(
        &self,
        context: Node<'a, 'input>,
    ) -> Result<Vec<QueryItem<'a, 'input>>> {
        let evaluation_error = |reason: String| SplitError::Evaluation {
            query: self.source.clone(),
            reason,
        };

        match evaluate(&self.expr, &Context::root(context)).map_err(evaluation_error)? {
            Value::Nodes(items) => Ok(items),
            _ => Err(evaluation_error(
                "expression did not evaluate to a node set".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn compile(query: &str) -> Box<dyn CompiledQuery> {
        let namespaces = NamespaceTable::from_pairs([("m", "urn:m")]).unwrap();
        PathQueryEngine::new().compile(query, &namespaces).unwrap()
    }

    #[test]
    fn test_select_nodes_in_document_order() {
        let doc = Document::parse("<docs><doc id='1'/><doc id='2'/></docs>").unwrap();
        let query = compile("/docs/doc");

        let ids: Vec<String> = query
            .select_nodes(doc.root())
            .unwrap()
            .iter()
            .map(|item| item.node().attribute("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_select_single_node() {
        let doc = Document::parse("<doc><id>42</id></doc>").unwrap();
        let query = compile("id");

        let found = query.select_single_node(doc.root_element()).unwrap().unwrap();
        assert_eq!(found.string_value(), "42");

        let missing = compile("nothing");
        assert!(missing
            .select_single_node(doc.root_element())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_attribute_selection() {
        let doc = Document::parse("<doc id=' a/b '/>").unwrap();
        let query = compile("@id");

        let item = query.select_single_node(doc.root_element()).unwrap().unwrap();
        assert!(item.is_attribute());
        assert_eq!(item.string_value(), " a/b ");
        assert_eq!(item.local_name(), "id");
    }

    #[test]
    fn test_prefixed_query_matches_by_uri() {
        // Different prefix in the document, same namespace URI.
        let doc = Document::parse(r#"<x:feed xmlns:x="urn:m"><x:item/><item/></x:feed>"#).unwrap();
        let query = compile("/m:feed/m:item");

        assert_eq!(query.select_nodes(doc.root()).unwrap().len(), 1);
    }

    #[test]
    fn test_compile_errors_name_query() {
        let engine = PathQueryEngine::new();
        let namespaces = NamespaceTable::new();

        let err = engine.compile("/docs/doc[", &namespaces).unwrap_err();
        assert!(err.is_startup_error());
        assert!(err.to_string().contains("'/docs/doc['"));

        let err = engine.compile("count(/docs)", &namespaces).unwrap_err();
        assert!(err.to_string().contains("does not select nodes"));
    }

    #[test]
    fn test_source_is_preserved() {
        assert_eq!(compile("//doc[@delete]").source(), "//doc[@delete]");
        assert_eq!(PathQueryEngine::new().name(), "xpath-subset");
    }
}
