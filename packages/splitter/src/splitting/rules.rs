//! Compiled split and delete rules.

use std::fmt;

use crate::config::RuleMap;
use crate::error::Result;
use crate::query::{CompiledQuery, NamespaceTable, QueryEngine};

/// A split rule: selects nodes to split out and, relative to each, the node
/// whose text becomes the derived document's identifier.
#[derive(Debug)]
pub struct CompiledRule {
    node_query: Box<dyn CompiledQuery>,
    id_query: Box<dyn CompiledQuery>,
}

impl CompiledRule {
    /// Query selecting the nodes to split out.
    #[must_use]
    pub fn node_query(&self) -> &dyn CompiledQuery {
        self.node_query.as_ref()
    }

    /// Query selecting the identifier node, relative to a matched node.
    #[must_use]
    pub fn id_query(&self) -> &dyn CompiledQuery {
        self.id_query.as_ref()
    }
}

/// A delete rule: selects candidate nodes and, relative to each, the node
/// whose presence flags the candidate for deletion.
#[derive(Debug)]
pub struct DeleteRule {
    node_query: Box<dyn CompiledQuery>,
    flag_query: Box<dyn CompiledQuery>,
}

impl DeleteRule {
    /// Query selecting candidate nodes.
    #[must_use]
    pub fn node_query(&self) -> &dyn CompiledQuery {
        self.node_query.as_ref()
    }

    /// Query whose non-empty result flags a candidate.
    #[must_use]
    pub fn flag_query(&self) -> &dyn CompiledQuery {
        self.flag_query.as_ref()
    }
}

/// Build-once, read-only registry of compiled rules.
///
/// Rules keep configuration order. The set holds no mutable state, so it
/// can be shared between splitters through an `Arc`.
pub struct RuleSet {
    split: Vec<CompiledRule>,
    delete: Vec<DeleteRule>,
    engine: &'static str,
}

impl RuleSet {
    /// Compile split rules and delete rules with one namespace table.
    ///
    /// # Errors
    ///
    /// Returns the first compile error, naming the offending query. No
    /// partially compiled set is returned.
    pub fn compile(
        rules: &RuleMap,
        delete_flags: &RuleMap,
        namespaces: &NamespaceTable,
        engine: &dyn QueryEngine,
    ) -> Result<Self> {
        let split = rules
            .iter()
            .map(|(node, id)| -> Result<CompiledRule> {
                Ok(CompiledRule {
                    node_query: engine.compile(node, namespaces)?,
                    id_query: engine.compile(id, namespaces)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = delete_flags
            .iter()
            .map(|(node, flag)| -> Result<DeleteRule> {
                Ok(DeleteRule {
                    node_query: engine.compile(node, namespaces)?,
                    flag_query: engine.compile(flag, namespaces)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            engine = engine.name(),
            split_rules = split.len(),
            delete_rules = delete.len(),
            "Compiled rule set"
        );

        Ok(Self {
            split,
            delete,
            engine: engine.name(),
        })
    }

    /// Split rules in configuration order.
    #[must_use]
    pub fn split_rules(&self) -> &[CompiledRule] {
        &self.split
    }

    /// Delete rules in configuration order.
    #[must_use]
    pub fn delete_rules(&self) -> &[DeleteRule] {
        &self.delete
    }

    /// Name of the engine the rules were compiled with.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = |queries: Vec<(&str, &str)>| {
            queries
                .into_iter()
                .map(|(a, b)| format!("{a} -> {b}"))
                .collect::<Vec<_>>()
        };
        f.debug_struct("RuleSet")
            .field("engine", &self.engine)
            .field(
                "split",
                &sources(
                    self.split
                        .iter()
                        .map(|r| (r.node_query.source(), r.id_query.source()))
                        .collect(),
                ),
            )
            .field(
                "delete",
                &sources(
                    self.delete
                        .iter()
                        .map(|r| (r.node_query.source(), r.flag_query.source()))
                        .collect(),
                ),
            )
            .finish()
    }
}
