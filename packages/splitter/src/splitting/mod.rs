//! Document splitting.
//!
//! Split rules pair a node query with an id query. Every node selected by a
//! node query becomes a derived document whose id is the text selected by the
//! id query, evaluated relative to that node. Derived documents carry the
//! serialized node, a reference to the parent document, and the lineage of
//! their id.

mod engine;
mod fields;
mod lineage;
mod rules;

pub use engine::{SplitOutcome, Splitter};
pub use fields::{propagate_fields, should_copy};
pub use lineage::{generate_lineage, LINEAGE_SEPARATOR};
pub use rules::{CompiledRule, DeleteRule, RuleSet};
