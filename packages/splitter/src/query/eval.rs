//! Query evaluation over roxmltree documents.
//!
//! Values follow XPath 1.0 typing: node sets, strings, numbers and booleans,
//! with the usual conversions between them. Node sets are kept sorted in
//! document order without duplicates after every step.

use roxmltree::Node;

use super::parser::{Axis, CmpOp, Expr, Function, LocationPath, NodeTest, Step};
use super::QueryItem;

/// Result of evaluating an expression.
#[derive(Debug, Clone)]
pub(crate) enum Value<'a, 'input> {
    Nodes(Vec<QueryItem<'a, 'input>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value<'_, '_> {
    fn to_bool(&self) -> bool {
        match self {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn to_num(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Str(s) => parse_number(s),
            Value::Nodes(_) => parse_number(&self.to_str()),
        }
    }

    fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Nodes(items) => items.first().map(QueryItem::string_value).unwrap_or_default(),
        }
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Evaluation context: the context item plus its position within the
/// current node set (1-based) and that set's size.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a, 'input> {
    pub item: QueryItem<'a, 'input>,
    pub position: usize,
    pub size: usize,
}

impl<'a, 'input> Context<'a, 'input> {
    /// Context for evaluating a top-level query against a node.
    pub(crate) fn root(node: Node<'a, 'input>) -> Self {
        Self {
            item: QueryItem::Node(node),
            position: 1,
            size: 1,
        }
    }
}

/// Evaluate an expression in a context.
pub(crate) fn evaluate<'a, 'input>(
    expr: &Expr,
    ctx: &Context<'a, 'input>,
) -> Result<Value<'a, 'input>, String> {
    match expr {
        Expr::Or(left, right) => {
            Ok(Value::Bool(evaluate(left, ctx)?.to_bool() || evaluate(right, ctx)?.to_bool()))
        }
        Expr::And(left, right) => {
            Ok(Value::Bool(evaluate(left, ctx)?.to_bool() && evaluate(right, ctx)?.to_bool()))
        }
        Expr::Compare(op, left, right) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            Ok(Value::Bool(compare(*op, &left, &right)))
        }
        Expr::Union(parts) => {
            let mut items = Vec::new();
            for part in parts {
                match evaluate(part, ctx)? {
                    Value::Nodes(nodes) => items.extend(nodes),
                    _ => return Err("union operand did not evaluate to a node set".to_string()),
                }
            }
            sort_document_order(&mut items);
            Ok(Value::Nodes(items))
        }
        Expr::Path(path) => evaluate_path(path, ctx).map(Value::Nodes),
        Expr::Literal(s) => Ok(Value::Str(s.clone())),
        Expr::Number(n) => Ok(Value::Num(*n)),
        Expr::Call(function, args) => call(*function, args, ctx),
    }
}

fn call<'a, 'input>(
    function: Function,
    args: &[Expr],
    ctx: &Context<'a, 'input>,
) -> Result<Value<'a, 'input>, String> {
    let arg = |index: usize| -> Result<Value<'a, 'input>, String> {
        match args.get(index) {
            Some(expr) => evaluate(expr, ctx),
            None => Err(format!("missing argument {}", index + 1)),
        }
    };

    let value = match function {
        Function::Not => Value::Bool(!arg(0)?.to_bool()),
        Function::True => Value::Bool(true),
        Function::False => Value::Bool(false),
        Function::Position => Value::Num(ctx.position as f64),
        Function::Last => Value::Num(ctx.size as f64),
        Function::Count => match arg(0)? {
            Value::Nodes(items) => Value::Num(items.len() as f64),
            _ => return Err("count() argument is not a node set".to_string()),
        },
        Function::Contains => Value::Bool(arg(0)?.to_str().contains(&arg(1)?.to_str())),
        Function::StartsWith => Value::Bool(arg(0)?.to_str().starts_with(&arg(1)?.to_str())),
        Function::LocalName => {
            let item = if args.is_empty() {
                Some(ctx.item)
            } else {
                match arg(0)? {
                    Value::Nodes(items) => items.first().copied(),
                    _ => return Err("local-name() argument is not a node set".to_string()),
                }
            };
            Value::Str(item.map(|i| i.local_name()).unwrap_or_default())
        }
        Function::NormalizeSpace => {
            let text = if args.is_empty() {
                ctx.item.string_value()
            } else {
                arg(0)?.to_str()
            };
            Value::Str(text.split_whitespace().collect::<Vec<_>>().join(" "))
        }
    };
    Ok(value)
}

fn evaluate_path<'a, 'input>(
    path: &LocationPath,
    ctx: &Context<'a, 'input>,
) -> Result<Vec<QueryItem<'a, 'input>>, String> {
    let mut current = if path.absolute {
        vec![QueryItem::Node(ctx.item.node().document().root())]
    } else {
        vec![ctx.item]
    };

    for step in &path.steps {
        let mut next = Vec::new();
        for item in &current {
            next.extend(evaluate_step(step, *item)?);
        }
        sort_document_order(&mut next);
        current = next;
    }

    Ok(current)
}

fn evaluate_step<'a, 'input>(
    step: &Step,
    item: QueryItem<'a, 'input>,
) -> Result<Vec<QueryItem<'a, 'input>>, String> {
    let mut candidates: Vec<QueryItem<'a, 'input>> = axis_items(step.axis, item)
        .into_iter()
        .filter(|candidate| matches_test(&step.test, step.axis, *candidate))
        .collect();

    for predicate in &step.predicates {
        let size = candidates.len();
        let mut kept = Vec::with_capacity(size);
        for (index, candidate) in candidates.into_iter().enumerate() {
            let ctx = Context {
                item: candidate,
                position: index + 1,
                size,
            };
            let keep = match evaluate(predicate, &ctx)? {
                Value::Num(n) => n == (index + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(candidate);
            }
        }
        candidates = kept;
    }

    Ok(candidates)
}

fn axis_items<'a, 'input>(axis: Axis, item: QueryItem<'a, 'input>) -> Vec<QueryItem<'a, 'input>> {
    let node = match item {
        QueryItem::Node(node) => node,
        QueryItem::Attribute { owner, .. } => {
            return match axis {
                Axis::SelfNode | Axis::DescendantOrSelf => vec![item],
                Axis::Parent => vec![QueryItem::Node(owner)],
                Axis::Child | Axis::Attribute | Axis::Descendant => Vec::new(),
            };
        }
    };

    match axis {
        Axis::Child => node.children().map(QueryItem::Node).collect(),
        Axis::Descendant => node.descendants().skip(1).map(QueryItem::Node).collect(),
        Axis::DescendantOrSelf => node.descendants().map(QueryItem::Node).collect(),
        Axis::SelfNode => vec![item],
        Axis::Parent => node.parent().map(QueryItem::Node).into_iter().collect(),
        Axis::Attribute => (0..node.attributes().count())
            .map(|index| QueryItem::Attribute { owner: node, index })
            .collect(),
    }
}

fn matches_test(test: &NodeTest, axis: Axis, item: QueryItem<'_, '_>) -> bool {
    match item {
        QueryItem::Attribute { owner, index } => {
            let Some(attr) = owner.attributes().nth(index) else {
                return false;
            };
            match test {
                NodeTest::AnyNode | NodeTest::Wildcard => true,
                NodeTest::NamespaceWildcard(uri) => attr.namespace() == Some(uri.as_str()),
                NodeTest::Name { namespace, local } => {
                    attr.name() == local.as_str() && attr.namespace() == namespace.as_deref()
                }
                NodeTest::Text | NodeTest::Comment => false,
            }
        }
        QueryItem::Node(node) => {
            // Name tests select the principal node type, which is never an
            // attribute node for the axes that yield tree nodes.
            let principal = axis != Axis::Attribute && node.is_element();
            match test {
                NodeTest::AnyNode => true,
                NodeTest::Text => node.is_text(),
                NodeTest::Comment => node.is_comment(),
                NodeTest::Wildcard => principal,
                NodeTest::NamespaceWildcard(uri) => {
                    principal && node.tag_name().namespace() == Some(uri.as_str())
                }
                NodeTest::Name { namespace, local } => {
                    principal
                        && node.tag_name().name() == local.as_str()
                        && node.tag_name().namespace() == namespace.as_deref()
                }
            }
        }
    }
}

fn sort_document_order(items: &mut Vec<QueryItem<'_, '_>>) {
    items.sort_by_key(QueryItem::order_key);
    items.dedup_by_key(|item| item.order_key());
}

fn compare(op: CmpOp, left: &Value<'_, '_>, right: &Value<'_, '_>) -> bool {
    match (left, right) {
        (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| {
            let a = Value::Str(a.string_value());
            r.iter()
                .any(|b| compare_scalars(op, &a, &Value::Str(b.string_value())))
        }),
        (Value::Nodes(nodes), other) => compare_with_set(op, nodes, other, false),
        (other, Value::Nodes(nodes)) => compare_with_set(op, nodes, other, true),
        (l, r) => compare_scalars(op, l, r),
    }
}

/// Compare each member of a node set against a scalar; true if any matches.
fn compare_with_set(
    op: CmpOp,
    nodes: &[QueryItem<'_, '_>],
    scalar: &Value<'_, '_>,
    set_on_right: bool,
) -> bool {
    let ordered = |a: &Value<'_, '_>, b: &Value<'_, '_>| {
        if set_on_right {
            compare_scalars(op, b, a)
        } else {
            compare_scalars(op, a, b)
        }
    };

    if let Value::Bool(_) = scalar {
        return ordered(&Value::Bool(!nodes.is_empty()), scalar);
    }

    nodes.iter().any(|node| {
        let member = match scalar {
            Value::Num(_) => Value::Num(parse_number(&node.string_value())),
            _ => Value::Str(node.string_value()),
        };
        ordered(&member, scalar)
    })
}

fn compare_scalars(op: CmpOp, left: &Value<'_, '_>, right: &Value<'_, '_>) -> bool {
    match op {
        CmpOp::Eq | CmpOp::NotEq => {
            let equal = if matches!(left, Value::Bool(_)) || matches!(right, Value::Bool(_)) {
                left.to_bool() == right.to_bool()
            } else if matches!(left, Value::Num(_)) || matches!(right, Value::Num(_)) {
                left.to_num() == right.to_num()
            } else {
                left.to_str() == right.to_str()
            };
            if op == CmpOp::Eq {
                equal
            } else {
                !equal
            }
        }
        CmpOp::Lt => left.to_num() < right.to_num(),
        CmpOp::LtEq => left.to_num() <= right.to_num(),
        CmpOp::Gt => left.to_num() > right.to_num(),
        CmpOp::GtEq => left.to_num() >= right.to_num(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;
    use crate::query::namespace::NamespaceTable;
    use crate::query::parser::parse;
    use roxmltree::Document;

    fn eval_at<'a, 'input>(query: &str, node: Node<'a, 'input>) -> Value<'a, 'input> {
        let expr = parse(tokenize(query).unwrap(), &NamespaceTable::new()).unwrap();
        evaluate(&expr, &Context::root(node)).unwrap()
    }

    fn strings(value: Value<'_, '_>) -> Vec<String> {
        match value {
            Value::Nodes(items) => items.iter().map(QueryItem::string_value).collect(),
            other => panic!("expected node set, got {other:?}"),
        }
    }

    const XML: &str = r#"<docs><doc id="1" n="5">a</doc><doc id="2" n="12">b</doc><x/><doc id="3">c</doc></docs>"#;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_conversions() {
        assert!(Value::Str("x".into()).to_bool());
        assert!(!Value::Str(String::new()).to_bool());
        assert!(!Value::Num(f64::NAN).to_bool());
        assert_eq!(Value::Str(" 4 ".into()).to_num(), 4.0);
        assert!(Value::Str("four".into()).to_num().is_nan());
        assert_eq!(Value::Bool(true).to_num(), 1.0);
    }

    #[test]
    fn test_child_path_and_position() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();

        assert_eq!(strings(eval_at("doc", root)), vec!["a", "b", "c"]);
        assert_eq!(strings(eval_at("doc[2]", root)), vec!["b"]);
        assert_eq!(strings(eval_at("doc[last()]", root)), vec!["c"]);
        assert_eq!(strings(eval_at("doc[position() > 1]/@id", root)), vec!["2", "3"]);
    }

    #[test]
    fn test_comparisons_follow_node_set_semantics() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();

        // Numeric comparison, not string comparison: 12 > 6 but "12" < "6".
        assert_eq!(strings(eval_at("doc[@n > 6]", root)), vec!["b"]);
        assert_eq!(strings(eval_at("doc[@id = '3' or @n = 5]", root)), vec!["a", "c"]);
        assert_eq!(strings(eval_at("doc[@n != 5]", root)), vec!["b"]);
        assert_eq!(strings(eval_at("doc[not(@n)]", root)), vec!["c"]);
    }

    #[test]
    fn test_functions() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();

        assert!(eval_at("count(doc) = 3", root).to_bool());
        assert!(eval_at("contains(doc[2], 'b')", root).to_bool());
        assert!(eval_at("starts-with(local-name(), 'do')", root).to_bool());
        assert_eq!(eval_at("normalize-space('  a   b ')", root).to_str(), "a b");
    }

    #[test]
    fn test_absolute_and_parent_paths() {
        let doc = Document::parse(XML).unwrap();
        let second = doc.root_element().children().nth(1).unwrap();

        assert_eq!(strings(eval_at("/docs/x", second)).len(), 1);
        assert_eq!(strings(eval_at("../doc[1]/@id", second)), vec!["1"]);
        assert_eq!(strings(eval_at(".", second)), vec!["b"]);
        assert_eq!(strings(eval_at("@id/..", second)), vec!["b"]);
    }

    #[test]
    fn test_union_is_sorted_and_deduplicated() {
        let doc = Document::parse(XML).unwrap();
        let root = doc.root_element();

        let result = strings(eval_at("doc[3] | doc[1] | doc[@id='1']", root));
        assert_eq!(result, vec!["a", "c"]);
    }

    #[test]
    fn test_descendant_text_nodes() {
        let doc = Document::parse("<a>x<b>y</b><!--c--></a>").unwrap();
        let root = doc.root_element();

        assert_eq!(strings(eval_at(".//text()", root)), vec!["x", "y"]);
        assert_eq!(strings(eval_at("descendant::node()", root)).len(), 4);
        assert_eq!(strings(eval_at("comment()", root)), vec!["c"]);
    }

    #[test]
    fn test_descendant_predicate_is_per_parent() {
        let doc = Document::parse("<r><g><i>1</i><i>2</i></g><g><i>3</i></g></r>").unwrap();
        let root = doc.root_element();

        assert_eq!(strings(eval_at("//i[1]", root)), vec!["1", "3"]);
    }
}
