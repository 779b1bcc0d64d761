//! Recursive-descent parser producing the query syntax tree.
//!
//! Prefixed names are resolved against the namespace table while parsing, so
//! a compiled query carries namespace URIs and never looks up a prefix again.

use super::lexer::Token;
use super::namespace::NamespaceTable;

/// Navigation axis of a location step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Attribute,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "child" => Some(Self::Child),
            "attribute" => Some(Self::Attribute),
            "descendant" => Some(Self::Descendant),
            "descendant-or-self" => Some(Self::DescendantOrSelf),
            "self" => Some(Self::SelfNode),
            "parent" => Some(Self::Parent),
            _ => None,
        }
    }
}

/// Test applied to each node reached along an axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeTest {
    /// Expanded name; `namespace` is `None` for unprefixed names
    Name {
        namespace: Option<String>,
        local: String,
    },
    /// `*`
    Wildcard,
    /// `prefix:*`
    NamespaceWildcard(String),
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `node()`
    AnyNode,
}

/// One step of a location path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

/// A location path, absolute or relative to the context node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Not,
    Position,
    Last,
    Count,
    Contains,
    StartsWith,
    True,
    False,
    LocalName,
    NormalizeSpace,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "not" => Some(Self::Not),
            "position" => Some(Self::Position),
            "last" => Some(Self::Last),
            "count" => Some(Self::Count),
            "contains" => Some(Self::Contains),
            "starts-with" => Some(Self::StartsWith),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "local-name" => Some(Self::LocalName),
            "normalize-space" => Some(Self::NormalizeSpace),
            _ => None,
        }
    }

    /// Accepted argument counts, inclusive.
    fn arity(self) -> (usize, usize) {
        match self {
            Self::Position | Self::Last | Self::True | Self::False => (0, 0),
            Self::Not | Self::Count => (1, 1),
            Self::Contains | Self::StartsWith => (2, 2),
            Self::LocalName | Self::NormalizeSpace => (0, 1),
        }
    }
}

/// Query expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Union(Vec<Expr>),
    Path(LocationPath),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Whether evaluation always yields a node set.
    pub(crate) fn is_node_set(&self) -> bool {
        match self {
            Expr::Path(_) => true,
            Expr::Union(parts) => parts.iter().all(Expr::is_node_set),
            _ => false,
        }
    }
}

/// Parse a token stream into an expression.
pub(crate) fn parse(tokens: Vec<Token>, namespaces: &NamespaceTable) -> Result<Expr, String> {
    if tokens.is_empty() {
        return Err("query is empty".to_string());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        namespaces,
    };
    let expr = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        return Err(format!("unexpected '{token}' after end of expression"));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: Vec<Token>,
    pos: usize,
    namespaces: &'t NamespaceTable,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected '{expected}' but found '{token}'")),
            None => Err(format!("expected '{expected}' but query ended")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek().is_some_and(|t| t.is_name("or")) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.peek().is_some_and(|t| t.is_name("and")) {
            self.pos += 1;
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::NotEq) => CmpOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_union()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::LtEq) => CmpOp::LtEq,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::GtEq) => CmpOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_union()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_union(&mut self) -> Result<Expr, String> {
        let first = self.parse_path_or_primary()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }

        let mut parts = vec![first];
        while self.eat(&Token::Pipe) {
            parts.push(self.parse_path_or_primary()?);
        }
        if !parts.iter().all(Expr::is_node_set) {
            return Err("union operands must be location paths".to_string());
        }
        Ok(Expr::Union(parts))
    }

    fn parse_path_or_primary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            None => Err("unexpected end of query".to_string()),
            Some(Token::Literal(_)) | Some(Token::Number(_)) | Some(Token::LParen) => {
                self.parse_primary()
            }
            Some(Token::Name { prefix: None, local })
                if self.peek_at(1) == Some(&Token::LParen) && !is_node_type(local) =>
            {
                self.parse_primary()
            }
            Some(_) => Ok(Expr::Path(self.parse_location_path()?)),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name {
                prefix: None,
                local,
            }) => self.parse_call(&local),
            Some(token) => Err(format!("unexpected '{token}'")),
            None => Err("unexpected end of query".to_string()),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, String> {
        let function =
            Function::from_name(name).ok_or_else(|| format!("unknown function '{name}()'"))?;
        self.expect(&Token::LParen)?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen)?;
                break;
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(format!(
                "function '{name}()' takes {} but was given {}",
                describe_arity(min, max),
                args.len()
            ));
        }
        if matches!(function, Function::Count) && !args[0].is_node_set() {
            return Err("count() expects a location path".to_string());
        }
        if matches!(function, Function::LocalName) && args.first().is_some_and(|a| !a.is_node_set())
        {
            return Err("local-name() expects a location path".to_string());
        }

        Ok(Expr::Call(function, args))
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, String> {
        let mut steps = Vec::new();

        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.at_step_start() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                break;
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name { .. }) | Some(Token::At) | Some(Token::Dot) | Some(Token::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let (Some(Token::Name { prefix: None, local }), Some(Token::ColonColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(local).ok_or_else(|| format!("unsupported axis '{local}'"))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Name { prefix: None, local })
                if is_node_type(&local) && self.peek() == Some(&Token::LParen) =>
            {
                self.pos += 1;
                self.expect(&Token::RParen)?;
                Ok(match local.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::AnyNode,
                })
            }
            Some(Token::Name { prefix: None, local }) if local == "*" => Ok(NodeTest::Wildcard),
            Some(Token::Name { prefix: None, local }) => Ok(NodeTest::Name {
                namespace: None,
                local,
            }),
            Some(Token::Name {
                prefix: Some(prefix),
                local,
            }) => {
                let uri = self
                    .namespaces
                    .resolve(&prefix)
                    .ok_or_else(|| format!("namespace prefix '{prefix}' is not bound"))?
                    .to_string();
                if local == "*" {
                    Ok(NodeTest::NamespaceWildcard(uri))
                } else {
                    Ok(NodeTest::Name {
                        namespace: Some(uri),
                        local,
                    })
                }
            }
            Some(token) => Err(format!("expected a node test but found '{token}'")),
            None => Err("unexpected end of query".to_string()),
        }
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "text" | "node" | "comment")
}

fn describe_arity(min: usize, max: usize) -> String {
    match (min, max) {
        (0, 0) => "no arguments".to_string(),
        (1, 1) => "1 argument".to_string(),
        (min, max) if min == max => format!("{min} arguments"),
        (min, max) => format!("{min} to {max} arguments"),
    }
}
