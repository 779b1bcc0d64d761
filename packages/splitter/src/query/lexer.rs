//! Query tokenization.
//!
//! Converts a path query string into a flat token stream. Operator names
//! (`and`, `or`) and node-type tests are lexed as plain names and told apart
//! by the parser from their position.

use std::fmt;

/// A token of a path query.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    At,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Pipe,
    Comma,
    Dot,
    DotDot,
    ColonColon,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// A quoted string literal, quotes removed
    Literal(String),
    /// A numeric literal
    Number(f64),
    /// A possibly prefixed name; `local` is `*` for wildcards
    Name {
        prefix: Option<String>,
        local: String,
    },
}

impl Token {
    /// Whether this token is the unprefixed name `name`.
    pub(crate) fn is_name(&self, name: &str) -> bool {
        matches!(self, Token::Name { prefix: None, local } if local == name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::At => f.write_str("@"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Pipe => f.write_str("|"),
            Token::Comma => f.write_str(","),
            Token::Dot => f.write_str("."),
            Token::DotDot => f.write_str(".."),
            Token::ColonColon => f.write_str("::"),
            Token::Eq => f.write_str("="),
            Token::NotEq => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::LtEq => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::GtEq => f.write_str(">="),
            Token::Literal(s) => write!(f, "'{s}'"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Name {
                prefix: Some(p),
                local,
            } => write!(f, "{p}:{local}"),
            Token::Name {
                prefix: None,
                local,
            } => f.write_str(local),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Tokenize a query string.
///
/// Returns a description of the first lexical error.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::ColonColon);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Name {
                    prefix: None,
                    local: "*".to_string(),
                });
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let Some(len) = chars[start..].iter().position(|&ch| ch == quote) else {
                    return Err(format!("unterminated string literal at offset {i}"));
                };
                tokens.push(Token::Literal(chars[start..start + len].iter().collect()));
                i = start + len + 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '.' | '0'..='9' => {
                let start = i;
                let mut seen_dot = false;
                while i < chars.len() {
                    match chars[i] {
                        '0'..='9' => i += 1,
                        '.' if !seen_dot => {
                            seen_dot = true;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}' at offset {start}"))?;
                tokens.push(Token::Number(value));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let first: String = chars[start..i].iter().collect();

                // `prefix:local` or `prefix:*`, but not an axis separator.
                let is_qualified = chars.get(i) == Some(&':')
                    && chars
                        .get(i + 1)
                        .is_some_and(|&n| n == '*' || is_name_start(n));

                if is_qualified {
                    i += 1;
                    let local = if chars[i] == '*' {
                        i += 1;
                        "*".to_string()
                    } else {
                        let local_start = i;
                        while i < chars.len() && is_name_char(chars[i]) {
                            i += 1;
                        }
                        chars[local_start..i].iter().collect()
                    };
                    tokens.push(Token::Name {
                        prefix: Some(first),
                        local,
                    });
                } else {
                    tokens.push(Token::Name {
                        prefix: None,
                        local: first,
                    });
                }
            }
            other => {
                return Err(format!("unexpected character '{other}' at offset {i}"));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(local: &str) -> Token {
        Token::Name {
            prefix: None,
            local: local.to_string(),
        }
    }

    #[test]
    fn test_tokenize_simple_path() {
        let tokens = tokenize("/docs/doc").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Slash, name("docs"), Token::Slash, name("doc")]
        );
    }

    #[test]
    fn test_tokenize_predicate_and_attribute() {
        let tokens = tokenize("//doc[@id != '1']").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::DoubleSlash,
                name("doc"),
                Token::LBracket,
                Token::At,
                name("id"),
                Token::NotEq,
                Token::Literal("1".to_string()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_tokenize_prefixed_names_and_axes() {
        let tokens = tokenize("m:*/child::m:item").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name {
                    prefix: Some("m".to_string()),
                    local: "*".to_string()
                },
                Token::Slash,
                name("child"),
                Token::ColonColon,
                Token::Name {
                    prefix: Some("m".to_string()),
                    local: "item".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tokenize_dots_and_numbers() {
        let tokens = tokenize("../x[.5 <= 2.25]/.").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::DotDot,
                Token::Slash,
                name("x"),
                Token::LBracket,
                Token::Number(0.5),
                Token::LtEq,
                Token::Number(2.25),
                Token::RBracket,
                Token::Slash,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn test_tokenize_hyphenated_function_name() {
        let tokens = tokenize("starts-with(@id, \"a\")").unwrap();
        assert_eq!(tokens[0], name("starts-with"));
        assert_eq!(tokens[5], Token::Literal("a".to_string()));
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("/doc[@id='1]").unwrap_err().contains("unterminated"));
        assert!(tokenize("/doc#").unwrap_err().contains("'#'"));
        assert!(tokenize("a ! b").is_err());
    }
}
