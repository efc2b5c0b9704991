//! Boolean expressions over pointcut definition identifiers.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or    := and (("||" | "or") and)*
//! and   := unary (("&&" | "and") unary)*
//! unary := ("!" | "not") unary | "(" or ")" | IDENT | "true" | "false"
//! ```

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Literal(bool),
    Var(String),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// A compiled expression. Immutable and cheap to share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let root = parser.parse_or()?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(syntax(source, *offset, format!("unexpected {token:?}")));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct identifiers in order of first appearance.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_identifiers(&self.root, &mut out);
        out
    }

    /// Evaluates with `lookup` supplying each identifier's value. Every
    /// identifier is visited so an unbound name is reported regardless of
    /// operand order.
    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<bool>) -> Result<bool, ExpressionError> {
        eval(&self.root, lookup)
    }
}

fn collect_identifiers<'a>(node: &'a Node, out: &mut Vec<&'a str>) {
    match node {
        Node::Literal(_) => {}
        Node::Var(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Node::Not(inner) => collect_identifiers(inner, out),
        Node::And(a, b) | Node::Or(a, b) => {
            collect_identifiers(a, out);
            collect_identifiers(b, out);
        }
    }
}

fn eval(node: &Node, lookup: &dyn Fn(&str) -> Option<bool>) -> Result<bool, ExpressionError> {
    Ok(match node {
        Node::Literal(value) => *value,
        Node::Var(name) => lookup(name).ok_or_else(|| ExpressionError::Unbound(name.clone()))?,
        Node::Not(inner) => !eval(inner, lookup)?,
        Node::And(a, b) => {
            let left = eval(a, lookup)?;
            let right = eval(b, lookup)?;
            left && right
        }
        Node::Or(a, b) => {
            let left = eval(a, lookup)?;
            let right = eval(b, lookup)?;
            left || right
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    True,
    False,
    LParen,
    RParen,
}

fn syntax(source: &str, position: usize, reason: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        expression: source.to_string(),
        position,
        reason: reason.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((offset, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((offset, Token::RParen));
            }
            '!' => {
                chars.next();
                tokens.push((offset, Token::Not));
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, next)) if next == c => {
                        tokens.push((offset, if c == '&' { Token::And } else { Token::Or }));
                    }
                    _ => return Err(syntax(source, offset, format!("expected '{c}{c}'"))),
                }
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match ident.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                };
                tokens.push((offset, token));
            }
            other => return Err(syntax(source, offset, format!("unexpected character '{other}'"))),
        }
    }
    if tokens.is_empty() {
        return Err(syntax(source, 0, "empty expression"));
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.source.len())
    }

    fn parse_or(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ExpressionError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        let offset = self.offset();
        let Some(token) = self.peek().cloned() else {
            return Err(syntax(self.source, offset, "unexpected end of expression"));
        };
        self.pos += 1;
        match token {
            Token::Not => Ok(Node::Not(Box::new(self.parse_unary()?))),
            Token::Ident(name) => Ok(Node::Var(name)),
            Token::True => Ok(Node::Literal(true)),
            Token::False => Ok(Node::Literal(false)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(syntax(self.source, self.offset(), "expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            other => Err(syntax(self.source, offset, format!("unexpected {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval_with(expr: &str, bindings: &[(&str, bool)]) -> Result<bool, ExpressionError> {
        let map: HashMap<&str, bool> = bindings.iter().copied().collect();
        Expression::compile(expr)?.evaluate(&|name| map.get(name).copied())
    }

    #[test]
    fn precedence_not_and_or() {
        assert!(eval_with("a || b && c", &[("a", true), ("b", false), ("c", false)]).unwrap());
        assert!(!eval_with("(a || b) && c", &[("a", true), ("b", false), ("c", false)]).unwrap());
        assert!(eval_with("!a && b", &[("a", false), ("b", true)]).unwrap());
        assert!(!eval_with("not (a or b)", &[("a", false), ("b", true)]).unwrap());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert!(eval_with("a AND NOT b", &[("a", true), ("b", false)]).unwrap());
        assert!(eval_with("TRUE", &[]).unwrap());
    }

    #[test]
    fn unbound_identifier_is_reported_even_when_short_circuitable() {
        let err = eval_with("false && missing", &[]).unwrap_err();
        assert_eq!(err, ExpressionError::Unbound("missing".to_string()));
    }

    #[test]
    fn identifiers_are_listed_once_in_order() {
        let expr = Expression::compile("pc1 && (pc2 || !pc1) && aspect.pc3").unwrap();
        assert_eq!(expr.identifiers(), vec!["pc1", "pc2", "aspect.pc3"]);
    }

    #[test]
    fn malformed_expressions_fail_to_compile() {
        for bad in ["", "a &&", "(a || b", "a b", "a & b", "a || )", "a # b"] {
            assert!(
                matches!(Expression::compile(bad), Err(ExpressionError::Syntax { .. })),
                "{bad} should not compile"
            );
        }
    }
}
