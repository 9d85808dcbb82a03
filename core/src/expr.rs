//! Boolean condition expressions over sibling keyword values.
//!
//! Blocs are gated by conditions such as `PHENOMENON == 'THERMAL'` or
//! `exists(TABLE) and INFO in (1, 2)`. A [`Condition`] is parsed once and
//! evaluated against a [`Context`] mapping keyword names to their current
//! (possibly defaulted) values.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := primary (("==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not in") primary)?
//! primary := number | string | True | False | None | NAME
//!          | "exists" "(" NAME ")" | "(" ")" | "(" or ("," or)* ","? ")"
//! ```
//!
//! # Examples
//!
//! ```
//! use command_params_core::{Condition, Context};
//! use serde_json::json;
//!
//! let condition = Condition::parse("METHOD == 'MUMPS' and not exists(PRECOND)").unwrap();
//!
//! let mut context = Context::new();
//! context.insert("METHOD".into(), json!("MUMPS"));
//! assert!(condition.evaluate(&context));
//!
//! context.insert("PRECOND".into(), json!("LDLT"));
//! assert!(!condition.evaluate(&context));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Context, Document};

/// Condition parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// A character that starts no token.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    /// A string literal without its closing quote.
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    /// A numeric literal that does not parse.
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
    /// A token in the wrong place.
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },
    /// Input ended in the middle of an expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Document),
    Name(String),
    Tuple(Vec<Expr>),
    Exists(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Real(f64),
    Str(String),
    Ident(String),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(v) => write!(f, "number {v}"),
            Token::Real(v) => write!(f, "number {v}"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Op(op) => write!(f, "operator {op:?}"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let two = |op: CompareOp| (Token::Op(op), 2usize);
        let (token, width) = match (ch, next) {
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('=', Some('=')) => two(CompareOp::Eq),
            ('!', Some('=')) => two(CompareOp::Ne),
            ('<', Some('=')) => two(CompareOp::Le),
            ('>', Some('=')) => two(CompareOp::Ge),
            ('<', _) => (Token::Op(CompareOp::Lt), 1),
            ('>', _) => (Token::Op(CompareOp::Gt), 1),
            ('\'' | '"', _) => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|(_, c)| *c == ch)
                    .ok_or(ExprError::UnterminatedString(offset))?;
                let text: String = chars[i + 1..i + 1 + end].iter().map(|(_, c)| c).collect();
                (Token::Str(text), end + 2)
            }
            (c, _)
                if c.is_ascii_digit()
                    || c == '.'
                    || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let len = chars[i + 1..]
                    .iter()
                    .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
                    .count()
                    + 1;
                let text: String = chars[i..i + len].iter().map(|(_, c)| c).collect();
                let token = if let Ok(v) = text.parse::<i64>() {
                    Token::Int(v)
                } else if let Ok(v) = text.parse::<f64>() {
                    Token::Real(v)
                } else {
                    return Err(ExprError::InvalidNumber(text));
                };
                (token, len)
            }
            (c, _) if c.is_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
                    .count();
                let text: String = chars[i..i + len].iter().map(|(_, c)| c).collect();
                (Token::Ident(text), len)
            }
            (c, _) => return Err(ExprError::UnexpectedChar { ch: c, offset }),
        };

        tokens.push((token, offset));
        i += width;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(t, _)| t)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn advance(&mut self) -> Result<Token, ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some((token, offset)) => ExprError::UnexpectedToken {
                found: token.to_string(),
                offset: *offset,
            },
            None => ExprError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek_ident("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.peek_ident("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.peek_ident("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            Some(Token::Ident(s)) if s == "in" => CompareOp::In,
            Some(Token::Ident(s))
                if s == "not" && matches!(self.peek_at(1), Some(Token::Ident(n)) if n == "in") =>
            {
                self.pos += 1;
                CompareOp::NotIn
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        if self.peek().is_none() {
            return Err(ExprError::UnexpectedEnd);
        }
        let start = self.pos;
        match self.advance()? {
            Token::Int(v) => Ok(Expr::Literal(Document::from(v))),
            Token::Real(v) => Ok(Expr::Literal(Document::from(v))),
            Token::Str(s) => Ok(Expr::Literal(Document::String(s))),
            Token::Ident(name) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(Document::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Document::Bool(false))),
                "None" | "null" => Ok(Expr::Literal(Document::Null)),
                "and" | "or" | "not" | "in" => {
                    self.pos = start;
                    Err(self.unexpected())
                }
                "exists" if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let name = match self.advance()? {
                        Token::Ident(name) => name,
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected());
                        }
                    };
                    self.expect(Token::RParen)?;
                    Ok(Expr::Exists(name))
                }
                _ => Ok(Expr::Name(name)),
            },
            Token::LParen => {
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_or()?;
                if self.peek() != Some(&Token::Comma) {
                    self.expect(Token::RParen)?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    if self.peek() == Some(&Token::RParen) {
                        break;
                    }
                    items.push(self.parse_or()?);
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Tuple(items))
            }
            _ => {
                self.pos = start;
                Err(self.unexpected())
            }
        }
    }
}

/// A parsed bloc condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parses a condition.
    ///
    /// # Errors
    ///
    /// Returns an [`ExprError`] describing the first syntax problem.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.peek().is_some() {
            return Err(parser.unexpected());
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Returns the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed expression tree.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the condition. Names missing from `context` are `None`.
    pub fn evaluate(&self, context: &Context) -> bool {
        truthy(&eval(&self.expr, context))
    }

    /// Returns every keyword name the condition reads, in order of first
    /// appearance.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_params_core::Condition;
    ///
    /// let condition = Condition::parse("A == 1 or (B in (2, 3) and exists(A))").unwrap();
    /// assert_eq!(condition.names(), vec!["A", "B"]);
    /// ```
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_names(&self.expr, &mut names);
        names
    }
}

impl FromStr for Condition {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn collect_names<'a>(expr: &'a Expr, names: &mut Vec<&'a str>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Name(name) | Expr::Exists(name) => {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        Expr::Tuple(items) => items.iter().for_each(|e| collect_names(e, names)),
        Expr::Not(inner) => collect_names(inner, names),
        Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(_, a, b) => {
            collect_names(a, names);
            collect_names(b, names);
        }
    }
}

fn eval(expr: &Expr, context: &Context) -> Document {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Name(name) => context.get(name).cloned().unwrap_or(Document::Null),
        Expr::Tuple(items) => Document::Array(items.iter().map(|e| eval(e, context)).collect()),
        Expr::Exists(name) => Document::Bool(context.get(name).is_some_and(|v| !v.is_null())),
        Expr::Not(inner) => Document::Bool(!truthy(&eval(inner, context))),
        Expr::And(a, b) => Document::Bool(truthy(&eval(a, context)) && truthy(&eval(b, context))),
        Expr::Or(a, b) => Document::Bool(truthy(&eval(a, context)) || truthy(&eval(b, context))),
        Expr::Compare(op, a, b) => {
            let left = eval(a, context);
            let right = eval(b, context);
            Document::Bool(compare(*op, &left, &right))
        }
    }
}

fn truthy(value: &Document) -> bool {
    match value {
        Document::Null => false,
        Document::Bool(b) => *b,
        Document::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Document::String(s) => !s.is_empty(),
        Document::Array(items) => !items.is_empty(),
        Document::Object(map) => !map.is_empty(),
    }
}

/// Equality with numbers compared by value (`1 == 1.0`).
pub(crate) fn values_equal(a: &Document, b: &Document) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn ordering(a: &Document, b: &Document) -> Option<Ordering> {
    match (a, b) {
        (Document::Number(_), Document::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Document::String(x), Document::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(op: CompareOp, left: &Document, right: &Document) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => !contains(right, left),
    }
}

fn contains(haystack: &Document, needle: &Document) -> bool {
    match (haystack, needle) {
        (Document::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Document::String(text), Document::String(part)) => text.contains(part.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(pairs: &[(&str, Document)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_equality_against_missing_name_is_false() {
        let condition = Condition::parse("X == 1").unwrap();
        assert!(!condition.evaluate(&Context::new()));
        assert!(condition.evaluate(&context(&[("X", json!(1))])));
        assert!(condition.evaluate(&context(&[("X", json!(1.0))])));
    }

    #[test]
    fn test_precedence_of_and_over_or() {
        let condition = Condition::parse("A == 1 or B == 2 and C == 3").unwrap();
        assert!(condition.evaluate(&context(&[("A", json!(1))])));
        assert!(!condition.evaluate(&context(&[("B", json!(2))])));
        assert!(condition.evaluate(&context(&[("B", json!(2)), ("C", json!(3))])));
    }

    #[test]
    fn test_membership_and_not_in() {
        let condition = Condition::parse("MODE in ('A', 'B')").unwrap();
        assert!(condition.evaluate(&context(&[("MODE", json!("B"))])));
        assert!(!condition.evaluate(&context(&[("MODE", json!("C"))])));

        let negated = Condition::parse("MODE not in ('A', 'B')").unwrap();
        assert!(negated.evaluate(&context(&[("MODE", json!("C"))])));
    }

    #[test]
    fn test_none_comparison_and_exists() {
        let condition = Condition::parse("TABLE == None").unwrap();
        assert!(condition.evaluate(&Context::new()));

        let exists = Condition::parse("not exists(TABLE)").unwrap();
        assert!(exists.evaluate(&Context::new()));
        assert!(!exists.evaluate(&context(&[("TABLE", json!("t1"))])));
    }

    #[test]
    fn test_ordering_between_mixed_kinds_is_false() {
        let condition = Condition::parse("X > 2").unwrap();
        assert!(!condition.evaluate(&context(&[("X", json!("text"))])));
        assert!(condition.evaluate(&context(&[("X", json!(2.5))])));
    }

    #[test]
    fn test_single_element_tuple_and_negative_numbers() {
        let condition = Condition::parse("X in (-1,)").unwrap();
        assert!(condition.evaluate(&context(&[("X", json!(-1))])));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Condition::parse("X == 'abc"),
            Err(ExprError::UnterminatedString(5))
        );
        assert_eq!(Condition::parse("X =="), Err(ExprError::UnexpectedEnd));
        assert!(matches!(
            Condition::parse("X == 1 )"),
            Err(ExprError::UnexpectedToken { offset: 7, .. })
        ));
        assert!(matches!(
            Condition::parse("X # 1"),
            Err(ExprError::UnexpectedChar { ch: '#', .. })
        ));
    }
}
