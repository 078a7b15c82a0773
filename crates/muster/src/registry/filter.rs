// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Candidate filter expression parser and evaluator.
//!
//! Minimal LDAP-style attribute filters over candidate attributes:
//!
//! ```text
//! filter ::= '(' body ')'
//! body   ::= '&' filter filter+      conjunction
//!          | '|' filter filter+      disjunction
//!          | '!' filter              negation
//!          | attr '=' value          equality ('*' matches presence)
//! ```
//!
//! Built-in attributes `id` and `kind` resolve against the candidate itself;
//! anything else matches the candidate's attribute map. A malformed filter is
//! a first-class terminal error for the key that used it — never retried,
//! never fatal to the rest of a batch.

use super::Candidate;

/// Errors from parsing a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Empty expression.
    EmptyExpression,
    /// Invalid syntax, with a human-readable reason.
    ParseError(String),
    /// Input continues past a complete filter (byte offset of the leftover).
    TrailingInput(usize),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::EmptyExpression => write!(f, "empty filter expression"),
            FilterError::ParseError(msg) => write!(f, "filter parse error: {msg}"),
            FilterError::TrailingInput(pos) => {
                write!(f, "trailing input after filter at offset {pos}")
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Parsed filter node.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    /// `attr=*` — attribute is present, whatever its value.
    Present(String),
    Eq { attr: String, value: String },
}

/// Parsed, evaluatable candidate filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    node: Node,
}

impl Filter {
    /// Parse a filter expression.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FilterError::EmptyExpression);
        }

        let mut parser = Parser::new(trimmed);
        let node = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(FilterError::TrailingInput(parser.pos));
        }

        Ok(Self {
            source: trimmed.to_string(),
            node,
        })
    }

    /// Filter matching exactly one candidate id.
    ///
    /// Built directly as an AST node, so ids containing filter
    /// metacharacters cannot break the expression.
    pub fn for_id(id: &str) -> Self {
        Self {
            source: format!("(id={id})"),
            node: Node::Eq {
                attr: "id".to_string(),
                value: id.to_string(),
            },
        }
    }

    /// Conjunction of this filter with `other`.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        Self {
            source: format!("(&{}{})", self.source, other.source),
            node: Node::And(vec![self.node, other.node]),
        }
    }

    /// Does `candidate` satisfy this filter?
    pub fn matches(&self, candidate: &Candidate) -> bool {
        eval(&self.node, candidate)
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn eval(node: &Node, candidate: &Candidate) -> bool {
    match node {
        Node::And(children) => children.iter().all(|n| eval(n, candidate)),
        Node::Or(children) => children.iter().any(|n| eval(n, candidate)),
        Node::Not(child) => !eval(child, candidate),
        Node::Present(attr) => candidate.attr(attr).is_some(),
        Node::Eq { attr, value } => candidate.attr(attr) == Some(value.as_str()),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), FilterError> {
        match self.bump() {
            Some(ch) if ch == wanted => Ok(()),
            Some(ch) => Err(FilterError::ParseError(format!(
                "expected '{wanted}', found '{ch}' at offset {}",
                self.pos - ch.len_utf8()
            ))),
            None => Err(FilterError::ParseError(format!(
                "expected '{wanted}', found end of input"
            ))),
        }
    }

    fn parse_filter(&mut self) -> Result<Node, FilterError> {
        self.skip_whitespace();
        self.expect('(')?;
        let node = self.parse_body()?;
        self.skip_whitespace();
        self.expect(')')?;
        Ok(node)
    }

    fn parse_body(&mut self) -> Result<Node, FilterError> {
        self.skip_whitespace();
        match self.peek() {
            Some('&') => {
                self.bump();
                Ok(Node::And(self.parse_operands('&')?))
            }
            Some('|') => {
                self.bump();
                Ok(Node::Or(self.parse_operands('|')?))
            }
            Some('!') => {
                self.bump();
                Ok(Node::Not(Box::new(self.parse_filter()?)))
            }
            Some(_) => self.parse_comparison(),
            None => Err(FilterError::ParseError(
                "expected filter body, found end of input".to_string(),
            )),
        }
    }

    /// Two or more sub-filters after '&' or '|'.
    fn parse_operands(&mut self, op: char) -> Result<Vec<Node>, FilterError> {
        let mut operands = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('(') => operands.push(self.parse_filter()?),
                _ => break,
            }
        }
        if operands.len() < 2 {
            return Err(FilterError::ParseError(format!(
                "'{op}' requires at least two operands, found {}",
                operands.len()
            )));
        }
        Ok(operands)
    }

    fn parse_comparison(&mut self) -> Result<Node, FilterError> {
        let attr_start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '=' || ch == '(' || ch == ')' {
                break;
            }
            self.bump();
        }
        let attr = self.input[attr_start..self.pos].trim().to_string();
        if attr.is_empty() {
            return Err(FilterError::ParseError(format!(
                "empty attribute name at offset {attr_start}"
            )));
        }

        self.expect('=')?;

        let value_start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '(' || ch == ')' {
                break;
            }
            self.bump();
        }
        let value = self.input[value_start..self.pos].to_string();

        if value == "*" {
            Ok(Node::Present(attr))
        } else {
            Ok(Node::Eq { attr, value })
        }
    }
}
