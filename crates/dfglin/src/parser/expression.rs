use super::scanner::{ScanError, Scanner};
use crate::ir::{ConstantKind, Node, OperatorKind};
use serde::Serialize;
use std::cell::Cell;
use std::ops::Range;
use thiserror::Error;

const EXCERPT_LEN: usize = 48;

/// Deepest expression nesting the parser accepts. A deeper tree is rejected
/// as `MalformedExpression` with reason "nesting too deep", so every tree the
/// parser produces is safe for the recursive walks over `Node`.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExpressionError {
    #[error("Malformed expression at byte {offset}: {reason} in `{}`", excerpt(.span))]
    MalformedExpression {
        span: String,
        offset: usize,
        reason: String,
    },

    #[error("Unknown construct `{tag}` at byte {offset}")]
    UnknownConstruct { tag: String, offset: usize },

    #[error("Unknown operator kind `{token}` at byte {offset}")]
    UnknownOperatorKind { token: String, offset: usize },
}

impl ExpressionError {
    pub fn offset(&self) -> usize {
        match self {
            ExpressionError::MalformedExpression { offset, .. }
            | ExpressionError::UnknownConstruct { offset, .. }
            | ExpressionError::UnknownOperatorKind { offset, .. } => *offset,
        }
    }
}

fn excerpt(span: &str) -> String {
    let span = span.trim();
    match span.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &span[..cut]),
        None => span.to_string(),
    }
}

/// Parses a single textual expression such as `(Operator Plus Next:(Terminal a),(IntConst 1))`.
pub fn parse_expression(text: &str) -> Result<Node, ExpressionError> {
    let scanner = Scanner::new(text);
    ExpressionParser::new(&scanner).parse(0..text.len())
}

pub(crate) struct ExpressionParser<'s, 'a> {
    scanner: &'s Scanner<'a>,
    depth: Cell<usize>,
}

impl<'s, 'a> ExpressionParser<'s, 'a> {
    pub fn new(scanner: &'s Scanner<'a>) -> Self {
        Self {
            scanner,
            depth: Cell::new(0),
        }
    }

    pub fn parse(&self, range: Range<usize>) -> Result<Node, ExpressionError> {
        let depth = self.depth.get();
        if depth >= MAX_NESTING_DEPTH {
            return Err(self.malformed(self.scanner.trim(range), "nesting too deep"));
        }
        self.depth.set(depth + 1);
        let node = self.parse_node(range);
        self.depth.set(depth);
        node
    }

    fn parse_node(&self, range: Range<usize>) -> Result<Node, ExpressionError> {
        let range = self.scanner.trim(range);
        if range.is_empty() {
            return Err(self.malformed(range, "empty expression"));
        }
        if self.scanner.byte(range.start) != Some(b'(') {
            return Err(self.malformed(range, "expected `(`"));
        }
        let Some(close) = self.scanner.matching_paren(range.start, range.end) else {
            return Err(self.malformed(range, "unbalanced parentheses"));
        };
        if close + 1 != range.end {
            return Err(self.malformed(range, "unexpected text after expression"));
        }

        let inner = range.start + 1..close;
        let (tag, rest) = self.scanner.word(inner);
        match self.scanner.slice(tag.clone()) {
            "Terminal" => self.terminal(range, rest),
            "IntConst" | "IntCost" => self.constant(ConstantKind::Int, range, rest),
            "FloatConst" => self.constant(ConstantKind::Float, range, rest),
            "StringConst" => self.constant(ConstantKind::String, range, rest),
            "IntCon" => {
                // Some dumps split the tag: `(IntCon st 4'd3)`.
                let (st, value) = self.scanner.word(rest);
                if self.scanner.slice(st) == "st" {
                    self.constant(ConstantKind::Int, range, value)
                } else {
                    Err(self.unknown(tag))
                }
            }
            "Operator" => self.operator(range, rest),
            "Concat" => self.concat(range, rest),
            "Partselect" => self.partselect(range, rest),
            "Branch" => self.branch(range, rest),
            "" => Err(self.malformed(range, "missing construct tag")),
            _ => Err(self.unknown(tag)),
        }
    }

    fn terminal(&self, whole: Range<usize>, rest: Range<usize>) -> Result<Node, ExpressionError> {
        let (name, trailing) = self.scanner.word(rest);
        if name.is_empty() {
            return Err(self.malformed(whole, "missing terminal name"));
        }
        if !self.scanner.trim(trailing).is_empty() {
            return Err(self.malformed(whole, "unexpected text after terminal name"));
        }
        Ok(Node::terminal(self.scanner.slice(name)))
    }

    fn constant(
        &self,
        kind: ConstantKind,
        whole: Range<usize>,
        rest: Range<usize>,
    ) -> Result<Node, ExpressionError> {
        let value = self.scanner.trim(rest);
        if value.is_empty() {
            return Err(self.malformed(whole, "missing constant value"));
        }
        Ok(Node::typed_constant(kind, self.scanner.slice(value)))
    }

    fn operator(&self, whole: Range<usize>, rest: Range<usize>) -> Result<Node, ExpressionError> {
        let (kind_token, rest) = self.scanner.word(rest);
        if kind_token.is_empty() {
            return Err(self.malformed(whole, "missing operator kind"));
        }
        let kind = OperatorKind::from_token(self.scanner.slice(kind_token.clone())).ok_or_else(
            || ExpressionError::UnknownOperatorKind {
                token: self.scanner.slice(kind_token.clone()).to_string(),
                offset: kind_token.start,
            },
        )?;
        let operands = self.next_list(whole, rest)?;
        Ok(Node::operator(kind, operands))
    }

    fn concat(&self, whole: Range<usize>, rest: Range<usize>) -> Result<Node, ExpressionError> {
        let operands = self.next_list(whole, rest)?;
        Ok(Node::operator(OperatorKind::Concat, operands))
    }

    fn partselect(
        &self,
        whole: Range<usize>,
        rest: Range<usize>,
    ) -> Result<Node, ExpressionError> {
        let fields = self
            .scanner
            .keyed_fields(rest, &["Var:", "MSB:", "LSB:", "Next:"])
            .map_err(|e| self.scan_error(whole.clone(), e))?;

        if let Some(next) = fields.get("Next:") {
            if fields.contains("Var:") {
                return Err(self.malformed(whole, "both `Var:` and `Next:` given"));
            }
            let operands = self.operand_list(whole, next)?;
            return Ok(Node::operator(OperatorKind::Partselect, operands));
        }

        let mut operands = Vec::with_capacity(3);
        for key in ["Var:", "MSB:", "LSB:"] {
            let Some(value) = fields.get(key) else {
                return Err(self.malformed(
                    whole.clone(),
                    "partselect needs `Var:`, `MSB:` and `LSB:`",
                ));
            };
            operands.push(self.parse(value)?);
        }
        Ok(Node::operator(OperatorKind::Partselect, operands))
    }

    fn branch(&self, whole: Range<usize>, rest: Range<usize>) -> Result<Node, ExpressionError> {
        let fields = self
            .scanner
            .keyed_fields(rest, &["Cond:", "True:", "False:"])
            .map_err(|e| self.scan_error(whole.clone(), e))?;

        let Some(cond) = fields.get("Cond:") else {
            return Err(self.malformed(whole, "missing `Cond:` field"));
        };
        let Some(true_branch) = fields.get("True:") else {
            return Err(self.malformed(whole, "missing `True:` field"));
        };
        let cond = self.parse(cond)?;
        let true_branch = self.parse(true_branch)?;
        let false_branch = match fields.get("False:") {
            Some(value) if !value.is_empty() => Some(self.parse(value)?),
            _ => None,
        };
        Ok(Node::branch(cond, true_branch, false_branch))
    }

    /// `Next:` operand list shared by `Operator` and `Concat`.
    fn next_list(
        &self,
        whole: Range<usize>,
        rest: Range<usize>,
    ) -> Result<Vec<Node>, ExpressionError> {
        let fields = self
            .scanner
            .keyed_fields(rest, &["Next:"])
            .map_err(|e| self.scan_error(whole.clone(), e))?;
        let Some(next) = fields.get("Next:") else {
            return Err(self.malformed(whole, "missing `Next:` field"));
        };
        self.operand_list(whole, next)
    }

    fn operand_list(
        &self,
        whole: Range<usize>,
        list: Range<usize>,
    ) -> Result<Vec<Node>, ExpressionError> {
        let pieces = self
            .scanner
            .split_top_level(list, b',')
            .map_err(|e| self.scan_error(whole.clone(), e))?;
        if pieces.is_empty() {
            return Err(self.malformed(whole, "empty operand list"));
        }
        pieces.into_iter().map(|piece| self.parse(piece)).collect()
    }

    fn malformed(&self, range: Range<usize>, reason: &str) -> ExpressionError {
        ExpressionError::MalformedExpression {
            span: self.scanner.slice(range.clone()).to_string(),
            offset: range.start,
            reason: reason.to_string(),
        }
    }

    fn scan_error(&self, range: Range<usize>, err: ScanError) -> ExpressionError {
        ExpressionError::MalformedExpression {
            span: self.scanner.slice(range).to_string(),
            offset: err.offset,
            reason: err.reason.to_string(),
        }
    }

    fn unknown(&self, tag: Range<usize>) -> ExpressionError {
        ExpressionError::UnknownConstruct {
            tag: self.scanner.slice(tag.clone()).to_string(),
            offset: tag.start,
        }
    }
}
