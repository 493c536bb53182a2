//! Compiled expressions and the predicate seam.

use std::fmt;
use std::str::FromStr;

use crate::error::{FilterError, Result};
use crate::lexer::tokenize;
use crate::parser::{CompareOp, Node, anchored_regex, parse};
use crate::value::{EvalContext, Value};

/// Something that accepts or rejects an evaluation context.
///
/// The forwarding engine only depends on this trait, so callers can plug in
/// a different rule language without touching delivery.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Returns whether the context satisfies the predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the predicate cannot be evaluated against `ctx`.
    fn test(&self, ctx: &dyn EvalContext) -> Result<bool>;
}

/// A filter expression compiled once and evaluated many times.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Compiles expression text.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Syntax`] for malformed text and
    /// [`FilterError::InvalidRegex`] for a bad literal pattern.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let root = parse(&tokens, source.len())?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Returns the text the expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression to a value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown identifiers, operand type mismatches
    /// and patterns that fail to compile at evaluation time.
    pub fn evaluate(&self, ctx: &dyn EvalContext) -> Result<Value> {
        eval(&self.root, ctx)
    }
}

impl Predicate for Expression {
    fn test(&self, ctx: &dyn EvalContext) -> Result<bool> {
        match self.evaluate(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(FilterError::NotBoolean(other.type_name())),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FromStr for Expression {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn eval(node: &Node, ctx: &dyn EvalContext) -> Result<Value> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Path(segments) => {
            let parts: Vec<&str> = segments.iter().map(String::as_str).collect();
            ctx.resolve(&parts)
                .ok_or_else(|| FilterError::UnknownIdentifier(segments.join(".")))
        }
        Node::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Node::Not(operand) => Ok(Value::Bool(!eval_bool(operand, ctx)?)),
        Node::And(left, right) => {
            Ok(Value::Bool(eval_bool(left, ctx)? && eval_bool(right, ctx)?))
        }
        Node::Or(left, right) => {
            Ok(Value::Bool(eval_bool(left, ctx)? || eval_bool(right, ctx)?))
        }
        Node::Compare {
            op,
            left,
            right,
            regex,
        } => {
            let lhs = eval(left, ctx)?;
            let rhs = eval(right, ctx)?;
            compare(*op, &lhs, &rhs, regex.as_ref()).map(Value::Bool)
        }
    }
}

fn eval_bool(node: &Node, ctx: &dyn EvalContext) -> Result<bool> {
    match eval(node, ctx)? {
        Value::Bool(b) => Ok(b),
        other => Err(FilterError::NotBoolean(other.type_name())),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value, regex: Option<&regex::Regex>) -> Result<bool> {
    let mismatch = || FilterError::TypeMismatch {
        op: op.symbol(),
        left: lhs.type_name(),
        right: rhs.type_name(),
    };

    match op {
        CompareOp::Eq => Ok(lhs.loosely_equals(rhs)),
        CompareOp::Ne => Ok(!lhs.loosely_equals(rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch()),
            };
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        CompareOp::Match | CompareOp::NotMatch => {
            let matched = match rhs {
                Value::List(items) => items.iter().any(|item| lhs.loosely_equals(item)),
                Value::Str(pattern) => {
                    let compiled;
                    let re = if let Some(re) = regex {
                        re
                    } else {
                        compiled = anchored_regex(pattern)?;
                        &compiled
                    };
                    any_string(lhs, |s| re.is_match(s)).ok_or_else(mismatch)?
                }
                _ => return Err(mismatch()),
            };
            Ok(matched == (op == CompareOp::Match))
        }
        CompareOp::StartsWith | CompareOp::NotStartsWith => {
            let Value::Str(prefix) = rhs else {
                return Err(mismatch());
            };
            let matched = any_string(lhs, |s| s.starts_with(prefix.as_str())).ok_or_else(mismatch)?;
            Ok(matched == (op == CompareOp::StartsWith))
        }
        CompareOp::EndsWith | CompareOp::NotEndsWith => {
            let Value::Str(suffix) = rhs else {
                return Err(mismatch());
            };
            let matched = any_string(lhs, |s| s.ends_with(suffix.as_str())).ok_or_else(mismatch)?;
            Ok(matched == (op == CompareOp::EndsWith))
        }
    }
}

/// Applies a string test to a string, or to any string element of a list.
/// Null never matches. Returns `None` for operands that hold no strings.
fn any_string(value: &Value, test: impl Fn(&str) -> bool) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Str(s) => Some(test(s)),
        Value::List(items) => Some(items.iter().any(|item| match item {
            Value::Str(s) => test(s),
            _ => false,
        })),
        _ => None,
    }
}
