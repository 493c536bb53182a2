//! Recursive-descent parser producing the expression tree.

use regex::Regex;

use crate::error::{FilterError, Result};
use crate::lexer::{Spanned, Token};
use crate::value::Value;

/// Deepest nesting of parentheses, lists or negations accepted.
pub(crate) const MAX_DEPTH: usize = 64;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
}

impl CompareOp {
    pub(crate) const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
            Self::StartsWith => "=^",
            Self::NotStartsWith => "!^",
            Self::EndsWith => "=$",
            Self::NotEndsWith => "!$",
        }
    }

    const fn from_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Eq => Self::Eq,
            Token::Ne => Self::Ne,
            Token::Lt => Self::Lt,
            Token::Le => Self::Le,
            Token::Gt => Self::Gt,
            Token::Ge => Self::Ge,
            Token::Match => Self::Match,
            Token::NotMatch => Self::NotMatch,
            Token::StartsWith => Self::StartsWith,
            Token::NotStartsWith => Self::NotStartsWith,
            Token::EndsWith => Self::EndsWith,
            Token::NotEndsWith => Self::NotEndsWith,
            _ => return None,
        })
    }

    const fn is_match(self) -> bool {
        matches!(self, Self::Match | Self::NotMatch)
    }
}

/// Expression tree node.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Literal(Value),
    Path(Vec<String>),
    List(Vec<Node>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
        /// Precompiled when the right operand of `=~`/`!~` is a string literal.
        regex: Option<Regex>,
    },
}

/// Compiles a regex that must match the whole subject.
pub(crate) fn anchored_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| FilterError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn parse(tokens: &[Spanned], source_len: usize) -> Result<Node> {
    if tokens.is_empty() {
        return Err(FilterError::syntax(0, "empty expression"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        source_len,
    };
    let node = parser.or_expr()?;

    if let Some(extra) = parser.peek() {
        return Err(FilterError::syntax(
            extra.position,
            format!("unexpected {}", extra.token.describe()),
        ));
    }
    Ok(node)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    source_len: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            return Ok(());
        }
        Err(self.error_here(&format!("expected {}", token.describe())))
    }

    fn error_here(&self, message: &str) -> FilterError {
        match self.peek() {
            Some(t) => FilterError::syntax(t.position, format!("{message}, found {}", t.token.describe())),
            None => FilterError::syntax(self.source_len, format!("{message}, found end of input")),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let position = self.peek().map_or(self.source_len, |t| t.position);
            return Err(FilterError::syntax(
                position,
                format!("expression nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Node> {
        let left = self.unary()?;
        let Some(op) = self.peek().and_then(|t| CompareOp::from_token(&t.token)) else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.unary()?;

        if let Some(next) = self.peek() {
            if CompareOp::from_token(&next.token).is_some() {
                return Err(FilterError::syntax(
                    next.position,
                    "comparison operators cannot be chained; use parentheses",
                ));
            }
        }

        let regex = match (&right, op.is_match()) {
            (Node::Literal(Value::Str(pattern)), true) => Some(anchored_regex(pattern)?),
            _ => None,
        };

        Ok(Node::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
            regex,
        })
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let operand = self.unary()?;
            self.leave();
            return Ok(Node::Not(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        let Some(spanned) = self.advance() else {
            return Err(self.error_here("expected a value"));
        };
        let position = spanned.position;

        match spanned.token.clone() {
            Token::True => Ok(Node::Literal(Value::Bool(true))),
            Token::False => Ok(Node::Literal(Value::Bool(false))),
            Token::Null => Ok(Node::Literal(Value::Null)),
            Token::Number(n) => Ok(Node::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Node::Literal(Value::Str(s))),
            Token::Ident(first) => {
                let mut segments = vec![first];
                while self.eat(&Token::Dot) {
                    match self.peek().map(|t| &t.token) {
                        Some(Token::Ident(segment)) => {
                            segments.push(segment.clone());
                            self.pos += 1;
                        }
                        _ => return Err(self.error_here("expected identifier after '.'")),
                    }
                }
                Ok(Node::Path(segments))
            }
            Token::LParen => {
                self.enter()?;
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                self.leave();
                Ok(inner)
            }
            Token::LBracket => {
                self.enter()?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.or_expr()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                self.leave();
                Ok(Node::List(items))
            }
            other => Err(FilterError::syntax(
                position,
                format!("unexpected {}", other.describe()),
            )),
        }
    }
}
