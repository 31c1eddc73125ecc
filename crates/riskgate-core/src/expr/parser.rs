//! Recursive-descent parser for rule conditions.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons (chained),
//! `+ -`, `* / %`, unary `-`, postfix (subscript, attribute, call).

use super::lexer::{Token, TokenKind};
use super::value::Value;
use super::EvalError;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    List(Vec<Expr>),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Attr {
        target: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a < b <= c` is `a < b and b <= c`, with `b` evaluated once.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

static EOF: TokenKind = TokenKind::Eof;

/// Parser over a token stream.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Parse a complete condition; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr, EvalError> {
        let expr = self.parse_expr()?;
        match self.peek() {
            TokenKind::Eof => Ok(expr),
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    // Left-associative chains nest one level per operator, so every
    // iteration counts against the depth limit.

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let base = self.depth;
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.enter()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let base = self.depth;
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            self.enter()?;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&TokenKind::Not) {
            self.enter()?;
            let operand = self.parse_not();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();

        while let Some(op) = self.comparison_op() {
            if rest.len() >= self.max_depth {
                return Err(EvalError::TooDeep {
                    max: self.max_depth,
                });
            }
            let rhs = self.parse_additive()?;
            rest.push((op, rhs));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    /// Consume a comparison operator, including the two-token `not in`.
    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::Ne => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Le => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Ge => CmpOp::Ge,
            TokenKind::In => CmpOp::In,
            TokenKind::Not if self.peek_at(1) == &TokenKind::In => {
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let base = self.depth;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let base = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Rem,
                _ => {
                    self.depth = base;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&TokenKind::Minus) {
            self.enter()?;
            let operand = self.parse_unary();
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(operand?)));
        }
        if self.eat(&TokenKind::Plus) {
            self.enter()?;
            let operand = self.parse_unary();
            self.depth -= 1;
            return operand;
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;

        loop {
            if matches!(
                self.peek(),
                TokenKind::LBracket | TokenKind::Dot | TokenKind::LParen
            ) {
                self.enter()?;
            }
            match self.peek() {
                TokenKind::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.pos += 1;
                    let name = match self.advance() {
                        TokenKind::Ident(name) => name,
                        other => {
                            return Err(self.error(format!("expected attribute name, found {}", other)))
                        }
                    };
                    expr = Expr::Attr {
                        target: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LParen => {
                    self.pos += 1;
                    let args = self.parse_sequence(&TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Ident(name) => Ok(Expr::Ident(name)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => Ok(Expr::List(self.parse_sequence(&TokenKind::RBracket)?)),
            TokenKind::Eof => Err(self.error("unexpected end of input".to_string())),
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: &TokenKind) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(EvalError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| &t.kind)
            .unwrap_or(&EOF)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), EvalError> {
        if self.eat(kind) {
            Ok(())
        } else {
            let found = self.peek().clone();
            Err(self.error(format!("expected {}, found {}", kind, found)))
        }
    }

    fn error(&self, message: String) -> EvalError {
        let pos = self
            .tokens
            .get(self.pos.saturating_sub(1).min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.pos)
            .unwrap_or(0);
        EvalError::Syntax { pos, message }
    }
}
