//! Expression syntax tree

use crate::error::Span;
use quire_types::Value;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

/// Comparison operator; comparisons chain like Python's
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

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value, Span),
    Name(String, Span),
    List(Vec<Expr>, Span),
    Attr(Box<Expr>, String, Span),
    Call(Box<Expr>, Vec<Arg>, Span),
    Index(Box<Expr>, Box<Expr>, Span),
    Unary(UnOp, Box<Expr>, Span),
    Binary(Box<Expr>, BinOp, Box<Expr>, Span),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>, Span),
    And(Box<Expr>, Box<Expr>, Span),
    Or(Box<Expr>, Box<Expr>, Span),
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, s)
            | Expr::Name(_, s)
            | Expr::List(_, s)
            | Expr::Attr(_, _, s)
            | Expr::Call(_, _, s)
            | Expr::Index(_, _, s)
            | Expr::Unary(_, _, s)
            | Expr::Binary(_, _, _, s)
            | Expr::Compare(_, _, s)
            | Expr::And(_, _, s)
            | Expr::Or(_, _, s) => *s,
            Expr::Ternary { span, .. } => *span,
        }
    }

    /// Whether the expression is the bare literal `True`
    pub fn is_true_literal(&self) -> bool {
        matches!(self, Expr::Literal(Value::Bool(true), _))
    }
}
