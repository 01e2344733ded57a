//! # quire expressions
//!
//! A small, side-effect free expression language used by queries to filter,
//! order and project documents:
//! - Python-flavoured syntax: `and`/`or`/`not`, chained comparisons, `in`,
//!   conditional expressions
//! - A fixed whitelist of builtin functions and value methods
//! - Engine objects (`post`, `site`) reached only through opaque handles
//!
//! ## Example
//!
//! ```ignore
//! status != 'draft' and 'rust' in tags and date > today() - timedelta(days=30)
//! ```

pub mod ast;
pub mod builtins;
pub mod compile;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod sort;

pub use ast::{Arg, BinOp, CmpOp, Expr, UnOp};
pub use compile::ExprCache;
pub use error::{ErrorContext, ExprError, Result};
pub use eval::{evaluate, Bindings, Context};
pub use lexer::{tokenize, SpannedToken, Token};
pub use parser::{parse_expr, Parser};
pub use sort::{sort_key, sort_key_or_min, SORT_KEY_MIN};

pub use quire_types::{Handle, Span, Value};

/// Parse and evaluate `source` in one step
pub fn eval_str(source: &str, ctx: &dyn Context) -> Result<Value> {
    evaluate(&parse_expr(source)?, ctx)
}
