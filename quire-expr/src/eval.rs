//! Tree-walking evaluator

use crate::ast::{Arg, Expr, UnOp};
use crate::builtins;
use crate::error::{ExprError, Result};
use crate::ops;
use quire_types::{Handle, Value};
use std::collections::BTreeMap;

/// The environment an expression is evaluated in.
///
/// Free names resolve through [`Context::lookup`]. Engine-owned objects are
/// exposed as [`Handle`] values and dereferenced lazily through
/// [`Context::handle_attr`] and [`Context::handle_call`], so the evaluator
/// never borrows into the document store.
pub trait Context {
    fn lookup(&self, name: &str) -> Option<Value>;

    fn handle_attr(&self, _handle: Handle, name: &str) -> Result<Value> {
        Err(ExprError::type_error(format!(
            "cannot read attribute '{}' in this context",
            name
        )))
    }

    fn handle_call(&self, _handle: Handle, method: &str, _args: &[Value]) -> Result<Value> {
        Err(ExprError::type_error(format!(
            "cannot call '{}' in this context",
            method
        )))
    }
}

/// Plain variable bindings with no handle support
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

impl Context for Bindings {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

/// Evaluate an expression against a context
pub fn evaluate(expr: &Expr, ctx: &dyn Context) -> Result<Value> {
    match expr {
        Expr::Literal(value, _) => Ok(value.clone()),

        Expr::Name(name, _) => ctx.lookup(name).ok_or_else(|| ExprError::Unbound {
            name: name.clone(),
        }),

        Expr::List(items, _) => items
            .iter()
            .map(|item| evaluate(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),

        Expr::Attr(target, name, _) => match evaluate(target, ctx)? {
            Value::Handle(handle) => ctx.handle_attr(handle, name),
            value => builtins::attribute(&value, name),
        },

        Expr::Call(callee, args, _) => eval_call(callee, args, ctx),

        Expr::Index(target, idx, _) => {
            let target = evaluate(target, ctx)?;
            let idx = evaluate(idx, ctx)?;
            builtins::index(&target, &idx)
        }

        Expr::Unary(UnOp::Neg, operand, _) => ops::negate(&evaluate(operand, ctx)?),
        Expr::Unary(UnOp::Not, operand, _) => {
            Ok(Value::Bool(!evaluate(operand, ctx)?.is_truthy()))
        }

        Expr::Binary(lhs, op, rhs, _) => {
            let l = evaluate(lhs, ctx)?;
            let r = evaluate(rhs, ctx)?;
            ops::binary(*op, &l, &r)
        }

        Expr::Compare(first, rest, _) => {
            let mut left = evaluate(first, ctx)?;
            for (op, operand) in rest {
                let right = evaluate(operand, ctx)?;
                if !ops::compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }

        Expr::And(lhs, rhs, _) => {
            let l = evaluate(lhs, ctx)?;
            if !l.is_truthy() {
                return Ok(l);
            }
            evaluate(rhs, ctx)
        }

        Expr::Or(lhs, rhs, _) => {
            let l = evaluate(lhs, ctx)?;
            if l.is_truthy() {
                return Ok(l);
            }
            evaluate(rhs, ctx)
        }

        Expr::Ternary {
            condition,
            then,
            otherwise,
            ..
        } => {
            if evaluate(condition, ctx)?.is_truthy() {
                evaluate(then, ctx)
            } else {
                evaluate(otherwise, ctx)
            }
        }
    }
}

type Evaluated = (Vec<Value>, Vec<(String, Value)>);

fn eval_args(args: &[Arg], ctx: &dyn Context) -> Result<Evaluated> {
    let mut positional = Vec::new();
    let mut keywords = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(expr) => positional.push(evaluate(expr, ctx)?),
            Arg::Keyword(name, expr) => keywords.push((name.clone(), evaluate(expr, ctx)?)),
        }
    }
    Ok((positional, keywords))
}

fn eval_call(callee: &Expr, args: &[Arg], ctx: &dyn Context) -> Result<Value> {
    match callee {
        Expr::Name(name, _) => {
            let (positional, keywords) = eval_args(args, ctx)?;
            if builtins::is_function(name) {
                builtins::call_function(name, &positional, &keywords)
            } else if let Some(value) = ctx.lookup(name) {
                Err(ExprError::type_error(format!(
                    "'{}' object is not callable",
                    value.type_name()
                )))
            } else {
                Err(ExprError::Unbound { name: name.clone() })
            }
        }
        Expr::Attr(target, method, _) => {
            let target = evaluate(target, ctx)?;
            let (positional, keywords) = eval_args(args, ctx)?;
            if let Some((key, _)) = keywords.first() {
                return Err(ExprError::call(
                    method,
                    format!("unexpected keyword argument '{}'", key),
                ));
            }
            match target {
                Value::Handle(handle) => ctx.handle_call(handle, method, &positional),
                value => builtins::call_method(&value, method, &positional),
            }
        }
        other => {
            let value = evaluate(other, ctx)?;
            Err(ExprError::type_error(format!(
                "'{}' object is not callable",
                value.type_name()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;
    use chrono::{NaiveDate, TimeDelta};

    fn eval_with(source: &str, ctx: &dyn Context) -> Result<Value> {
        evaluate(&parse_expr(source)?, ctx)
    }

    fn eval(source: &str) -> Value {
        eval_with(source, &Bindings::new()).unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval("-2 + 5"), Value::Int(3));
        assert_eq!(eval("7 % 3"), Value::Int(1));
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval("1 < 3 < 2"), Value::Bool(false));
        assert_eq!(eval("3 > 2 == 2"), Value::Bool(true));
    }

    #[test]
    fn test_boolean_operators_return_operands() {
        assert_eq!(eval("'' or 'fallback'"), Value::from("fallback"));
        assert_eq!(eval("0 and 1/0"), Value::Int(0));
        assert_eq!(eval("not []"), Value::Bool(true));
        assert_eq!(eval("1 && 2"), Value::Int(2));
    }

    #[test]
    fn test_ternary() {
        assert_eq!(eval("'yes' if 2 > 1 else 'no'"), Value::from("yes"));
        assert_eq!(eval("'yes' if None else 'no'"), Value::from("no"));
    }

    #[test]
    fn test_bindings_and_membership() {
        let ctx = Bindings::new()
            .with("status", "draft")
            .with("tags", vec!["rust", "ssg"]);
        assert_eq!(eval_with("status == 'draft'", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("'ssg' in tags", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("'go' not in tags", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("tags[0].upper()", &ctx).unwrap(), Value::from("RUST"));
        assert_eq!(eval_with("len(tags)", &ctx).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_unbound_name() {
        let err = eval_with("missing > 1", &Bindings::new()).unwrap_err();
        assert_eq!(
            err,
            ExprError::Unbound {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_date_arithmetic_with_timedelta() {
        let ctx = Bindings::new().with("date", NaiveDate::from_ymd_opt(2021, 1, 10).unwrap());
        assert_eq!(
            eval_with("date - timedelta(days=9)", &ctx).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap())
        );
        assert_eq!(
            eval_with("date > date(2020, 12, 31)", &ctx).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval("timedelta(weeks=1)"),
            Value::Duration(TimeDelta::days(7))
        );
    }

    #[test]
    fn test_binding_does_not_shadow_builtin_call() {
        let ctx = Bindings::new().with("date", NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(
            eval_with("date.year == date(2021, 1, 1).year", &ctx).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_calling_non_function() {
        let ctx = Bindings::new().with("title", "x");
        assert!(matches!(
            eval_with("title()", &ctx),
            Err(ExprError::Type { .. })
        ));
    }

    #[test]
    fn test_handles_need_a_context() {
        let ctx = Bindings::new().with("post", Handle::Document(0));
        assert!(eval_with("post.title", &ctx).is_err());
    }
}
