//! Filtered, sorted and projected views over the document store.
//!
//! Queries are built fluently from [`Engine::query`]:
//!
//! ```
//! # use quire_core::{Document, Engine, Settings};
//! # let mut engine = Engine::new(Settings::default(), Vec::new()).unwrap();
//! # engine.add_document(Document::new("a.md", "").with("status", "published")).unwrap();
//! let titles = engine
//!     .query()
//!     .filter("status == 'published'")
//!     .sort("date")
//!     .reverse(false)
//!     .map("post.path")
//!     .unwrap();
//! # assert_eq!(titles.len(), 1);
//! ```
//!
//! The filtered and sorted document subsequence is cached per argument set
//! for the lifetime of the engine; projections are evaluated on every call.

use crate::engine::Engine;
use crate::error::QueryError;
use parking_lot::Mutex;
use quire_expr::{evaluate, sort_key_or_min, Context, ExprError, Handle, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source text that selects everything / leaves order untouched
pub const ALWAYS: &str = "True";

fn is_always(source: &str) -> bool {
    source.trim() == ALWAYS
}

/// Resolved document subsequences keyed by query arguments
#[derive(Debug, Default)]
pub struct QueryCache {
    resolved: Mutex<HashMap<String, Arc<[usize]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Counters reported around each phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<Arc<[usize]>> {
        let found = self.resolved.lock().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn insert(&self, key: String, resolved: Arc<[usize]>) {
        self.resolved.lock().insert(key, resolved);
    }

    pub fn clear(&self) {
        self.resolved.lock().clear();
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.resolved.lock().len(),
        }
    }
}

/// Evaluation context for one document
struct DocContext<'q> {
    engine: &'q Engine,
    index: usize,
    args: &'q [Value],
    kwargs: &'q BTreeMap<String, Value>,
}

impl Context for DocContext<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.kwargs.get(name) {
            return Some(value.clone());
        }
        match name {
            "args" => Some(Value::List(self.args.to_vec())),
            "post" => Some(Value::Handle(Handle::Document(self.index))),
            "site" => Some(Value::Handle(Handle::Site)),
            _ => self.engine.store().get(self.index)?.field(name),
        }
    }

    fn handle_attr(&self, handle: Handle, name: &str) -> Result<Value, ExprError> {
        handle_attr(self.engine, handle, name)
    }

    fn handle_call(&self, handle: Handle, method: &str, args: &[Value]) -> Result<Value, ExprError> {
        handle_call(self.engine, handle, method, args)
    }
}

fn no_attribute(kind: &str, name: &str) -> ExprError {
    ExprError::Type {
        message: format!("'{}' object has no attribute '{}'", kind, name),
    }
}

/// `post.name` and `site.name`
pub(crate) fn handle_attr(engine: &Engine, handle: Handle, name: &str) -> Result<Value, ExprError> {
    match handle {
        Handle::Document(index) => engine
            .store()
            .get(index)
            .and_then(|doc| doc.field(name))
            .ok_or_else(|| no_attribute("post", name)),
        Handle::Site => engine
            .attr(name)
            .cloned()
            .ok_or_else(|| no_attribute("site", name)),
    }
}

fn name_arg<'a>(method: &str, args: &'a [Value]) -> Result<(&'a str, Value), ExprError> {
    let (name, default) = match args {
        [name] => (name, Value::None),
        [name, default] => (name, default.clone()),
        _ => {
            return Err(ExprError::Arity {
                name: method.to_string(),
                expected: 2,
                got: args.len(),
            })
        }
    };
    let name = name.as_str().ok_or_else(|| ExprError::Call {
        name: method.to_string(),
        message: "attribute name must be a string".into(),
    })?;
    Ok((name, default))
}

/// `post.get(..)`, `site.get(..)` and `site.count(..)`
pub(crate) fn handle_call(
    engine: &Engine,
    handle: Handle,
    method: &str,
    args: &[Value],
) -> Result<Value, ExprError> {
    match (handle, method) {
        (Handle::Document(index), "get") => {
            let (name, default) = name_arg(method, args)?;
            Ok(engine
                .store()
                .get(index)
                .and_then(|doc| doc.field(name))
                .unwrap_or(default))
        }
        (Handle::Site, "get") => {
            let (name, default) = name_arg(method, args)?;
            Ok(engine.attr(name).cloned().unwrap_or(default))
        }
        (Handle::Site, "count") => {
            let filter = match args {
                [] => ALWAYS,
                [Value::Str(filter)] => filter.as_str(),
                _ => {
                    return Err(ExprError::Call {
                        name: "count".into(),
                        message: "expected a filter expression string".into(),
                    })
                }
            };
            let matched = engine.filter(filter).map_err(|err| ExprError::Call {
                name: "count".into(),
                message: err.to_string(),
            })?;
            Ok(Value::from(matched.len()))
        }
        (Handle::Document(_), _) => Err(no_attribute("post", method)),
        (Handle::Site, _) => Err(no_attribute("site", method)),
    }
}

/// Indices of documents whose filter evaluates truthy, in load order.
///
/// Evaluation errors exclude the document; a filter that fails to parse
/// excludes every document.
pub(crate) fn filter_indices(
    engine: &Engine,
    filter: &str,
    args: &[Value],
    kwargs: &BTreeMap<String, Value>,
) -> Result<Vec<usize>, QueryError> {
    let count = engine.store().len();
    if is_always(filter) {
        return Ok((0..count).collect());
    }

    let expr = match engine.exprs().compile(filter) {
        Ok(expr) => expr,
        Err(err) => {
            tracing::debug!("Filter {:?} matches nothing: {}", filter, err);
            return Ok(Vec::new());
        }
    };
    Ok((0..count)
        .filter(|&index| {
            let ctx = DocContext {
                engine,
                index,
                args,
                kwargs,
            };
            evaluate(&expr, &ctx).is_ok_and(|v| v.is_truthy())
        })
        .collect())
}

/// A query under construction
#[derive(Clone)]
pub struct Query<'e> {
    engine: &'e Engine,
    filter: String,
    sort: String,
    reverse: bool,
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl<'e> Query<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            filter: ALWAYS.to_string(),
            sort: ALWAYS.to_string(),
            reverse: true,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Keep documents for which `expr` is truthy (default: all)
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = expr.into();
        self
    }

    /// Order by the sort key of `expr` (default: load order)
    pub fn sort(mut self, expr: impl Into<String>) -> Self {
        self.sort = expr.into();
        self
    }

    /// Reverse the final order (default: true)
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Bind a constant visible to every expression of this query
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Append a positional argument, visible as `args[i]`
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    fn cache_key(&self, projection: &str) -> String {
        format!(
            "{:?}",
            (
                projection,
                &self.filter,
                &self.sort,
                self.reverse,
                &self.args,
                &self.kwargs
            )
        )
    }

    fn context(&self, index: usize) -> DocContext<'_> {
        DocContext {
            engine: self.engine,
            index,
            args: &self.args,
            kwargs: &self.kwargs,
        }
    }

    /// The filtered, ordered document subsequence for `projection`
    fn resolve(&self, projection: &str) -> Result<Arc<[usize]>, QueryError> {
        let key = self.cache_key(projection);
        let cache = self.engine.query_cache();
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let mut matched = filter_indices(self.engine, &self.filter, &self.args, &self.kwargs)?;

        // A sort key that fails to parse gives every document the minimum key
        let sort_expr = if is_always(&self.sort) {
            None
        } else {
            match self.engine.exprs().compile(&self.sort) {
                Ok(expr) => Some(expr),
                Err(err) => {
                    tracing::debug!("Sort key {:?} ignored: {}", self.sort, err);
                    None
                }
            }
        };
        if let Some(expr) = sort_expr {
            let mut keyed: Vec<(f64, usize)> = matched
                .iter()
                .map(|&index| (sort_key_or_min(evaluate(&expr, &self.context(index))), index))
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            matched = keyed.into_iter().map(|(_, index)| index).collect();
        }
        if self.reverse {
            matched.reverse();
        }

        let resolved: Arc<[usize]> = matched.into();
        cache.insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Evaluate `projection` against every resolved document.
    ///
    /// Projection errors propagate.
    pub fn map(&self, projection: &str) -> Result<Vec<Value>, QueryError> {
        let resolved = self.resolve(projection)?;
        let expr = self.engine.exprs().compile(projection)?;
        resolved
            .iter()
            .map(|&index| evaluate(&expr, &self.context(index)).map_err(QueryError::from))
            .collect()
    }

    /// Resolved document indices
    pub fn indices(&self) -> Result<Vec<usize>, QueryError> {
        Ok(self.resolve("post")?.to_vec())
    }

    pub fn count(&self) -> Result<usize, QueryError> {
        Ok(self.resolve("post")?.len())
    }

    pub fn first(&self) -> Result<usize, QueryError> {
        self.resolve("post")?.first().copied().ok_or(QueryError::Empty)
    }

    pub fn last(&self) -> Result<usize, QueryError> {
        self.resolve("post")?.last().copied().ok_or(QueryError::Empty)
    }

    /// The single matching document
    pub fn one(&self) -> Result<usize, QueryError> {
        let resolved = self.resolve("post")?;
        match resolved.as_ref() {
            [index] => Ok(*index),
            [] => Err(QueryError::NoPosts),
            many => Err(QueryError::TooManyPosts { count: many.len() }),
        }
    }
}
