//! Compiled-expression cache keyed by source text.

use crate::ast::Expr;
use crate::error::Result;
use crate::parser::parse_expr;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of distinct expressions kept compiled
pub const DEFAULT_CAPACITY: usize = 512;

/// Parses expressions once and hands out shared trees afterwards
#[derive(Debug)]
pub struct ExprCache {
    compiled: Mutex<LruCache<String, Arc<Expr>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ExprCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiled: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compile `source`, reusing an earlier parse of the same text.
    ///
    /// Parse errors are not cached; a failing source is re-parsed on every
    /// call.
    pub fn compile(&self, source: &str) -> Result<Arc<Expr>> {
        if let Some(expr) = self.compiled.lock().get(source) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(expr));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let expr = Arc::new(parse_expr(source)?);
        self.compiled
            .lock()
            .put(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.compiled.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn clear(&self) {
        self.compiled.lock().clear();
    }
}
