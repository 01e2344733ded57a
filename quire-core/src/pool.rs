//! Bounded worker pool for per-document fan-out inside a hook.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// A fixed-size thread pool.
///
/// Hooks hand it one unit of work per item; [`WorkerPool::fan_out`] returns
/// only once every unit has finished, so no work outlives the hook call.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Pool with `size` threads, or one per available core
    pub fn new(size: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let size = size
            .filter(|n| *n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("quire-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over every item on the pool; results keep input order
    pub fn fan_out<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fan_out_preserves_order() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let out = pool.fan_out((0..100).collect(), |n: i32| n * 2);
        assert_eq!(out, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_fan_out_joins_before_returning() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        let done = AtomicUsize::new(0);
        pool.fan_out((0..20).collect::<Vec<_>>(), |_| {
            std::thread::sleep(std::time::Duration::from_millis(1));
            done.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_size() {
        assert_eq!(WorkerPool::new(Some(2)).unwrap().size(), 2);
        assert!(WorkerPool::new(None).unwrap().size() >= 1);
    }
}
