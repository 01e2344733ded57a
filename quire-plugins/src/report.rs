//! Build summary logged at teardown.

use crate::writer::written_paths;
use parking_lot::Mutex;
use quire_core::{Engine, Hooks, Phase, Plugin};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ReportPlugin {
    started: Mutex<Option<Instant>>,
}

impl Default for ReportPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPlugin {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(None),
        }
    }

    /// Time since the configure phase started, if it ran
    pub fn elapsed(&self) -> Option<Duration> {
        self.started.lock().map(|t| t.elapsed())
    }

    fn summarize(&self, engine: &Engine) {
        let documents = engine.store().len();
        let skipped = engine.store().all().iter().filter(|d| d.skip).count();
        let written = written_paths(engine).len();
        let last = engine.completed().last();

        tracing::info!(
            "Built {} documents ({} skipped, {} files written) through {} in {:.2?}",
            documents,
            skipped,
            written,
            last.map_or("nothing", |p| p.as_str()),
            self.elapsed().unwrap_or_default()
        );
        tracing::debug!("Cache: {}", engine.cache().stats());
        let (hits, misses) = engine.exprs().stats();
        tracing::debug!("Expressions: {} compiled, {} reused", misses, hits);
    }
}

impl Plugin for ReportPlugin {
    fn name(&self) -> &str {
        "report"
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        let timer = Arc::clone(&self);
        hooks.on_first(Phase::Configure, move |_| {
            *timer.started.lock() = Some(Instant::now());
            Ok(())
        });
        hooks.on_teardown(move |engine| {
            self.summarize(engine);
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::Settings;

    #[test]
    fn test_timer_starts_at_configure() {
        let report = Arc::new(ReportPlugin::new());
        assert!(report.elapsed().is_none());

        let plugin: Arc<dyn Plugin> = report.clone();
        let mut engine = Engine::new(Settings::default(), vec![plugin]).unwrap();
        engine.run(Phase::Configure).unwrap();
        assert!(report.elapsed().is_some());
        engine.teardown().unwrap();
        assert!(engine.is_torn_down());
    }
}
