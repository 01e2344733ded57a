//! Integration tests for the lifecycle engine

use parking_lot::Mutex;
use quire_core::{BuildError, Document, Engine, Hooks, Phase, Plugin, Settings, Value};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

struct FnPlugin<F> {
    name: &'static str,
    build: F,
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&mut Hooks<'_>) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn build(self: Arc<Self>, hooks: &mut Hooks<'_>) {
        (self.build)(hooks)
    }
}

fn plugin<F>(name: &'static str, build: F) -> Arc<dyn Plugin>
where
    F: Fn(&mut Hooks<'_>) + Send + Sync + 'static,
{
    Arc::new(FnPlugin { name, build })
}

/// Records every phase and the teardown it sees as "name:point"
fn recorder(name: &'static str, log: &Log) -> Arc<dyn Plugin> {
    let log = log.clone();
    plugin(name, move |hooks| {
        for phase in Phase::ALL {
            let log = log.clone();
            hooks.on(phase, move |_| {
                log.lock().push(format!("{name}:{phase}"));
                Ok(())
            });
        }
        let log = log.clone();
        hooks.on_teardown(move |_| {
            log.lock().push(format!("{name}:teardown"));
            Ok(())
        });
    })
}

fn engine(plugins: Vec<Arc<dyn Plugin>>) -> Engine {
    Engine::new(Settings::default(), plugins).unwrap()
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

#[test]
fn test_phases_run_in_order() {
    let log = Log::default();
    let mut engine = engine(vec![recorder("rec", &log)]);

    engine.run(Phase::Render).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "rec:configure",
            "rec:glob",
            "rec:load",
            "rec:pre_render",
            "rec:render"
        ]
    );
    assert_eq!(
        engine.completed().collect::<Vec<_>>(),
        Phase::Render.up_to().collect::<Vec<_>>()
    );
}

#[test]
fn test_run_is_idempotent() {
    let log = Log::default();
    let mut engine = engine(vec![recorder("rec", &log)]);

    engine.run(Phase::Load).unwrap();
    engine.run(Phase::Load).unwrap();
    engine.run(Phase::Glob).unwrap();
    assert_eq!(entries(&log).len(), 3);

    engine.run(Phase::Save).unwrap();
    let log = entries(&log);
    assert_eq!(log.len(), 7);
    assert_eq!(log.last().map(String::as_str), Some("rec:save"));
}

#[test]
fn test_run_chains() {
    let log = Log::default();
    let mut engine = engine(vec![recorder("rec", &log)]);

    engine.run(Phase::Glob).unwrap().run(Phase::Load).unwrap();
    assert!(engine.has_run(Phase::Load));
    assert!(!engine.has_run(Phase::PreRender));
}

#[test]
fn test_priority_tiers_and_registration_order() {
    let log = Log::default();
    let tiered = |name: &'static str, tier: &'static str| {
        let log = log.clone();
        plugin(name, move |hooks| {
            let log = log.clone();
            let hook = move |_: &mut Engine| {
                log.lock().push(name.to_string());
                Ok(())
            };
            match tier {
                "first" => hooks.on_first(Phase::Render, hook),
                "last" => hooks.on_last(Phase::Render, hook),
                _ => hooks.on(Phase::Render, hook),
            };
        })
    };

    let mut engine = engine(vec![
        tiered("late", "last"),
        tiered("a", "normal"),
        tiered("early", "first"),
        tiered("b", "normal"),
    ]);
    engine.run(Phase::Render).unwrap();

    assert_eq!(entries(&log), vec!["early", "a", "b", "late"]);
}

#[test]
fn test_lazy_attribute_runs_exactly_needed_phases() {
    let log = Log::default();
    let producer = plugin("index", |hooks| {
        hooks.produces(&["tag_index"], Phase::PostRender);
        hooks.on(Phase::PostRender, |engine| {
            engine.set_attr("tag_index", Value::from(vec![Value::from("rust")]));
            Ok(())
        });
    });
    let mut engine = engine(vec![recorder("rec", &log), producer]);

    let value = engine.get_or_compute("tag_index").unwrap();
    assert_eq!(value, Value::from(vec![Value::from("rust")]));
    assert!(engine.has_run(Phase::PostRender));
    assert!(!engine.has_run(Phase::Save));
    assert_eq!(entries(&log).len(), 6);

    engine.get_or_compute("tag_index").unwrap();
    assert_eq!(entries(&log).len(), 6);
}

#[test]
fn test_lazy_resolution_uses_latest_producer() {
    let early = plugin("early", |hooks| {
        hooks.produces(&["summary"], Phase::Load);
        hooks.on(Phase::Load, |engine| {
            engine.set_attr("summary", "partial");
            Ok(())
        });
    });
    let late = plugin("late", |hooks| {
        hooks.produces(&["summary"], Phase::Render);
        hooks.on(Phase::Render, |engine| {
            engine.set_attr("summary", "complete");
            Ok(())
        });
    });
    let mut engine = engine(vec![early, late]);

    assert_eq!(engine.get_or_compute("summary").unwrap(), Value::from("complete"));
    assert!(engine.has_run(Phase::Render));
}

#[test]
fn test_lazy_attribute_errors() {
    let silent = plugin("silent", |hooks| {
        hooks.produces(&["never_set"], Phase::Render);
    });
    let mut engine = engine(vec![silent]);

    assert!(matches!(
        engine.get_or_compute("unknown"),
        Err(BuildError::NoSuchAttribute(name)) if name == "unknown"
    ));
    assert!(matches!(
        engine.get_or_compute("render"),
        Err(BuildError::HookName(_))
    ));
    assert!(matches!(
        engine.get_or_compute("never_set"),
        Err(BuildError::NotProduced { phase: Phase::Render, .. })
    ));
}

#[test]
fn test_document_attribute_resolution() {
    let loader = plugin("loader", |hooks| {
        hooks.on(Phase::Load, |engine| {
            engine.add_document(Document::new("a.md", "# A"))?;
            Ok(())
        });
    });
    let renderer = plugin("renderer", |hooks| {
        hooks.produces(&["html"], Phase::Render);
        hooks.on(Phase::Render, |engine| {
            for doc in engine.store_mut().iter_mut() {
                doc.set("html", "<h1>A</h1>");
            }
            Ok(())
        });
    });
    let mut engine = engine(vec![loader, renderer]);

    engine.run(Phase::Load).unwrap();
    assert_eq!(
        engine.document_attr(0, "path").unwrap(),
        Value::from("a.md")
    );
    assert!(!engine.has_run(Phase::Render));

    assert_eq!(
        engine.document_attr(0, "html").unwrap(),
        Value::from("<h1>A</h1>")
    );
    assert!(engine.has_run(Phase::Render));
    assert!(matches!(
        engine.document_attr(5, "html"),
        Err(BuildError::NoSuchDocument(5))
    ));
}

#[test]
fn test_hook_error_is_wrapped_and_phase_not_completed() {
    let failing = plugin("broken", |hooks| {
        hooks.on(Phase::PreRender, |_| anyhow::bail!("template missing"));
    });
    let mut engine = engine(vec![failing]);

    let err = engine.run(Phase::Save).unwrap_err();
    match &err {
        BuildError::Hook { plugin, point, source } => {
            assert_eq!(plugin, "broken");
            assert_eq!(point, "pre_render");
            assert_eq!(source.to_string(), "template missing");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.has_run(Phase::Load));
    assert!(!engine.has_run(Phase::PreRender));
}

#[test]
fn test_reentrant_run_from_hook() {
    let log = Log::default();
    let sink = log.clone();
    let nested = plugin("nested", move |hooks| {
        let sink = sink.clone();
        hooks.on(Phase::Load, move |engine| {
            // Earlier or current phases are already satisfied
            engine.run(Phase::Glob)?;
            engine.run(Phase::Load)?;
            match engine.run(Phase::Render) {
                Err(BuildError::Reentrant { target, running }) => {
                    sink.lock().push(format!("{target} during {running}"));
                    Ok(())
                }
                Err(err) => Err(err.into()),
                Ok(_) => anyhow::bail!("nested run should have been refused"),
            }
        });
    });
    let mut engine = engine(vec![nested]);

    engine.run(Phase::Load).unwrap();
    assert_eq!(entries(&log), vec!["render during load"]);
    assert!(!engine.has_run(Phase::Render));
}

#[test]
fn test_get_or_compute_inside_hook() {
    let producer = plugin("producer", |hooks| {
        hooks.produces(&["sources"], Phase::Glob);
        hooks.produces(&["rendered"], Phase::Render);
        hooks.on(Phase::Glob, |engine| {
            engine.set_attr("sources", 2);
            Ok(())
        });
    });
    let consumer = plugin("consumer", |hooks| {
        hooks.on(Phase::Load, |engine| {
            let sources = engine.get_or_compute("sources")?;
            engine.set_attr("seen", sources);
            match engine.get_or_compute("rendered") {
                Err(BuildError::Reentrant { .. }) => Ok(()),
                other => anyhow::bail!("expected re-entrancy error, got {other:?}"),
            }
        });
    });
    let mut engine = engine(vec![producer, consumer]);

    engine.run(Phase::Load).unwrap();
    assert_eq!(engine.attr("seen"), Some(&Value::Int(2)));
}

#[test]
fn test_hook_as_callable() {
    let log = Log::default();
    let mut engine = engine(vec![recorder("rec", &log)]);

    {
        let mut to_render = engine.hook("render").unwrap();
        to_render().unwrap();
        to_render().unwrap();
    }
    assert!(engine.has_run(Phase::Render));
    assert_eq!(entries(&log).len(), 5);

    assert!(matches!(
        engine.hook("publish"),
        Err(BuildError::NoSuchAttribute(_))
    ));
}

#[test]
fn test_teardown_runs_exactly_once() {
    let log = Log::default();
    {
        let mut engine = engine(vec![recorder("rec", &log)]);
        engine.run(Phase::Configure).unwrap();
        engine.teardown().unwrap();
        engine.teardown().unwrap();
        assert!(engine.is_torn_down());
    }
    let teardowns = entries(&log)
        .iter()
        .filter(|e| e.ends_with(":teardown"))
        .count();
    assert_eq!(teardowns, 1);
}

#[test]
fn test_teardown_on_drop() {
    let log = Log::default();
    {
        let mut engine = engine(vec![recorder("rec", &log)]);
        engine.run(Phase::Glob).unwrap();
    }
    assert_eq!(
        entries(&log).last().map(String::as_str),
        Some("rec:teardown")
    );
}

#[test]
fn test_teardown_skipped_when_nothing_ran() {
    let log = Log::default();
    {
        let mut engine = engine(vec![recorder("rec", &log)]);
        engine.teardown().unwrap();
        assert!(!engine.is_torn_down());
    }
    assert!(entries(&log).is_empty());
}

#[test]
fn test_teardown_runs_every_hook_despite_failure() {
    let log = Log::default();
    let failing = plugin("failing", |hooks| {
        hooks.on_teardown(|_| anyhow::bail!("lock busy"));
    });
    let mut engine = engine(vec![failing, recorder("rec", &log)]);
    engine.run(Phase::Configure).unwrap();

    let err = engine.teardown().unwrap_err();
    assert!(matches!(err, BuildError::Hook { ref plugin, .. } if plugin == "failing"));
    assert_eq!(
        entries(&log).last().map(String::as_str),
        Some("rec:teardown")
    );
}

#[test]
fn test_end_to_end_three_documents() {
    let loader = plugin("fixture", |hooks| {
        hooks.on(Phase::Load, |engine| {
            for (path, date, status) in [
                ("one.md", "2021-01-01", "published"),
                ("two.md", "2023-01-01", "draft"),
                ("three.md", "2022-01-01", "published"),
            ] {
                let date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
                engine.add_document(
                    Document::new(path, "")
                        .with("date", Value::Date(date))
                        .with("status", status),
                )?;
            }
            Ok(())
        });
    });
    let mut engine = engine(vec![loader]);
    engine.run(Phase::Load).unwrap();

    assert_eq!(engine.filter("status == 'published'").unwrap(), vec![0, 2]);

    let dates = engine
        .query()
        .filter("status=='published'")
        .sort("date")
        .reverse(false)
        .map("date")
        .unwrap();
    let dates: Vec<String> = dates.iter().map(Value::to_string).collect();
    assert_eq!(dates, vec!["2021-01-01", "2022-01-01"]);
}
