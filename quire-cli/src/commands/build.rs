//! Build command implementation.

use super::open_engine;
use anyhow::{Context, Result};
use quire_core::Phase;
use quire_plugins::writer::written_paths;
use std::path::Path;

/// Run the lifecycle up to `to`, then tear down
pub fn build_site(config_path: &Path, to: Phase) -> Result<()> {
    let mut engine = open_engine(config_path)?;
    engine
        .run(to)
        .with_context(|| format!("Build failed before completing {}", to))?;
    engine.teardown().context("Teardown failed")?;

    let written = written_paths(&engine);
    if written.is_empty() {
        println!("Ran through {} ({} documents)", to, engine.store().len());
    } else {
        println!(
            "Built {} documents, wrote {} files to {}",
            engine.store().len(),
            written.len(),
            engine.settings().output_dir().display()
        );
    }
    Ok(())
}
