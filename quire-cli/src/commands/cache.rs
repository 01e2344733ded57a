//! Persistent cache maintenance.

use super::open_engine;
use anyhow::Result;
use std::path::Path;

pub fn clear_cache(config_path: &Path) -> Result<()> {
    let engine = open_engine(config_path)?;
    let before = engine.cache().stats().entries;
    engine.cache().clear();
    println!("Removed {} cache entries", before);
    Ok(())
}

pub fn cache_stats(config_path: &Path) -> Result<()> {
    let engine = open_engine(config_path)?;
    let dir = engine
        .settings()
        .cache_dir()
        .map_or_else(|| "memory".to_string(), |d| d.display().to_string());
    println!("{} entries in {}", engine.cache().stats().entries, dir);
    Ok(())
}
