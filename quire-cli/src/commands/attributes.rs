//! Attribute commands: `get` and `capabilities`.

use super::open_engine;
use anyhow::Result;
use serde_json::json;
use std::path::Path;

/// Resolve a site attribute lazily and print it as JSON
pub fn get_attribute(config_path: &Path, name: &str) -> Result<()> {
    let mut engine = open_engine(config_path)?;
    let value = engine.get_or_compute(name)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn list_capabilities(config_path: &Path, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let registry = engine.capabilities();

    if json {
        let entries: serde_json::Map<String, serde_json::Value> = registry
            .entries()
            .map(|(name, producers)| {
                let phase = registry.resolve(name).ok();
                (
                    name.to_string(),
                    json!({ "phase": phase, "producers": producers }),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (name, producers) in registry.entries() {
        let by: Vec<String> = producers
            .iter()
            .map(|p| format!("{}@{}", p.producer, p.phase))
            .collect();
        println!("{:<16} {}", name, by.join(", "));
    }
    Ok(())
}
