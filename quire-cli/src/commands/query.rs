//! Document queries: `list` and `show`.

use super::open_engine;
use anyhow::{bail, Context, Result};
use quire_core::{Phase, QueryError};
use serde_json::json;
use std::path::Path;

pub struct ListOptions {
    pub filter: String,
    pub sort: String,
    pub map: String,
    pub reverse: bool,
    pub json: bool,
    pub phase: Phase,
}

pub fn list_documents(config_path: &Path, opts: &ListOptions) -> Result<()> {
    let mut engine = open_engine(config_path)?;
    engine.run(opts.phase)?;

    let values = engine
        .query()
        .filter(opts.filter.as_str())
        .sort(opts.sort.as_str())
        .reverse(opts.reverse)
        .map(&opts.map)
        .context("Query failed")?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for value in &values {
            println!("{}", value);
        }
    }
    Ok(())
}

pub fn show_document(
    config_path: &Path,
    filter: &str,
    field: Option<&str>,
    phase: Phase,
) -> Result<()> {
    let mut engine = open_engine(config_path)?;
    engine.run(phase)?;

    let index = match engine.query().filter(filter).one() {
        Ok(index) => index,
        Err(QueryError::TooManyPosts { count }) => {
            bail!("{} documents match '{}'; narrow the filter", count, filter)
        }
        Err(QueryError::NoPosts) => bail!("No document matches '{}'", filter),
        Err(err) => return Err(err).context("Query failed"),
    };

    if let Some(field) = field {
        let value = engine.document_attr(index, field)?;
        println!("{}", value);
        return Ok(());
    }

    let doc = engine
        .document(index)
        .context("Matched document disappeared")?;
    let payload = json!({
        "path": doc.path().to_string_lossy(),
        "slug": doc.slug(),
        "content_hash": doc.content_hash(),
        "skip": doc.skip,
        "fields": doc.fields(),
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
