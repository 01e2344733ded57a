//! Attribute capabilities: which plugin produces which attribute, and when.

use quire_types::Phase;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no plugin produces attribute '{0}'")]
pub struct UnknownAttribute(pub String);

/// One plugin's claim to produce an attribute during a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Production {
    pub phase: Phase,
    pub producer: String,
}

#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, Vec<Production>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `producer` populates each of `names` during `phase`.
    /// Earlier registrations for the same name are kept.
    pub fn register(&mut self, names: &[&str], phase: Phase, producer: &str) {
        for name in names {
            self.entries
                .entry((*name).to_string())
                .or_default()
                .push(Production {
                    phase,
                    producer: producer.to_string(),
                });
        }
    }

    /// Phase to run to for `name`: the latest phase any producer claims
    pub fn resolve(&self, name: &str) -> Result<Phase, UnknownAttribute> {
        self.producers(name)
            .iter()
            .map(|p| p.phase)
            .max()
            .ok_or_else(|| UnknownAttribute(name.to_string()))
    }

    pub fn producers(&self, name: &str) -> &[Production] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All attributes in name order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Production])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
