//! Shared types for quire
//!
//! This crate provides the types used across the quire workspace:
//! lifecycle phases, hook priorities, source spans and the dynamic
//! [`Value`] carried by document field bags and expressions.

mod value;

pub use value::{Handle, Value};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A build lifecycle phase.
///
/// Phases are totally ordered; the derived `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configure,
    Glob,
    Load,
    PreRender,
    Render,
    PostRender,
    Save,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Phase; 7] = [
        Phase::Configure,
        Phase::Glob,
        Phase::Load,
        Phase::PreRender,
        Phase::Render,
        Phase::PostRender,
        Phase::Save,
    ];

    /// The last phase of a full build.
    pub const LAST: Phase = Phase::Save;

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::Glob => "glob",
            Phase::Load => "load",
            Phase::PreRender => "pre_render",
            Phase::Render => "render",
            Phase::PostRender => "post_render",
            Phase::Save => "save",
        }
    }

    /// Phases up to and including `self`, in order.
    pub fn up_to(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |p| *p <= self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase '{}'", self.0)
    }
}

impl std::error::Error for UnknownPhase {}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Dispatch tier of a hook within one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    First,
    #[default]
    Normal,
    Last,
}

/// Byte range in an expression source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Configure < Phase::Glob);
        assert!(Phase::Render < Phase::PostRender);
        assert_eq!(Phase::ALL.last(), Some(&Phase::LAST));
    }

    #[test]
    fn test_phase_round_trip_names() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
        assert!("teardown".parse::<Phase>().is_err());
    }

    #[test]
    fn test_up_to() {
        let phases: Vec<_> = Phase::Load.up_to().collect();
        assert_eq!(phases, vec![Phase::Configure, Phase::Glob, Phase::Load]);
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::First < Priority::Normal);
        assert!(Priority::Normal < Priority::Last);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
