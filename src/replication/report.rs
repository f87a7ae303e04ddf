use std::fmt::Display;

use crate::{CacheError, Result};

/// A server that a fan-out operation was sent to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Local(String),
    Replica(String),
}

impl Target {
    pub fn addr(&self) -> &str {
        match self {
            Target::Local(addr) | Target::Replica(addr) => addr,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Target::Local(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(addr) => write!(f, "{} (local)", addr),
            Self::Replica(addr) => write!(f, "{}", addr),
        }
    }
}

/// Per-target outcome of a fan-out `set` or `delete`, in the order the targets
/// were contacted. The local server is always first.
#[derive(Debug, Default)]
pub struct Replication {
    outcomes: Vec<(Target, Result<()>)>,
}

impl Replication {
    pub(crate) fn record(&mut self, target: Target, outcome: Result<()>) {
        self.outcomes.push((target, outcome));
    }

    /// True when every target acknowledged the operation.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_ok())
    }

    /// Addresses of the targets which failed.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(target, _)| target.addr())
            .collect()
    }

    pub fn outcome(&self, addr: &str) -> Option<&Result<()>> {
        self.outcomes
            .iter()
            .find(|(target, _)| target.addr() == addr)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, &Result<()>)> {
        self.outcomes.iter().map(|(target, outcome)| (target, outcome))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Collapse the report, failing with [`CacheError::Replication`] if any
    /// target did not acknowledge the operation.
    pub fn into_result(self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(CacheError::Replication {
            failed: self.failed().into_iter().map(String::from).collect(),
        })
    }
}
