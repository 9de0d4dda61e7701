//! Taint analysis types and data structures.
//!
//! This module contains the core types used by the analyzer:
//! - Reported issues and their severity
//! - Per-expression taint classification results
//! - Per-scope taint state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Severity of a reported issue, mirroring LSP diagnostic severities.
/// Serializes as the numeric wire value (1 = error, 2 = warning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    /// Error (LSP severity 1)
    Error,
    /// Warning (LSP severity 2)
    Warning,
}

impl Severity {
    /// Numeric value used on the wire (1 = error, 2 = warning)
    #[must_use]
    pub fn as_number(self) -> u8 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> u8 {
        severity.as_number()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Severity::Error),
            2 => Ok(Severity::Warning),
            other => Err(format!("invalid severity: {other}")),
        }
    }
}

/// A single reported flow violation.
///
/// Positions are zero-based; `col_end` is exclusive. Issues are immutable once
/// created and collected in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Zero-based line of the offending statement or call
    pub line: u32,
    /// Zero-based start column
    pub col_start: u32,
    /// Zero-based end column (exclusive)
    pub col_end: u32,
    /// Human-readable description, citing sources and sink where known
    pub message: String,
    /// Severity of the finding
    pub severity: Severity,
}

/// Classification of a single expression.
///
/// Invariant: `tainted` and `sanitized` are never both true; when a merge
/// would produce both, taint wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintResult {
    /// Does the expression carry externally-controlled data?
    pub tainted: bool,
    /// Has the expression passed through a recognized neutralizing call?
    pub sanitized: bool,
    /// Labels of the sources contributing taint (sorted for stable reporting)
    pub sources: BTreeSet<String>,
}

impl TaintResult {
    /// A clean result: neither tainted nor sanitized.
    #[must_use]
    pub fn clean() -> Self {
        Self::default()
    }

    /// A tainted result with a single source label.
    #[must_use]
    pub fn tainted_by(source: impl Into<String>) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source.into());
        Self {
            tainted: true,
            sanitized: false,
            sources,
        }
    }

    /// A tainted result carrying an existing source set.
    #[must_use]
    pub fn tainted_with(sources: BTreeSet<String>) -> Self {
        Self {
            tainted: true,
            sanitized: false,
            sources,
        }
    }

    /// A sanitized result.
    #[must_use]
    pub fn sanitized() -> Self {
        Self {
            tainted: false,
            sanitized: true,
            sources: BTreeSet::new(),
        }
    }

    /// Merge a set of results: tainted if any input is tainted (sources are
    /// the union over tainted inputs), else sanitized if any input is
    /// sanitized. Taint forces `sanitized` false.
    #[must_use]
    pub fn merge<I: IntoIterator<Item = TaintResult>>(results: I) -> Self {
        let mut tainted = false;
        let mut sanitized = false;
        let mut sources = BTreeSet::new();
        for res in results {
            if res.tainted {
                tainted = true;
                sources.extend(res.sources);
            }
            sanitized = sanitized || res.sanitized;
        }
        if tainted {
            sanitized = false;
        }
        Self {
            tainted,
            sanitized,
            sources,
        }
    }
}

/// Mutable taint state for one function or coroutine body (or the module
/// top level). Allocated empty on scope entry, discarded on exit; nothing
/// crosses scope boundaries in either direction.
#[derive(Debug, Default)]
pub struct ScopeState {
    /// Variable name -> the source labels that tainted it
    tainted_vars: HashMap<String, BTreeSet<String>>,
    sanitized_vars: HashSet<String>,
    /// Container name -> set of tainted literal keys ("*" means all keys)
    tainted_keys: HashMap<String, HashSet<String>>,
    /// Object name -> set of tainted attribute names
    tainted_attrs: HashMap<String, HashSet<String>>,
}

/// Wildcard key meaning "every key of this container is tainted".
pub const WILDCARD_KEY: &str = "*";

impl ScopeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a variable tainted with the sources that contributed the taint,
    /// removing any sanitized mark. An empty source set falls back to the
    /// name itself, so a seeded handler parameter cites itself.
    pub fn mark_tainted(&mut self, name: &str, sources: &BTreeSet<String>) {
        self.sanitized_vars.remove(name);
        let stored = if sources.is_empty() {
            BTreeSet::from([name.to_string()])
        } else {
            sources.clone()
        };
        self.tainted_vars.insert(name.to_string(), stored);
    }

    /// Mark a variable sanitized, removing any taint mark.
    pub fn mark_sanitized(&mut self, name: &str) {
        self.tainted_vars.remove(name);
        self.sanitized_vars.insert(name.to_string());
    }

    /// Drop both marks for a variable (plain overwrite with clean data).
    pub fn clear(&mut self, name: &str) {
        self.tainted_vars.remove(name);
        self.sanitized_vars.remove(name);
    }

    #[must_use]
    pub fn is_tainted(&self, name: &str) -> bool {
        self.tainted_vars.contains_key(name)
    }

    /// Source labels recorded for a tainted variable, if any.
    #[must_use]
    pub fn taint_sources(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.tainted_vars.get(name)
    }

    #[must_use]
    pub fn is_sanitized(&self, name: &str) -> bool {
        self.sanitized_vars.contains(name)
    }

    /// Snapshot of the currently tainted variable names.
    #[must_use]
    pub fn tainted_snapshot(&self) -> HashSet<String> {
        self.tainted_vars.keys().cloned().collect()
    }

    /// Mark `container[key]` tainted.
    pub fn taint_key(&mut self, container: &str, key: &str) {
        self.tainted_keys
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Clear the taint mark for `container[key]`, dropping the container
    /// entry if it becomes empty.
    pub fn clear_key(&mut self, container: &str, key: &str) {
        if let Some(keys) = self.tainted_keys.get_mut(container) {
            keys.remove(key);
            if keys.is_empty() {
                self.tainted_keys.remove(container);
            }
        }
    }

    #[must_use]
    pub fn key_is_tainted(&self, container: &str, key: &str) -> bool {
        self.tainted_keys
            .get(container)
            .is_some_and(|keys| keys.contains(key) || keys.contains(WILDCARD_KEY))
    }

    /// Mark `object.attr` tainted.
    pub fn taint_attr(&mut self, object: &str, attr: &str) {
        self.tainted_attrs
            .entry(object.to_string())
            .or_default()
            .insert(attr.to_string());
    }

    /// Clear the taint mark for `object.attr`, dropping the object entry if
    /// it becomes empty.
    pub fn clear_attr(&mut self, object: &str, attr: &str) {
        if let Some(attrs) = self.tainted_attrs.get_mut(object) {
            attrs.remove(attr);
            if attrs.is_empty() {
                self.tainted_attrs.remove(object);
            }
        }
    }

    #[must_use]
    pub fn attr_is_tainted(&self, object: &str, attr: &str) -> bool {
        self.tainted_attrs
            .get(object)
            .is_some_and(|attrs| attrs.contains(attr))
    }
}
