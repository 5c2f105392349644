//! Import graph over scanned files.
//!
//! Edges are `(from, raw target)` pairs. Targets are kept exactly as written
//! in the source so broken-import detection can report what the author typed;
//! resolution against the scanned tree happens only when a query needs it.

use std::collections::{BTreeSet, HashMap};

use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::record::extension_of;

/// Allowlist of files that are reachable without being imported.
#[derive(Debug, Clone)]
pub struct EntryPointMatcher {
    patterns: Vec<(String, Regex)>,
    globs: GlobSet,
}

impl EntryPointMatcher {
    /// Every pattern must compile as a regular expression, every glob as a
    /// glob. Either failure is a configuration error.
    pub fn compile(patterns: &[String], globs: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map(|re| (p.clone(), re))
                    .map_err(|source| AuditError::InvalidPattern {
                        pattern: p.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = GlobSetBuilder::new();
        for g in globs {
            let glob = Glob::new(g).map_err(|source| AuditError::InvalidGlob {
                pattern: g.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let globs = builder.build().map_err(|source| AuditError::InvalidGlob {
            pattern: globs.join(", "),
            source,
        })?;

        Ok(Self { patterns, globs })
    }

    /// Containment, then regex, per pattern; globs last.
    pub fn is_entry_point(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|(literal, re)| path.contains(literal.as_str()) || re.is_match(path))
            || self.globs.is_match(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenImport {
    pub from: String,
    pub to: String,
    pub resolved: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedFile {
    pub file: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    forward: IndexMap<String, IndexSet<String>>,
    reverse: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert into both directions at once. Re-adding an edge is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Raw targets imported by `path`, in first-seen order.
    pub fn dependencies_of(&self, path: &str) -> Vec<String> {
        self.forward
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files whose raw import target is exactly `target`.
    pub fn dependents_of(&self, target: &str) -> Vec<String> {
        self.reverse
            .get(target)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(IndexSet::len).sum()
    }

    /// Relative targets that do not land on a scanned file once resolved.
    pub fn find_broken_imports(
        &self,
        scanned: &BTreeSet<String>,
        default_ext: &str,
    ) -> Vec<BrokenImport> {
        let mut broken = Vec::new();
        for (from, to) in self.edges() {
            let Some(resolved) = resolve_target(from, to, default_ext) else {
                continue;
            };
            if !scanned.contains(&resolved) {
                debug!(from, to, resolved = %resolved, "unresolved import");
                broken.push(BrokenImport {
                    from: from.to_string(),
                    to: to.to_string(),
                    resolved,
                    reason: "File not found".into(),
                });
            }
        }
        broken
    }

    /// Candidates nobody imports and no entry point pattern covers.
    ///
    /// A candidate's dependents are the importers whose raw target either
    /// equals the candidate path or resolves to it.
    pub fn find_unused_files<'a, I>(
        &self,
        candidates: I,
        entry_points: &EntryPointMatcher,
        default_ext: &str,
    ) -> Vec<UnusedFile>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let resolved = self.resolved_dependents(default_ext);
        candidates
            .into_iter()
            .filter(|path| {
                let imported = resolved.get(*path).is_some_and(|froms| !froms.is_empty())
                    || self.reverse.get(*path).is_some_and(|froms| !froms.is_empty());
                !imported && !entry_points.is_entry_point(path)
            })
            .map(|path| UnusedFile {
                file: path.to_string(),
                reason: "No imports found".into(),
                suggestion: "Consider removing or archiving".into(),
            })
            .collect()
    }

    fn resolved_dependents(&self, default_ext: &str) -> HashMap<String, IndexSet<&str>> {
        let mut map: HashMap<String, IndexSet<&str>> = HashMap::new();
        for (from, to) in self.edges() {
            if let Some(resolved) = resolve_target(from, to, default_ext) {
                map.entry(resolved).or_default().insert(from);
            }
        }
        map
    }
}

/// Resolve `to` against the directory of `from`.
///
/// Returns `None` for targets outside resolution scope: anything that does
/// not start with `.` (package names, URLs). An extensionless result gets
/// `default_ext` appended. Only `.` and `..` are normalised; no index-file or
/// alias lookup is attempted.
pub fn resolve_target(from: &str, to: &str, default_ext: &str) -> Option<String> {
    if to.starts_with("http") || !to.starts_with('.') {
        return None;
    }
    let mut parts: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    let mut escaped = 0usize;
    for seg in to.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    escaped += 1;
                }
            }
            other => parts.push(other),
        }
    }
    let mut resolved = "../".repeat(escaped);
    resolved.push_str(&parts.join("/"));
    if extension_of(&resolved).is_none() {
        resolved.push('.');
        resolved.push_str(default_ext.trim_start_matches('.'));
    }
    Some(resolved)
}
