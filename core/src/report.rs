//! The Report: the only artifact an audit run hands to a renderer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Backup,
    Duplicate,
    NearDuplicate,
    BrokenImport,
    Unused,
    FileSize,
    Complexity,
    ConsoleLog,
    Todo,
    Misplaced,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Backup => "backup",
            Category::Duplicate => "duplicate",
            Category::NearDuplicate => "near_duplicate",
            Category::BrokenImport => "broken_import",
            Category::Unused => "unused",
            Category::FileSize => "file_size",
            Category::Complexity => "complexity",
            Category::ConsoleLog => "console_log",
            Category::Todo => "todo",
            Category::Misplaced => "misplaced",
        }
    }
}

/// One finding. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        category: Category,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            file: file.into(),
            details: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueBuckets {
    pub critical: Vec<Issue>,
    pub warning: Vec<Issue>,
    pub info: Vec<Issue>,
}

impl IssueBuckets {
    pub fn bucket(&self, severity: Severity) -> &[Issue] {
        match severity {
            Severity::Critical => &self.critical,
            Severity::Warning => &self.warning,
            Severity::Info => &self.info,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.critical
            .iter()
            .chain(self.warning.iter())
            .chain(self.info.iter())
    }

    pub fn len(&self) -> usize {
        self.critical.len() + self.warning.len() + self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_category(&self, category: Category) -> impl Iterator<Item = &Issue> {
        self.iter().filter(move |i| i.category == category)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub code_files: usize,
    pub duplicate_groups: usize,
    pub backup_files: usize,
    pub dead_code_files: usize,
    pub broken_imports: usize,
    pub misplaced_files: usize,
    pub near_duplicate_pairs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn priority(self) -> u8 {
        match self {
            Impact::High => 1,
            Impact::Medium => 2,
            Impact::Low => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub impact: Impact,
    pub action: String,
    pub priority: u8,
}

impl Recommendation {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        impact: Impact,
        action: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            impact,
            action: action.into(),
            priority: impact.priority(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub recommendations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub issues: IssueBuckets,
    pub stats: Stats,
    pub recommendations: Vec<Recommendation>,
    pub roots_scanned: usize,
    pub skipped_entries: usize,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            generated_at: Utc::now(),
            issues: IssueBuckets::default(),
            stats: Stats::default(),
            recommendations: Vec::new(),
            roots_scanned: 0,
            skipped_entries: 0,
        }
    }
}

impl Report {
    pub fn add_issue(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Critical => self.issues.critical.push(issue),
            Severity::Warning => self.issues.warning.push(issue),
            Severity::Info => self.issues.info.push(issue),
        }
    }

    /// Keeps the list ordered by priority; equal priorities keep insertion order.
    pub fn add_recommendation(&mut self, rec: Recommendation) {
        let at = self
            .recommendations
            .partition_point(|r| r.priority <= rec.priority);
        self.recommendations.insert(at, rec);
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.issues.len(),
            critical: self.issues.critical.len(),
            warning: self.issues.warning.len(),
            info: self.issues.info.len(),
            recommendations: self.recommendations.len(),
        }
    }
}

/// `1536` -> `"1.5 KiB"`.
pub fn format_kib(bytes: u64) -> String {
    format!("{:.1} KiB", bytes as f64 / 1024.0)
}
