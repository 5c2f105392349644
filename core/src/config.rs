//! Audit configuration.
//!
//! A flat key/value structure with documented defaults. It can be
//! deserialized from YAML and patched with `key=value` overrides; both paths
//! end in [`AuditConfig::validate`], which is the only place a run can fail
//! before it starts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::graph::EntryPointMatcher;

/// Maps one file extension to the directory it belongs in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MisplacedRule {
    /// Extension without the leading dot (`md`, `sql`).
    pub extension: String,
    /// Project-relative directory prefix the file is expected under.
    pub directory: String,
    /// Directory suggested as the move target.
    pub suggested_dir: String,
}

impl MisplacedRule {
    fn new(extension: &str, directory: &str, suggested_dir: &str) -> Self {
        Self {
            extension: extension.into(),
            directory: directory.into(),
            suggested_dir: suggested_dir.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base directory every reported path is relative to.
    pub project_root: PathBuf,
    /// Directories to scan, relative to `project_root`.
    pub roots: Vec<PathBuf>,
    /// Directory names pruned during the walk.
    pub ignore_dirs: Vec<String>,
    /// Extensions counted as code files in the statistics.
    pub code_extensions: Vec<String>,
    /// Extensions indexed for duplicate and backup detection.
    pub duplicate_extensions: Vec<String>,
    /// Extensions run through source analysis and the dependency graph.
    pub source_extensions: Vec<String>,
    /// Appended to extensionless relative imports before lookup.
    pub default_import_extension: String,
    /// Literal names (containment) or regular expressions.
    pub entry_points: Vec<String>,
    pub entry_point_globs: Vec<String>,
    pub file_size_warning_bytes: u64,
    pub file_size_critical_bytes: u64,
    pub complexity_warning: usize,
    pub console_log_max: usize,
    pub duplicate_similarity: f64,
    /// Run the quadratic near-duplicate pass.
    pub near_duplicates: bool,
    pub unused_days: u64,
    pub backup_recommend_min: usize,
    pub dead_code_recommend_min: usize,
    pub misplaced_rules: Vec<MisplacedRule>,
    pub misplaced_exempt: Vec<String>,
    /// Worker count for per-file analysis. `None` uses the rayon default.
    pub concurrency: Option<usize>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            roots: vec![PathBuf::from(".")],
            ignore_dirs: vec![
                "node_modules".into(),
                ".git".into(),
                "temp".into(),
                "archive".into(),
                "_archive".into(),
                ".vscode".into(),
                ".claude".into(),
            ],
            code_extensions: vec!["js".into(), "css".into(), "html".into()],
            duplicate_extensions: vec!["js".into(), "css".into()],
            source_extensions: vec!["js".into()],
            default_import_extension: "js".into(),
            entry_points: vec![
                "index.html".into(),
                "member-portal.html".into(),
                "nutrition-pro.html".into(),
                r"js/core/.*\.js$".into(),
                r"START-SERVER\.bat$".into(),
            ],
            entry_point_globs: Vec::new(),
            file_size_warning_bytes: 100 * 1024,
            file_size_critical_bytes: 500 * 1024,
            complexity_warning: 20,
            console_log_max: 5,
            duplicate_similarity: 0.95,
            near_duplicates: false,
            unused_days: 90,
            backup_recommend_min: 5,
            dead_code_recommend_min: 10,
            misplaced_rules: vec![
                MisplacedRule::new("md", "docs/", "docs/"),
                MisplacedRule::new("sql", "sql/", "sql/"),
                MisplacedRule::new("txt", "docs/", "docs/assets/"),
            ],
            misplaced_exempt: vec!["claude.md".into()],
            concurrency: None,
        }
    }
}

impl AuditConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: AuditConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply one `key=value` override with type coercion.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            "project_root" => self.project_root = PathBuf::from(value),
            "roots" => self.roots = parse_list(value).into_iter().map(PathBuf::from).collect(),
            "ignore_dirs" => self.ignore_dirs = parse_list(value),
            "code_extensions" => self.code_extensions = parse_extensions(value),
            "duplicate_extensions" => self.duplicate_extensions = parse_extensions(value),
            "source_extensions" => self.source_extensions = parse_extensions(value),
            "default_import_extension" => {
                self.default_import_extension = value.trim_start_matches('.').to_string()
            }
            "entry_points" => self.entry_points = parse_list(value),
            "entry_point_globs" => self.entry_point_globs = parse_list(value),
            "file_size_warning_bytes" => self.file_size_warning_bytes = parse_num(key, value)?,
            "file_size_critical_bytes" => self.file_size_critical_bytes = parse_num(key, value)?,
            "complexity_warning" => self.complexity_warning = parse_num(key, value)?,
            "console_log_max" => self.console_log_max = parse_num(key, value)?,
            "duplicate_similarity" => self.duplicate_similarity = parse_num(key, value)?,
            "near_duplicates" => self.near_duplicates = parse_bool(key, value)?,
            "unused_days" => self.unused_days = parse_num(key, value)?,
            "backup_recommend_min" => self.backup_recommend_min = parse_num(key, value)?,
            "dead_code_recommend_min" => self.dead_code_recommend_min = parse_num(key, value)?,
            "misplaced_exempt" => self.misplaced_exempt = parse_list(value),
            "concurrency" => {
                self.concurrency = if value.is_empty() || value == "auto" {
                    None
                } else {
                    Some(parse_num(key, value)?)
                }
            }
            other => {
                return Err(AuditError::Config(format!("unknown key `{other}`")));
            }
        }
        Ok(())
    }

    /// Apply a batch of `key=value` strings.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, sets: &[S]) -> Result<()> {
        for kv in sets {
            let kv = kv.as_ref();
            let Some((key, value)) = kv.split_once('=') else {
                return Err(AuditError::Config(format!(
                    "override `{kv}` is not of the form key=value"
                )));
            };
            self.set(key, value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duplicate_similarity.is_finite()
            || !(0.0..=1.0).contains(&self.duplicate_similarity)
        {
            return Err(AuditError::Config(format!(
                "duplicate_similarity must be within [0, 1], got {}",
                self.duplicate_similarity
            )));
        }
        if self.file_size_warning_bytes > self.file_size_critical_bytes {
            return Err(AuditError::Config(format!(
                "file_size_warning_bytes ({}) exceeds file_size_critical_bytes ({})",
                self.file_size_warning_bytes, self.file_size_critical_bytes
            )));
        }
        if self.concurrency == Some(0) {
            return Err(AuditError::Config("concurrency must be at least 1".into()));
        }
        if self.roots.is_empty() {
            return Err(AuditError::Config("no roots configured".into()));
        }
        if self.default_import_extension.is_empty() {
            return Err(AuditError::Config(
                "default_import_extension must not be empty".into(),
            ));
        }
        EntryPointMatcher::compile(&self.entry_points, &self.entry_point_globs)?;
        Ok(())
    }

    pub(crate) fn has_extension(list: &[String], ext: &str) -> bool {
        list.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_extensions(value: &str) -> Vec<String> {
    parse_list(value)
        .into_iter()
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .collect()
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        AuditError::Config(format!("`{key}` expects a number, got `{value}`"))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AuditError::Config(format!(
            "`{key}` expects a boolean, got `{value}`"
        ))),
    }
}
