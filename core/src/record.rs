//! Per-file records and the pattern-based source analyzer.
//!
//! Content is read at most once per record and hashed on that first read.
//! Import/export extraction is regex over raw text, not parsing: it is meant
//! to be fast and approximate, and it stays that way.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuditError, Result};

static RE_ES_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\s+.*?\s+from\s+['"](.+?)['"]"#).expect("valid import regex"));
static RE_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"require\(['"](.+?)['"]\)"#).expect("valid require regex"));
static RE_NAMED_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+(?:function|class|const|let|var)\s+(\w+)").expect("valid named export regex"));
static RE_GLOBAL_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:window|module\.exports)\.(\w+)\s*=").expect("valid global export regex"));
static RE_FUNCTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"function\s+\w+").expect("valid function regex"));
static RE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"class\s+\w+").expect("valid class regex"));
static RE_CONSOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"console\.(?:log|warn|error)").expect("valid console regex"));
static RE_TODO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)//\s*TODO:").expect("valid todo regex"));
static RE_BRANCH_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:if|else|for|while|case|catch)\b").expect("valid branch keyword regex"));

/// Metrics derived from one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub line_count: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub console_log_count: usize,
    pub todo_count: usize,
    pub cyclomatic_complexity: usize,
    /// Raw import targets in order of appearance, duplicates kept.
    pub imports: Vec<String>,
    /// Exported names; `"default"` marks a default export.
    pub exports: Vec<String>,
}

/// One scanned file.
#[derive(Debug)]
pub struct FileRecord {
    path: String,
    abs_path: PathBuf,
    size_bytes: u64,
    modified: Option<SystemTime>,
    content: OnceCell<String>,
    content_hash: OnceCell<String>,
}

impl FileRecord {
    /// `path` is the project-relative key, `abs_path` where to read it from.
    pub fn new(
        path: impl Into<String>,
        abs_path: impl Into<PathBuf>,
        size_bytes: u64,
        modified: Option<SystemTime>,
    ) -> Self {
        Self {
            path: path.into(),
            abs_path: abs_path.into(),
            size_bytes,
            modified,
            content: OnceCell::new(),
            content_hash: OnceCell::new(),
        }
    }

    /// Build a record from filesystem metadata.
    pub fn from_disk(path: impl Into<String>, abs_path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(abs_path).map_err(|e| AuditError::io(abs_path, e))?;
        Ok(Self::new(
            path,
            abs_path.to_path_buf(),
            meta.len(),
            meta.modified().ok(),
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path)
    }

    /// `None` until [`FileRecord::load_content`] has succeeded.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.get().map(|s| s.as_str())
    }

    /// Read the file once and cache text and hash.
    pub fn load_content(&self) -> Result<&str> {
        let text = self.content.get_or_try_init(|| {
            let bytes =
                std::fs::read(&self.abs_path).map_err(|e| AuditError::io(&self.abs_path, e))?;
            // Set inside the initializer so the hash is never observed without its text.
            let _ = self.content_hash.set(hash_bytes(&bytes));
            Ok::<_, AuditError>(String::from_utf8_lossy(&bytes).into_owned())
        })?;
        Ok(text.as_str())
    }

    /// Seed content without touching the disk.
    pub fn with_content(self, text: impl Into<String>) -> Self {
        let text = text.into();
        let _ = self.content_hash.set(hash_bytes(text.as_bytes()));
        let _ = self.content.set(text);
        self
    }

    pub fn is_backup_like(&self) -> bool {
        crate::organize::is_backup_name(self.file_name())
    }

    /// Recomputed on every call; only the content is cached.
    pub fn analyze_source(&self) -> Result<SourceMetrics> {
        let text = self.load_content()?;
        Ok(analyze_text(text))
    }
}

pub(crate) fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Pure analysis of source text.
pub fn analyze_text(text: &str) -> SourceMetrics {
    SourceMetrics {
        line_count: text.split('\n').count(),
        function_count: RE_FUNCTION.find_iter(text).count(),
        class_count: RE_CLASS.find_iter(text).count(),
        console_log_count: RE_CONSOLE.find_iter(text).count(),
        todo_count: RE_TODO.find_iter(text).count(),
        cyclomatic_complexity: complexity(text),
        imports: extract_imports(text),
        exports: extract_exports(text),
    }
}

pub fn extract_imports(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for re in [&*RE_ES_IMPORT, &*RE_REQUIRE] {
        for cap in re.captures_iter(text) {
            if let Some(m) = cap.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, target)| target).collect()
}

pub fn extract_exports(text: &str) -> Vec<String> {
    let mut exports: Vec<String> = RE_NAMED_EXPORT
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect();
    if text.contains("export default") {
        exports.push("default".into());
    }
    exports.extend(
        RE_GLOBAL_EXPORT
            .captures_iter(text)
            .map(|cap| cap[1].to_string()),
    );
    exports
}

/// `1 + if + else + for + while + case + catch + && + || + ?` over raw text.
pub fn complexity(text: &str) -> usize {
    1 + RE_BRANCH_KEYWORD.find_iter(text).count()
        + text.matches("&&").count()
        + text.matches("||").count()
        + text.matches('?').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, text: &str) -> FileRecord {
        FileRecord::new(path, PathBuf::from(path), text.len() as u64, None).with_content(text)
    }

    #[test]
    fn imports_keep_order_and_duplicates() {
        let text = r#"
const fs = require('fs');
import { a } from './a';
import b from "./b.js";
const again = require('./a');
"#;
        assert_eq!(extract_imports(text), vec!["fs", "./a", "./b.js", "./a"]);
    }

    #[test]
    fn exports_cover_named_default_and_assignment() {
        let text = r#"
export function start() {}
export const LIMIT = 3;
export default App;
window.Portal = Portal;
module.exports.helper = helper;
"#;
        assert_eq!(
            extract_exports(text),
            vec!["start", "LIMIT", "default", "Portal", "helper"]
        );
    }

    #[test]
    fn complexity_counts_branches_and_operators() {
        let text = "if (a && b) { x = c ? 1 : 2 } else { while (d || e) {} }";
        // 1 + if + else + while + && + || + ?
        assert_eq!(complexity(text), 7);
        // identifiers containing keywords do not count
        assert_eq!(complexity("const iffy = format;"), 1);
    }

    #[test]
    fn console_and_todo_counts() {
        let text = "console.log(1);\nconsole.warn(2);\nconsole.info(3);\n// TODO: fix\n//todo: lower\n";
        let metrics = analyze_text(text);
        assert_eq!(metrics.console_log_count, 2);
        assert_eq!(metrics.todo_count, 2);
        assert_eq!(metrics.line_count, 6);
    }

    #[test]
    fn analysis_is_idempotent() {
        let rec = record("src/app.js", "export class App {}\nfunction run() { if (x) {} }\n");
        let first = rec.analyze_source().unwrap();
        let second = rec.analyze_source().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.class_count, 1);
        assert_eq!(first.function_count, 1);
        assert_eq!(first.exports, vec!["App"]);
    }

    #[test]
    fn hash_is_stable_and_set_with_content() {
        let a = record("a.js", "same");
        let b = record("b.js", "same");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().map(str::len), Some(64));
        assert_ne!(a.content_hash(), record("c.js", "samf").content_hash());
    }

    #[test]
    fn hash_is_unset_before_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.js");
        std::fs::write(&path, "let x = 1;").unwrap();
        let rec = FileRecord::from_disk("x.js", &path).unwrap();
        assert!(rec.content_hash().is_none());
        assert_eq!(rec.load_content().unwrap(), "let x = 1;");
        assert_eq!(rec.content_hash(), Some(hash_bytes(b"let x = 1;").as_str()));
    }

    #[test]
    fn vanished_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.js");
        std::fs::write(&path, "x").unwrap();
        let rec = FileRecord::from_disk("gone.js", &path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(rec.load_content(), Err(AuditError::Io { .. })));
        assert!(rec.content_hash().is_none());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("src/App.JS").as_deref(), Some("js"));
        assert_eq!(extension_of("docs/.hidden"), None);
        assert_eq!(extension_of("Makefile"), None);
    }
}
