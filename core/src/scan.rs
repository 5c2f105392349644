//! Scan phase: walk the configured roots and collect file records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::AuditConfig;
use crate::record::FileRecord;

/// Everything the later phases need from the walk.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Sorted by project-relative path, one record per path.
    pub files: Vec<Arc<FileRecord>>,
    pub total_size_bytes: u64,
    pub code_files: usize,
    /// Configured roots that could be opened as directories.
    pub roots_scanned: usize,
    /// Entries the walker could not stat or descend into.
    pub skipped_entries: usize,
}

impl ScanOutcome {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path())
    }
}

/// Walk every root depth-first, pruning `ignore_dirs`. An inaccessible root or
/// entry is logged and skipped; the walk itself never fails.
pub fn scan(config: &AuditConfig) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut by_path: BTreeMap<String, Arc<FileRecord>> = BTreeMap::new();

    for root in &config.roots {
        let base = config.project_root.join(root);
        if !base.is_dir() {
            warn!(root = %base.display(), "root is not an accessible directory; skipping");
            continue;
        }
        outcome.roots_scanned += 1;

        let mut walker = WalkDir::new(&base).sort_by_file_name().into_iter();
        while let Some(entry_res) = walker.next() {
            let entry = match entry_res {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    outcome.skipped_entries += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && is_ignored_dir(entry.file_name(), &config.ignore_dirs) {
                    debug!(dir = %entry.path().display(), "pruned");
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(path = %entry.path().display(), error = %err, "skipping dangling link");
                        outcome.skipped_entries += 1;
                        continue;
                    }
                }
            }

            let rel = to_display_path(entry.path(), &config.project_root);
            if by_path.contains_key(&rel) {
                continue;
            }
            match FileRecord::from_disk(rel.clone(), entry.path()) {
                Ok(record) => {
                    by_path.insert(rel, Arc::new(record));
                }
                Err(err) => {
                    warn!(error = %err, "skipping entry");
                    outcome.skipped_entries += 1;
                }
            }
        }
    }

    for record in by_path.into_values() {
        outcome.total_size_bytes += record.size_bytes();
        if record
            .extension()
            .is_some_and(|ext| AuditConfig::has_extension(&config.code_extensions, &ext))
        {
            outcome.code_files += 1;
        }
        outcome.files.push(record);
    }

    info!(
        files = outcome.files.len(),
        bytes = outcome.total_size_bytes,
        roots = outcome.roots_scanned,
        skipped = outcome.skipped_entries,
        "scan complete"
    );
    outcome
}

fn is_ignored_dir(name: &std::ffi::OsStr, ignore_dirs: &[String]) -> bool {
    let name = name.to_string_lossy();
    ignore_dirs.iter().any(|d| d.as_str() == name)
}

/// Project-relative path with `/` separators and no leading `./`.
pub fn to_display_path(path: &Path, project_root: &Path) -> String {
    let rel: PathBuf = pathdiff::diff_paths(path, project_root)
        .or_else(|| path.strip_prefix(project_root).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf());
    let text = rel.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config_for(root: &Path) -> AuditConfig {
        AuditConfig {
            project_root: root.to_path_buf(),
            ..AuditConfig::default()
        }
    }

    #[test]
    fn ignored_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "js/app.js", "let a;");
        write(dir.path(), "node_modules/lib/index.js", "let b;");
        write(dir.path(), "archive/old.js", "let c;");
        write(dir.path(), "docs/readme.md", "# hi");

        let outcome = scan(&config_for(dir.path()));
        let paths: Vec<&str> = outcome.paths().collect();
        assert_eq!(paths, vec!["docs/readme.md", "js/app.js"]);
        assert_eq!(outcome.code_files, 1);
        assert_eq!(outcome.total_size_bytes, 10);
        assert_eq!(outcome.roots_scanned, 1);
    }

    #[test]
    fn missing_root_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "js/app.js", "x");
        let mut cfg = config_for(dir.path());
        cfg.roots = vec![PathBuf::from("nope"), PathBuf::from("js")];

        let outcome = scan(&cfg);
        assert_eq!(outcome.roots_scanned, 1);
        assert_eq!(outcome.paths().collect::<Vec<_>>(), vec!["js/app.js"]);
    }

    #[test]
    fn overlapping_roots_do_not_duplicate_records() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "js/app.js", "x");
        let mut cfg = config_for(dir.path());
        cfg.roots = vec![PathBuf::from("."), PathBuf::from("js")];

        let outcome = scan(&cfg);
        assert_eq!(outcome.roots_scanned, 2);
        assert_eq!(outcome.files.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_counted_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "js/app.js", "x");
        std::os::unix::fs::symlink(
            dir.path().join("js/missing.js"),
            dir.path().join("js/link.js"),
        )
        .unwrap();

        let outcome = scan(&config_for(dir.path()));
        assert_eq!(outcome.paths().collect::<Vec<_>>(), vec!["js/app.js"]);
        assert_eq!(outcome.skipped_entries, 1);
        assert_eq!(outcome.roots_scanned, 1);
    }

    #[test]
    fn display_paths_are_relative_and_slashed() {
        let root = Path::new("/work/project");
        assert_eq!(
            to_display_path(Path::new("/work/project/js/app.js"), root),
            "js/app.js"
        );
        assert_eq!(to_display_path(Path::new("./js/app.js"), Path::new(".")), "js/app.js");
    }
}
