//! File-placement rules: backup-like names and files outside their canonical
//! directory.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::MisplacedRule;
use crate::record::extension_of;

static BACKUP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"-backup\.(?:js|css|json)$",
        r"-old\.(?:js|css|json)$",
        r"-copy\.(?:js|css|json)$",
        r"-v\d+\.(?:js|css|json)$",
        r"\.bak$",
        r"~$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid backup regex"))
    .collect()
});

/// Name-only check against the manual-backup conventions.
pub fn is_backup_name(file_name: &str) -> bool {
    BACKUP_PATTERNS.iter().any(|re| re.is_match(file_name))
}

/// A file found outside the directory its extension implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misplacement {
    pub extension: String,
    pub expected_dir: String,
    pub suggested_path: String,
}

/// Check `rel_path` against the rules. Exempt entries match the whole
/// project-relative path.
pub fn find_misplacement(
    rel_path: &str,
    rules: &[MisplacedRule],
    exempt: &[String],
) -> Option<Misplacement> {
    if exempt.iter().any(|e| e == rel_path) {
        return None;
    }
    let ext = extension_of(rel_path)?;
    let rule = rules
        .iter()
        .find(|r| r.extension.trim_start_matches('.').eq_ignore_ascii_case(&ext))?;
    if rel_path.starts_with(&rule.directory) {
        return None;
    }
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let mut suggested = rule.suggested_dir.clone();
    if !suggested.is_empty() && !suggested.ends_with('/') {
        suggested.push('/');
    }
    suggested.push_str(file_name);
    Some(Misplacement {
        extension: ext,
        expected_dir: rule.directory.clone(),
        suggested_path: suggested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;

    #[test]
    fn test_is_backup_name() {
        assert!(is_backup_name("planner-backup.js"));
        assert!(is_backup_name("theme-old.css"));
        assert!(is_backup_name("data-copy.json"));
        assert!(is_backup_name("stats-v2.js"));
        assert!(is_backup_name("notes.bak"));
        assert!(is_backup_name("main.js~"));
        assert!(!is_backup_name("backup.js"));
        assert!(!is_backup_name("old-school.js"));
        assert!(!is_backup_name("stats-v2.ts"));
        assert!(!is_backup_name("copy.md"));
    }

    #[test]
    fn markdown_outside_docs_is_misplaced() {
        let cfg = AuditConfig::default();
        let found = find_misplacement("js/README.md", &cfg.misplaced_rules, &cfg.misplaced_exempt)
            .expect("misplaced");
        assert_eq!(found.suggested_path, "docs/README.md");
        assert_eq!(found.expected_dir, "docs/");
    }

    #[test]
    fn text_files_suggest_assets_dir() {
        let cfg = AuditConfig::default();
        let found =
            find_misplacement("notes.txt", &cfg.misplaced_rules, &cfg.misplaced_exempt).unwrap();
        assert_eq!(found.suggested_path, "docs/assets/notes.txt");
    }

    #[test]
    fn files_in_place_or_exempt_are_ignored() {
        let cfg = AuditConfig::default();
        let rules = &cfg.misplaced_rules;
        assert!(find_misplacement("docs/guide.md", rules, &cfg.misplaced_exempt).is_none());
        assert!(find_misplacement("sql/schema.sql", rules, &cfg.misplaced_exempt).is_none());
        assert!(find_misplacement("claude.md", rules, &cfg.misplaced_exempt).is_none());
        assert!(find_misplacement("js/app.js", rules, &cfg.misplaced_exempt).is_none());
    }
}
