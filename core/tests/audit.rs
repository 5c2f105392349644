use std::fs;
use std::path::{Path, PathBuf};

use repoaudit_core::{
    AuditConfig, AuditEngine, AuditError, CancelToken, Category, Issue, Report, Severity,
};
use tempfile::TempDir;

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, text) in files {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    dir
}

fn config_for(root: &Path) -> AuditConfig {
    AuditConfig {
        project_root: root.to_path_buf(),
        ..AuditConfig::default()
    }
}

fn audit(root: &Path) -> Report {
    AuditEngine::new(config_for(root)).unwrap().run().unwrap()
}

fn issues(report: &Report, category: Category) -> Vec<&Issue> {
    report.issues.with_category(category).collect()
}

fn assert_flagged(report: &Report, category: Category, file: &str) {
    assert!(
        report
            .issues
            .iter()
            .any(|i| i.category == category && i.file == file),
        "expected {category:?} for {file}, got issues: {:#?}",
        report.issues.iter().map(|i| (i.category, &i.file)).collect::<Vec<_>>()
    );
}

fn assert_not_flagged(report: &Report, category: Category, file: &str) {
    assert!(
        !report
            .issues
            .iter()
            .any(|i| i.category == category && i.file == file),
        "did not expect {category:?} for {file}"
    );
}

#[test]
fn three_file_scenario() {
    let dup = format!("const shared = 1;\n{}", "x".repeat(1200 - 18));
    assert_eq!(dup.len(), 1200);
    let dir = tree(&[
        ("keep.js", "export function foo() { return 1; }\n"),
        ("dup1.js", &dup),
        ("dup2.js", &dup),
        ("broken.js", "import z from './missing';\n"),
    ]);

    let report = audit(dir.path());

    assert_eq!(report.stats.duplicate_groups, 1);
    let dups = issues(&report, Category::Duplicate);
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].severity, Severity::Critical);
    assert_eq!(
        dups[0].details["files"],
        serde_json::json!(["dup1.js", "dup2.js"])
    );
    assert_eq!(dups[0].details["waste_bytes"], 1200);

    let broken = issues(&report, Category::BrokenImport);
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].severity, Severity::Critical);
    assert_eq!(broken[0].file, "broken.js");
    assert_eq!(broken[0].details["to"], "./missing");

    assert_flagged(&report, Category::Unused, "keep.js");
    let keep = issues(&report, Category::Unused)
        .into_iter()
        .find(|i| i.file == "keep.js")
        .unwrap();
    assert_eq!(keep.severity, Severity::Info);
}

#[test]
fn entry_point_pattern_exempts_unused_file() {
    let dir = tree(&[("keep.js", "export function foo() {}\n")]);
    let mut cfg = config_for(dir.path());
    cfg.entry_points.push("keep.js".into());

    let report = AuditEngine::new(cfg).unwrap().run().unwrap();
    assert_not_flagged(&report, Category::Unused, "keep.js");
    assert_eq!(report.stats.dead_code_files, 0);
}

#[test]
fn default_entry_points_cover_core_directory() {
    let dir = tree(&[("js/core/boot.js", "let booted = true;\n")]);
    let report = audit(dir.path());
    assert_not_flagged(&report, Category::Unused, "js/core/boot.js");
}

#[test]
fn relative_import_resolves_when_target_exists() {
    let dir = tree(&[
        ("src/a.js", "import x from './b';\n"),
        ("src/b.js", "export const x = 1;\n"),
    ]);
    let report = audit(dir.path());
    assert!(issues(&report, Category::BrokenImport).is_empty());
    // b is imported through resolution, so only a is unused.
    assert_flagged(&report, Category::Unused, "src/a.js");
    assert_not_flagged(&report, Category::Unused, "src/b.js");
}

#[test]
fn missing_relative_import_is_broken() {
    let dir = tree(&[("src/a.js", "import x from './b';\n")]);
    let report = audit(dir.path());
    let broken = issues(&report, Category::BrokenImport);
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].details["to"], "./b");
    assert_eq!(broken[0].details["resolved"], "src/b.js");
    assert_eq!(report.stats.broken_imports, 1);
}

#[test]
fn package_imports_are_never_broken() {
    let dir = tree(&[
        ("app.js", "import React from 'react';\nconst fs = require('fs');\n"),
        ("react", "not a module"),
    ]);
    let report = audit(dir.path());
    assert!(issues(&report, Category::BrokenImport).is_empty());
}

#[test]
fn repeated_runs_produce_identical_stats() {
    let dir = tree(&[
        ("js/a.js", "import b from './b';\nconsole.log(1);\n"),
        ("js/b.js", "export default 1;\n"),
        ("js/b-copy.js", "export default 1;\n"),
        ("notes.txt", "todo"),
        ("docs/readme.md", "# docs"),
    ]);
    let engine = AuditEngine::new(config_for(dir.path())).unwrap();
    let first = engine.run().unwrap();
    let second = engine.run().unwrap();

    assert_eq!(first.stats, second.stats);
    assert_eq!(
        serde_json::to_string(&first.stats).unwrap(),
        serde_json::to_string(&second.stats).unwrap()
    );
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.summary(), second.summary());
}

#[test]
fn inaccessible_root_is_skipped() {
    let dir = tree(&[("js/app.js", "let a;\n")]);
    let mut cfg = config_for(dir.path());
    cfg.roots = vec![PathBuf::from("does-not-exist")];

    let report = AuditEngine::new(cfg).unwrap().run().unwrap();
    assert_eq!(report.roots_scanned, 0);
    assert_eq!(report.stats.total_files, 0);
    assert!(report.issues.is_empty());
}

#[test]
fn near_duplicates_only_when_enabled() {
    let body = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi";
    let dir = tree(&[
        ("a.js", body),
        ("b.js", &format!("{body} omicron")),
    ]);

    let report = audit(dir.path());
    assert_eq!(report.stats.near_duplicate_pairs, 0);

    let mut cfg = config_for(dir.path());
    cfg.near_duplicates = true;
    cfg.duplicate_similarity = 0.9;
    let report = AuditEngine::new(cfg).unwrap().run().unwrap();
    assert_eq!(report.stats.near_duplicate_pairs, 1);
    let near = issues(&report, Category::NearDuplicate);
    assert_eq!(near[0].severity, Severity::Warning);
    assert_eq!(near[0].file, "a.js");
    assert_eq!(near[0].details["other"], "b.js");
    assert_eq!(near[0].details["similarity"], 93);
}

#[test]
fn cancelled_run_stops_with_error() {
    let dir = tree(&[("a.js", "let a;\n")]);
    let token = CancelToken::new();
    let engine = AuditEngine::new(config_for(dir.path()))
        .unwrap()
        .with_cancel(token.clone());
    token.cancel();
    assert!(matches!(engine.run(), Err(AuditError::Cancelled)));
}

#[test]
fn bad_configuration_is_rejected_before_running() {
    let dir = tree(&[("a.js", "let a;\n")]);
    let mut cfg = config_for(dir.path());
    cfg.entry_points = vec!["[unterminated".into()];
    assert!(matches!(
        AuditEngine::new(cfg),
        Err(AuditError::InvalidPattern { .. })
    ));

    let mut cfg = config_for(dir.path());
    assert!(cfg.apply_overrides(&["complexity_warning=high"]).is_err());
}

#[test]
fn recommendations_follow_statistics() {
    let dir = tree(&[
        ("a.js", "same"),
        ("b.js", "same"),
        ("c.js", "import x from './gone';\n"),
    ]);
    let report = audit(dir.path());
    let titles: Vec<&str> = report
        .recommendations
        .iter()
        .map(|r| r.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Eliminate duplicate files", "Fix broken imports"]);
    assert!(report.recommendations.iter().all(|r| r.priority == 1));
}

#[test]
fn unused_detection_covers_every_scanned_file() {
    let dir = tree(&[
        ("index.html", "<script src=\"js/app.js\"></script>"),
        ("js/app.js", "let app = 1;\n"),
        ("css/orphan.css", "body { margin: 0; }\n"),
        ("data/orphan.json", "{}"),
    ]);
    let report = audit(dir.path());

    assert_flagged(&report, Category::Unused, "css/orphan.css");
    assert_flagged(&report, Category::Unused, "data/orphan.json");
    assert_not_flagged(&report, Category::Unused, "index.html");
    assert_eq!(report.stats.dead_code_files, 3, "app.js, orphan.css, orphan.json");
}

#[test]
fn unused_issue_reports_file_age() {
    let dir = tree(&[("lonely.js", "let x;\n")]);
    let report = audit(dir.path());
    let unused = issues(&report, Category::Unused);
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].details["days_since_modified"], 0);
    assert_eq!(unused[0].details["stale"], false);
}

#[test]
fn file_vanishing_after_scan_is_excluded_without_an_issue() {
    let dir = tree(&[
        ("a.js", "same"),
        ("b.js", "same"),
        ("gone.js", "same\nimport x from './missing';\n"),
    ]);
    let engine = AuditEngine::new(config_for(dir.path())).unwrap();
    let scanned = engine.scan();
    assert_eq!(scanned.files.len(), 3);
    fs::remove_file(dir.path().join("gone.js")).unwrap();

    let analysis = engine.analyze(&scanned).unwrap();
    assert_eq!(analysis.unreadable, 1);
    assert!(analysis.graph.dependencies_of("gone.js").is_empty());
    let groups = analysis.duplicates.find_exact_duplicates();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].files, vec!["a.js", "b.js"]);

    let report = engine.classify(&scanned, &analysis);
    assert!(
        report.issues.iter().all(|i| i.file != "gone.js"),
        "unreadable file should produce no issue: {:#?}",
        report.issues.iter().map(|i| (i.category, &i.file)).collect::<Vec<_>>()
    );
    assert_eq!(report.stats.broken_imports, 0);
    assert_eq!(report.stats.duplicate_groups, 1);
}

#[test]
fn backup_names_only_count_for_indexed_code_files() {
    let dir = tree(&[
        ("js/app-backup.js", "let a = 1;\n"),
        ("css/theme-old.css", "body {}\n"),
        ("data/seed-backup.json", "{}"),
        ("notes.bak", "old"),
    ]);
    let report = audit(dir.path());
    assert_eq!(report.stats.backup_files, 2);
    assert_flagged(&report, Category::Backup, "js/app-backup.js");
    assert_flagged(&report, Category::Backup, "css/theme-old.css");
    assert_not_flagged(&report, Category::Backup, "data/seed-backup.json");
    assert_not_flagged(&report, Category::Backup, "notes.bak");
}
