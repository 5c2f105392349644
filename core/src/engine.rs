//! The audit pipeline: scan, analyze, classify.
//!
//! Each phase takes the previous phase's output by shared reference and
//! returns a fresh value, so a caller can stop after any phase and inspect
//! what it produced. [`AuditEngine::run`] chains all of them.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::duplicates::DuplicateIndex;
use crate::error::{AuditError, Result};
use crate::graph::{DependencyGraph, EntryPointMatcher};
use crate::organize::find_misplacement;
use crate::record::{analyze_text, FileRecord, SourceMetrics};
use crate::report::{format_kib, Category, Impact, Issue, Recommendation, Report, Severity};
use crate::scan::{scan, ScanOutcome};

/// Shared flag polled between files. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-file products of the analysis phase.
#[derive(Debug, Default)]
pub struct Analysis {
    pub duplicates: DuplicateIndex,
    pub graph: DependencyGraph,
    /// Readable source files with their metrics, in scan order.
    pub sources: Vec<(Arc<FileRecord>, SourceMetrics)>,
    pub unreadable: usize,
    /// Paths dropped because their content could not be read.
    pub unreadable_paths: BTreeSet<String>,
}

enum FileOutcome {
    Skipped,
    Unreadable(String),
    Indexed {
        record: Arc<FileRecord>,
        duplicate: bool,
        metrics: Option<SourceMetrics>,
    },
}

pub struct AuditEngine {
    config: AuditConfig,
    entry_points: EntryPointMatcher,
    cancel: CancelToken,
}

impl AuditEngine {
    /// Validate the configuration up front; nothing runs with a bad config.
    pub fn new(config: AuditConfig) -> Result<Self> {
        config.validate()?;
        let entry_points =
            EntryPointMatcher::compile(&config.entry_points, &config.entry_point_globs)?;
        Ok(Self {
            config,
            entry_points,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn run(&self) -> Result<Report> {
        self.check_cancelled()?;
        let scanned = self.scan();
        self.check_cancelled()?;
        let analysis = self.analyze(&scanned)?;
        self.check_cancelled()?;
        Ok(self.classify(&scanned, &analysis))
    }

    pub fn scan(&self) -> ScanOutcome {
        scan(&self.config)
    }

    /// Read, hash and measure every relevant file on the worker pool, then
    /// feed the results into the index and graph from this thread.
    pub fn analyze(&self, scanned: &ScanOutcome) -> Result<Analysis> {
        let outcomes = self.in_pool(|| {
            scanned
                .files
                .par_iter()
                .map(|record| self.analyze_file(record))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut analysis = Analysis::default();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Skipped => {}
                FileOutcome::Unreadable(path) => {
                    analysis.unreadable += 1;
                    analysis.unreadable_paths.insert(path);
                }
                FileOutcome::Indexed {
                    record,
                    duplicate,
                    metrics,
                } => {
                    if duplicate {
                        // Content is already loaded, so this cannot fail on I/O.
                        if let Err(err) = analysis.duplicates.add(Arc::clone(&record)) {
                            warn!(error = %err, "excluding file from duplicate index");
                        }
                    }
                    if let Some(metrics) = metrics {
                        for target in &metrics.imports {
                            analysis.graph.add_edge(record.path(), target);
                        }
                        analysis.sources.push((record, metrics));
                    }
                }
            }
        }

        info!(
            indexed = analysis.duplicates.len(),
            sources = analysis.sources.len(),
            edges = analysis.graph.edge_count(),
            unreadable = analysis.unreadable,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// Turn scan and analysis results into a Report.
    pub fn classify(&self, scanned: &ScanOutcome, analysis: &Analysis) -> Report {
        let mut report = Report {
            roots_scanned: scanned.roots_scanned,
            skipped_entries: scanned.skipped_entries,
            ..Report::default()
        };
        report.stats.total_files = scanned.files.len();
        report.stats.total_size_bytes = scanned.total_size_bytes;
        report.stats.code_files = scanned.code_files;

        self.classify_duplicates(scanned, analysis, &mut report);
        self.classify_dependencies(scanned, analysis, &mut report);
        self.classify_quality(analysis, &mut report);
        self.classify_misplacement(scanned, &mut report);
        self.recommend(&mut report);

        let summary = report.summary();
        info!(
            critical = summary.critical,
            warning = summary.warning,
            info = summary.info,
            recommendations = summary.recommendations,
            "classification complete"
        );
        report
    }

    fn analyze_file(&self, record: &Arc<FileRecord>) -> Result<FileOutcome> {
        self.check_cancelled()?;
        let Some(ext) = record.extension() else {
            return Ok(FileOutcome::Skipped);
        };
        let duplicate = AuditConfig::has_extension(&self.config.duplicate_extensions, &ext);
        let source = AuditConfig::has_extension(&self.config.source_extensions, &ext);
        if !duplicate && !source {
            return Ok(FileOutcome::Skipped);
        }

        let text = match record.load_content() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "excluding unreadable file");
                return Ok(FileOutcome::Unreadable(record.path().to_string()));
            }
        };
        let metrics = source.then(|| analyze_text(text));
        Ok(FileOutcome::Indexed {
            record: Arc::clone(record),
            duplicate,
            metrics,
        })
    }

    fn in_pool<T, F>(&self, job: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        match self.config.concurrency {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| AuditError::Config(format!("cannot start worker pool: {e}")))?;
                pool.install(job)
            }
            None => job(),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }

    fn classify_duplicates(&self, scanned: &ScanOutcome, analysis: &Analysis, report: &mut Report) {
        let backups = scanned.files.iter().filter(|r| {
            r.extension()
                .is_some_and(|ext| AuditConfig::has_extension(&self.config.duplicate_extensions, &ext))
                && r.is_backup_like()
        });
        for record in backups {
            report.add_issue(
                Issue::new(
                    Severity::Warning,
                    Category::Backup,
                    record.path(),
                    format!("Backup file detected: {}", record.file_name()),
                )
                .with_detail("suggestion", "Move to archive or delete"),
            );
            report.stats.backup_files += 1;
        }

        let groups = analysis.duplicates.find_exact_duplicates();
        report.stats.duplicate_groups = groups.len();
        for group in &groups {
            let file = group.files.first().cloned().unwrap_or_default();
            report.add_issue(
                Issue::new(
                    Severity::Critical,
                    Category::Duplicate,
                    file,
                    format!("Found {} identical files", group.count),
                )
                .with_detail("files", group.files.clone())
                .with_detail("count", group.count)
                .with_detail("content_hash", group.content_hash.clone())
                .with_detail("waste_bytes", group.total_waste_bytes)
                .with_detail("waste", format_kib(group.total_waste_bytes)),
            );
        }

        if self.config.near_duplicates {
            let pairs = analysis
                .duplicates
                .find_near_duplicates(self.config.duplicate_similarity);
            report.stats.near_duplicate_pairs = pairs.len();
            for pair in pairs {
                let percent = pair.percent();
                report.add_issue(
                    Issue::new(
                        Severity::Warning,
                        Category::NearDuplicate,
                        pair.first,
                        format!("{percent}% similar to {}", pair.second),
                    )
                    .with_detail("other", pair.second)
                    .with_detail("similarity", percent),
                );
            }
        }
        info!(
            groups = report.stats.duplicate_groups,
            backups = report.stats.backup_files,
            "duplicate detection complete"
        );
    }

    fn classify_dependencies(&self, scanned: &ScanOutcome, analysis: &Analysis, report: &mut Report) {
        let ext = &self.config.default_import_extension;
        let all_paths: BTreeSet<String> = scanned.paths().map(str::to_string).collect();

        let broken = analysis.graph.find_broken_imports(&all_paths, ext);
        report.stats.broken_imports = broken.len();
        for b in broken {
            report.add_issue(
                Issue::new(
                    Severity::Critical,
                    Category::BrokenImport,
                    b.from.clone(),
                    format!("Broken import: {}", b.to),
                )
                .with_detail("to", b.to)
                .with_detail("resolved", b.resolved)
                .with_detail("reason", b.reason),
            );
        }

        let unused = analysis.graph.find_unused_files(
            scanned
                .paths()
                .filter(|p| !analysis.unreadable_paths.contains(*p)),
            &self.entry_points,
            ext,
        );
        report.stats.dead_code_files = unused.len();
        let by_path: HashMap<&str, &FileRecord> =
            scanned.files.iter().map(|r| (r.path(), r.as_ref())).collect();
        let now = SystemTime::now();
        for u in unused {
            let days = by_path
                .get(u.file.as_str())
                .and_then(|r| r.modified())
                .and_then(|m| now.duration_since(m).ok())
                .map(|d| d.as_secs() / 86_400);
            let stale = days.is_some_and(|d| d > self.config.unused_days);
            let message = if stale {
                "Potentially unused file, not modified recently"
            } else {
                "Potentially unused file"
            };
            let mut issue = Issue::new(Severity::Info, Category::Unused, u.file, message)
                .with_detail("reason", u.reason)
                .with_detail("suggestion", u.suggestion)
                .with_detail("stale", stale);
            if let Some(days) = days {
                issue = issue.with_detail("days_since_modified", days);
            }
            report.add_issue(issue);
        }
        info!(
            broken = report.stats.broken_imports,
            unused = report.stats.dead_code_files,
            "dependency analysis complete"
        );
    }

    fn classify_quality(&self, analysis: &Analysis, report: &mut Report) {
        let cfg = &self.config;
        for (record, metrics) in &analysis.sources {
            let size = record.size_bytes();
            if size > cfg.file_size_critical_bytes {
                report.add_issue(
                    Issue::new(
                        Severity::Critical,
                        Category::FileSize,
                        record.path(),
                        format!("File too large: {}", format_kib(size)),
                    )
                    .with_detail("size_bytes", size),
                );
            } else if size > cfg.file_size_warning_bytes {
                report.add_issue(
                    Issue::new(
                        Severity::Warning,
                        Category::FileSize,
                        record.path(),
                        format!("Large file: {}", format_kib(size)),
                    )
                    .with_detail("size_bytes", size),
                );
            }

            if metrics.cyclomatic_complexity > cfg.complexity_warning {
                report.add_issue(
                    Issue::new(
                        Severity::Warning,
                        Category::Complexity,
                        record.path(),
                        format!("High complexity: {}", metrics.cyclomatic_complexity),
                    )
                    .with_detail("complexity", metrics.cyclomatic_complexity)
                    .with_detail("functions", metrics.function_count),
                );
            }

            if metrics.console_log_count > cfg.console_log_max {
                report.add_issue(
                    Issue::new(
                        Severity::Info,
                        Category::ConsoleLog,
                        record.path(),
                        format!("Too many console statements: {}", metrics.console_log_count),
                    )
                    .with_detail("count", metrics.console_log_count),
                );
            }

            if metrics.todo_count > 0 {
                report.add_issue(
                    Issue::new(
                        Severity::Info,
                        Category::Todo,
                        record.path(),
                        format!("{} TODO comments found", metrics.todo_count),
                    )
                    .with_detail("count", metrics.todo_count),
                );
            }
        }
        debug!(files = analysis.sources.len(), "quality thresholds checked");
    }

    fn classify_misplacement(&self, scanned: &ScanOutcome, report: &mut Report) {
        for path in scanned.paths() {
            let Some(found) = find_misplacement(
                path,
                &self.config.misplaced_rules,
                &self.config.misplaced_exempt,
            ) else {
                continue;
            };
            report.add_issue(
                Issue::new(
                    Severity::Warning,
                    Category::Misplaced,
                    path,
                    format!("File should be in {}", found.expected_dir),
                )
                .with_detail("suggested_path", found.suggested_path),
            );
            report.stats.misplaced_files += 1;
        }
        debug!(misplaced = report.stats.misplaced_files, "misplacement checked");
    }

    fn recommend(&self, report: &mut Report) {
        let stats = report.stats.clone();

        if stats.duplicate_groups > 0 {
            let waste: u64 = report
                .issues
                .with_category(Category::Duplicate)
                .filter_map(|i| i.details.get("waste_bytes").and_then(|v| v.as_u64()))
                .sum();
            report.add_recommendation(Recommendation::new(
                "Eliminate duplicate files",
                format!(
                    "{} duplicate groups waste {}",
                    stats.duplicate_groups,
                    format_kib(waste)
                ),
                Impact::High,
                "Keep one copy per group and point every reference at it",
            ));
        }
        if stats.backup_files > self.config.backup_recommend_min {
            report.add_recommendation(Recommendation::new(
                "Clean up backup files",
                format!("{} backup files found", stats.backup_files),
                Impact::Medium,
                "Move backup copies to an archive directory or delete them",
            ));
        }
        if stats.broken_imports > 0 {
            report.add_recommendation(Recommendation::new(
                "Fix broken imports",
                format!("{} imports do not resolve", stats.broken_imports),
                Impact::High,
                "Correct the import paths or restore the missing files",
            ));
        }
        if stats.dead_code_files > self.config.dead_code_recommend_min {
            report.add_recommendation(Recommendation::new(
                "Remove dead code",
                format!("{} files are never imported", stats.dead_code_files),
                Impact::Medium,
                "Archive or delete files nothing depends on",
            ));
        }
        if stats.misplaced_files > 0 {
            report.add_recommendation(Recommendation::new(
                "Organize misplaced files",
                format!("{} files are outside their expected directory", stats.misplaced_files),
                Impact::Low,
                "Move each file to its suggested path",
            ));
        }
        if stats.near_duplicate_pairs > 0 {
            report.add_recommendation(Recommendation::new(
                "Consolidate near-duplicates",
                format!("{} file pairs are nearly identical", stats.near_duplicate_pairs),
                Impact::Medium,
                "Merge similar files or extract the shared code",
            ));
        }
        let hotspots = report.issues.with_category(Category::Complexity).count();
        if hotspots > 0 {
            report.add_recommendation(Recommendation::new(
                "Reduce complexity hotspots",
                format!("{hotspots} files exceed the complexity threshold"),
                Impact::Medium,
                "Split large functions and flatten nested branches",
            ));
        }
    }
}
