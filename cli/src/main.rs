use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use console::style;
use repoaudit_core::{AuditConfig, AuditEngine, Issue, Report, Severity};
use tracing_subscriber::EnvFilter;

/// Repository hygiene audit.
#[derive(Debug, Parser)]
#[command(
    name = "repoaudit",
    about = "Find duplicate files, backups, broken imports and dead files in a project tree."
)]
struct Args {
    /// Path to config file (YAML). Defaults to repoaudit.yml if present.
    #[arg(long, default_value = "repoaudit.yml")]
    config: PathBuf,

    /// Project root every reported path is relative to.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Override a config value, e.g. --set complexity_warning=30 (repeatable).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,

    /// Emit the full report as JSON on stdout.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print only the summary line.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Also run the pairwise near-duplicate pass.
    #[arg(long, action = ArgAction::SetTrue)]
    near_duplicates: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directories to scan, relative to the project root. Defaults to the
    /// configured roots.
    paths: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut cfg = load_config(&args.config)?;
    cfg.apply_overrides(args.sets.as_slice())
        .context("Invalid --set override")?;
    if let Some(root) = &args.project_root {
        cfg.project_root = root.clone();
    }
    if !args.paths.is_empty() {
        cfg.roots = args.paths.clone();
    }
    if args.near_duplicates {
        cfg.near_duplicates = true;
    }

    let engine = AuditEngine::new(cfg).context("Invalid configuration")?;
    let report = engine.run().context("Audit failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if !args.quiet {
            print_human_report(&report);
        }
        print_summary(&report);
    }

    if report.roots_scanned == 0 {
        eprintln!(
            "{} none of the configured roots could be read",
            style("error:").red().bold()
        );
        process::exit(2);
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

/// Missing file means defaults. A relative `project_root` in the file is
/// taken relative to the file's directory.
fn load_config(path: &Path) -> anyhow::Result<AuditConfig> {
    if !path.exists() {
        return Ok(AuditConfig::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let mut cfg = AuditConfig::from_yaml_str(&text)
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    if cfg.project_root.is_relative() {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => env::current_dir()?,
        };
        cfg.project_root = dir.join(&cfg.project_root);
    }
    Ok(cfg)
}

fn print_human_report(report: &Report) {
    for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
        let issues = report.issues.bucket(severity);
        if issues.is_empty() {
            continue;
        }
        println!("{}", style(severity_heading(severity, issues.len())).bold());
        for issue in issues {
            print_issue(issue);
        }
        println!();
    }

    if !report.recommendations.is_empty() {
        println!("{}", style("Recommendations:").bold());
        for rec in &report.recommendations {
            println!(
                "  {}. {} ({})",
                rec.priority,
                style(&rec.title).green(),
                rec.description
            );
            println!("     {}", style(&rec.action).dim());
        }
        println!();
    }
}

fn severity_heading(severity: Severity, count: usize) -> String {
    let label = match severity {
        Severity::Critical => "Critical",
        Severity::Warning => "Warnings",
        Severity::Info => "Info",
    };
    format!("{label} ({count}):")
}

fn print_issue(issue: &Issue) {
    let tag = match issue.severity {
        Severity::Critical => style(issue.category.as_str()).red(),
        Severity::Warning => style(issue.category.as_str()).yellow(),
        Severity::Info => style(issue.category.as_str()).blue(),
    };
    println!("  - [{}] {}: {}", tag, style(&issue.file).cyan(), issue.message);
}

fn print_summary(report: &Report) {
    let summary = report.summary();
    let stats = &report.stats;
    println!(
        "{} files ({} code), {} issues: {} critical, {} warnings, {} info",
        stats.total_files,
        stats.code_files,
        summary.total,
        style(summary.critical).red(),
        style(summary.warning).yellow(),
        summary.info
    );
}
