//! Repository hygiene audit engine.
//!
//! Walks a project tree and reports duplicate files, backup leftovers, broken
//! relative imports, files nothing imports, oversized or overly complex
//! sources, and files outside their canonical directory. The engine produces a
//! [`Report`]; rendering it is left to the caller.

pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod graph;
pub mod organize;
pub mod record;
pub mod report;
pub mod scan;

pub use config::{AuditConfig, MisplacedRule};
pub use duplicates::{DuplicateGroup, DuplicateIndex, SimilarPair};
pub use engine::{Analysis, AuditEngine, CancelToken};
pub use error::{AuditError, Result};
pub use graph::{BrokenImport, DependencyGraph, EntryPointMatcher, UnusedFile};
pub use record::{FileRecord, SourceMetrics};
pub use report::{
    Category, Impact, Issue, IssueBuckets, Recommendation, Report, ReportSummary, Severity, Stats,
};
pub use scan::ScanOutcome;
