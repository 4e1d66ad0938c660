//! One complete run: scan, reconcile, select, verify, persist.

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use time::Duration;
use tracing::info;

use crate::flac::AudioVerifier;

use super::entry::{IntegrityEntry, sort_by_last_check, sort_by_path};
use super::history::{DEFAULT_SEPARATOR, HistoryError, HistoryFile};
use super::reconcile::{DEFAULT_MODTIME_TOLERANCE, ReconcileStats, Reconciler};
use super::runner::{Clock, DEFAULT_AUTOSAVE_INTERVAL, RunError, RunStats, VerificationRunner};
use super::scanner::{CollectionScanner, DEFAULT_EXTENSION, ScanError};
use super::selection::{ProportionRole, Selection, SelectionPolicy};

/// Everything needed to run one check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub collection_root: PathBuf,
    pub history_path: PathBuf,
    pub policy: SelectionPolicy,
    pub extensions: Vec<String>,
    pub separator: u8,
    pub modtime_tolerance: Duration,
    pub autosave_interval: Duration,
}

impl CheckRequest {
    /// Request with default tolerances, `.flac` files and `;` separator.
    pub fn new(
        collection_root: impl Into<PathBuf>,
        history_path: impl Into<PathBuf>,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            collection_root: collection_root.into(),
            history_path: history_path.into(),
            policy,
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            separator: DEFAULT_SEPARATOR,
            modtime_tolerance: DEFAULT_MODTIME_TOLERANCE,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

/// What a finished check did.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub total: usize,
    pub reconcile: ReconcileStats,
    /// `None` when the collection was empty and nothing was attempted.
    pub selection: Option<Selection>,
    pub run: Option<RunStats>,
    pub elapsed: std::time::Duration,
}

/// Errors that abort a check.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl CheckError {
    /// True when the run stopped because a file failed verification.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Run(RunError::Verification { .. }))
    }
}

/// Run one check against the collection and history named in `request`.
pub fn check<V: AudioVerifier, C: Clock>(
    request: &CheckRequest,
    verifier: V,
    clock: C,
) -> Result<CheckReport, CheckError> {
    info!("Check started");
    let started = Instant::now();

    let mut history = HistoryFile::with_separator(&request.history_path, request.separator);
    let recorded = history.load()?;
    info!(
        path = %history.path().display(),
        entries = recorded.len(),
        "History loaded"
    );

    let scanner =
        CollectionScanner::with_extensions(&request.collection_root, request.extensions.clone());
    let (scanned, _) = scanner.scan()?;

    let (mut entries, reconcile) =
        Reconciler::new(request.modtime_tolerance).merge(recorded, scanned);
    info!(
        carried = reconcile.carried,
        changed = reconcile.changed,
        new = reconcile.new,
        "History reconciled"
    );
    sort_by_last_check(&mut entries);

    if entries.is_empty() {
        info!("No item, nothing will be done");
        return Ok(CheckReport {
            total: 0,
            reconcile,
            selection: None,
            run: None,
            elapsed: started.elapsed(),
        });
    }

    info!("Total item(s): {}", entries.len());
    log_check_range(&entries);

    let selection = request.policy.select(&entries, clock.now());
    log_selection(&request.policy, &selection);
    if selection.is_full_pass() {
        // Everything is checked: walk the collection in path order instead.
        sort_by_path(&mut entries);
    }

    let runner = VerificationRunner::new(verifier, &clock, &history)
        .with_autosave_interval(request.autosave_interval);
    let run = runner.run(&mut entries, selection.cutoff)?;

    let elapsed = started.elapsed();
    info!("Elapsed time: {:.3?} for {} item(s)", elapsed, selection.cutoff);
    info!("Check finished");
    Ok(CheckReport {
        total: entries.len(),
        reconcile,
        selection: Some(selection),
        run: Some(run),
        elapsed,
    })
}

fn log_check_range(entries: &[IntegrityEntry]) {
    let describe = |entry: Option<&IntegrityEntry>| match entry.and_then(|e| e.last_checked_at) {
        Some(at) => at.to_string(),
        None => "never".to_string(),
    };
    info!(
        oldest = %describe(entries.first()),
        newest = %describe(entries.last()),
        "Last check range"
    );
}

fn log_selection(policy: &SelectionPolicy, selection: &Selection) {
    match selection.by_age {
        Some(limit) => info!("Limit item(s) by age: {limit}"),
        None => info!("Limit item(s) by age: not defined"),
    }
    if let (Some(limit), Some(rule)) = (selection.by_proportion, policy.proportion) {
        info!("Limit item(s) by percentage: {limit} {}", rule.role());
        if let Some(by_age) = selection.by_age
            && by_age != selection.cutoff
        {
            info!(
                "Limit item 'by age' changed by limit 'by percentage' from {by_age} to {}",
                selection.cutoff
            );
        }
        if selection.by_age.is_none() && rule.role() == ProportionRole::Max {
            info!("A maximum percentage without an age rule selects nothing");
        }
    }
    info!("Effective item(s) limit: {}", selection.cutoff);
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
