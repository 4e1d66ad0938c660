//! Incremental integrity checking of an audio collection.

pub mod check;
pub mod entry;
pub mod history;
pub mod reconcile;
pub mod runner;
pub mod scanner;
pub mod selection;
pub mod timestamp;

pub use check::{CheckError, CheckReport, CheckRequest, check};
pub use entry::{IntegrityEntry, NEVER_CHECKED};
pub use history::{HistoryError, HistoryFile};
pub use reconcile::{Reconciler, reconcile};
pub use runner::{Clock, RunError, RunOutcome, RunStats, SystemClock, VerificationRunner};
pub use scanner::{CollectionScanner, ScanError};
pub use selection::{AgeRule, ProportionRole, ProportionRule, Selection, SelectionPolicy};
