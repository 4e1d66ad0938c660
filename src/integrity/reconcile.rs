//! Merge persisted history with the current on-disk state.
//!
//! The scan decides membership: a file missing from disk is dropped even if
//! history knows it. History only decides check status, and only while the
//! file still has the recorded size and (within tolerance) modification time.

use std::collections::HashMap;
use std::path::PathBuf;

use time::Duration;
use tracing::debug;

use super::entry::IntegrityEntry;

/// Largest modification-time drift still considered the same file.
///
/// Absorbs timestamp truncation and rounding across file systems.
pub const DEFAULT_MODTIME_TOLERANCE: Duration = Duration::MILLISECOND;

/// Counts describing how each scanned file was resolved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// History was trusted and carried forward.
    pub carried: usize,
    /// History existed but the file changed since; history discarded.
    pub changed: usize,
    /// No history for the path.
    pub new: usize,
}

/// Reconciles history against a scan using a fixed modification-time tolerance.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    tolerance: Duration,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_MODTIME_TOLERANCE)
    }
}

impl Reconciler {
    pub fn new(tolerance: Duration) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Produce one entry per scanned file. Output order is unspecified.
    pub fn merge(
        &self,
        history: Vec<IntegrityEntry>,
        scanned: Vec<IntegrityEntry>,
    ) -> (Vec<IntegrityEntry>, ReconcileStats) {
        let mut known: HashMap<PathBuf, IntegrityEntry> = history
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        let mut stats = ReconcileStats::default();
        let merged = scanned
            .into_iter()
            .map(|observed| match known.remove(&observed.path) {
                Some(recorded) => match self.carry_forward(recorded, &observed) {
                    Some(carried) => {
                        stats.carried += 1;
                        carried
                    }
                    None => {
                        debug!(
                            path = %observed.path.display(),
                            "File changed since last check"
                        );
                        stats.changed += 1;
                        observed
                    }
                },
                None => {
                    stats.new += 1;
                    observed
                }
            })
            .collect();
        (merged, stats)
    }

    /// Return the recorded entry if it still describes `observed`.
    fn carry_forward(
        &self,
        mut recorded: IntegrityEntry,
        observed: &IntegrityEntry,
    ) -> Option<IntegrityEntry> {
        if recorded.size != observed.size {
            return None;
        }
        let drift = (recorded.modified_at - observed.modified_at).abs();
        if drift > self.tolerance {
            return None;
        }
        if !drift.is_zero() {
            recorded.modified_at = observed.modified_at;
        }
        Some(recorded)
    }
}

/// Reconcile with the default one-millisecond tolerance.
pub fn reconcile(
    history: Vec<IntegrityEntry>,
    scanned: Vec<IntegrityEntry>,
) -> Vec<IntegrityEntry> {
    Reconciler::default().merge(history, scanned).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use time::{OffsetDateTime, macros::datetime};

    const T: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);
    const T0: OffsetDateTime = datetime!(2024-06-02 08:30 UTC);

    fn checked(path: &str, size: u64, modified_at: OffsetDateTime) -> IntegrityEntry {
        IntegrityEntry {
            last_checked_at: Some(T0),
            ..IntegrityEntry::unchecked(path, size, modified_at)
        }
    }

    fn by_path(entries: Vec<IntegrityEntry>) -> HashMap<PathBuf, IntegrityEntry> {
        entries
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect()
    }

    #[test]
    fn unchanged_file_keeps_history_and_resized_file_loses_it() {
        let history = vec![checked("/A", 100, T), checked("/B", 50, T)];
        let scanned = vec![
            IntegrityEntry::unchecked("/A", 100, T),
            IntegrityEntry::unchecked("/B", 60, T),
        ];
        let (merged, stats) = Reconciler::default().merge(history, scanned);
        let merged = by_path(merged);
        assert_eq!(merged[&PathBuf::from("/A")].last_checked_at, Some(T0));
        assert_eq!(merged[&PathBuf::from("/B")].last_checked_at, None);
        assert_eq!(merged[&PathBuf::from("/B")].size, 60);
        assert_eq!(
            stats,
            ReconcileStats {
                carried: 1,
                changed: 1,
                new: 0
            }
        );
    }

    #[test]
    fn drift_at_tolerance_is_trusted_and_disk_time_wins() {
        let observed_at = T + DEFAULT_MODTIME_TOLERANCE;
        let merged = reconcile(
            vec![checked("/A", 1, T)],
            vec![IntegrityEntry::unchecked("/A", 1, observed_at)],
        );
        assert_eq!(merged[0].last_checked_at, Some(T0));
        assert_eq!(merged[0].modified_at, observed_at);
    }

    #[test]
    fn drift_beyond_tolerance_discards_history() {
        let observed_at = T - DEFAULT_MODTIME_TOLERANCE - Duration::NANOSECOND;
        let merged = reconcile(
            vec![checked("/A", 1, T)],
            vec![IntegrityEntry::unchecked("/A", 1, observed_at)],
        );
        assert_eq!(merged[0].last_checked_at, None);
        assert_eq!(merged[0].modified_at, observed_at);
    }

    #[test]
    fn files_only_in_history_are_dropped() {
        let merged = reconcile(
            vec![checked("/gone", 1, T), checked("/A", 1, T)],
            vec![
                IntegrityEntry::unchecked("/A", 1, T),
                IntegrityEntry::unchecked("/new", 2, T),
            ],
        );
        let paths: HashSet<_> = merged.into_iter().map(|entry| entry.path).collect();
        assert_eq!(
            paths,
            HashSet::from([PathBuf::from("/A"), PathBuf::from("/new")])
        );
    }

    fn arb_entries() -> impl Strategy<Value = Vec<(u8, u64, i64, Option<i64>)>> {
        prop::collection::vec(
            (0u8..24, 0u64..4, -3_000i64..3_000, prop::option::of(0i64..1_000_000)),
            0..32,
        )
    }

    fn build(raw: &[(u8, u64, i64, Option<i64>)]) -> Vec<IntegrityEntry> {
        let mut seen = HashSet::new();
        raw.iter()
            .filter(|(id, ..)| seen.insert(*id))
            .map(|(id, size, drift_us, checked_s)| IntegrityEntry {
                path: PathBuf::from(format!("/c/{id}.flac")),
                size: *size,
                modified_at: T + Duration::microseconds(*drift_us),
                last_checked_at: checked_s.map(|secs| T0 + Duration::seconds(secs)),
            })
            .collect()
    }

    proptest! {
        #[test]
        fn membership_follows_scan(history in arb_entries(), scanned in arb_entries()) {
            let history = build(&history);
            let scanned = build(&scanned);
            let expected: HashSet<_> = scanned.iter().map(|e| e.path.clone()).collect();
            let merged = reconcile(history, scanned.clone());
            prop_assert_eq!(merged.len(), scanned.len());
            let actual: HashSet<_> = merged.into_iter().map(|e| e.path).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn reconciling_twice_is_idempotent(history in arb_entries(), scanned in arb_entries()) {
            let history = build(&history);
            let scanned: Vec<_> = build(&scanned)
                .into_iter()
                .map(|e| IntegrityEntry { last_checked_at: None, ..e })
                .collect();
            let first = by_path(reconcile(history, scanned.clone()));
            let second = by_path(reconcile(first.values().cloned().collect(), scanned));
            for (path, entry) in &first {
                prop_assert_eq!(entry.last_checked_at, second[path].last_checked_at);
            }
        }

        #[test]
        fn history_is_trusted_exactly_up_to_the_tolerance(
            tolerance_us in 0i64..5_000,
            drift_ns in -6_000_000i64..6_000_000,
        ) {
            let tolerance = Duration::microseconds(tolerance_us);
            let drift = Duration::nanoseconds(drift_ns);
            let observed_at = T + drift;
            let (merged, stats) = Reconciler::new(tolerance).merge(
                vec![checked("/A", 1, T)],
                vec![IntegrityEntry::unchecked("/A", 1, observed_at)],
            );
            let trusted = drift.abs() <= tolerance;
            prop_assert_eq!(merged[0].last_checked_at.is_some(), trusted);
            prop_assert_eq!(stats.carried, usize::from(trusted));
            prop_assert_eq!(merged[0].modified_at, observed_at);
        }

        #[test]
        fn drift_on_either_side_of_the_boundary(
            tolerance_us in 0i64..5_000,
            later in any::<bool>(),
        ) {
            let tolerance = Duration::microseconds(tolerance_us);
            let sign = if later { 1 } else { -1 };
            let at_edge = T + tolerance * sign;
            let past_edge = T + (tolerance + Duration::NANOSECOND) * sign;
            let reconciler = Reconciler::new(tolerance);

            let (merged, _) = reconciler.merge(
                vec![checked("/A", 1, T)],
                vec![IntegrityEntry::unchecked("/A", 1, at_edge)],
            );
            prop_assert_eq!(merged[0].last_checked_at, Some(T0));
            let (merged, _) = reconciler.merge(
                vec![checked("/A", 1, T)],
                vec![IntegrityEntry::unchecked("/A", 1, past_edge)],
            );
            prop_assert_eq!(merged[0].last_checked_at, None);
        }
    }
}
