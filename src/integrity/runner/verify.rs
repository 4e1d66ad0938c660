use std::path::Path;

use time::Duration;
use tracing::{error, info, warn};

use crate::flac::AudioVerifier;
use crate::integrity::entry::{IntegrityEntry, sort_by_last_check};
use crate::integrity::history::HistoryFile;

use super::{Clock, RunError, RunOutcome, RunStats};

/// Minimum time between two intermediate saves of the history.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::minutes(3);

/// Drives the verifier over the leading `cutoff` entries of a list.
pub struct VerificationRunner<'h, V, C> {
    verifier: V,
    clock: C,
    history: &'h HistoryFile,
    autosave_interval: Duration,
}

impl<'h, V: AudioVerifier, C: Clock> VerificationRunner<'h, V, C> {
    pub fn new(verifier: V, clock: C, history: &'h HistoryFile) -> Self {
        Self {
            verifier,
            clock,
            history,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    /// Verify `entries[..cutoff]` in their current order.
    ///
    /// Every entry is persisted at the end, re-sorted by last check. On the
    /// first verification failure the list is persisted the same way and the
    /// failure is returned; later entries keep their prior state.
    pub fn run(
        &self,
        entries: &mut [IntegrityEntry],
        cutoff: usize,
    ) -> Result<RunStats, RunError> {
        let limit = cutoff.min(entries.len());
        let width = limit.to_string().len();
        let mut stats = RunStats {
            selected: limit,
            verified: 0,
            vanished: 0,
            autosaves: 0,
            outcome: if limit >= entries.len() {
                RunOutcome::CompletedAll
            } else {
                RunOutcome::CompletedPartial
            },
        };
        let mut last_save = self.clock.now();

        for idx in 0..limit {
            let path = entries[idx].path.clone();
            let passed = if still_present(&path) {
                info!(
                    "Verifying ({:>width$}/{limit} - {:6.2}%) {}",
                    idx + 1,
                    (idx + 1) as f64 / limit as f64 * 100.0,
                    path.display()
                );
                match self.verifier.test(&path) {
                    Ok(()) => true,
                    Err(source) => {
                        error!(path = %path.display(), error = %source, "Verification failed");
                        if let Some(output) = source.output() {
                            error!("Tool output:\n{output}");
                        }
                        self.persist_after_failure(entries);
                        return Err(RunError::Verification { path, source });
                    }
                }
            } else {
                warn!(path = %path.display(), "File disappeared before verification");
                stats.vanished += 1;
                false
            };

            let now = self.clock.now();
            if passed {
                entries[idx].mark_checked(now);
                stats.verified += 1;
            }
            if now - last_save > self.autosave_interval {
                self.history.save(entries)?;
                info!(verified = stats.verified, "Progress saved");
                stats.autosaves += 1;
                last_save = now;
            }
        }

        if limit < entries.len() {
            info!("There are no more items satisfying 'age' or 'percentage' conditions");
        }
        sort_by_last_check(entries);
        self.history.save(entries)?;
        Ok(stats)
    }

    fn persist_after_failure(&self, entries: &mut [IntegrityEntry]) {
        sort_by_last_check(entries);
        if let Err(err) = self.history.save(entries) {
            error!(error = %err, "Failed to save progress after verification failure");
        }
    }
}

/// Re-check existence right before verifying; unknown states count as present.
fn still_present(path: &Path) -> bool {
    path.try_exists().unwrap_or(true)
}
