//! Decide how many of the oldest-checked entries are verified this run.
//!
//! Entries are expected sorted ascending by last-check time (never-checked
//! first). The result is a cutoff index: `entries[..cutoff]` is selected.
//!
//! | age rule | proportion rule | cutoff                    |
//! |----------|-----------------|---------------------------|
//! | none     | none            | 0                         |
//! | `a`      | none            | `a`                       |
//! | none     | `p` min         | `p`                       |
//! | none     | `p` max         | 0                         |
//! | `a`      | `p` min         | `max(a, p)`               |
//! | `a`      | `p` max         | `min(a, p)`               |

use thiserror::Error;
use time::{Duration, OffsetDateTime, Time};

use super::entry::IntegrityEntry;

/// Rejected selection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Age must be a number of minutes, -1 (never checked) or -2 (not checked today), got {0}")]
    InvalidAge(i64),
    #[error("Percentage must be between 1 and 100, got {0}")]
    InvalidPercentage(i64),
}

/// Recency policy selecting entries by how long ago they were last checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeRule {
    /// Last check at or before `now - minutes`.
    OlderThan { minutes: u32 },
    /// Never successfully verified.
    NeverChecked,
    /// Last check at or before midnight of the current day.
    NotCheckedToday,
}

impl AgeRule {
    /// Flag value meaning "never checked".
    pub const NEVER_CHECKED_FLAG: i64 = -1;
    /// Flag value meaning "not checked today".
    pub const NOT_CHECKED_TODAY_FLAG: i64 = -2;

    /// Interpret the command-line age value.
    pub fn from_flag(value: i64) -> Result<Self, SelectionError> {
        match value {
            Self::NEVER_CHECKED_FLAG => Ok(Self::NeverChecked),
            Self::NOT_CHECKED_TODAY_FLAG => Ok(Self::NotCheckedToday),
            minutes if minutes >= 0 => u32::try_from(minutes)
                .map(|minutes| Self::OlderThan { minutes })
                .map_err(|_| SelectionError::InvalidAge(value)),
            _ => Err(SelectionError::InvalidAge(value)),
        }
    }

    /// Latest last-check instant still eligible, `None` for "never checked".
    pub fn threshold(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            Self::OlderThan { minutes } => Some(now - Duration::minutes(i64::from(*minutes))),
            Self::NeverChecked => None,
            Self::NotCheckedToday => Some(now.replace_time(Time::MIDNIGHT)),
        }
    }
}

/// Whether a proportion guarantees a floor of work or caps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProportionRole {
    Min,
    Max,
}

impl std::fmt::Display for ProportionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
        })
    }
}

/// Percentage-sized slice of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProportionRule {
    percent: u8,
    role: ProportionRole,
}

impl ProportionRule {
    pub fn new(percent: i64, role: ProportionRole) -> Result<Self, SelectionError> {
        match u8::try_from(percent) {
            Ok(value @ 1..=100) => Ok(Self {
                percent: value,
                role,
            }),
            _ => Err(SelectionError::InvalidPercentage(percent)),
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn role(&self) -> ProportionRole {
        self.role
    }
}

/// Optional age and proportion rules applied together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub age: Option<AgeRule>,
    pub proportion: Option<ProportionRule>,
}

/// Cutoffs computed for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Cutoff from the age rule, if supplied.
    pub by_age: Option<usize>,
    /// Cutoff from the proportion rule, if supplied.
    pub by_proportion: Option<usize>,
    /// Effective number of leading entries to verify.
    pub cutoff: usize,
    /// Number of entries the cutoff applies to.
    pub total: usize,
}

impl Selection {
    /// True when every entry is selected (a full pass).
    pub fn is_full_pass(&self) -> bool {
        self.total > 0 && self.cutoff >= self.total
    }
}

impl SelectionPolicy {
    /// Compute the cutoff for `entries` sorted ascending by last check.
    pub fn select(&self, entries: &[IntegrityEntry], now: OffsetDateTime) -> Selection {
        let total = entries.len();
        let by_age = self
            .age
            .map(|rule| age_cutoff(entries, rule.threshold(now)));
        let by_proportion = self
            .proportion
            .map(|rule| proportion_cutoff(total, rule.percent));
        let cutoff = combine(
            by_age,
            by_proportion.zip(self.proportion.map(|rule| rule.role)),
        );
        Selection {
            by_age,
            by_proportion,
            cutoff,
            total,
        }
    }
}

/// First index whose last check is strictly after `threshold`.
///
/// An entry checked exactly at `threshold` is still eligible.
///
/// Never-checked entries order before every instant, so a `None` threshold
/// selects exactly the never-checked prefix.
pub fn age_cutoff(entries: &[IntegrityEntry], threshold: Option<OffsetDateTime>) -> usize {
    entries.partition_point(|entry| entry.last_checked_at <= threshold)
}

/// `round(total * percent / 100)` clamped to `[0, total]`, halves rounded up.
pub fn proportion_cutoff(total: usize, percent: u8) -> usize {
    let scaled = total as u128 * u128::from(percent) + 50;
    usize::try_from(scaled / 100).map_or(total, |wanted| wanted.min(total))
}

/// Combine the two optional cutoffs per the role of the proportion rule.
pub fn combine(by_age: Option<usize>, by_proportion: Option<(usize, ProportionRole)>) -> usize {
    match (by_age, by_proportion) {
        (None, None) => 0,
        (Some(age), None) => age,
        (None, Some((proportion, ProportionRole::Min))) => proportion,
        (None, Some((_, ProportionRole::Max))) => 0,
        (Some(age), Some((proportion, ProportionRole::Min))) => age.max(proportion),
        (Some(age), Some((proportion, ProportionRole::Max))) => age.min(proportion),
    }
}
