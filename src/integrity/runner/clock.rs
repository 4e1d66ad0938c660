use time::{OffsetDateTime, UtcOffset};

/// Source of wall-clock time for a run.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock reporting instants in a fixed UTC offset.
///
/// `time` refuses to read the local offset on unix once a second thread
/// exists, so the offset is captured up front by [`SystemClock::local`] and
/// reused for every reading. The default clock reports UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    /// Capture the local offset. Call before any thread is spawned.
    pub fn local() -> Self {
        Self::with_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }

    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_offset(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}
