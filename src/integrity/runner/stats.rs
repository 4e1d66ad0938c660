/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The selection covered the whole collection.
    CompletedAll,
    /// The selection was exhausted before the end of the collection.
    CompletedPartial,
}

/// Summary of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub selected: usize,
    pub verified: usize,
    pub vanished: usize,
    pub autosaves: usize,
    pub outcome: RunOutcome,
}
