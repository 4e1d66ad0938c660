//! Sequential verification of the selected entries with periodic persistence.

mod clock;
mod errors;
mod stats;
mod verify;

pub use clock::{Clock, SystemClock};
pub use errors::RunError;
pub use stats::{RunOutcome, RunStats};
pub use verify::{DEFAULT_AUTOSAVE_INTERVAL, VerificationRunner};
