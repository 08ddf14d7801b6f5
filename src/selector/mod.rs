//! Configuration selection
//!
//! [`ConfigurationSelector`] runs the round-based search over candidate
//! configurations against one exclusively owned database.

mod errors;
mod options;
mod scheduler;
mod state;

pub use errors::{SelectorError, SelectorResult};
pub use options::SelectorOptions;
pub use scheduler::{ConfigurationSelector, SelectionOutcome};
pub use state::{CompletedConfiguration, SchedulerPhase, SchedulerState, MAX_TIMEOUT_SECS};
