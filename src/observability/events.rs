//! Observable events emitted during a configuration search

use std::fmt;

/// Observable events in lambdatune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Search run starts
    RunBegin,
    /// Search run finished (successfully or not)
    RunComplete,
    /// Search run aborted by a fatal error
    RunAborted,

    // Inputs
    /// Tuner configuration loaded
    ConfigLoaded,
    /// Candidate configurations loaded
    CandidatesLoaded,
    /// Candidate file skipped
    CandidateSkipped,
    /// Malformed statement dropped during parsing
    StatementSkipped,
    /// Workload loaded
    WorkloadLoaded,

    // Rounds
    /// A round starts
    RoundBegin,
    /// A round ends with at least one completed configuration
    RoundSucceeded,
    /// A round ends with no completed configuration
    RoundExhausted,
    /// The timeout for the next round grows
    TimeoutGrown,
    /// Configuration priority order after a round
    PriorityReordered,

    // Configuration attempts
    /// Attempt to evaluate a configuration starts
    ConfigAttemptBegin,
    /// Configuration ran the whole workload within budget
    ConfigCompleted,
    /// Configuration exceeded its budget
    ConfigIncomplete,
    /// Budget for remaining configurations tightened by the best time
    BudgetTightened,
    /// A setting statement was rejected by the engine
    SettingRejected,

    // Indexes and queries
    /// Index created
    IndexCreated,
    /// Index creation failed (skipped)
    IndexCreateFailed,
    /// Query execution begins
    QueryBegin,
    /// Query hit its time budget
    QueryTimeout,
    /// Query failed for a reason other than its budget
    QueryFailed,

    // Driver
    /// Transient driver failure, retrying
    DriverRetry,
    /// Database state reset
    StateReset,

    // Reports
    /// Execution report appended to the log
    ReportAppended,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RunBegin => "RUN_BEGIN",
            Event::RunComplete => "RUN_COMPLETE",
            Event::RunAborted => "RUN_ABORTED",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::CandidatesLoaded => "CANDIDATES_LOADED",
            Event::CandidateSkipped => "CANDIDATE_SKIPPED",
            Event::StatementSkipped => "STATEMENT_SKIPPED",
            Event::WorkloadLoaded => "WORKLOAD_LOADED",

            Event::RoundBegin => "ROUND_BEGIN",
            Event::RoundSucceeded => "ROUND_SUCCEEDED",
            Event::RoundExhausted => "ROUND_EXHAUSTED",
            Event::TimeoutGrown => "TIMEOUT_GROWN",
            Event::PriorityReordered => "PRIORITY_REORDERED",

            Event::ConfigAttemptBegin => "CONFIG_ATTEMPT_BEGIN",
            Event::ConfigCompleted => "CONFIG_COMPLETED",
            Event::ConfigIncomplete => "CONFIG_INCOMPLETE",
            Event::BudgetTightened => "BUDGET_TIGHTENED",
            Event::SettingRejected => "SETTING_REJECTED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexCreateFailed => "INDEX_CREATE_FAILED",
            Event::QueryBegin => "QUERY_BEGIN",
            Event::QueryTimeout => "QUERY_TIMEOUT",
            Event::QueryFailed => "QUERY_FAILED",

            Event::DriverRetry => "DRIVER_RETRY",
            Event::StateReset => "STATE_RESET",

            Event::ReportAppended => "REPORT_APPENDED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RunAborted)
    }

    /// Returns true for recoverable problems worth a warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::CandidateSkipped
                | Event::StatementSkipped
                | Event::SettingRejected
                | Event::IndexCreateFailed
                | Event::QueryFailed
                | Event::DriverRetry
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_abort_is_fatal() {
        assert!(Event::RunAborted.is_fatal());
        assert!(!Event::QueryTimeout.is_fatal());
        assert!(!Event::IndexCreateFailed.is_fatal());
    }

    #[test]
    fn test_budget_signals_are_not_warnings() {
        // Timeouts drive admission control; they are expected.
        assert!(!Event::QueryTimeout.is_warning());
        assert!(!Event::ConfigIncomplete.is_warning());
        assert!(Event::IndexCreateFailed.is_warning());
    }
}
