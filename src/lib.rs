//! lambdatune - database configuration selection
//!
//! Given candidate configurations (settings plus indexes) and a query
//! workload, finds the configuration that runs the workload fastest while
//! spending as little time as possible on the losers.

pub mod cli;
pub mod cluster;
pub mod driver;
pub mod model;
pub mod observability;
pub mod ordering;
pub mod report;
pub mod resolver;
pub mod selector;
pub mod workload;
