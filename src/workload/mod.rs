//! Loading the inputs of a search: configuration candidates and queries

mod candidates;
mod errors;
mod queries;

pub use candidates::{load_candidates, normalize_statement, parse_candidate, Candidate};
pub use errors::{WorkloadError, WorkloadResult};
pub use queries::{load_queries, natural_cmp};
