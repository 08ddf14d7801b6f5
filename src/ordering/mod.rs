//! Optimal ordering of clusters (or queries) by index-creation cost
//!
//! See `solver` for the objective and the complexity contract.

mod errors;
mod solver;

pub use errors::{OrderingError, OrderingResult};
pub use solver::{replay_cost, OrderingSolution, OrderingSolver, DEFAULT_MAX_ITEMS, HARD_MAX_ITEMS};
