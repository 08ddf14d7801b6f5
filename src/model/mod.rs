//! Value types for the configuration search
//!
//! - `Index`: one index definition, identified by `(table, column)`
//! - `Configuration`: settings plus deduplicated indexes
//! - `IndexNameSequence`: unique index naming across configurations
//! - `Query` / `Workload`: the queries each configuration is measured on

mod configuration;
mod index;
mod query;
mod sequence;

pub use configuration::Configuration;
pub use index::{is_index_statement, Index, IndexKey};
pub use query::{Query, QueryId, Workload};
pub use sequence::IndexNameSequence;
