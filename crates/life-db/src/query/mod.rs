pub mod execute;
pub mod operators;
pub mod types;

pub use execute::{execute_plan, execute_query, find_first};
pub use types::{IndexQuery, Predicate, Query, QueryResult, QuerySource, SortDirection, SortEntry};
