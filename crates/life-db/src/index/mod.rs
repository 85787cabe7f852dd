pub mod planner;
pub mod scan;
pub mod types;

pub use planner::{explain_plan, plan_query, QueryPlan, ScanPlan, ScanType};
pub use types::{IndexKey, KeyRange, RangeBound};
