pub mod migrate;
pub mod registry;

pub use migrate::{plan_upgrade, UpgradePlan};
pub use registry::{IndexDef, MigrateFn, SchemaRegistry, SchemaVersion, TableDef};
