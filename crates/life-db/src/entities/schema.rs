//! The application's table layout.

use crate::error::SchemaError;
use crate::schema::registry::{SchemaRegistry, TableDef};

use super::local::{Action, Event, Goal, Knowledge, PersonalState, Reflection, Routine, RoutineLog};
use super::LocalEntity;

pub const LIFE_SCHEMA_VERSION: u32 = 1;

/// Registry holding every local entity table and its indexes.
pub fn life_schema() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::new().register(LIFE_SCHEMA_VERSION, life_tables())
}

pub fn life_tables() -> Vec<TableDef> {
    vec![
        TableDef::new(PersonalState::TABLE).index("timestamp"),
        TableDef::new(Action::TABLE)
            .index("status")
            .index("type")
            .index("createdAt")
            .index("dueDate"),
        TableDef::new(Event::TABLE).index("startTime").index("type"),
        TableDef::new(Goal::TABLE).index("status").index("createdAt"),
        TableDef::new(Routine::TABLE).index("frequency").index("active"),
        TableDef::new(RoutineLog::TABLE)
            .index("routineId")
            .index("timestamp"),
        TableDef::new(Knowledge::TABLE).index("type").index("updatedAt"),
        TableDef::new(Reflection::TABLE).index("type").index("timestamp"),
    ]
}
