//! Typed entities stored locally or fetched from a remote service.
//!
//! Local entities persist timestamps as epoch milliseconds so that index order
//! is chronological. Remote (financial) entities use whatever the service
//! speaks: RFC 3339 timestamps and string ids.

pub mod finance;
pub mod local;
pub mod schema;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ValidationError, ValidationErrors};
use crate::types::RecordKey;

pub use finance::{
    Account, AccountKind, Budget, BudgetPeriod, Card, Debt, FinancialGoal, Investment,
    InvestmentKind, Subscription, Transaction, TransactionKind,
};
pub use local::{
    Action, ActionStatus, ActionType, Event, EventType, Goal, GoalStatus, Knowledge,
    PersonalState, Reflection, Routine, RoutineFrequency, RoutineLog,
};
pub use schema::{life_schema, LIFE_SCHEMA_VERSION};

// ============================================================================
// Traits
// ============================================================================

/// A typed record with field-level invariants.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Check the entity's invariants. Every violation is reported.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// An entity persisted in a table of the embedded store.
pub trait LocalEntity: Entity {
    const TABLE: &'static str;

    /// Primary key, once the store has assigned one.
    fn key(&self) -> Option<RecordKey>;
}

/// An entity owned by a remote service.
pub trait RemoteEntity: Entity {
    /// Path segment of the REST resource (`/{RESOURCE}`).
    const RESOURCE: &'static str;

    fn remote_id(&self) -> Option<&str>;
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Accumulates field errors while checking an entity.
#[derive(Debug, Default)]
pub(crate) struct Checks(Vec<ValidationError>);

impl Checks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn require(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.0.push(ValidationError::new(field, message));
        }
        self
    }

    pub(crate) fn in_range<T: PartialOrd + Copy>(
        &mut self,
        value: Option<T>,
        field: &str,
        min: T,
        max: T,
    ) -> &mut Self {
        if let Some(v) = value {
            if v < min || v > max {
                self.0.push(ValidationError::new(field, "out of range"));
            }
        }
        self
    }

    pub(crate) fn finish(&mut self) -> Result<(), ValidationErrors> {
        ValidationErrors(std::mem::take(&mut self.0)).into_result()
    }
}
