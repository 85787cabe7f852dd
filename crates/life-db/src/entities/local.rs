//! Entities persisted in the embedded store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::types::RecordKey;

use super::{Checks, Entity, LocalEntity};

macro_rules! local_entity {
    ($ty:ty, $table:literal) => {
        impl LocalEntity for $ty {
            const TABLE: &'static str = $table;

            fn key(&self) -> Option<RecordKey> {
                self.id
            }
        }
    };
}

// ============================================================================
// PersonalState
// ============================================================================

/// A point-in-time self assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for PersonalState {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .in_range(self.mood, "mood", 0, 10)
            .in_range(self.energy, "energy", 0, 10)
            .in_range(self.stress, "stress", 0, 10)
            .finish()
    }
}

local_entity!(PersonalState, "states");

// ============================================================================
// Action
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Task,
    Habit,
    Activity,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Habit => "habit",
            Self::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Planned,
    #[serde(rename = "in-progress")]
    InProgress,
    Completed,
    Abandoned,
}

impl ActionStatus {
    /// The stored (and indexed) form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ActionStatus,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity for Action {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let completed = self.status == ActionStatus::Completed;
        Checks::new()
            .require(!self.title.trim().is_empty(), "title", "must not be empty")
            .require(
                completed == self.completed_at.is_some(),
                "completedAt",
                "must be set exactly when status is completed",
            )
            .finish()
    }
}

local_entity!(Action, "actions");

// ============================================================================
// Event
// ============================================================================

/// A calendar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Scheduled,
    Unexpected,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity for Event {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let ordered = self.end_time.map_or(true, |end| end >= self.start_time);
        Checks::new()
            .require(!self.title.trim().is_empty(), "title", "must not be empty")
            .require(ordered, "endTime", "must not precede startTime")
            .finish()
    }
}

local_entity!(Event, "events");

// ============================================================================
// Goal
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: GoalStatus,
    /// Percent complete. Not required to grow monotonically.
    #[serde(default)]
    pub progress: u8,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity for Goal {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let completed = self.status == GoalStatus::Completed;
        Checks::new()
            .require(!self.title.trim().is_empty(), "title", "must not be empty")
            .in_range(Some(self.progress), "progress", 0, 100)
            .require(
                completed == self.completed_at.is_some(),
                "completedAt",
                "must be set exactly when status is completed",
            )
            .finish()
    }
}

local_entity!(Goal, "goals");

// ============================================================================
// Routine / RoutineLog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineFrequency {
    Daily,
    Weekly,
    Monthly,
}

/// A recurring habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub title: String,
    pub frequency: RoutineFrequency,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Routine {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(!self.title.trim().is_empty(), "title", "must not be empty")
            .finish()
    }
}

local_entity!(Routine, "routines");

/// One completion of a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineLog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub routine_id: RecordKey,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_completed")]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_completed() -> bool {
    true
}

impl Entity for RoutineLog {}

local_entity!(RoutineLog, "routine_logs");

// ============================================================================
// Knowledge / Reflection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Knowledge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub knowledge_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Entity for Knowledge {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Checks::new()
            .require(!self.title.trim().is_empty(), "title", "must not be empty")
            .require(
                self.updated_at >= self.created_at,
                "updatedAt",
                "must not precede createdAt",
            )
            .finish()
    }
}

local_entity!(Knowledge, "knowledge");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordKey>,
    #[serde(rename = "type")]
    pub reflection_type: String,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Span the reflection covers, e.g. `week`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl Entity for Reflection {}

local_entity!(Reflection, "reflections");
