use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::InstanceStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The recurrence rule is malformed. Raised at rule construction, never
    /// while calculating occurrences.
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    /// Another writer already materialized this (task, date) pair.
    #[error("Instance for task {task_id} on {date} already exists")]
    DuplicateInstance { task_id: Uuid, date: NaiveDate },

    #[error("Cannot {action} an instance that is {from}")]
    InvalidTransition {
        from: InstanceStatus,
        action: &'static str,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}

impl CoreError {
    /// Storage failures that may succeed when attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
            ) || e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == "5" || code == "6"), // SQLITE_BUSY / SQLITE_LOCKED
            _ => false,
        }
    }
}
