use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    EndConditionKind, Frequency, InstanceOverride, NewRecurrenceRule, NewRecurringTaskData,
    NewTaskData, Occurrence, OneTimeTask, RecurrenceRule, RecurringTask, Task, TaskInstance,
    TaskKind, TaskStatus, WeekdaySet,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub mod instances;
pub mod tasks;

/// Tasks joined with their (optional) rule. Shared by every task query.
pub(crate) const TASK_SELECT: &str = r#"
    SELECT t.id, t.kind, t.title, t.description, t.due_at, t.status, t.active,
           t.completed_at, t.created_at, t.updated_at,
           r.frequency, r.repeat_interval, r.days_of_week, r.day_of_month, r.start_date,
           r.anchor_time, r.end_condition, r.occurrence_count, r.end_date
    FROM tasks t
    LEFT JOIN recurrence_rules r ON r.task_id = t.id
"#;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TaskRow {
    pub id: Uuid,
    pub kind: TaskKind,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<NaiveDateTime>,
    pub status: TaskStatus,
    pub active: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub frequency: Option<Frequency>,
    pub repeat_interval: Option<u32>,
    pub days_of_week: Option<String>,
    pub day_of_month: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub anchor_time: Option<NaiveTime>,
    pub end_condition: Option<EndConditionKind>,
    pub occurrence_count: Option<u32>,
    pub end_date: Option<NaiveDate>,
}

impl TaskRow {
    /// Rebuilds the rule through the same validation callers go through.
    fn rule(&self) -> Result<RecurrenceRule, CoreError> {
        let start_date = self.start_date.ok_or_else(|| {
            CoreError::InvalidRule(format!("recurring task {} has no stored rule", self.id))
        })?;
        let days_of_week = self
            .days_of_week
            .as_deref()
            .unwrap_or_default()
            .parse::<WeekdaySet>()
            .map_err(|e| CoreError::InvalidRule(e.to_string()))?;

        NewRecurrenceRule {
            frequency: self.frequency,
            interval: self.repeat_interval.unwrap_or(1),
            days_of_week,
            day_of_month: self.day_of_month,
            start_date,
            anchor_time: self.anchor_time,
            end_condition: self.end_condition.unwrap_or_default(),
            occurrence_count: self.occurrence_count,
            end_date: self.end_date,
        }
        .build()
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        match row.kind {
            TaskKind::OneTime => Ok(Task::OneTime(OneTimeTask {
                id: row.id,
                title: row.title,
                description: row.description,
                status: row.status,
                due_at: row.due_at,
                completed_at: row.completed_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })),
            TaskKind::Recurring => {
                let rule = row.rule()?;
                Ok(Task::Recurring(RecurringTask {
                    id: row.id,
                    title: row.title,
                    description: row.description,
                    status: row.status,
                    rule,
                    active: row.active,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }))
            }
        }
    }
}

/// Task and rule storage
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    /// Stores the task and its rule in one transaction. Does not materialize.
    async fn add_recurring_task(&self, data: NewRecurringTaskData)
        -> Result<RecurringTask, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError>;
    async fn list_tasks(&self) -> Result<Vec<Task>, CoreError>;
    async fn find_active_recurring_tasks(&self) -> Result<Vec<RecurringTask>, CoreError>;
    /// Swaps the rule. Existing instances are left untouched.
    async fn replace_rule(&self, task_id: Uuid, rule: RecurrenceRule)
        -> Result<RecurringTask, CoreError>;
    async fn set_task_active(&self, task_id: Uuid, active: bool)
        -> Result<RecurringTask, CoreError>;
    /// One-time tasks only; recurring tasks track status per instance.
    async fn set_task_status(&self, task_id: Uuid, status: TaskStatus)
        -> Result<OneTimeTask, CoreError>;
    /// Deletes the task; its rule and instances go with it.
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Instance storage: the boundary the materializer works against.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn find_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<TaskInstance>, CoreError>;
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError>;
    /// Fails with [`CoreError::DuplicateInstance`] when (task, date) already exists.
    async fn insert_instance(
        &self,
        task_id: Uuid,
        occurrence: &Occurrence,
    ) -> Result<TaskInstance, CoreError>;
    /// Instances of one task, optionally bounded (inclusive) on either side.
    async fn list_instances(
        &self,
        task_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TaskInstance>, CoreError>;
    /// Instances of every task scheduled within `[from, to]`.
    async fn list_instances_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TaskInstance>, CoreError>;
    async fn latest_instance_date(&self, task_id: Uuid) -> Result<Option<NaiveDate>, CoreError>;
    async fn count_instances(&self, task_id: Uuid) -> Result<i64, CoreError>;
    async fn complete_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError>;
    async fn skip_instance(&self, task_id: Uuid, date: NaiveDate)
        -> Result<TaskInstance, CoreError>;
    async fn start_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError>;
    async fn cancel_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError>;
    async fn override_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
        changes: InstanceOverride,
    ) -> Result<TaskInstance, CoreError>;
    async fn clear_override(&self, task_id: Uuid, date: NaiveDate)
        -> Result<TaskInstance, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: TaskRepository + InstanceRepository {}

impl<T: TaskRepository + InstanceRepository> Repository for T {}

/// SQLite implementation of the repository pattern
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
