use crate::error::CoreError;
use crate::models::{
    EndCondition, NewRecurringTaskData, NewTaskData, OneTimeTask, RecurrenceRule, RecurringTask,
    Task, TaskKind, TaskStatus,
};
use crate::repository::{SqliteRepository, TaskRepository, TaskRow, TASK_SELECT};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        validate_title(&data.title)?;
        let now = Utc::now();
        let task = OneTimeTask {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            status: TaskStatus::Pending,
            due_at: data.due_at,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO tasks (id, kind, title, description, due_at, status, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)"#,
        )
        .bind(task.id)
        .bind(TaskKind::OneTime)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at)
        .bind(task.status)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await?;

        debug!(task_id = %task.id, "added one-time task");
        Ok(Task::OneTime(task))
    }

    async fn add_recurring_task(
        &self,
        data: NewRecurringTaskData,
    ) -> Result<RecurringTask, CoreError> {
        validate_title(&data.title)?;
        let now = Utc::now();
        let task = RecurringTask {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            status: TaskStatus::Pending,
            rule: data.rule,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        sqlx::query(
            r#"INSERT INTO tasks (id, kind, title, description, status, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, 1, ?, ?)"#,
        )
        .bind(task.id)
        .bind(TaskKind::Recurring)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::write_rule_in_transaction(&mut tx, task.id, &task.rule, false).await?;
        tx.commit().await?;

        debug!(task_id = %task.id, frequency = %task.rule.frequency(), "added recurring task");
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{} WHERE t.id = ?", TASK_SELECT))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        // Ids are stored as 16-byte blobs, so match against their hex form.
        let mut pattern: String = short_id
            .chars()
            .filter(|c| *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        pattern.push('%');

        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{} WHERE lower(hex(t.id)) LIKE ? ORDER BY t.created_at",
            TASK_SELECT
        ))
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, CoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!("{} ORDER BY t.created_at", TASK_SELECT))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn find_active_recurring_tasks(&self) -> Result<Vec<RecurringTask>, CoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{} WHERE t.kind = ? AND t.active = 1 ORDER BY t.created_at",
            TASK_SELECT
        ))
        .bind(TaskKind::Recurring)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| Task::try_from(row).map(Task::into_recurring))
            .filter_map(Result::transpose)
            .collect()
    }

    async fn replace_rule(
        &self,
        task_id: Uuid,
        rule: RecurrenceRule,
    ) -> Result<RecurringTask, CoreError> {
        let mut task = self.find_recurring(task_id).await?;
        let now = Utc::now();

        let mut tx = self.pool().begin().await?;
        Self::write_rule_in_transaction(&mut tx, task_id, &rule, true).await?;
        sqlx::query("UPDATE tasks SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(task_id = %task_id, "replaced recurrence rule");
        task.rule = rule;
        task.updated_at = now;
        Ok(task)
    }

    async fn set_task_active(
        &self,
        task_id: Uuid,
        active: bool,
    ) -> Result<RecurringTask, CoreError> {
        let mut task = self.find_recurring(task_id).await?;
        let now = Utc::now();
        sqlx::query("UPDATE tasks SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(task_id)
            .execute(self.pool())
            .await?;

        task.active = active;
        task.updated_at = now;
        Ok(task)
    }

    async fn set_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<OneTimeTask, CoreError> {
        let mut task = match self.find_task_by_id(task_id).await? {
            Some(Task::OneTime(task)) => task,
            Some(Task::Recurring(task)) => {
                return Err(CoreError::InvalidInput(format!(
                    "'{}' is recurring; change the status of its instances instead",
                    task.title
                )))
            }
            None => return Err(CoreError::NotFound(format!("task {}", task_id))),
        };
        if task.status == status {
            return Ok(task);
        }

        let now = Utc::now();
        let completed_at = (status == TaskStatus::Completed).then_some(now);
        sqlx::query("UPDATE tasks SET status = ?, completed_at = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(completed_at)
            .bind(now)
            .bind(task_id)
            .execute(self.pool())
            .await?;

        debug!(task_id = %task_id, ?status, "changed task status");
        task.status = status;
        task.completed_at = completed_at;
        task.updated_at = now;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }
}

impl SqliteRepository {
    async fn find_recurring(&self, task_id: Uuid) -> Result<RecurringTask, CoreError> {
        match self.find_task_by_id(task_id).await? {
            Some(Task::Recurring(task)) => Ok(task),
            Some(Task::OneTime(_)) => Err(CoreError::InvalidInput(format!(
                "task {} is not recurring",
                task_id
            ))),
            None => Err(CoreError::NotFound(format!("task {}", task_id))),
        }
    }

    async fn write_rule_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        task_id: Uuid,
        rule: &RecurrenceRule,
        replace: bool,
    ) -> Result<(), CoreError> {
        let (occurrence_count, end_date) = match rule.end_condition() {
            EndCondition::Never => (None, None),
            EndCondition::AfterOccurrences { count } => (Some(count), None),
            EndCondition::ByDate { date } => (None, Some(date)),
        };
        let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };

        sqlx::query(&format!(
            r#"{} INTO recurrence_rules
               (task_id, frequency, repeat_interval, days_of_week, day_of_month, start_date,
                anchor_time, end_condition, occurrence_count, end_date)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            verb
        ))
        .bind(task_id)
        .bind(rule.frequency())
        .bind(rule.interval())
        .bind(rule.days_of_week().to_string())
        .bind(rule.day_of_month())
        .bind(rule.start_date())
        .bind(rule.anchor_time())
        .bind(rule.end_condition().kind())
        .bind(occurrence_count)
        .bind(end_date)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::InvalidInput("task title cannot be empty".to_string()));
    }
    Ok(())
}
