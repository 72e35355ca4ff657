use crate::error::CoreError;
use crate::models::{InstanceOverride, InstanceStatus, Occurrence, TaskInstance};
use crate::repository::{InstanceRepository, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl InstanceRepository for SqliteRepository {
    async fn find_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<TaskInstance>, CoreError> {
        let instance =
            sqlx::query_as("SELECT * FROM task_instances WHERE task_id = ? AND scheduled_date = ?")
                .bind(task_id)
                .bind(date)
                .fetch_optional(self.pool())
                .await?;
        Ok(instance)
    }

    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let instance = sqlx::query_as("SELECT * FROM task_instances WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(instance)
    }

    async fn insert_instance(
        &self,
        task_id: Uuid,
        occurrence: &Occurrence,
    ) -> Result<TaskInstance, CoreError> {
        let now = Utc::now();
        let instance = TaskInstance {
            id: Uuid::now_v7(),
            task_id,
            scheduled_date: occurrence.date,
            scheduled_time: occurrence.time,
            status: InstanceStatus::NotStarted,
            completed_at: None,
            overridden: false,
            override_title: None,
            override_description: None,
            override_due_at: None,
            created_at: now,
            updated_at: now,
        };

        let result = sqlx::query(
            r#"INSERT INTO task_instances
               (id, task_id, scheduled_date, scheduled_time, status, overridden, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(instance.id)
        .bind(instance.task_id)
        .bind(instance.scheduled_date)
        .bind(instance.scheduled_time)
        .bind(instance.status)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(instance),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::DuplicateInstance {
                    task_id,
                    date: occurrence.date,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_instances(
        &self,
        task_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let instances = sqlx::query_as(
            r#"SELECT * FROM task_instances
               WHERE task_id = ?
                 AND (? IS NULL OR scheduled_date >= ?)
                 AND (? IS NULL OR scheduled_date <= ?)
               ORDER BY scheduled_date"#,
        )
        .bind(task_id)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn list_instances_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let instances = sqlx::query_as(
            r#"SELECT * FROM task_instances
               WHERE scheduled_date BETWEEN ? AND ?
               ORDER BY scheduled_date, scheduled_time"#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn latest_instance_date(&self, task_id: Uuid) -> Result<Option<NaiveDate>, CoreError> {
        let latest: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT scheduled_date FROM task_instances WHERE task_id = ? ORDER BY scheduled_date DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(latest)
    }

    async fn count_instances(&self, task_id: Uuid) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_instances WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn complete_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, |instance| instance.complete(Utc::now()))
            .await
    }

    async fn skip_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, |instance| instance.skip(Utc::now()))
            .await
    }

    async fn start_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, |instance| instance.start(Utc::now()))
            .await
    }

    async fn cancel_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, |instance| instance.cancel(Utc::now()))
            .await
    }

    async fn override_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
        changes: InstanceOverride,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, move |instance| {
            instance.apply_override(changes, Utc::now())
        })
        .await
    }

    async fn clear_override(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.update_instance_with(task_id, date, |instance| {
            instance.clear_override(Utc::now());
            Ok(())
        })
        .await
    }
}

impl SqliteRepository {
    /// Loads the instance of `task_id` on `date`, applies `change` and writes
    /// the mutable columns back, all in one transaction.
    async fn update_instance_with<F>(
        &self,
        task_id: Uuid,
        date: NaiveDate,
        change: F,
    ) -> Result<TaskInstance, CoreError>
    where
        F: FnOnce(&mut TaskInstance) -> Result<(), CoreError> + Send,
    {
        let mut tx = self.pool().begin().await?;

        let mut instance: TaskInstance = sqlx::query_as(
            "SELECT * FROM task_instances WHERE task_id = ? AND scheduled_date = ?",
        )
        .bind(task_id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound(format!("no instance of task {} on {}", task_id, date))
        })?;

        change(&mut instance)?;

        sqlx::query(
            r#"UPDATE task_instances
               SET status = ?, completed_at = ?, overridden = ?, override_title = ?,
                   override_description = ?, override_due_at = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(instance.status)
        .bind(instance.completed_at)
        .bind(instance.overridden)
        .bind(&instance.override_title)
        .bind(&instance.override_description)
        .bind(instance.override_due_at)
        .bind(instance.updated_at)
        .bind(instance.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(instance_id = %instance.id, status = %instance.status, "updated instance");
        Ok(instance)
    }
}
