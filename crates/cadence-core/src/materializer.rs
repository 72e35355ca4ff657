//! Expands recurrence rules into persisted instances.
//!
//! The materializer is idempotent: re-running any operation with the same
//! inputs creates nothing new. Every instance it writes starts out
//! `NOT_STARTED`, and it never touches the rule or instances that already exist.

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::models::{RecurringTask, TaskInstance};
use crate::recurrence::{Horizon, MaterializationManager};
use crate::repository::InstanceRepository;

pub struct InstanceMaterializer<'a, R: InstanceRepository + ?Sized> {
    repo: &'a R,
    manager: &'a MaterializationManager,
}

impl<'a, R: InstanceRepository + ?Sized> InstanceMaterializer<'a, R> {
    pub fn new(repo: &'a R, manager: &'a MaterializationManager) -> Self {
        Self { repo, manager }
    }

    /// Materializes the rule's candidates up to `horizon`, returning only the
    /// instances created by this call.
    ///
    /// Candidates on or before the latest stored instance are skipped, so a run
    /// picks up where the previous one stopped. Duplicate-key failures caused
    /// by a concurrent writer are treated as "already materialized".
    pub async fn extend(
        &self,
        task: &RecurringTask,
        horizon: Horizon,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let rule = &task.rule;
        let latest = self.repo.latest_instance_date(task.id).await?;
        let mut created = Vec::new();

        for occurrence in rule.occurrences() {
            if !rule.should_continue(occurrence.ordinal, occurrence.date)
                || occurrence.date > horizon.until
                || created.len() >= horizon.max_new
            {
                break;
            }
            if latest.is_some_and(|latest| occurrence.date <= latest) {
                continue;
            }
            if self.repo.find_instance(task.id, occurrence.date).await?.is_some() {
                continue;
            }

            match self.repo.insert_instance(task.id, &occurrence).await {
                Ok(instance) => {
                    debug!(task_id = %task.id, date = %occurrence.date, "materialized instance");
                    created.push(instance);
                }
                Err(CoreError::DuplicateInstance { task_id, date }) => {
                    debug!(task_id = %task_id, date = %date, "instance already materialized");
                }
                Err(e) => return Err(e),
            }
        }

        if !created.is_empty() {
            info!(
                task_id = %task.id,
                created = created.len(),
                until = %horizon.until,
                "extended instances"
            );
        }
        Ok(created)
    }

    /// First expansion of a newly created task: `count` instances from the
    /// rule's start, bounded by the lookahead cap.
    pub async fn materialize_initial(
        &self,
        task: &RecurringTask,
        count: usize,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        self.materialize_initial_as_of(task, count, today()).await
    }

    pub async fn materialize_initial_as_of(
        &self,
        task: &RecurringTask,
        count: usize,
        today: NaiveDate,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let horizon = self.manager.initial_horizon(count, today);
        self.extend(task, horizon).await
    }

    /// Ensures instances exist through `today + window_days`. Returns how many
    /// were created.
    pub async fn extend_horizon(
        &self,
        task: &RecurringTask,
        window_days: u32,
    ) -> Result<usize, CoreError> {
        self.extend_horizon_as_of(task, window_days, today()).await
    }

    pub async fn extend_horizon_as_of(
        &self,
        task: &RecurringTask,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<usize, CoreError> {
        let horizon = self.manager.rolling_horizon(window_days, today);
        Ok(self.extend(task, horizon).await?.len())
    }
}

/// Calendar date the materializer treats as "today".
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
