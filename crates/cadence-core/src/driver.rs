//! Periodic horizon extension across every active recurring task.
//!
//! There is no timer in here. A host (cron, a systemd timer, `cadence extend`)
//! calls [`HorizonExtensionDriver::run`] on whatever schedule it likes.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::materializer::{today, InstanceMaterializer};
use crate::models::RecurringTask;
use crate::recurrence::{MaterializationManager, MaterializationSummary};
use crate::repository::{InstanceRepository, TaskRepository};

const RETRY_BACKOFF_MS: u64 = 50;

pub struct HorizonExtensionDriver<'a, R: ?Sized> {
    repo: &'a R,
    manager: &'a MaterializationManager,
}

impl<'a, R: ?Sized> HorizonExtensionDriver<'a, R> {
    pub fn new(repo: &'a R, manager: &'a MaterializationManager) -> Self {
        Self { repo, manager }
    }
}

impl<'a, R: InstanceRepository + ?Sized> HorizonExtensionDriver<'a, R> {
    /// Extends each task independently. A task that keeps failing is recorded
    /// in the summary and the run moves on to the next one.
    pub async fn extend_tasks(
        &self,
        tasks: &[RecurringTask],
        window_days: u32,
        today: NaiveDate,
    ) -> MaterializationSummary {
        let start = Instant::now();
        let materializer = InstanceMaterializer::new(self.repo, self.manager);
        let retries = self.manager.config().retry_attempts;
        let mut summary = MaterializationSummary::default();

        for task in tasks {
            summary.tasks_processed += 1;
            let mut attempt = 0;
            loop {
                match materializer
                    .extend_horizon_as_of(task, window_days, today)
                    .await
                {
                    Ok(created) => {
                        summary.instances_created += created;
                        break;
                    }
                    Err(e) if e.is_transient() && attempt < retries => {
                        attempt += 1;
                        warn!(task_id = %task.id, attempt, error = %e, "retrying horizon extension");
                        tokio::time::sleep(Duration::from_millis(
                            RETRY_BACKOFF_MS * u64::from(attempt),
                        ))
                        .await;
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "horizon extension failed");
                        summary.tasks_with_errors += 1;
                        summary.errors.push(format!("{} ({}): {}", task.title, task.id, e));
                        break;
                    }
                }
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        summary
    }
}

impl<'a, R: TaskRepository + InstanceRepository + ?Sized> HorizonExtensionDriver<'a, R> {
    /// One run over all active tasks using the configured rolling window.
    pub async fn run(&self) -> Result<MaterializationSummary, CoreError> {
        self.run_as_of(self.manager.config().rolling_window_days, today())
            .await
    }

    /// Fails only when the task list itself cannot be loaded.
    pub async fn run_as_of(
        &self,
        window_days: u32,
        today: NaiveDate,
    ) -> Result<MaterializationSummary, CoreError> {
        let tasks = self.repo.find_active_recurring_tasks().await?;
        let summary = self.extend_tasks(&tasks, window_days, today).await;

        info!(
            tasks = summary.tasks_processed,
            created = summary.instances_created,
            failed = summary.tasks_with_errors,
            duration_ms = summary.duration_ms,
            "horizon extension finished"
        );
        Ok(summary)
    }
}
