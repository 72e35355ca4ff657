use async_trait::async_trait;
use cadence_core::db::establish_connection;
use cadence_core::driver::HorizonExtensionDriver;
use cadence_core::error::CoreError;
use cadence_core::materializer::InstanceMaterializer;
use cadence_core::models::*;
use cadence_core::recurrence::MaterializationManager;
use cadence_core::repository::{InstanceRepository, SqliteRepository, TaskRepository};
use chrono::{NaiveDate, NaiveTime, Weekday};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper function to create a test database
async fn setup_test_db() -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (SqliteRepository::new(pool), temp_dir)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 1, 1)
}

async fn create_recurring(
    repo: &SqliteRepository,
    title: &str,
    rule: NewRecurrenceRule,
) -> RecurringTask {
    repo.add_recurring_task(NewRecurringTaskData {
        title: title.to_string(),
        description: Some(format!("Test task: {}", title)),
        rule: rule.build().expect("valid rule"),
    })
    .await
    .expect("Failed to create recurring task")
}

async fn scheduled_dates(repo: &SqliteRepository, task_id: Uuid) -> Vec<NaiveDate> {
    repo.list_instances(task_id, None, None)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.scheduled_date)
        .collect()
}

mod materialization {
    use super::*;

    #[tokio::test]
    async fn test_daily_initial_horizon() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let task = create_recurring(
            &repo,
            "Standup",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)).at(nine),
        )
        .await;

        let created = InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();

        assert_eq!(created.len(), 5);
        assert_eq!(
            scheduled_dates(&repo, task.id).await,
            (1..=5).map(|d| date(2025, 1, d)).collect::<Vec<_>>()
        );
        assert!(created
            .iter()
            .all(|i| i.status == InstanceStatus::NotStarted && i.scheduled_time == Some(nine)));
    }

    #[tokio::test]
    async fn test_extension_is_idempotent() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Journal",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        let materializer = InstanceMaterializer::new(&repo, &manager);

        materializer
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();
        let again = materializer
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();
        assert!(again.is_empty());

        // Window of 30 days from Jan 1 covers Jan 6 through Jan 31
        let extended = materializer
            .extend_horizon_as_of(&task, 30, today())
            .await
            .unwrap();
        assert_eq!(extended, 26);
        let repeated = materializer
            .extend_horizon_as_of(&task, 30, today())
            .await
            .unwrap();
        assert_eq!(repeated, 0);
        assert_eq!(repo.count_instances(task.id).await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_after_occurrences_caps_total() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Physio",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)).ending_after(3),
        )
        .await;
        let materializer = InstanceMaterializer::new(&repo, &manager);

        let created = materializer
            .materialize_initial_as_of(&task, 90, today())
            .await
            .unwrap();
        assert_eq!(created.len(), 3);

        materializer
            .extend_horizon_as_of(&task, 365, today())
            .await
            .unwrap();
        assert_eq!(repo.count_instances(task.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_by_date_stops_at_end_date() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Antibiotics",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)).ending_on(date(2025, 1, 10)),
        )
        .await;

        InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 90, today())
            .await
            .unwrap();

        let dates = scheduled_dates(&repo, task.id).await;
        assert_eq!(dates.len(), 10);
        assert!(dates.iter().all(|d| *d <= date(2025, 1, 10)));
    }

    #[tokio::test]
    async fn test_safety_cap_limits_initial_horizon() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::new(MaterializationConfig {
            lookahead_days: 10,
            ..MaterializationConfig::default()
        });
        let task = create_recurring(
            &repo,
            "Capped",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let created = InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 90, today())
            .await
            .unwrap();
        assert_eq!(created.len(), 11);
        assert_eq!(created.last().unwrap().scheduled_date, date(2025, 1, 11));
    }

    #[tokio::test]
    async fn test_monthly_clamping_is_persisted() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Pay rent",
            NewRecurrenceRule::new(Frequency::Monthly, date(2025, 1, 31)).day_of_month(31),
        )
        .await;

        InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 3, today())
            .await
            .unwrap();
        assert_eq!(
            scheduled_dates(&repo, task.id).await,
            vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
    }

    #[tokio::test]
    async fn test_weekly_day_set_persisted() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Gym",
            NewRecurrenceRule::new(Frequency::Weekly, date(2025, 1, 6))
                .on([Weekday::Mon, Weekday::Wed, Weekday::Fri]),
        )
        .await;

        // The rule survives the round trip through storage
        let stored = repo
            .find_task_by_id(task.id)
            .await
            .unwrap()
            .and_then(Task::into_recurring)
            .unwrap();
        assert_eq!(stored.rule, task.rule);

        InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&stored, 4, today())
            .await
            .unwrap();
        assert_eq!(
            scheduled_dates(&repo, task.id).await,
            vec![date(2025, 1, 6), date(2025, 1, 8), date(2025, 1, 10), date(2025, 1, 13)]
        );
    }

    #[tokio::test]
    async fn test_rule_replacement_keeps_existing_instances() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Review",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        let materializer = InstanceMaterializer::new(&repo, &manager);
        materializer
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();

        let weekly = NewRecurrenceRule::new(Frequency::Weekly, date(2025, 1, 1))
            .on([Weekday::Mon])
            .build()
            .unwrap();
        let task = repo.replace_rule(task.id, weekly).await.unwrap();

        materializer
            .extend_horizon_as_of(&task, 30, today())
            .await
            .unwrap();

        let dates = scheduled_dates(&repo, task.id).await;
        let mut expected: Vec<NaiveDate> = (1..=5).map(|d| date(2025, 1, d)).collect();
        expected.extend([date(2025, 1, 6), date(2025, 1, 13), date(2025, 1, 20), date(2025, 1, 27)]);
        assert_eq!(dates, expected);
    }
}

mod instance_actions {
    use super::*;

    async fn daily_with_five(repo: &SqliteRepository) -> RecurringTask {
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            repo,
            "Water plants",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        InstanceMaterializer::new(repo, &manager)
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();
        task
    }

    #[tokio::test]
    async fn test_skip_leaves_others_untouched() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;

        let skipped = repo.skip_instance(task.id, date(2025, 1, 3)).await.unwrap();
        assert_eq!(skipped.status, InstanceStatus::Deferred);

        for instance in repo.list_instances(task.id, None, None).await.unwrap() {
            if instance.scheduled_date == date(2025, 1, 3) {
                assert_eq!(instance.status, InstanceStatus::Deferred);
            } else {
                assert_eq!(instance.status, InstanceStatus::NotStarted);
            }
        }
    }

    #[tokio::test]
    async fn test_override_isolation() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;

        let overridden = repo
            .override_instance(
                task.id,
                date(2025, 1, 2),
                InstanceOverride {
                    title: Some("Water plants (vacation)".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(overridden.overridden);
        assert_eq!(overridden.effective_title(&task), "Water plants (vacation)");

        let neighbour = repo
            .find_instance(task.id, date(2025, 1, 3))
            .await
            .unwrap()
            .unwrap();
        assert!(!neighbour.overridden);
        assert_eq!(neighbour.effective_title(&task), "Water plants");

        let cleared = repo.clear_override(task.id, date(2025, 1, 2)).await.unwrap();
        assert_eq!(cleared.effective_title(&task), "Water plants");
    }

    #[tokio::test]
    async fn test_complete_is_idempotent_in_storage() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;

        let first = repo.complete_instance(task.id, date(2025, 1, 1)).await.unwrap();
        let second = repo.complete_instance(task.id, date(2025, 1, 1)).await.unwrap();
        assert_eq!(first.status, InstanceStatus::Completed);
        assert_eq!(first.completed_at, second.completed_at);

        let err = repo.skip_instance(task.id, date(2025, 1, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_start_and_cancel() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;

        let started = repo.start_instance(task.id, date(2025, 1, 4)).await.unwrap();
        assert_eq!(started.status, InstanceStatus::InProgress);
        let cancelled = repo.cancel_instance(task.id, date(2025, 1, 4)).await.unwrap();
        assert_eq!(cancelled.status, InstanceStatus::Cancelled);

        let stored = repo.find_instance_by_id(cancelled.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InstanceStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_not_found_for_wrong_task_or_date() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;

        let wrong_task = repo.complete_instance(Uuid::now_v7(), date(2025, 1, 1)).await;
        assert!(matches!(wrong_task, Err(CoreError::NotFound(_))));

        let wrong_date = repo.skip_instance(task.id, date(2025, 2, 1)).await;
        assert!(matches!(wrong_date, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_instances_ranges() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = daily_with_five(&repo).await;
        let other = daily_with_five(&repo).await;

        let ranged = repo
            .list_instances(task.id, Some(date(2025, 1, 2)), Some(date(2025, 1, 4)))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 3);

        let everyone = repo
            .list_instances_between(date(2025, 1, 5), date(2025, 1, 5))
            .await
            .unwrap();
        assert_eq!(everyone.len(), 2);
        assert!(everyone.iter().any(|i| i.task_id == other.id));
    }
}

mod tasks {
    use super::*;

    #[tokio::test]
    async fn test_one_time_task() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = repo
            .add_task(NewTaskData {
                title: "File taxes".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(task.kind(), TaskKind::OneTime);

        let rule = NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1))
            .build()
            .unwrap();
        let err = repo.replace_rule(task.id(), rule).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_one_time_task_status() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = repo
            .add_task(NewTaskData {
                title: "Renew passport".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);

        let done = repo
            .set_task_status(task.id(), TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        // Completing again keeps the original timestamp
        let again = repo
            .set_task_status(task.id(), TaskStatus::Completed)
            .await
            .unwrap();
        assert_eq!(again.completed_at, done.completed_at);

        let reopened = repo
            .set_task_status(task.id(), TaskStatus::Pending)
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());

        let stored = repo.find_task_by_id(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_recurring_task_status_rejected() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = create_recurring(
            &repo,
            "Standup",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let err = repo
            .set_task_status(task.id, TaskStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let missing = repo
            .set_task_status(Uuid::now_v7(), TaskStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let (repo, _temp_dir) = setup_test_db().await;
        let err = repo.add_task(NewTaskData::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_short_id_prefix_lookup() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = create_recurring(
            &repo,
            "Prefix",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let prefix = &task.id.to_string()[..8];
        let found = repo.find_tasks_by_short_id_prefix(prefix).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), task.id);

        let upper = prefix.to_uppercase();
        assert_eq!(repo.find_tasks_by_short_id_prefix(&upper).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_instances() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Temporary",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();

        repo.delete_task(task.id).await.unwrap();
        assert!(repo.find_task_by_id(task.id).await.unwrap().is_none());
        assert_eq!(repo.count_instances(task.id).await.unwrap(), 0);

        let again = repo.delete_task(task.id).await;
        assert!(matches!(again, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = create_recurring(
            &repo,
            "Seasonal",
            NewRecurrenceRule::new(Frequency::Weekly, date(2025, 1, 1)),
        )
        .await;

        repo.set_task_active(task.id, false).await.unwrap();
        assert!(repo.find_active_recurring_tasks().await.unwrap().is_empty());

        let resumed = repo.set_task_active(task.id, true).await.unwrap();
        assert!(resumed.active);
        assert_eq!(repo.find_active_recurring_tasks().await.unwrap().len(), 1);
    }
}

/// Wraps the SQLite repository to simulate races and storage failures.
struct TestRepository {
    inner: SqliteRepository,
    /// Pretend nothing is materialized yet, as a concurrent run would see it.
    hide_existing: bool,
    /// Number of inserts that fail with a transient error before succeeding.
    transient_failures: AtomicU32,
    /// Inserts for this task always fail.
    broken_task: Option<Uuid>,
}

impl TestRepository {
    fn new(inner: SqliteRepository) -> Self {
        Self {
            inner,
            hide_existing: false,
            transient_failures: AtomicU32::new(0),
            broken_task: None,
        }
    }
}

#[async_trait]
impl InstanceRepository for TestRepository {
    async fn find_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<TaskInstance>, CoreError> {
        if self.hide_existing {
            return Ok(None);
        }
        self.inner.find_instance(task_id, date).await
    }

    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        self.inner.find_instance_by_id(id).await
    }

    async fn insert_instance(
        &self,
        task_id: Uuid,
        occurrence: &Occurrence,
    ) -> Result<TaskInstance, CoreError> {
        if self.broken_task == Some(task_id) {
            return Err(CoreError::InvalidInput("storage rejected instance".to_string()));
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(CoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert_instance(task_id, occurrence).await
    }

    async fn list_instances(
        &self,
        task_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        self.inner.list_instances(task_id, from, to).await
    }

    async fn list_instances_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        self.inner.list_instances_between(from, to).await
    }

    async fn latest_instance_date(&self, task_id: Uuid) -> Result<Option<NaiveDate>, CoreError> {
        if self.hide_existing {
            return Ok(None);
        }
        self.inner.latest_instance_date(task_id).await
    }

    async fn count_instances(&self, task_id: Uuid) -> Result<i64, CoreError> {
        self.inner.count_instances(task_id).await
    }

    async fn complete_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.complete_instance(task_id, date).await
    }

    async fn skip_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.skip_instance(task_id, date).await
    }

    async fn start_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.start_instance(task_id, date).await
    }

    async fn cancel_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.cancel_instance(task_id, date).await
    }

    async fn override_instance(
        &self,
        task_id: Uuid,
        date: NaiveDate,
        changes: InstanceOverride,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.override_instance(task_id, date, changes).await
    }

    async fn clear_override(
        &self,
        task_id: Uuid,
        date: NaiveDate,
    ) -> Result<TaskInstance, CoreError> {
        self.inner.clear_override(task_id, date).await
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_insert_is_swallowed() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Race",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        InstanceMaterializer::new(&repo, &manager)
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();

        // A second writer that cannot see the first one's rows
        let mut racing = TestRepository::new(repo.clone());
        racing.hide_existing = true;
        let created = InstanceMaterializer::new(&racing, &manager)
            .materialize_initial_as_of(&task, 5, today())
            .await
            .unwrap();

        assert!(created.is_empty());
        assert_eq!(repo.count_instances(task.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_insert_reports_duplicate() {
        let (repo, _temp_dir) = setup_test_db().await;
        let task = create_recurring(
            &repo,
            "Direct",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        let occurrence = task.rule.occurrences().next().unwrap();

        repo.insert_instance(task.id, &occurrence).await.unwrap();
        let err = repo.insert_instance(task.id, &occurrence).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateInstance { task_id, date: d } if task_id == task.id && d == occurrence.date
        ));
    }
}

mod driver {
    use super::*;

    #[tokio::test]
    async fn test_run_skips_paused_tasks() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let active = create_recurring(
            &repo,
            "Active",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        let paused = create_recurring(
            &repo,
            "Paused",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        repo.set_task_active(paused.id, false).await.unwrap();

        let summary = HorizonExtensionDriver::new(&repo, &manager)
            .run_as_of(6, today())
            .await
            .unwrap();

        assert_eq!(summary.tasks_processed, 1);
        assert_eq!(summary.instances_created, 7);
        assert_eq!(summary.tasks_with_errors, 0);
        assert_eq!(repo.count_instances(active.id).await.unwrap(), 7);
        assert_eq!(repo.count_instances(paused.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_run() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let broken = create_recurring(
            &repo,
            "Broken",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;
        let healthy = create_recurring(
            &repo,
            "Healthy",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let mut failing = TestRepository::new(repo.clone());
        failing.broken_task = Some(broken.id);
        let tasks = repo.find_active_recurring_tasks().await.unwrap();

        let summary = HorizonExtensionDriver::new(&failing, &manager)
            .extend_tasks(&tasks, 2, today())
            .await;

        assert_eq!(summary.tasks_processed, 2);
        assert_eq!(summary.tasks_with_errors, 1);
        assert_eq!(summary.instances_created, 3);
        assert!(summary.errors[0].contains("Broken"));
        assert_eq!(repo.count_instances(healthy.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Flaky",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let flaky = TestRepository::new(repo.clone());
        flaky.transient_failures.store(2, Ordering::SeqCst);

        let summary = HorizonExtensionDriver::new(&flaky, &manager)
            .extend_tasks(std::slice::from_ref(&task), 2, today())
            .await;

        assert_eq!(summary.tasks_with_errors, 0);
        assert_eq!(summary.instances_created, 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (repo, _temp_dir) = setup_test_db().await;
        let manager = MaterializationManager::with_defaults();
        let task = create_recurring(
            &repo,
            "Down",
            NewRecurrenceRule::new(Frequency::Daily, date(2025, 1, 1)),
        )
        .await;

        let flaky = TestRepository::new(repo.clone());
        flaky.transient_failures.store(10, Ordering::SeqCst);

        let summary = HorizonExtensionDriver::new(&flaky, &manager)
            .extend_tasks(std::slice::from_ref(&task), 2, today())
            .await;

        assert_eq!(summary.tasks_with_errors, 1);
        assert_eq!(summary.instances_created, 0);
        // One initial attempt plus the configured retries
        assert_eq!(flaky.transient_failures.load(Ordering::SeqCst), 7);
    }
}
