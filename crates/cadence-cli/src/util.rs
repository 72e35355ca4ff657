use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{RecurringTask, Task};
use cadence_core::repository::TaskRepository;
use uuid::Uuid;

pub async fn resolve_task(repo: &impl TaskRepository, short_id: &str) -> Result<Task> {
    if let Ok(id) = short_id.parse::<Uuid>() {
        return repo
            .find_task_by_id(id)
            .await?
            .ok_or_else(|| anyhow!(CoreError::NotFound(format!("No task with ID '{}'", id))));
    }
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let mut tasks = repo.find_tasks_by_short_id_prefix(short_id).await?;
    match tasks.len() {
        1 => Ok(tasks.remove(0)),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let task_info: Vec<(String, String)> = tasks
                .into_iter()
                .map(|t| (t.id().to_string(), t.title().to_string()))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(task_info)))
        }
    }
}

pub async fn resolve_recurring_task(
    repo: &impl TaskRepository,
    short_id: &str,
) -> Result<RecurringTask> {
    match resolve_task(repo, short_id).await? {
        Task::Recurring(task) => Ok(task),
        Task::OneTime(task) => Err(anyhow!(CoreError::InvalidInput(format!(
            "'{}' is a one-time task",
            task.title
        )))),
    }
}
