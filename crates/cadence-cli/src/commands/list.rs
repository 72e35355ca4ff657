use anyhow::Result;
use cadence_core::materializer::today;
use cadence_core::models::{RecurringTask, Task, TaskInstance};
use cadence_core::repository::Repository;
use chrono::{Days, Local};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::cli::{ListCommand, PreviewCommand};
use crate::parser::parse_date;
use crate::util::{resolve_recurring_task, resolve_task};
use crate::views::table::{display_instances, display_occurrences, display_tasks, ViewInstance};

const DEFAULT_LIST_DAYS: u64 = 14;

pub async fn list_tasks(repo: &impl Repository) -> Result<()> {
    let tasks = repo.list_tasks().await?;
    display_tasks(&tasks);
    Ok(())
}

/// JSON shape of one listed instance: stored fields plus resolved values.
#[derive(Serialize)]
struct InstanceJson<'a> {
    #[serde(flatten)]
    instance: &'a TaskInstance,
    title: &'a str,
    description: Option<&'a str>,
    due_at: chrono::NaiveDateTime,
    overdue: bool,
}

pub async fn list_instances(repo: &impl Repository, command: ListCommand) -> Result<()> {
    let from = command.from.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
    let to = match command.to.as_deref() {
        Some(to) => parse_date(to)?,
        None => from.checked_add_days(Days::new(DEFAULT_LIST_DAYS)).unwrap_or(from),
    };

    let (instances, tasks) = match command.task.as_deref() {
        Some(id) => {
            let task = resolve_recurring_task(repo, id).await?;
            let instances = repo.list_instances(task.id, Some(from), Some(to)).await?;
            (instances, HashMap::from([(task.id, task)]))
        }
        None => {
            let instances = repo.list_instances_between(from, to).await?;
            let tasks: HashMap<Uuid, RecurringTask> = repo
                .list_tasks()
                .await?
                .into_iter()
                .filter_map(Task::into_recurring)
                .map(|t| (t.id, t))
                .collect();
            (instances, tasks)
        }
    };

    let now = Local::now().naive_local();
    let resolved: Vec<(&TaskInstance, &RecurringTask)> = instances
        .iter()
        .filter_map(|i| tasks.get(&i.task_id).map(|t| (i, t)))
        .collect();

    if command.json {
        let rows: Vec<InstanceJson> = resolved
            .iter()
            .map(|(instance, task)| InstanceJson {
                instance,
                title: instance.effective_title(task),
                description: instance.effective_description(task),
                due_at: instance.effective_due_at(task),
                overdue: instance.is_overdue(task, now),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let views: Vec<ViewInstance> = resolved
        .iter()
        .map(|(instance, task)| ViewInstance {
            task_title: instance.effective_title(task).to_string(),
            scheduled_date: instance.scheduled_date,
            status: instance.status,
            due_at: instance.effective_due_at(task),
            overdue: instance.is_overdue(task, now),
            overridden: instance.overridden,
        })
        .collect();
    display_instances(&views);
    Ok(())
}

pub async fn preview(repo: &impl Repository, command: PreviewCommand) -> Result<()> {
    let task = resolve_task(repo, &command.id).await?;
    let Some(task) = task.as_recurring() else {
        println!("'{}' is a one-time task and does not repeat.", task.title());
        return Ok(());
    };

    let from = command.from.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);
    let occurrences = task.rule.preview(from, command.count);
    display_occurrences(&task.title, &occurrences);
    Ok(())
}
