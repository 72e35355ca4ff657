use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::{InstanceOverride, InstanceStatus, RecurringTask, TaskInstance};
use cadence_core::repository::Repository;
use chrono::NaiveDate;
use owo_colors::{OwoColorize, Style};

use crate::cli::{InstanceRef, OverrideCommand};
use crate::parser::{parse_date, parse_datetime};
use crate::util::resolve_recurring_task;

/// Status changes that can be applied to a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
    Complete,
    Skip,
    Start,
    Cancel,
    Reset,
}

async fn resolve(repo: &impl Repository, target: &InstanceRef) -> Result<(RecurringTask, NaiveDate)> {
    let task = resolve_recurring_task(repo, &target.id).await?;
    let date = parse_date(&target.date)?;
    Ok((task, date))
}

pub async fn apply_action(
    repo: &impl Repository,
    target: InstanceRef,
    action: InstanceAction,
) -> Result<()> {
    let (task, date) = resolve(repo, &target).await?;
    let instance = match action {
        InstanceAction::Complete => repo.complete_instance(task.id, date).await,
        InstanceAction::Skip => repo.skip_instance(task.id, date).await,
        InstanceAction::Start => repo.start_instance(task.id, date).await,
        InstanceAction::Cancel => repo.cancel_instance(task.id, date).await,
        InstanceAction::Reset => repo.clear_override(task.id, date).await,
    }
    .map_err(|e| not_materialized_hint(e, &task, date))?;

    report(&task, &instance, action);
    Ok(())
}

pub async fn override_instance(repo: &impl Repository, command: OverrideCommand) -> Result<()> {
    let (task, date) = resolve(repo, &command.instance).await?;
    let changes = InstanceOverride {
        title: command.title,
        description: command.description,
        due_at: command.due.as_deref().map(parse_datetime).transpose()?,
    };
    if changes.is_empty() {
        return Err(anyhow!(CoreError::InvalidInput(
            "Pass at least one of --title, --description or --due".to_string()
        )));
    }

    let instance = repo
        .override_instance(task.id, date, changes)
        .await
        .map_err(|e| not_materialized_hint(e, &task, date))?;

    println!(
        "{} Overrode {} on {}",
        "✓".style(Style::new().green().bold()),
        instance.effective_title(&task).bright_white().bold(),
        date
    );
    println!(
        "  {} Due {}",
        "→".style(Style::new().blue()),
        instance.effective_due_at(&task).format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn report(task: &RecurringTask, instance: &TaskInstance, action: InstanceAction) {
    let success_style = Style::new().green().bold();
    let verb = match action {
        InstanceAction::Complete => "Completed",
        InstanceAction::Skip => "Skipped",
        InstanceAction::Start => "Started",
        InstanceAction::Cancel => "Cancelled",
        InstanceAction::Reset => "Reset",
    };
    let status = match instance.status {
        InstanceStatus::Completed => instance.status.to_string().green().to_string(),
        InstanceStatus::InProgress => instance.status.to_string().cyan().to_string(),
        _ => instance.status.to_string(),
    };
    println!(
        "{} {} '{}' on {} ({})",
        "✓".style(success_style),
        verb,
        instance.effective_title(task),
        instance.scheduled_date,
        status
    );
}

/// Most "not found" errors here mean the date is past the materialized horizon.
fn not_materialized_hint(err: CoreError, task: &RecurringTask, date: NaiveDate) -> anyhow::Error {
    match err {
        CoreError::NotFound(_) if task.rule.is_occurrence(date) => anyhow!(CoreError::NotFound(
            format!(
                "'{}' on {} is not materialized yet; run `cadence extend --window <days>` first",
                task.title, date
            )
        )),
        CoreError::NotFound(_) => anyhow!(CoreError::NotFound(format!(
            "'{}' has no occurrence on {}",
            task.title, date
        ))),
        other => anyhow!(other),
    }
}
