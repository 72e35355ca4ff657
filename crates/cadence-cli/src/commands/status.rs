use anyhow::Result;
use cadence_core::models::TaskStatus;
use cadence_core::repository::Repository;
use owo_colors::{OwoColorize, Style};

use crate::cli::StatusCommand;
use crate::util::resolve_task;

pub async fn set_status(repo: &impl Repository, command: StatusCommand) -> Result<()> {
    let task = resolve_task(repo, &command.id).await?;
    let task = repo.set_task_status(task.id(), command.status).await?;

    let marker = match task.status {
        TaskStatus::Completed => "✓".style(Style::new().green().bold()).to_string(),
        TaskStatus::Cancelled => "✗".style(Style::new().red().bold()).to_string(),
        TaskStatus::Pending => "○".style(Style::new().blue()).to_string(),
    };
    println!("{} '{}' is now {}", marker, task.title, task.status);
    Ok(())
}
