use anyhow::Result;
use cadence_core::driver::HorizonExtensionDriver;
use cadence_core::materializer::today;
use cadence_core::recurrence::MaterializationManager;
use cadence_core::repository::Repository;
use owo_colors::{OwoColorize, Style};

use crate::cli::{ExtendCommand, TaskRef};
use crate::util::resolve_recurring_task;

pub async fn extend(
    repo: &impl Repository,
    manager: &MaterializationManager,
    command: ExtendCommand,
) -> Result<()> {
    let window = command
        .window
        .unwrap_or(manager.config().rolling_window_days);
    let summary = HorizonExtensionDriver::new(repo, manager)
        .run_as_of(window, today())
        .await?;

    let style = if summary.tasks_with_errors == 0 {
        Style::new().green().bold()
    } else {
        Style::new().yellow().bold()
    };
    println!(
        "{} Extended {} task(s) by {} day(s): {} new instance(s) in {}ms",
        "✓".style(style),
        summary.tasks_processed,
        window,
        summary.instances_created,
        summary.duration_ms
    );
    for error in &summary.errors {
        println!("  {} {}", "✗".red(), error);
    }
    Ok(())
}

pub async fn set_active(repo: &impl Repository, target: TaskRef, active: bool) -> Result<()> {
    let task = resolve_recurring_task(repo, &target.id).await?;
    let task = repo.set_task_active(task.id, active).await?;

    let verb = if active { "Resumed" } else { "Paused" };
    println!(
        "{} {} '{}'",
        "✓".style(Style::new().green().bold()),
        verb,
        task.title.bright_white().bold()
    );
    Ok(())
}
