use anyhow::{anyhow, Result};
use cadence_core::materializer::{today, InstanceMaterializer};
use cadence_core::models::{NewRecurrenceRule, NewRecurringTaskData, NewTaskData, RecurrenceRule};
use cadence_core::recurrence::MaterializationManager;
use cadence_core::repository::Repository;
use owo_colors::{OwoColorize, Style};

use crate::cli::{AddCommand, RecurrenceArgs};
use crate::parser::{parse_date, parse_datetime, parse_time, parse_weekdays};

pub async fn add_task(
    repo: &impl Repository,
    manager: &MaterializationManager,
    command: AddCommand,
) -> Result<()> {
    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    if command.recurrence.every.is_none() {
        let due_at = command.due.as_deref().map(parse_datetime).transpose()?;
        let task = repo
            .add_task(NewTaskData {
                title: command.title,
                description: command.description,
                due_at,
            })
            .await?;

        println!(
            "{} Created task: {}",
            "✓".style(success_style),
            task.title().bright_white().bold()
        );
        println!("  {} Task ID: {}", "→".style(info_style), task.id().to_string().yellow());
        return Ok(());
    }

    let rule = build_rule(&command.recurrence)?;
    let task = repo
        .add_recurring_task(NewRecurringTaskData {
            title: command.title,
            description: command.description,
            rule,
        })
        .await?;

    let created = InstanceMaterializer::new(repo, manager)
        .materialize_initial(&task, manager.config().initial_horizon)
        .await?;

    println!(
        "{} Created recurring task: {}",
        "✓".style(success_style),
        task.title.bright_white().bold()
    );
    println!("  {} Task ID: {}", "→".style(info_style), task.id.to_string().yellow());
    match (created.first(), created.last()) {
        (Some(first), Some(last)) => println!(
            "  {} Materialized {} instances ({} to {})",
            "→".style(info_style),
            created.len(),
            first.scheduled_date,
            last.scheduled_date
        ),
        _ => println!(
            "  {} No instances fall within the lookahead window yet",
            "→".style(info_style)
        ),
    }
    Ok(())
}

fn build_rule(args: &RecurrenceArgs) -> Result<RecurrenceRule> {
    let frequency = args
        .every
        .ok_or_else(|| anyhow!("--every is required for recurring tasks"))?;
    let start = args.start.as_deref().map(parse_date).transpose()?.unwrap_or_else(today);

    let mut rule = NewRecurrenceRule::new(frequency.into(), start).interval(args.interval);
    if let Some(days) = &args.on {
        rule.days_of_week = parse_weekdays(days)?;
    }
    if let Some(day) = args.day_of_month {
        rule = rule.day_of_month(day);
    }
    if let Some(at) = &args.at {
        rule = rule.at(parse_time(at)?);
    }
    if let Some(count) = args.count {
        rule = rule.ending_after(count);
    }
    if let Some(until) = &args.until {
        rule = rule.ending_on(parse_date(until)?);
    }
    Ok(rule.build()?)
}
