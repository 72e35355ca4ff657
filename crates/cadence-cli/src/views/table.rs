use cadence_core::models::{InstanceStatus, Occurrence, Task, TaskStatus};
use chrono::{Local, NaiveDate, NaiveDateTime};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

/// An instance flattened with its task for display.
#[derive(Debug, Clone)]
pub struct ViewInstance {
    pub task_title: String,
    pub scheduled_date: NaiveDate,
    pub status: InstanceStatus,
    pub due_at: NaiveDateTime,
    pub overdue: bool,
    pub overridden: bool,
}

pub fn display_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Schedule"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(task.id().to_string()));

        let mut title_cell = Cell::new(task.title());
        if matches!(task.status(), TaskStatus::Completed | TaskStatus::Cancelled) {
            title_cell = title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey);
        }
        row.add_cell(title_cell);
        row.add_cell(Cell::new(task.status().to_string()));

        let schedule = match task {
            Task::OneTime(t) => match t.due_at {
                Some(due) => Cell::new(format!("due {}", due.format("%Y-%m-%d %H:%M"))),
                None => Cell::new("None"),
            },
            Task::Recurring(t) => {
                let rule = &t.rule;
                let mut text = format!("↻ {}", rule.frequency());
                if rule.interval() > 1 {
                    text.push_str(&format!(" x{}", rule.interval()));
                }
                if !rule.days_of_week().is_empty() {
                    text.push_str(&format!(" on {}", rule.days_of_week()));
                }
                if let Some(day) = rule.day_of_month() {
                    text.push_str(&format!(" day {}", day));
                }
                text.push_str(&format!(" from {}", rule.start_date()));
                let cell = Cell::new(text);
                if t.active {
                    cell
                } else {
                    cell.fg(Color::DarkGrey).add_attribute(Attribute::Italic)
                }
            }
        };
        row.add_cell(schedule);
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_instances(instances: &[ViewInstance]) {
    if instances.is_empty() {
        println!("No instances found.");
        return;
    }

    let now = Local::now().naive_local();
    let today = now.date();

    let mut table = Table::new();
    table.set_header(vec!["Date", "Title", "Status", "Due"]);

    for instance in instances {
        let mut row = Row::new();
        row.add_cell(Cell::new(instance.scheduled_date.format("%a %Y-%m-%d")));

        let mut title = instance.task_title.clone();
        if instance.overridden {
            title.push_str(" ✎");
        }
        let mut title_cell = Cell::new(title);
        if instance.status.is_terminal() {
            title_cell = title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey);
        }
        row.add_cell(title_cell);

        let status_cell = Cell::new(instance.status.to_string());
        row.add_cell(match instance.status {
            InstanceStatus::Completed => status_cell.fg(Color::Green),
            InstanceStatus::InProgress => status_cell.fg(Color::Cyan),
            InstanceStatus::Deferred | InstanceStatus::Cancelled => {
                status_cell.fg(Color::DarkGrey)
            }
            InstanceStatus::NotStarted => status_cell,
        });

        let due_cell = Cell::new((instance.due_at - now).humanize());
        row.add_cell(if instance.overdue {
            due_cell.fg(Color::Red) // Overdue
        } else if instance.due_at.date() == today && !instance.status.is_terminal() {
            due_cell.fg(Color::Yellow) // Due today
        } else {
            due_cell
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_occurrences(title: &str, occurrences: &[Occurrence]) {
    if occurrences.is_empty() {
        println!("No upcoming occurrences for '{}'.", title);
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Time"]);
    for occurrence in occurrences {
        table.add_row(vec![
            Cell::new(occurrence.ordinal + 1),
            Cell::new(occurrence.date.format("%a %Y-%m-%d")),
            Cell::new(
                occurrence
                    .time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    println!("{table}");
}
