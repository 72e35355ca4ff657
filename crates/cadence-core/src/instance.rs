//! Per-instance status transitions and override resolution.
//!
//! These methods mutate an in-memory [`TaskInstance`]; the repository loads the
//! row, applies one of them and writes the result back.

use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};

use crate::error::CoreError;
use crate::models::{InstanceOverride, InstanceStatus, RecurringTask, TaskInstance};

impl TaskInstance {
    /// Marks the instance completed. Completing twice keeps the first
    /// completion timestamp.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        match self.status {
            InstanceStatus::Completed => Ok(()),
            InstanceStatus::Cancelled => Err(self.invalid("complete")),
            _ => {
                self.status = InstanceStatus::Completed;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
        }
    }

    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(self.invalid("skip"));
        }
        self.status = InstanceStatus::Deferred;
        self.updated_at = now;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(self.invalid("start"));
        }
        self.status = InstanceStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        match self.status {
            InstanceStatus::Cancelled => Ok(()),
            InstanceStatus::Completed => Err(self.invalid("cancel")),
            _ => {
                self.status = InstanceStatus::Cancelled;
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Merges `changes` into the instance's overrides. Fields left `None` keep
    /// whatever override was already present.
    pub fn apply_override(
        &mut self,
        changes: InstanceOverride,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if changes.is_empty() {
            return Err(CoreError::InvalidInput(
                "an override must change at least one field".to_string(),
            ));
        }
        if let Some(title) = changes.title {
            if title.trim().is_empty() {
                return Err(CoreError::InvalidInput(
                    "override title cannot be empty".to_string(),
                ));
            }
            self.override_title = Some(title);
        }
        if let Some(description) = changes.description {
            self.override_description = Some(description);
        }
        if let Some(due_at) = changes.due_at {
            self.override_due_at = Some(due_at);
        }
        self.overridden = true;
        self.updated_at = now;
        Ok(())
    }

    /// Drops every override so the instance inherits from its task again.
    pub fn clear_override(&mut self, now: DateTime<Utc>) {
        self.overridden = false;
        self.override_title = None;
        self.override_description = None;
        self.override_due_at = None;
        self.updated_at = now;
    }

    pub fn effective_title<'a>(&'a self, task: &'a RecurringTask) -> &'a str {
        match (&self.override_title, self.overridden) {
            (Some(title), true) => title,
            _ => &task.title,
        }
    }

    pub fn effective_description<'a>(&'a self, task: &'a RecurringTask) -> Option<&'a str> {
        match (&self.override_description, self.overridden) {
            (Some(description), true) => Some(description),
            _ => task.description.as_deref(),
        }
    }

    /// Due timestamp: the override if present, otherwise the scheduled date at
    /// the scheduled (or anchor) time, falling back to midnight.
    pub fn effective_due_at(&self, task: &RecurringTask) -> NaiveDateTime {
        if let (Some(due), true) = (self.override_due_at, self.overridden) {
            return due;
        }
        let time = self
            .scheduled_time
            .or_else(|| task.rule.anchor_time())
            .unwrap_or(NaiveTime::MIN);
        self.scheduled_date.and_time(time)
    }

    /// Timed instances are overdue once their due moment passes; untimed ones
    /// only from the day after their scheduled date.
    pub fn is_overdue(&self, task: &RecurringTask, now: NaiveDateTime) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let timed = (self.overridden && self.override_due_at.is_some())
            || self.scheduled_time.is_some()
            || task.rule.anchor_time().is_some();
        if timed {
            self.effective_due_at(task) < now
        } else {
            self.scheduled_date < now.date()
        }
    }

    fn invalid(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.status,
            action,
        }
    }
}
