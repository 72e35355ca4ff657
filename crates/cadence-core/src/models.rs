use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

// ============================================================================
// Recurrence Rule
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
    /// Falls back to daily stepping with the rule's interval.
    Custom,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Biweekly => write!(f, "biweekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
            Frequency::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Ok(Frequency::Biweekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            "yearly" | "year" | "annually" => Ok(Frequency::Yearly),
            "custom" => Ok(Frequency::Custom),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// A set of weekdays stored as a bitmask (bit 0 = Monday).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct WeekdaySet(u8);

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl WeekdaySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::empty();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.iter().map(weekday_code).collect();
        write!(f, "{}", codes.join(","))
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid weekday: {0}")]
pub struct ParseWeekdaySetError(String);

impl FromStr for WeekdaySet {
    type Err = ParseWeekdaySetError;

    /// Accepts comma or whitespace separated day names: `MO,WE`, `mon wed`, `Monday`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = WeekdaySet::empty();
        for token in s.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let day = match token.to_lowercase().as_str() {
                "mo" => Weekday::Mon,
                "tu" => Weekday::Tue,
                "we" => Weekday::Wed,
                "th" => Weekday::Thu,
                "fr" => Weekday::Fri,
                "sa" => Weekday::Sat,
                "su" => Weekday::Sun,
                other => other
                    .parse::<Weekday>()
                    .map_err(|_| ParseWeekdaySetError(token.to_string()))?,
            };
            set.insert(day);
        }
        Ok(set)
    }
}

impl From<WeekdaySet> for String {
    fn from(set: WeekdaySet) -> Self {
        set.to_string()
    }
}

impl TryFrom<String> for WeekdaySet {
    type Error = ParseWeekdaySetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which end condition a rule definition asks for. The payload (count or date)
/// travels separately in [`NewRecurrenceRule`] until the rule is validated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndConditionKind {
    #[default]
    Never,
    AfterOccurrences,
    ByDate,
}

/// When generation of a rule stops. Exactly one variant is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndCondition {
    Never,
    AfterOccurrences { count: u32 },
    ByDate { date: NaiveDate },
}

impl EndCondition {
    pub fn kind(&self) -> EndConditionKind {
        match self {
            EndCondition::Never => EndConditionKind::Never,
            EndCondition::AfterOccurrences { .. } => EndConditionKind::AfterOccurrences,
            EndCondition::ByDate { .. } => EndConditionKind::ByDate,
        }
    }
}

/// Unvalidated rule definition, as submitted by a caller or read from storage.
///
/// Turn it into a [`RecurrenceRule`] with [`NewRecurrenceRule::build`]; every
/// configuration error is reported there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRecurrenceRule {
    pub frequency: Option<Frequency>,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: WeekdaySet,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub anchor_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_condition: EndConditionKind,
    #[serde(default)]
    pub occurrence_count: Option<u32>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_interval() -> u32 {
    1
}

impl NewRecurrenceRule {
    pub fn new(frequency: Frequency, start_date: NaiveDate) -> Self {
        Self {
            frequency: Some(frequency),
            interval: 1,
            days_of_week: WeekdaySet::empty(),
            day_of_month: None,
            start_date,
            anchor_time: None,
            end_condition: EndConditionKind::Never,
            occurrence_count: None,
            end_date: None,
        }
    }

    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    pub fn day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.anchor_time = Some(time);
        self
    }

    pub fn ending_after(mut self, count: u32) -> Self {
        self.end_condition = EndConditionKind::AfterOccurrences;
        self.occurrence_count = Some(count);
        self
    }

    pub fn ending_on(mut self, date: NaiveDate) -> Self {
        self.end_condition = EndConditionKind::ByDate;
        self.end_date = Some(date);
        self
    }

    /// Validates the definition and produces an immutable rule.
    pub fn build(self) -> Result<RecurrenceRule, CoreError> {
        let frequency = self
            .frequency
            .ok_or_else(|| CoreError::InvalidRule("frequency is required".to_string()))?;

        if self.interval < 1 {
            return Err(CoreError::InvalidRule(format!(
                "interval must be at least 1, got {}",
                self.interval
            )));
        }

        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(CoreError::InvalidRule(format!(
                    "day of month must be between 1 and 31, got {}",
                    day
                )));
            }
        }

        let end_condition = match self.end_condition {
            EndConditionKind::Never => EndCondition::Never,
            EndConditionKind::AfterOccurrences => match self.occurrence_count {
                Some(count) if count >= 1 => EndCondition::AfterOccurrences { count },
                Some(count) => {
                    return Err(CoreError::InvalidRule(format!(
                        "occurrence count must be at least 1, got {}",
                        count
                    )))
                }
                None => {
                    return Err(CoreError::InvalidRule(
                        "an AFTER_OCCURRENCES end condition requires a count".to_string(),
                    ))
                }
            },
            EndConditionKind::ByDate => match self.end_date {
                Some(date) if date < self.start_date => {
                    return Err(CoreError::InvalidRule(format!(
                        "end date {} precedes start date {}",
                        date, self.start_date
                    )))
                }
                Some(date) => EndCondition::ByDate { date },
                None => {
                    return Err(CoreError::InvalidRule(
                        "a BY_DATE end condition requires a date".to_string(),
                    ))
                }
            },
        };

        Ok(RecurrenceRule {
            frequency,
            interval: self.interval,
            days_of_week: self.days_of_week,
            day_of_month: self.day_of_month,
            start_date: self.start_date,
            anchor_time: self.anchor_time,
            end_condition,
        })
    }
}

/// Immutable, validated description of a repeating pattern.
///
/// The only way to obtain one is [`NewRecurrenceRule::build`], so every
/// `RecurrenceRule` in the system satisfies its invariants and the occurrence
/// calculator never has to re-check them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NewRecurrenceRule", into = "NewRecurrenceRule")]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    days_of_week: WeekdaySet,
    day_of_month: Option<u32>,
    start_date: NaiveDate,
    anchor_time: Option<NaiveTime>,
    end_condition: EndCondition,
}

impl RecurrenceRule {
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn days_of_week(&self) -> WeekdaySet {
        self.days_of_week
    }

    pub fn day_of_month(&self) -> Option<u32> {
        self.day_of_month
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn anchor_time(&self) -> Option<NaiveTime> {
        self.anchor_time
    }

    pub fn end_condition(&self) -> EndCondition {
        self.end_condition
    }
}

impl TryFrom<NewRecurrenceRule> for RecurrenceRule {
    type Error = CoreError;

    fn try_from(value: NewRecurrenceRule) -> Result<Self, Self::Error> {
        value.build()
    }
}

impl From<RecurrenceRule> for NewRecurrenceRule {
    fn from(rule: RecurrenceRule) -> Self {
        let (end_condition, occurrence_count, end_date) = match rule.end_condition {
            EndCondition::Never => (EndConditionKind::Never, None, None),
            EndCondition::AfterOccurrences { count } => {
                (EndConditionKind::AfterOccurrences, Some(count), None)
            }
            EndCondition::ByDate { date } => (EndConditionKind::ByDate, None, Some(date)),
        };
        Self {
            frequency: Some(rule.frequency),
            interval: rule.interval,
            days_of_week: rule.days_of_week,
            day_of_month: rule.day_of_month,
            start_date: rule.start_date,
            anchor_time: rule.anchor_time,
            end_condition,
            occurrence_count,
            end_date,
        }
    }
}

/// A computed, not yet persisted occurrence of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    /// 0-based count of occurrences produced before this one.
    pub ordinal: u32,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum TaskKind {
    OneTime,
    Recurring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_at: Option<NaiveDateTime>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task that repeats. Owns its rule exclusively; deleting the task deletes
/// the rule and every instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub rule: RecurrenceRule,
    /// Paused tasks are ignored by horizon extension.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    OneTime(OneTimeTask),
    Recurring(RecurringTask),
}

impl Task {
    pub fn id(&self) -> Uuid {
        match self {
            Task::OneTime(t) => t.id,
            Task::Recurring(t) => t.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Task::OneTime(t) => &t.title,
            Task::Recurring(t) => &t.title,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Task::OneTime(t) => t.description.as_deref(),
            Task::Recurring(t) => t.description.as_deref(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            Task::OneTime(t) => t.status,
            Task::Recurring(t) => t.status,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Task::OneTime(_) => TaskKind::OneTime,
            Task::Recurring(_) => TaskKind::Recurring,
        }
    }

    pub fn as_recurring(&self) -> Option<&RecurringTask> {
        match self {
            Task::Recurring(t) => Some(t),
            Task::OneTime(_) => None,
        }
    }

    pub fn into_recurring(self) -> Option<RecurringTask> {
        match self {
            Task::Recurring(t) => Some(t),
            Task::OneTime(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringTaskData {
    pub title: String,
    pub description: Option<String>,
    pub rule: RecurrenceRule,
}

// ============================================================================
// Task Instances
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    NotStarted,
    InProgress,
    Completed,
    /// The "skipped" outcome.
    Deferred,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::NotStarted => write!(f, "not started"),
            InstanceStatus::InProgress => write!(f, "in progress"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Deferred => write!(f, "deferred"),
            InstanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid instance status: {0}")]
pub struct ParseInstanceStatusError(String);

impl FromStr for InstanceStatus {
    type Err = ParseInstanceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "not_started" => Ok(InstanceStatus::NotStarted),
            "in_progress" => Ok(InstanceStatus::InProgress),
            "completed" => Ok(InstanceStatus::Completed),
            "deferred" | "skipped" => Ok(InstanceStatus::Deferred),
            "cancelled" => Ok(InstanceStatus::Cancelled),
            _ => Err(ParseInstanceStatusError(s.to_string())),
        }
    }
}

/// The persisted materialization of one occurrence of a recurring task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TaskInstance {
    pub id: Uuid,
    /// Owning recurring task
    pub task_id: Uuid,
    pub scheduled_date: NaiveDate,
    /// Inherited from the rule's anchor time at materialization
    pub scheduled_time: Option<NaiveTime>,
    pub status: InstanceStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub overridden: bool,
    pub override_title: Option<String>,
    pub override_description: Option<String>,
    pub override_due_at: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields to replace on a single instance. `None` leaves the current value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOverride {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<NaiveDateTime>,
}

impl InstanceOverride {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_at.is_none()
    }
}

// ============================================================================
// Materialization
// ============================================================================

/// Configuration for materialization behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializationConfig {
    /// Hard cap: never materialize further than this many days past today
    pub lookahead_days: u32,
    /// Instances created for a brand new recurring task
    pub initial_horizon: usize,
    /// Window (days) the periodic driver keeps populated
    pub rolling_window_days: u32,
    /// Limit for a single extension of one task
    pub max_batch_size: usize,
    /// Attempts per task for transient storage failures during a driver run
    pub retry_attempts: u32,
}

impl Default for MaterializationConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 365,
            initial_horizon: 90,
            rolling_window_days: 30,
            max_batch_size: 100,
            retry_attempts: 2,
        }
    }
}
