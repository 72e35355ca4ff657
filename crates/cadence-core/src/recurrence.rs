//! Occurrence calculation and end-condition evaluation.
//!
//! Everything in this module is pure: a [`RecurrenceRule`] plus a reference
//! date always yields the same answer, and nothing here touches storage. The
//! stateful side of recurrence lives in [`crate::materializer`].

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::models::{
    EndCondition, Frequency, MaterializationConfig, Occurrence, RecurrenceRule,
};

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// `date` with its day replaced by `day`, clamped to the month's last day.
fn with_clamped_day(date: NaiveDate, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(date.year(), date.month());
    date.with_day(day.min(last))
}

impl EndCondition {
    /// Whether the occurrence with this 0-based ordinal and date may still be
    /// materialized.
    #[inline]
    pub fn should_continue(&self, ordinal: u32, date: NaiveDate) -> bool {
        match *self {
            EndCondition::Never => true,
            EndCondition::AfterOccurrences { count } => ordinal < count,
            EndCondition::ByDate { date: end } => date <= end,
        }
    }
}

impl RecurrenceRule {
    /// Weeks advanced per cycle for weekly-style rules.
    fn week_step(&self) -> u64 {
        match self.frequency() {
            Frequency::Biweekly => 2 * u64::from(self.interval()),
            _ => u64::from(self.interval()),
        }
    }

    /// The next candidate date strictly after `from`.
    ///
    /// Returns `None` only when the result would fall outside chrono's date range.
    pub fn next_after(&self, from: NaiveDate) -> Option<NaiveDate> {
        let interval = self.interval();
        match self.frequency() {
            Frequency::Daily | Frequency::Custom => {
                from.checked_add_days(Days::new(u64::from(interval)))
            }
            Frequency::Weekly | Frequency::Biweekly => {
                let step = self.week_step();
                let days = self.days_of_week();
                if days.is_empty() {
                    return from.checked_add_days(Days::new(7 * step));
                }
                // Scan day by day; entering a new ISO week skips the
                // (step - 1) weeks that are not part of the cycle.
                let mut next = from.succ_opt()?;
                loop {
                    if next.weekday() == Weekday::Mon && step > 1 {
                        next = next.checked_add_days(Days::new(7 * (step - 1)))?;
                    }
                    if days.contains(next.weekday()) {
                        return Some(next);
                    }
                    next = next.succ_opt()?;
                }
            }
            Frequency::Monthly => {
                let next = from.checked_add_months(Months::new(interval))?;
                match self.day_of_month() {
                    Some(day) => with_clamped_day(next, day),
                    None => Some(next),
                }
            }
            Frequency::Yearly => from.checked_add_months(Months::new(interval.checked_mul(12)?)),
        }
    }

    /// The first legal occurrence: the start date itself unless the weekday set
    /// or day of month moves it forward.
    pub fn first_occurrence(&self) -> Option<NaiveDate> {
        let start = self.start_date();
        match self.frequency() {
            Frequency::Weekly | Frequency::Biweekly if !self.days_of_week().is_empty() => {
                if self.days_of_week().contains(start.weekday()) {
                    Some(start)
                } else {
                    self.next_after(start)
                }
            }
            Frequency::Monthly => match self.day_of_month() {
                Some(day) => {
                    let target = with_clamped_day(start, day)?;
                    if target >= start {
                        Some(target)
                    } else {
                        self.next_after(target)
                    }
                }
                None => Some(start),
            },
            _ => Some(start),
        }
    }

    #[inline]
    pub fn should_continue(&self, ordinal: u32, date: NaiveDate) -> bool {
        self.end_condition().should_continue(ordinal, date)
    }

    /// Every candidate the rule produces, ignoring the end condition.
    pub fn occurrences(&self) -> Occurrences<'_> {
        Occurrences {
            rule: self,
            next: self.first_occurrence(),
            ordinal: 0,
        }
    }

    /// Candidates up to the point where the end condition first fails.
    pub fn bounded_occurrences(&self) -> impl Iterator<Item = Occurrence> + '_ {
        self.occurrences()
            .take_while(move |o| self.should_continue(o.ordinal, o.date))
    }

    /// Whether `date` is one of the rule's occurrences, end condition included.
    pub fn is_occurrence(&self, date: NaiveDate) -> bool {
        self.bounded_occurrences()
            .find(|o| o.date >= date)
            .is_some_and(|o| o.date == date)
    }

    /// Up to `count` occurrences on or after `from`.
    pub fn preview(&self, from: NaiveDate, count: usize) -> Vec<Occurrence> {
        self.bounded_occurrences()
            .skip_while(|o| o.date < from)
            .take(count)
            .collect()
    }
}

/// Iterator over a rule's raw occurrence sequence.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    next: Option<NaiveDate>,
    ordinal: u32,
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        let date = self.next?;
        self.next = self.rule.next_after(date);
        let occurrence = Occurrence {
            date,
            time: self.rule.anchor_time(),
            ordinal: self.ordinal,
        };
        self.ordinal = self.ordinal.saturating_add(1);
        Some(occurrence)
    }
}

// ============================================================================
// MaterializationManager
// ============================================================================

/// How far a single materialization run may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    /// Stop after creating this many instances
    pub max_new: usize,
    /// Never materialize a date after this one
    pub until: NaiveDate,
}

/// Statistics collected during a horizon extension run
#[derive(Debug, Clone, Default)]
pub struct MaterializationSummary {
    /// Number of recurring tasks processed
    pub tasks_processed: usize,
    /// Total instances created across all tasks
    pub instances_created: usize,
    /// Number of tasks that failed after all attempts
    pub tasks_with_errors: usize,
    /// Detailed error messages
    pub errors: Vec<String>,
    /// Time taken for the operation
    pub duration_ms: u64,
}

/// Turns [`MaterializationConfig`] policy into concrete horizons.
#[derive(Debug, Clone)]
pub struct MaterializationManager {
    config: MaterializationConfig,
}

impl MaterializationManager {
    pub fn new(config: MaterializationConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(MaterializationConfig::default())
    }

    /// Latest date any run may materialize, counted from `today`.
    pub fn safety_cap(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.config.lookahead_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Horizon for the first expansion of a new task: `count` instances,
    /// bounded by the safety cap.
    pub fn initial_horizon(&self, count: usize, today: NaiveDate) -> Horizon {
        Horizon {
            max_new: count,
            until: self.safety_cap(today),
        }
    }

    /// Horizon that keeps `window_days` past `today` populated.
    pub fn rolling_horizon(&self, window_days: u32, today: NaiveDate) -> Horizon {
        let window_end = today
            .checked_add_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MAX);
        Horizon {
            max_new: self.config.max_batch_size,
            until: window_end.min(self.safety_cap(today)),
        }
    }

    pub fn config(&self) -> &MaterializationConfig {
        &self.config
    }
}
