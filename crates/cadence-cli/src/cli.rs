use cadence_core::models::{Frequency, TaskStatus};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Recurring tasks with materialized, individually editable instances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output (overridden by CADENCE_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a one-time task, or a recurring one with --every
    Add(AddCommand),
    /// List tasks
    Tasks,
    /// List materialized instances
    List(ListCommand),
    /// Show upcoming occurrences of a recurring task without storing them
    Preview(PreviewCommand),
    /// Set the status of a one-time task (pending, completed, cancelled)
    Status(StatusCommand),
    /// Mark an instance as completed
    Do(InstanceRef),
    /// Skip an instance (it is kept as deferred)
    Skip(InstanceRef),
    /// Mark an instance as in progress
    Start(InstanceRef),
    /// Cancel an instance
    Cancel(InstanceRef),
    /// Change the title, description or due time of one instance
    Override(OverrideCommand),
    /// Drop an instance's overrides
    Reset(InstanceRef),
    /// Materialize instances for every active recurring task
    Extend(ExtendCommand),
    /// Stop extending a recurring task
    Pause(TaskRef),
    /// Resume extending a paused recurring task
    Resume(TaskRef),
    /// Delete a task with its rule and instances
    Delete(DeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[clap(short, long)]
    pub description: Option<String>,
    /// Due date of a one-time task
    #[clap(long, conflicts_with = "every")]
    pub due: Option<String>,

    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RecurrenceArgs {
    /// Repeat the task
    #[clap(long, value_enum)]
    pub every: Option<FrequencyArg>,
    /// Step between occurrences
    #[clap(long, requires = "every", default_value_t = 1)]
    pub interval: u32,
    /// Days of week for weekly rules (e.g. 'mon,wed,fri')
    #[clap(long, requires = "every")]
    pub on: Option<String>,
    /// Day of month for monthly rules (clamped to short months)
    #[clap(long, requires = "every")]
    pub day_of_month: Option<u32>,
    /// First date of the rule (defaults to today)
    #[clap(long, requires = "every")]
    pub start: Option<String>,
    /// Time of day inherited by every instance (e.g. '09:00', '6:30 pm')
    #[clap(long, requires = "every")]
    pub at: Option<String>,
    /// Stop after this many occurrences
    #[clap(long, requires = "every", conflicts_with = "until")]
    pub count: Option<u32>,
    /// Last date an occurrence may fall on
    #[clap(long, requires = "every")]
    pub until: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
    Custom,
}

impl From<FrequencyArg> for Frequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Biweekly => Frequency::Biweekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Yearly => Frequency::Yearly,
            FrequencyArg::Custom => Frequency::Custom,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Only instances of this task
    #[clap(long)]
    pub task: Option<String>,
    /// First date to show (defaults to today)
    #[clap(long)]
    pub from: Option<String>,
    /// Last date to show (defaults to 14 days after --from)
    #[clap(long)]
    pub to: Option<String>,
    /// Print JSON instead of a table
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    /// Task ID (or unique prefix)
    pub id: String,
    /// Number of occurrences to show
    #[clap(long, short, default_value = "10")]
    pub count: usize,
    /// Show occurrences on or after this date (defaults to today)
    #[clap(long)]
    pub from: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct TaskRef {
    /// Task ID (or unique prefix)
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    /// Task ID (or unique prefix)
    pub id: String,
    /// New status
    pub status: TaskStatus,
}

#[derive(Parser, Debug, Clone)]
pub struct InstanceRef {
    /// Task ID (or unique prefix)
    pub id: String,
    /// Scheduled date of the instance
    pub date: String,
}

#[derive(Parser, Debug, Clone)]
pub struct OverrideCommand {
    #[command(flatten)]
    pub instance: InstanceRef,
    #[clap(long)]
    pub title: Option<String>,
    #[clap(long)]
    pub description: Option<String>,
    /// New due date and time for this instance only
    #[clap(long)]
    pub due: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ExtendCommand {
    /// Days past today to keep populated (defaults to the configured window)
    #[clap(long)]
    pub window: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// Task ID (or unique prefix)
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}
