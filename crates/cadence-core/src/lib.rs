//! # Cadence Core Library
//!
//! Recurrence rule evaluation and idempotent instance materialization for
//! recurring tasks.
//!
//! ## Core Modules
//!
//! - [`models`]: Rules, tasks, instances and configuration
//! - [`recurrence`]: Pure occurrence calculation and end-condition evaluation
//! - [`instance`]: Per-instance status transitions and overrides
//! - [`materializer`]: Turns rule candidates into stored instances
//! - [`driver`]: Periodic horizon extension across all active tasks
//! - [`repository`]: Data access layer with Repository pattern
//! - [`db`]: Database connection and migration management
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     materializer::InstanceMaterializer,
//!     models::{Frequency, NewRecurrenceRule, NewRecurringTaskData},
//!     recurrence::MaterializationManager,
//!     repository::{SqliteRepository, TaskRepository},
//! };
//! use chrono::{NaiveDate, Weekday};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!     let manager = MaterializationManager::with_defaults();
//!
//!     let rule = NewRecurrenceRule::new(Frequency::Weekly, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())
//!         .on([Weekday::Mon, Weekday::Wed, Weekday::Fri])
//!         .build()?;
//!     let task = repo
//!         .add_recurring_task(NewRecurringTaskData {
//!             title: "Stretch".to_string(),
//!             description: None,
//!             rule,
//!         })
//!         .await?;
//!
//!     let created = InstanceMaterializer::new(&repo, &manager)
//!         .materialize_initial(&task, 10)
//!         .await?;
//!     println!("created {} instances", created.len());
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod driver;
pub mod error;
pub mod instance;
pub mod materializer;
pub mod models;
pub mod recurrence;
pub mod repository;
