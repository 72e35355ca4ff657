pub mod add;
pub mod delete;
pub mod instance;
pub mod list;
pub mod recurrence;
pub mod status;
