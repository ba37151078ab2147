pub mod appointment;
pub mod deadline;
pub mod milestone;
pub mod project;
pub mod recurring_task;
pub mod schedule;
pub mod store;
pub mod task;
