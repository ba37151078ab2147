use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Task {
    /// UUID to identify the task
    pub id: Uuid,
    /// User-facing auto-incremental task number
    pub task_number: u64,
    /// Tenant owning the task
    pub user_id: Uuid,
    /// The project of this task if it belongs to any
    pub project_id: Option<Uuid>,
    /// The milestone of this task, only set together with a project
    pub milestone_id: Option<Uuid>,
    /// Name of the task
    pub name: String,
    /// Free-form workflow status ("todo", "blocked", ...)
    pub status: Option<String>,
    /// Priority, higher means more important
    pub priority: Option<i32>,
    /// Planned start of work
    pub start: Option<Timestamp>,
    /// Planned end of work
    pub end: Option<Timestamp>,
    /// Due date for this task
    pub due: Option<Timestamp>,
    /// When the task was completed
    pub completed_at: Option<Timestamp>,
    /// When the task was created
    pub created_at: Timestamp,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskValidationError {
    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Task status cannot be empty")]
    EmptyStatus,

    #[error("A milestone can only be set on a task that belongs to a project")]
    MilestoneWithoutProject,

    #[error("End time must be after start time")]
    EndNotAfterStart,
}

impl Task {
    pub fn new(
        user_id: Uuid,
        name: String,
        project_id: Option<Uuid>,
        milestone_id: Option<Uuid>,
    ) -> Result<Self, TaskValidationError> {
        if name.trim().is_empty() {
            return Err(TaskValidationError::EmptyName);
        }
        if milestone_id.is_some() && project_id.is_none() {
            return Err(TaskValidationError::MilestoneWithoutProject);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            project_id,
            milestone_id,
            created_at: Timestamp::now(),
            ..Self::default()
        })
    }

    pub fn rename(&mut self, name: String) -> Result<(), TaskValidationError> {
        if name.trim().is_empty() {
            return Err(TaskValidationError::EmptyName);
        }
        self.name = name;
        Ok(())
    }

    pub fn change_status(&mut self, status: String) -> Result<(), TaskValidationError> {
        if status.trim().is_empty() {
            return Err(TaskValidationError::EmptyStatus);
        }
        self.status = Some(status);
        Ok(())
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = Some(priority);
    }

    /// Moving to another project drops the milestone, which belonged to the old one
    pub fn assign_to_project(&mut self, project_id: Uuid) {
        if self.project_id != Some(project_id) {
            self.milestone_id = None;
        }
        self.project_id = Some(project_id);
    }

    pub fn assign_to_milestone(&mut self, milestone_id: Uuid) -> Result<(), TaskValidationError> {
        if self.project_id.is_none() {
            return Err(TaskValidationError::MilestoneWithoutProject);
        }
        self.milestone_id = Some(milestone_id);
        Ok(())
    }

    pub fn unassign_from_milestone(&mut self) {
        self.milestone_id = None;
    }

    pub fn convert_to_floating(&mut self) {
        self.project_id = None;
        self.milestone_id = None;
    }

    pub fn set_due(&mut self, due: Option<Timestamp>) {
        self.due = due;
    }

    pub fn update_time_range(
        &mut self,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<(), TaskValidationError> {
        if let (Some(start), Some(end)) = (start, end)
            && end <= start
        {
            return Err(TaskValidationError::EndNotAfterStart);
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Timestamp::now());
    }

    pub fn mark_incomplete(&mut self) {
        self.completed_at = None;
    }
}
