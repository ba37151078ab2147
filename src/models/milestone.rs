use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    deadline::{Deadline, DeadlineOwner},
    schedule::{Reconciliation, Schedulable, reconcile},
};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Milestone {
    /// UUID of the milestone
    pub id: Uuid,
    /// Project owning this milestone
    pub project_id: Uuid,
    /// Name of the milestone
    pub name: String,
    /// Description of the milestone
    pub description: String,
    /// When work on the milestone starts
    pub start: Option<Timestamp>,
    /// Current deadline, mirrors the latest surviving deadline record
    pub last_deadline: Option<Timestamp>,
    /// Completed at timestamp of the milestone
    pub completed_at: Option<Timestamp>,
    /// Deadline history of the milestone
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MilestoneValidationError {
    #[error("Milestone name cannot be empty")]
    EmptyName,

    #[error("Milestone description cannot be empty")]
    EmptyDescription,
}

impl Milestone {
    pub fn new(
        project_id: Uuid,
        name: String,
        description: String,
    ) -> Result<Self, MilestoneValidationError> {
        if name.trim().is_empty() {
            return Err(MilestoneValidationError::EmptyName);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            name,
            description,
            ..Self::default()
        })
    }

    pub fn update_dates(
        &mut self,
        start: Timestamp,
        end: Option<Timestamp>,
        reason: &str,
    ) -> Reconciliation {
        reconcile(self, start, end, reason)
    }

    pub fn rename(&mut self, name: String) -> Result<(), MilestoneValidationError> {
        if name.trim().is_empty() {
            return Err(MilestoneValidationError::EmptyName);
        }
        self.name = name;
        Ok(())
    }

    pub fn update_description(&mut self, description: String) -> Result<(), MilestoneValidationError> {
        if description.trim().is_empty() {
            return Err(MilestoneValidationError::EmptyDescription);
        }
        self.description = description;
        Ok(())
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Timestamp::now());
    }

    pub fn mark_incomplete(&mut self) {
        self.completed_at = None;
    }
}

impl Schedulable for Milestone {
    fn deadline_owner(&self) -> DeadlineOwner {
        DeadlineOwner::Milestone(self.id)
    }

    fn set_start(&mut self, start: Timestamp) {
        self.start = Some(start);
    }

    fn last_deadline(&self) -> Option<Timestamp> {
        self.last_deadline
    }

    fn set_last_deadline(&mut self, due: Option<Timestamp>) {
        self.last_deadline = due;
    }

    fn deadlines(&self) -> &[Deadline] {
        &self.deadlines
    }

    fn deadlines_mut(&mut self) -> &mut Vec<Deadline> {
        &mut self.deadlines
    }
}
