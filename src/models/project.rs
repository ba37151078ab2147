use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use slug::slugify;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    deadline::{Deadline, DeadlineOwner},
    milestone::{Milestone, MilestoneValidationError},
    schedule::{Reconciliation, Schedulable, reconcile},
};

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Archived,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown project status '{0}' (expected active, paused, completed or archived)")]
pub struct UnknownProjectStatus(pub String);

impl std::str::FromStr for ProjectStatus {
    type Err = UnknownProjectStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "paused" => Ok(ProjectStatus::Paused),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(UnknownProjectStatus(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Project {
    /// UUID of the project
    pub id: Uuid,
    /// Tenant owning the project
    pub user_id: Uuid,
    /// Name of the project
    pub name: String,
    /// Slug of the project
    pub slug: String,
    /// Description of the project
    pub description: String,
    /// Lifecycle status of the project
    pub status: ProjectStatus,
    /// When the project starts
    pub start: Timestamp,
    /// Current deadline, mirrors the latest surviving deadline record
    pub last_deadline: Option<Timestamp>,
    /// Completed at timestamp of the project
    pub completed_at: Option<Timestamp>,
    /// Created at timestamp of the project
    pub created_at: Timestamp,
    /// Milestones of the project
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Deadline history of the project
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectValidationError {
    #[error("Project name cannot be empty")]
    EmptyName,

    #[error("Project description cannot be empty")]
    EmptyDescription,

    #[error(transparent)]
    Milestone(#[from] MilestoneValidationError),
}

impl Project {
    pub fn new(
        user_id: Uuid,
        name: String,
        description: String,
        status: ProjectStatus,
        start: Timestamp,
    ) -> Result<Self, ProjectValidationError> {
        if name.trim().is_empty() {
            return Err(ProjectValidationError::EmptyName);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            slug: slugify(&name),
            name,
            description,
            status,
            start,
            created_at: Timestamp::now(),
            ..Self::default()
        })
    }

    pub fn update_time_period(
        &mut self,
        start: Timestamp,
        end: Option<Timestamp>,
        reason: &str,
    ) -> Reconciliation {
        reconcile(self, start, end, reason)
    }

    pub fn rename(&mut self, name: String) -> Result<(), ProjectValidationError> {
        if name.trim().is_empty() {
            return Err(ProjectValidationError::EmptyName);
        }
        self.slug = slugify(&name);
        self.name = name;
        Ok(())
    }

    pub fn update_description(&mut self, description: String) -> Result<(), ProjectValidationError> {
        if description.trim().is_empty() {
            return Err(ProjectValidationError::EmptyDescription);
        }
        self.description = description;
        Ok(())
    }

    /// Applies a status change, keeping `completed_at` in step with it
    pub fn update_status(&mut self, status: ProjectStatus) {
        match status {
            ProjectStatus::Completed => self.mark_completed(),
            ProjectStatus::Active => self.mark_active(),
            ProjectStatus::Paused | ProjectStatus::Archived => self.status = status,
        }
    }

    pub fn mark_completed(&mut self) {
        self.status = ProjectStatus::Completed;
        self.completed_at = Some(Timestamp::now());
    }

    pub fn mark_active(&mut self) {
        self.status = ProjectStatus::Active;
        self.completed_at = None;
    }

    /// Adds a milestone; a given end goes through reconciliation so the
    /// milestone starts out with its first deadline record.
    pub fn add_milestone(
        &mut self,
        name: String,
        description: String,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        reason: &str,
    ) -> Result<&Milestone, ProjectValidationError> {
        let mut milestone = Milestone::new(self.id, name, description)?;
        milestone.start = start;
        if let Some(end) = end {
            milestone.update_dates(start.unwrap_or(self.start), Some(end), reason);
        }
        self.milestones.push(milestone);
        Ok(&self.milestones[self.milestones.len() - 1])
    }

    pub fn remove_milestone(&mut self, milestone_id: Uuid) -> Option<Milestone> {
        let index = self.milestones.iter().position(|m| m.id == milestone_id)?;
        Some(self.milestones.remove(index))
    }

    pub fn move_milestone(
        &mut self,
        milestone_id: Uuid,
        start: Timestamp,
        end: Option<Timestamp>,
        reason: &str,
    ) -> Option<Reconciliation> {
        self.milestone_mut(milestone_id)
            .map(|milestone| milestone.update_dates(start, end, reason))
    }

    pub fn milestone(&self, milestone_id: Uuid) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == milestone_id)
    }

    pub fn milestone_mut(&mut self, milestone_id: Uuid) -> Option<&mut Milestone> {
        self.milestones.iter_mut().find(|m| m.id == milestone_id)
    }
}

impl Schedulable for Project {
    fn deadline_owner(&self) -> DeadlineOwner {
        DeadlineOwner::Project(self.id)
    }

    fn set_start(&mut self, start: Timestamp) {
        self.start = start;
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
