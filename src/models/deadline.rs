use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which kind of entity a deadline belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineType {
    Project,
    Milestone,
    Task,
}

impl std::fmt::Display for DeadlineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeadlineType::Project => "project",
            DeadlineType::Milestone => "milestone",
            DeadlineType::Task => "task",
        };
        f.write_str(label)
    }
}

/// The single entity a deadline is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineOwner {
    Project(Uuid),
    Milestone(Uuid),
    Task(Uuid),
}

impl DeadlineOwner {
    pub fn kind(&self) -> DeadlineType {
        match self {
            DeadlineOwner::Project(_) => DeadlineType::Project,
            DeadlineOwner::Milestone(_) => DeadlineType::Milestone,
            DeadlineOwner::Task(_) => DeadlineType::Task,
        }
    }

    /// Resolves the flat (type + three nullable references) shape into a single owner.
    pub fn from_refs(
        kind: DeadlineType,
        project_id: Option<Uuid>,
        milestone_id: Option<Uuid>,
        task_id: Option<Uuid>,
    ) -> Result<Self, DeadlineError> {
        let populated: Vec<DeadlineOwner> = [
            project_id.map(DeadlineOwner::Project),
            milestone_id.map(DeadlineOwner::Milestone),
            task_id.map(DeadlineOwner::Task),
        ]
        .into_iter()
        .flatten()
        .collect();

        match populated.as_slice() {
            [owner] if owner.kind() == kind => Ok(*owner),
            [owner] => Err(DeadlineError::TypeMismatch {
                expected: kind,
                found: owner.kind(),
            }),
            _ => Err(DeadlineError::OwnerCount(populated.len())),
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            DeadlineOwner::Project(id) | DeadlineOwner::Milestone(id) | DeadlineOwner::Task(id) => {
                id
            }
        }
    }
}

/// Contract violations when building a deadline from raw owner references.
/// These are caller bugs (or corrupted store data), never user input errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("Deadline must reference exactly one owner, found {0}")]
    OwnerCount(usize),

    #[error("Deadline of type {expected:?} references a {found:?} owner")]
    TypeMismatch {
        expected: DeadlineType,
        found: DeadlineType,
    },
}

/// One historical or current due-date assertion for exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DeadlineRecord", try_from = "DeadlineRecord")]
pub struct Deadline {
    id: Uuid,
    due: Timestamp,
    reason: String,
    owner: DeadlineOwner,
}

impl Deadline {
    pub fn for_owner(owner: DeadlineOwner, due: Timestamp, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            due,
            reason: reason.into(),
            owner,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn due(&self) -> Timestamp {
        self.due
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn owner(&self) -> DeadlineOwner {
        self.owner
    }

    pub fn kind(&self) -> DeadlineType {
        self.owner.kind()
    }
}

/// On-disk shape of a deadline
#[derive(Serialize, Deserialize)]
struct DeadlineRecord {
    id: Uuid,
    due: Timestamp,
    #[serde(default)]
    reason: String,
    #[serde(rename = "type")]
    kind: DeadlineType,
    project_id: Option<Uuid>,
    milestone_id: Option<Uuid>,
    task_id: Option<Uuid>,
}

impl From<Deadline> for DeadlineRecord {
    fn from(deadline: Deadline) -> Self {
        let (project_id, milestone_id, task_id) = match deadline.owner {
            DeadlineOwner::Project(id) => (Some(id), None, None),
            DeadlineOwner::Milestone(id) => (None, Some(id), None),
            DeadlineOwner::Task(id) => (None, None, Some(id)),
        };
        Self {
            id: deadline.id,
            due: deadline.due,
            reason: deadline.reason,
            kind: deadline.owner.kind(),
            project_id,
            milestone_id,
            task_id,
        }
    }
}

impl TryFrom<DeadlineRecord> for Deadline {
    type Error = DeadlineError;

    fn try_from(record: DeadlineRecord) -> Result<Self, Self::Error> {
        let owner = DeadlineOwner::from_refs(
            record.kind,
            record.project_id,
            record.milestone_id,
            record.task_id,
        )?;
        Ok(Self {
            id: record.id,
            due: record.due,
            reason: record.reason,
            owner,
        })
    }
}
