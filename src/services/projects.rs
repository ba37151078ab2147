use jiff::Timestamp;
use log::{debug, info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        deadline::DeadlineOwner,
        project::{Project, ProjectStatus, ProjectValidationError, UnknownProjectStatus},
        schedule::{Reconciliation, Schedulable},
        store::Store,
    },
    services::{InvalidDate, parse_instant, parse_optional_instant},
    storage::{Storage, StorageError},
};

/// Reason recorded on a deadline when the caller gives none
pub const DEFAULT_REASON: &str = "Updated";
pub const INITIAL_REASON: &str = "Initial deadline";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectLookupError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("Project name is ambiguous. Multiple projects found: {}", .0.join(", "))]
    AmbiguousProjectName(Vec<String>),
}

/// Resolves a fuzzy project name (or exact slug) to the id of one of the user's projects
pub fn resolve_project(
    store: &Store,
    user_id: Uuid,
    name: &str,
) -> Result<Uuid, ProjectLookupError> {
    let matching_projects = store.find_projects_by_name(user_id, name);

    if let Some(exact) = matching_projects
        .iter()
        .find(|p| p.slug == name || p.name.eq_ignore_ascii_case(name))
    {
        return Ok(exact.id);
    }

    match matching_projects.as_slice() {
        [] => Err(ProjectLookupError::ProjectNotFound(name.to_string())),
        [project] => Ok(project.id),
        _ => Err(ProjectLookupError::AmbiguousProjectName(
            matching_projects.iter().map(|p| p.name.clone()).collect(),
        )),
    }
}

/// Logs the outcome of a deadline reconciliation in the key=value event format
pub fn log_reconciliation(owner: DeadlineOwner, outcome: &Reconciliation) {
    let (kind, owner_id) = (owner.kind(), owner.id());
    match outcome {
        Reconciliation::Cleared => {
            info!("event=deadline_cleared owner={kind} owner_id={owner_id}")
        }
        Reconciliation::Unchanged => {
            debug!("event=deadline_unchanged owner={kind} owner_id={owner_id}")
        }
        Reconciliation::Extended { added } => {
            info!("event=deadline_extended owner={kind} owner_id={owner_id} added={added}")
        }
        Reconciliation::PulledIn { added, removed } => {
            info!(
                "event=deadline_pulled_in owner={kind} owner_id={owner_id} added={added} removed={}",
                removed.len()
            );
            for deadline in removed {
                debug!(
                    "event=deadline_removed owner={} owner_id={} deadline_id={} due={}",
                    deadline.kind(),
                    deadline.owner().id(),
                    deadline.id(),
                    deadline.due()
                );
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CreateProjectError {
    #[error("Project with name '{}' already exists", .0)]
    ProjectAlreadyExists(String),

    #[error(transparent)]
    InvalidStatus(#[from] UnknownProjectStatus),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] ProjectValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateProjectParameters {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub reason: Option<String>,
}

pub fn create_project(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateProjectParameters,
) -> Result<Project, CreateProjectError> {
    let status = match parameters.status.as_deref() {
        Some(status) => status.parse::<ProjectStatus>()?,
        None => ProjectStatus::Active,
    };
    let start = match parameters.start.as_deref() {
        Some(start) => parse_instant(start)?,
        None => Timestamp::now(),
    };
    let end = parse_optional_instant(parameters.end.as_deref())?;

    let mut project = Project::new(
        parameters.user_id,
        parameters.name,
        parameters.description.unwrap_or_default(),
        status,
        start,
    )?;

    if store
        .get_projects_for_user(parameters.user_id)
        .any(|p| p.slug == project.slug)
    {
        warn!("event=project_create status=rejected reason=duplicate slug={}", project.slug);
        return Err(CreateProjectError::ProjectAlreadyExists(project.name));
    }

    if end.is_some() {
        let reason = parameters.reason.as_deref().unwrap_or(INITIAL_REASON);
        let outcome = project.update_time_period(start, end, reason);
        log_reconciliation(project.deadline_owner(), &outcome);
    }

    info!("event=project_create status=ok project_id={}", project.id);
    let created = project.clone();
    store.add_project(project);
    storage.save(store)?;

    Ok(created)
}

#[derive(Debug, Error)]
pub enum UpdateProjectError {
    #[error(transparent)]
    Lookup(#[from] ProjectLookupError),

    #[error("Project with name '{}' already exists", .0)]
    ProjectAlreadyExists(String),

    #[error(transparent)]
    InvalidStatus(#[from] UnknownProjectStatus),

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),

    #[error(transparent)]
    Validation(#[from] ProjectValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Partial update of a project.
///
/// Dates follow the update rules of the planner: `start` together with `end`
/// moves the deadline, `start` alone clears it, and `end` alone moves the
/// deadline while keeping the current start.
pub struct UpdateProjectParameters {
    pub user_id: Uuid,
    pub project: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub reason: Option<String>,
}

pub struct UpdateProjectResult {
    pub project: Project,
    pub reconciliation: Option<Reconciliation>,
}

pub fn update_project(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateProjectParameters,
) -> Result<UpdateProjectResult, UpdateProjectError> {
    let project_id = resolve_project(store, parameters.user_id, &parameters.project)?;

    // Parse everything before touching the project so a bad input changes nothing.
    let status = parameters
        .status
        .as_deref()
        .map(str::parse::<ProjectStatus>)
        .transpose()?;
    let start = parse_optional_instant(parameters.start.as_deref())?;
    let end = parse_optional_instant(parameters.end.as_deref())?;

    let Some(project) = store.get_project(project_id) else {
        return Err(ProjectLookupError::ProjectNotFound(parameters.project).into());
    };
    let mut updated = project.clone();

    if let Some(name) = parameters.name {
        updated.rename(name)?;
        if store
            .get_projects_for_user(parameters.user_id)
            .any(|p| p.id != project_id && p.slug == updated.slug)
        {
            warn!("event=project_update status=rejected reason=duplicate slug={}", updated.slug);
            return Err(UpdateProjectError::ProjectAlreadyExists(updated.name));
        }
    }
    if let Some(description) = parameters.description {
        updated.update_description(description)?;
    }
    if let Some(status) = status {
        updated.update_status(status);
    }

    let reason = parameters.reason.as_deref().unwrap_or(DEFAULT_REASON);
    let reconciliation = match (start, end) {
        (Some(start), end) => Some(updated.update_time_period(start, end, reason)),
        (None, Some(end)) => Some(updated.update_time_period(updated.start, Some(end), reason)),
        (None, None) => None,
    };
    if let Some(outcome) = &reconciliation {
        log_reconciliation(updated.deadline_owner(), outcome);
    }

    if let Some(project) = store.get_project_mut(project_id) {
        *project = updated.clone();
    }
    storage.save(store)?;
    info!("event=project_update status=ok project_id={project_id}");

    Ok(UpdateProjectResult {
        project: updated,
        reconciliation,
    })
}

#[derive(Debug, Error)]
pub enum CompleteProjectError {
    #[error(transparent)]
    Lookup(#[from] ProjectLookupError),

    #[error("Project '{0}' is already completed")]
    ProjectAlreadyCompleted(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CompleteProjectParameters {
    pub user_id: Uuid,
    pub project: String,
}

pub fn complete_project(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CompleteProjectParameters,
) -> Result<Project, CompleteProjectError> {
    let project_id = resolve_project(store, parameters.user_id, &parameters.project)?;
    let Some(project) = store.get_project_mut(project_id) else {
        return Err(ProjectLookupError::ProjectNotFound(parameters.project).into());
    };

    if project.status == ProjectStatus::Completed {
        return Err(CompleteProjectError::ProjectAlreadyCompleted(
            project.name.clone(),
        ));
    }

    project.mark_completed();
    let completed = project.clone();
    storage.save(store)?;
    info!("event=project_complete status=ok project_id={project_id}");

    Ok(completed)
}

#[derive(Debug, Error)]
pub enum DeleteProjectError {
    #[error(transparent)]
    Lookup(#[from] ProjectLookupError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteProjectParameters {
    pub user_id: Uuid,
    pub project: String,
}

pub struct DeleteProjectResult {
    pub project: Project,
    pub cascaded_tasks_count: usize,
}

/// Deletes a project for good. Milestones and deadline history are owned by
/// the project and go with it; tasks of the project are deleted as well, and
/// appointments that pointed at it are unlinked.
pub fn delete_project(
    store: &mut Store,
    storage: &impl Storage,
    parameters: DeleteProjectParameters,
) -> Result<DeleteProjectResult, DeleteProjectError> {
    let project_id = resolve_project(store, parameters.user_id, &parameters.project)?;
    let Some(project) = store.remove_project(project_id) else {
        return Err(ProjectLookupError::ProjectNotFound(parameters.project).into());
    };

    let (removed_tasks, kept_tasks): (Vec<_>, Vec<_>) = std::mem::take(&mut store.tasks)
        .into_iter()
        .partition(|t| t.project_id == Some(project_id));
    store.tasks = kept_tasks;
    let cascaded_tasks_count = removed_tasks.len();

    for appointment in store.appointments.iter_mut() {
        if appointment.project_id == Some(project_id) {
            appointment.project_id = None;
        }
        if appointment
            .task_id
            .is_some_and(|task_id| removed_tasks.iter().any(|t| t.id == task_id))
        {
            appointment.task_id = None;
        }
    }

    storage.save(store)?;
    info!(
        "event=project_delete status=ok project_id={project_id} tasks={cascaded_tasks_count} milestones={} deadlines={}",
        project.milestones.len(),
        project.deadlines.len()
    );

    Ok(DeleteProjectResult {
        project,
        cascaded_tasks_count,
    })
}

/// The user's projects, earliest start first
pub fn list_projects(store: &Store, user_id: Uuid) -> Vec<&Project> {
    let mut projects: Vec<_> = store.get_projects_for_user(user_id).collect();
    projects.sort_by_key(|p| p.start);
    projects
}
